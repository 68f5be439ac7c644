//! Normalizes inbound invocation payloads and dispatches them.
//!
//! Two payload shapes are accepted. A direct invocation carries the request fields
//! at the top level. An HTTP-style envelope carries `httpMethod`, `path` and a
//! JSON-encoded `body`. Anything unrecognized falls through to the direct shape.
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::aggregator::{aggregate, AccumulatedResult};
use crate::bridge::run_to_completion;
use crate::envelope::ResponseEnvelope;
use crate::errors::{BridgeError, BridgeResult};
use crate::models::request::{ConverseRequest, InferenceConfig};
use crate::models::tool::{Tool, ToolConfig};
use crate::prompt_template::story_instruction;
use crate::providers::base::{Completion, Provider};

pub const DEFAULT_MODEL_ID: &str = "us.amazon.nova-premier-v1:0";
pub const DEFAULT_SERVICE_NAME: &str = "converse-bridge";
pub const DEFAULT_QUESTION: &str = "What is the weather today?";
pub const DEFAULT_TOPIC: &str = "a magical adventure";
pub const DEFAULT_TOOL_NAME: &str = "web_search_v1";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You only have access to 1 tool: web_search_v1 (nova_grounding), invoke it 1 time only.";

pub const HEALTH_PATH: &str = "/health";
pub const STORY_PATH: &str = "/api/story";
pub const ASK_PATH: &str = "/api/ask";

/// Per-deployment behaviour of the router
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub service_name: String,
    pub default_model: String,
    pub default_question: String,
    pub default_topic: String,
    /// Offered on question paths only. Not user-controllable.
    pub tool_config: Option<ToolConfig>,
    /// Advisory text sent upstream with questions; the model is not bound by it
    pub system_instruction: Option<String>,
    pub story_inference: InferenceConfig,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            default_model: DEFAULT_MODEL_ID.to_string(),
            default_question: DEFAULT_QUESTION.to_string(),
            default_topic: DEFAULT_TOPIC.to_string(),
            tool_config: Some(ToolConfig::single(Tool::system(DEFAULT_TOOL_NAME))),
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            story_inference: InferenceConfig {
                max_tokens: Some(1024),
                temperature: Some(0.7),
                top_p: None,
            },
        }
    }
}

/// What a streamed answer is about, which decides the body keys of the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Topic,
    Question,
}

impl Subject {
    /// `(subject key, answer key)` in the response body
    pub fn keys(self) -> (&'static str, &'static str) {
        match self {
            Subject::Topic => ("topic", "story"),
            Subject::Question => ("question", "response"),
        }
    }
}

/// A normalized invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Health,
    Ask {
        question: String,
        model_id: String,
    },
    Stream {
        subject: Subject,
        text: String,
        model_id: String,
    },
}

#[derive(Debug, Deserialize)]
struct DirectPayload {
    question: Option<String>,
    topic: Option<String>,
    model_id: Option<String>,
    #[serde(default)]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StoryBody {
    topic: Option<String>,
    prompt: Option<String>,
    model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AskBody {
    question: Option<String>,
    model_id: Option<String>,
    #[serde(default)]
    stream: bool,
}

fn decode<T: DeserializeOwned>(value: Value) -> BridgeResult<T> {
    serde_json::from_value(value).map_err(|e| BridgeError::MalformedInvocation(e.to_string()))
}

/// Decode the JSON-encoded `body` string of an HTTP-style invocation
fn decode_body<T: DeserializeOwned>(body: Option<&Value>) -> BridgeResult<T> {
    let body = match body {
        None | Some(Value::Null) => {
            return Err(BridgeError::MalformedInvocation(
                "request body is required".to_string(),
            ))
        }
        Some(Value::String(body)) => body,
        Some(_) => {
            return Err(BridgeError::MalformedInvocation(
                "request body must be a JSON-encoded string".to_string(),
            ))
        }
    };
    let value: Value = serde_json::from_str(body)
        .map_err(|e| BridgeError::MalformedInvocation(format!("invalid JSON body: {}", e)))?;
    if !value.is_object() {
        return Err(BridgeError::MalformedInvocation(
            "request body must be a JSON object".to_string(),
        ));
    }
    decode(value)
}

/// Dispatches invocations to the unary or streaming path and wraps the outcome.
///
/// The provider is shared read-only across invocations; all conversation and event
/// state lives inside a single call to [`InvocationRouter::handle`].
pub struct InvocationRouter {
    provider: Arc<dyn Provider>,
    settings: RouterSettings,
}

impl InvocationRouter {
    pub fn new(provider: Arc<dyn Provider>, settings: RouterSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Normalize a raw payload into an [`Invocation`]
    pub fn parse(&self, event: &Value) -> BridgeResult<Invocation> {
        if !event.is_object() {
            return Err(BridgeError::MalformedInvocation(
                "invocation payload must be a JSON object".to_string(),
            ));
        }

        if let Some(method) = event.get("httpMethod").and_then(Value::as_str) {
            let method = method.to_ascii_uppercase();
            let path = event.get("path").and_then(Value::as_str).unwrap_or_default();
            match (method.as_str(), path) {
                ("GET", HEALTH_PATH) => return Ok(Invocation::Health),
                ("POST", STORY_PATH) => {
                    let body: StoryBody = decode_body(event.get("body"))?;
                    return Ok(Invocation::Stream {
                        subject: Subject::Topic,
                        text: body
                            .topic
                            .or(body.prompt)
                            .unwrap_or_else(|| self.settings.default_topic.clone()),
                        model_id: self.model_or_default(body.model_id),
                    });
                }
                ("POST", ASK_PATH) => {
                    let body: AskBody = decode_body(event.get("body"))?;
                    return Ok(self.question(body.question, body.model_id, body.stream));
                }
                (method, path) => {
                    debug!(
                        "No route for {} {}, treating as direct invocation",
                        method, path
                    );
                }
            }
        }

        let direct: DirectPayload = decode(event.clone())?;
        if let Some(topic) = direct.topic {
            return Ok(Invocation::Stream {
                subject: Subject::Topic,
                text: topic,
                model_id: self.model_or_default(direct.model_id),
            });
        }
        Ok(self.question(direct.question, direct.model_id, direct.stream))
    }

    fn model_or_default(&self, model_id: Option<String>) -> String {
        model_id.unwrap_or_else(|| self.settings.default_model.clone())
    }

    fn question(
        &self,
        question: Option<String>,
        model_id: Option<String>,
        stream: bool,
    ) -> Invocation {
        let question = question.unwrap_or_else(|| self.settings.default_question.clone());
        let model_id = self.model_or_default(model_id);
        if stream {
            Invocation::Stream {
                subject: Subject::Question,
                text: question,
                model_id,
            }
        } else {
            Invocation::Ask { question, model_id }
        }
    }

    /// Handle one invocation. Never fails: every error becomes a 500 envelope.
    pub fn handle(&self, event: &Value) -> ResponseEnvelope {
        debug!("Received invocation: {}", event);

        let invocation = match self.parse(event) {
            Ok(invocation) => invocation,
            Err(e) => {
                error!("Rejected invocation: {}", e);
                return ResponseEnvelope::failure(&e, false);
            }
        };

        match invocation {
            Invocation::Health => ResponseEnvelope::ok(json!({
                "status": "healthy",
                "service": self.settings.service_name,
            })),
            Invocation::Ask { question, model_id } => {
                match self.ask(&question, &model_id) {
                    Ok(completion) => {
                        info!(request_id = %completion.request_id, "Question answered");
                        ResponseEnvelope::ok(json!({
                            "question": question,
                            "response": completion.message,
                            "requestId": completion.request_id,
                        }))
                    }
                    Err(e) => {
                        error!("Question failed: {}", e);
                        ResponseEnvelope::failure(&e, false)
                    }
                }
            }
            Invocation::Stream {
                subject,
                text,
                model_id,
            } => match self.stream(subject, &text, &model_id) {
                Ok(result) => {
                    info!(
                        request_id = %result.request_id,
                        "Collected {} chunks, total length: {}",
                        result.event_count,
                        result.text.len()
                    );
                    ResponseEnvelope::ok(Self::stream_body(subject, text, result))
                }
                Err(e) => {
                    error!("Streaming failed: {}", e);
                    ResponseEnvelope::failure(&e, true)
                }
            },
        }
    }

    fn ask(&self, question: &str, model_id: &str) -> BridgeResult<Completion> {
        let request = self.question_request(question, model_id);
        let provider = Arc::clone(&self.provider);
        run_to_completion(move || async move { provider.complete(&request).await })
    }

    fn stream(
        &self,
        subject: Subject,
        text: &str,
        model_id: &str,
    ) -> BridgeResult<AccumulatedResult> {
        let request = match subject {
            Subject::Topic => {
                let instruction = story_instruction(text)
                    .map_err(|e| BridgeError::Internal(format!("failed to render prompt: {}", e)))?;
                ConverseRequest::new(model_id, instruction)
                    .with_inference(self.settings.story_inference.clone())
            }
            Subject::Question => self.question_request(text, model_id),
        };

        let provider = Arc::clone(&self.provider);
        run_to_completion(move || async move {
            let events = provider.stream(&request).await?;
            aggregate(events).await
        })
    }

    fn question_request(&self, question: &str, model_id: &str) -> ConverseRequest {
        let mut request = ConverseRequest::new(model_id, question);
        if let Some(system) = &self.settings.system_instruction {
            request = request.with_system(system.clone());
        }
        if let Some(tool_config) = &self.settings.tool_config {
            request = request.with_tool_config(tool_config.clone());
        }
        request
    }

    fn stream_body(subject: Subject, text: String, result: AccumulatedResult) -> Value {
        let (subject_key, answer_key) = subject.keys();
        let mut body = Map::new();
        body.insert(subject_key.to_string(), Value::String(text));
        body.insert(answer_key.to_string(), Value::String(result.text));
        body.insert("mode".to_string(), json!("streaming"));
        body.insert("streaming".to_string(), json!(true));
        body.insert("chunks".to_string(), json!(result.event_count));
        body.insert("complete".to_string(), json!(result.complete));
        body.insert("requestId".to_string(), json!(result.request_id));
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::StreamEvent;
    use crate::providers::mock::{MockProvider, MOCK_REQUEST_ID};

    fn router(provider: &Arc<MockProvider>) -> InvocationRouter {
        InvocationRouter::new(provider.clone(), RouterSettings::default())
    }

    fn story_events() -> Vec<StreamEvent> {
        vec![
            StreamEvent::MessageStart { role: None },
            StreamEvent::text_delta("Once "),
            StreamEvent::text_delta("upon a time"),
            StreamEvent::MessageStop {
                stop_reason: Some("end_turn".to_string()),
            },
        ]
    }

    #[test]
    fn test_health_skips_upstream() {
        let provider = Arc::new(MockProvider::failing(BridgeError::UpstreamUnavailable(
            "should not be called".to_string(),
        )));
        let envelope = router(&provider).handle(&json!({"httpMethod": "GET", "path": "/health"}));

        assert_eq!(envelope.status_code, 200);
        assert_eq!(
            envelope.body_json().unwrap(),
            json!({"status": "healthy", "service": "converse-bridge"})
        );
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_story_over_http_envelope() {
        let provider = Arc::new(MockProvider::with_events(story_events()));
        let envelope = router(&provider).handle(&json!({
            "httpMethod": "POST",
            "path": "/api/story",
            "headers": {"Content-Type": "application/json"},
            "body": "{\"topic\": \"a robot learning to paint\"}"
        }));

        assert_eq!(envelope.status_code, 200);
        let body = envelope.body_json().unwrap();
        assert_eq!(body["topic"], "a robot learning to paint");
        assert_eq!(body["story"], "Once upon a time");
        assert_eq!(body["mode"], "streaming");
        assert_eq!(body["streaming"], true);
        assert_eq!(body["chunks"], 2);
        assert_eq!(body["complete"], true);
        assert_eq!(body["requestId"], MOCK_REQUEST_ID);

        let request = provider.last_request().unwrap();
        assert_eq!(request.model_id, DEFAULT_MODEL_ID);
        assert!(request.conversation.messages()[0]
            .text()
            .contains("bedtime story about a robot learning to paint"));
        assert_eq!(request.tool_config, None);
        assert_eq!(request.inference.unwrap().max_tokens, Some(1024));
    }

    #[test]
    fn test_story_prompt_fallback_and_default_topic() {
        let provider = Arc::new(MockProvider::with_events(story_events()));
        let router = router(&provider);

        let invocation = router
            .parse(&json!({
                "httpMethod": "POST",
                "path": "/api/story",
                "body": "{\"prompt\": \"dragons\"}"
            }))
            .unwrap();
        assert!(matches!(invocation, Invocation::Stream { ref text, .. } if text == "dragons"));

        let invocation = router
            .parse(&json!({"httpMethod": "POST", "path": "/api/story", "body": "{}"}))
            .unwrap();
        assert!(matches!(invocation, Invocation::Stream { ref text, .. } if text == DEFAULT_TOPIC));
    }

    #[test]
    fn test_direct_question_uses_unary_path() {
        let message = json!({"role": "assistant", "content": [{"text": "Sunny."}]});
        let provider = Arc::new(MockProvider::with_message(message.clone()));
        let envelope = router(&provider).handle(&json!({
            "question": "Weather in Seattle?",
            "model_id": "custom-model"
        }));

        assert_eq!(envelope.status_code, 200);
        assert_eq!(
            envelope.body_json().unwrap(),
            json!({
                "question": "Weather in Seattle?",
                "response": message,
                "requestId": MOCK_REQUEST_ID
            })
        );

        let request = provider.last_request().unwrap();
        assert_eq!(request.model_id, "custom-model");
        assert_eq!(request.system.as_deref(), Some(DEFAULT_SYSTEM_INSTRUCTION));
        assert_eq!(
            request.tool_config,
            Some(ToolConfig::single(Tool::system(DEFAULT_TOOL_NAME)))
        );
    }

    #[test]
    fn test_direct_topic_streams() {
        let provider = Arc::new(MockProvider::with_events(story_events()));
        let envelope = router(&provider).handle(&json!({"topic": "the moon"}));

        let body = envelope.body_json().unwrap();
        assert_eq!(body["topic"], "the moon");
        assert_eq!(body["story"], "Once upon a time");
    }

    #[test]
    fn test_streamed_question_uses_question_keys() {
        let provider = Arc::new(MockProvider::with_events(story_events()));
        let envelope = router(&provider).handle(&json!({"question": "Why?", "stream": true}));

        let body = envelope.body_json().unwrap();
        assert_eq!(body["question"], "Why?");
        assert_eq!(body["response"], "Once upon a time");
        assert!(body.get("story").is_none());
        assert!(provider.last_request().unwrap().tool_config.is_some());
    }

    #[test]
    fn test_empty_payload_defaults_to_question() {
        let provider = Arc::new(MockProvider::with_message(json!({})));
        let invocation = router(&provider).parse(&json!({})).unwrap();
        assert_eq!(
            invocation,
            Invocation::Ask {
                question: DEFAULT_QUESTION.to_string(),
                model_id: DEFAULT_MODEL_ID.to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_route_falls_through_to_direct() {
        let provider = Arc::new(MockProvider::with_message(json!({})));
        let invocation = router(&provider)
            .parse(&json!({"httpMethod": "DELETE", "path": "/api/story", "topic": "owls"}))
            .unwrap();
        assert!(matches!(invocation, Invocation::Stream { ref text, .. } if text == "owls"));
    }

    #[test]
    fn test_non_string_method_falls_through_to_direct() {
        let provider = Arc::new(MockProvider::with_events(story_events()));
        let envelope = router(&provider).handle(&json!({"httpMethod": null, "topic": "owls"}));

        assert_eq!(envelope.status_code, 200);
        let body = envelope.body_json().unwrap();
        assert_eq!(body["topic"], "owls");
        assert_eq!(body["story"], "Once upon a time");
    }

    #[test]
    fn test_health_ignores_body() {
        let provider = Arc::new(MockProvider::with_message(json!({})));
        let envelope = router(&provider).handle(&json!({
            "httpMethod": "GET",
            "path": "/health",
            "body": {"unexpected": true}
        }));

        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.body_json().unwrap()["status"], "healthy");
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_ask_route() {
        let provider = Arc::new(MockProvider::with_message(json!({})));
        let invocation = router(&provider)
            .parse(&json!({
                "httpMethod": "post",
                "path": "/api/ask",
                "body": "{\"question\": \"Hi?\"}"
            }))
            .unwrap();
        assert!(matches!(invocation, Invocation::Ask { ref question, .. } if question == "Hi?"));
    }

    #[test]
    fn test_malformed_payloads() {
        let provider = Arc::new(MockProvider::with_events(story_events()));
        let router = router(&provider);

        for event in [
            json!("just a string"),
            json!({"httpMethod": "POST", "path": "/api/story"}),
            json!({"httpMethod": "POST", "path": "/api/story", "body": "not json"}),
            json!({"httpMethod": "POST", "path": "/api/story", "body": "[1, 2]"}),
            json!({"httpMethod": "POST", "path": "/api/ask", "body": {"question": "Hi?"}}),
            json!({"question": 42}),
        ] {
            let envelope = router.handle(&event);
            assert_eq!(envelope.status_code, 500, "payload: {}", event);
            let body = envelope.body_json().unwrap();
            assert!(body["error"]
                .as_str()
                .unwrap()
                .starts_with("Malformed invocation"));
        }
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_transport_failure_before_any_event() {
        let provider = Arc::new(MockProvider::failing(BridgeError::UpstreamUnavailable(
            "connect timeout".to_string(),
        )));
        let envelope = router(&provider).handle(&json!({"topic": "owls"}));

        assert_eq!(envelope.status_code, 500);
        assert!(envelope.headers.is_none());
        let body = envelope.body_json().unwrap();
        assert_eq!(body["error"], "Upstream unavailable: connect timeout");
        assert_eq!(body["streaming"], true);
        assert!(body.get("story").is_none());
    }

    #[test]
    fn test_mid_stream_failure_returns_no_partial_story() {
        let provider = Arc::new(MockProvider::with_results(vec![
            Ok(StreamEvent::text_delta("Once ")),
            Err(BridgeError::AggregationFailure("stream interrupted".to_string())),
        ]));
        let envelope = router(&provider).handle(&json!({"topic": "owls"}));

        assert_eq!(envelope.status_code, 500);
        let body = envelope.body_json().unwrap();
        assert!(body.get("story").is_none());
        assert_eq!(body["error"], "Aggregation failed: stream interrupted");
    }

    #[test]
    fn test_truncated_stream_is_flagged() {
        let provider = Arc::new(MockProvider::with_events(vec![
            StreamEvent::MessageStart { role: None },
            StreamEvent::text_delta("Once "),
        ]));
        let body = router(&provider)
            .handle(&json!({"topic": "owls"}))
            .body_json()
            .unwrap();

        assert_eq!(body["story"], "Once ");
        assert_eq!(body["complete"], false);
    }

    #[test]
    fn test_unary_failure_envelope() {
        let provider = Arc::new(MockProvider::failing(BridgeError::UpstreamRejected {
            status: 403,
            message: "denied".to_string(),
        }));
        let envelope = router(&provider).handle(&json!({"question": "Hi?"}));

        assert_eq!(envelope.status_code, 500);
        assert_eq!(
            envelope.body_json().unwrap(),
            json!({"error": "Upstream rejected the request (403): denied"})
        );
    }
}
