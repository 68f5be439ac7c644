use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::base::{Completion, EventStream, Provider};
use super::configs::ConverseProviderConfig;
use crate::errors::{BridgeError, BridgeResult};
use crate::models::event::{StreamEvent, TokenUsage};
use crate::models::request::ConverseRequest;

pub const REQUEST_ID_HEADER: &str = "x-amzn-requestid";

/// Client for an inference service speaking the Converse API.
///
/// Built once per process and shared read-only across invocations.
pub struct ConverseProvider {
    client: Client,
    config: ConverseProviderConfig,
}

impl ConverseProvider {
    pub fn new(config: ConverseProviderConfig) -> BridgeResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            // every invocation runs on its own short-lived runtime; pooled
            // connections would be bound to a runtime that no longer exists
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self, model_id: &str, action: &str) -> String {
        format!(
            "{}/model/{}/{}",
            self.config.host.trim_end_matches('/'),
            urlencoding::encode(model_id),
            action
        )
    }

    fn payload(request: &ConverseRequest) -> Value {
        let mut payload = json!({ "messages": request.conversation });

        if let Some(system) = &request.system {
            payload["system"] = json!([{ "text": system }]);
        }
        if let Some(tool_config) = &request.tool_config {
            payload["toolConfig"] = json!(tool_config);
        }
        if let Some(inference) = &request.inference {
            payload["inferenceConfig"] = json!(inference);
        }

        payload
    }

    fn request_id(response: &Response) -> String {
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    async fn post(&self, url: &str, payload: &Value, accept: &str) -> BridgeResult<Response> {
        let attempts = self.config.retry_attempts + 1;
        let mut attempt = 0;

        let response = loop {
            attempt += 1;
            let result = self
                .client
                .post(url)
                .bearer_auth(&self.config.api_key)
                .header(reqwest::header::ACCEPT, accept)
                .json(payload)
                .send()
                .await;

            match result {
                Ok(response) => break response,
                Err(e) if attempt < attempts && (e.is_connect() || e.is_timeout()) => {
                    warn!("Transport failure on attempt {}/{}: {}", attempt, attempts, e);
                }
                Err(e) => return Err(BridgeError::UpstreamUnavailable(e.to_string())),
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(text);
        Err(BridgeError::UpstreamRejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Provider for ConverseProvider {
    async fn complete(&self, request: &ConverseRequest) -> BridgeResult<Completion> {
        let url = self.url(&request.model_id, "converse");
        info!(model = %request.model_id, "Invoking model");

        let response = self
            .post(&url, &Self::payload(request), "application/json")
            .await?;
        let request_id = Self::request_id(&response);

        let body: Value = response
            .json()
            .await
            .map_err(|e| BridgeError::InvalidResponse(e.to_string()))?;

        let message = body
            .pointer("/output/message")
            .cloned()
            .ok_or_else(|| BridgeError::InvalidResponse("missing output.message".to_string()))?;
        let stop_reason = body
            .get("stopReason")
            .and_then(|v| v.as_str())
            .map(String::from);
        let usage = body
            .get("usage")
            .cloned()
            .and_then(|v| serde_json::from_value::<TokenUsage>(v).ok());

        debug!(request_id = %request_id, "Model replied: {}", message);

        Ok(Completion {
            message,
            request_id,
            stop_reason,
            usage,
        })
    }

    async fn stream(&self, request: &ConverseRequest) -> BridgeResult<EventStream> {
        let url = self.url(&request.model_id, "converse-stream");
        info!(model = %request.model_id, "Opening model stream");

        let response = self
            .post(&url, &Self::payload(request), "text/event-stream")
            .await?;
        let request_id = Self::request_id(&response);

        let events = response
            .bytes_stream()
            .eventsource()
            .map(|item| match item {
                Ok(event) => StreamEvent::from_sse(&event.event, &event.data),
                Err(e) => Err(BridgeError::AggregationFailure(format!(
                    "stream interrupted: {}",
                    e
                ))),
            })
            .boxed();

        Ok(EventStream { request_id, events })
    }
}
