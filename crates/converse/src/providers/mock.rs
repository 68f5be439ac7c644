use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::errors::{BridgeError, BridgeResult};
use crate::models::event::StreamEvent;
use crate::models::request::ConverseRequest;
use crate::providers::base::{Completion, EventStream, Provider};

pub const MOCK_REQUEST_ID: &str = "mock-request-id";

enum Reply {
    Message(Value),
    Events(Vec<BridgeResult<StreamEvent>>),
    Fail(BridgeError),
}

/// A mock provider that returns a pre-configured reply for testing
pub struct MockProvider {
    reply: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<ConverseRequest>>,
}

impl MockProvider {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_message(message: Value) -> Self {
        Self::with_reply(Reply::Message(message))
    }

    pub fn with_events(events: Vec<StreamEvent>) -> Self {
        Self::with_results(events.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<BridgeResult<StreamEvent>>) -> Self {
        Self::with_reply(Reply::Events(results))
    }

    pub fn failing(error: BridgeError) -> Self {
        Self::with_reply(Reply::Fail(error))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ConverseRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn record(&self, request: &ConverseRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: &ConverseRequest) -> BridgeResult<Completion> {
        self.record(request);
        match &self.reply {
            Reply::Message(message) => Ok(Completion {
                message: message.clone(),
                request_id: MOCK_REQUEST_ID.to_string(),
                stop_reason: Some("end_turn".to_string()),
                usage: None,
            }),
            Reply::Fail(error) => Err(error.clone()),
            Reply::Events(_) => Err(BridgeError::Internal(
                "mock configured for streaming only".to_string(),
            )),
        }
    }

    async fn stream(&self, request: &ConverseRequest) -> BridgeResult<EventStream> {
        self.record(request);
        match &self.reply {
            Reply::Events(results) => Ok(EventStream {
                request_id: MOCK_REQUEST_ID.to_string(),
                events: stream::iter(results.clone()).boxed(),
            }),
            Reply::Fail(error) => Err(error.clone()),
            Reply::Message(_) => Err(BridgeError::Internal(
                "mock configured for unary only".to_string(),
            )),
        }
    }
}
