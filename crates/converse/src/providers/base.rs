use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::errors::BridgeResult;
use crate::models::event::{StreamEvent, TokenUsage};
use crate::models::request::ConverseRequest;

/// Result of a unary call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The raw `output.message` object, returned to callers untouched
    pub message: Value,
    pub request_id: String,
    pub stop_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Result of a streaming call.
///
/// `request_id` is known as soon as the response headers arrive, before any event
/// is consumed. `events` is single-pass and forward-only.
pub struct EventStream {
    pub request_id: String,
    pub events: BoxStream<'static, BridgeResult<StreamEvent>>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Base trait for inference services reachable through the Converse API shape
#[async_trait]
pub trait Provider: Send + Sync {
    /// Issue one unary call and return the complete message
    async fn complete(&self, request: &ConverseRequest) -> BridgeResult<Completion>;

    /// Issue one streaming call and return the lazy event sequence
    async fn stream(&self, request: &ConverseRequest) -> BridgeResult<EventStream>;
}
