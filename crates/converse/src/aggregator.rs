//! Folds a stream of upstream events into one accumulated answer.
use futures::StreamExt;
use serde::Serialize;
use std::ops::ControlFlow;
use tracing::{debug, warn};

use crate::errors::{BridgeError, BridgeResult};
use crate::models::event::StreamEvent;
use crate::providers::base::EventStream;

/// The folded answer of one streaming call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccumulatedResult {
    pub text: String,
    /// Number of text deltas appended
    pub event_count: usize,
    pub request_id: String,
    /// True only when the upstream sent `messageStop`; false means the stream ended early
    pub complete: bool,
    pub stop_reason: Option<String>,
}

/// Append-only accumulator. One per stream; never reused.
#[derive(Debug, Default)]
pub struct Aggregator {
    text: String,
    event_count: usize,
    complete: bool,
    stop_reason: Option<String>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event in arrival order.
    ///
    /// Returns `Break` on `messageStop`, after which no further event may be applied.
    pub fn apply(&mut self, event: StreamEvent) -> BridgeResult<ControlFlow<()>> {
        match event {
            StreamEvent::ContentBlockDelta {
                text: Some(text), ..
            } => {
                debug!(
                    "Received chunk: {}...",
                    text.chars().take(50).collect::<String>()
                );
                self.text.push_str(&text);
                self.event_count += 1;
            }
            StreamEvent::ContentBlockDelta { text: None, .. } => {}
            StreamEvent::MessageStop { stop_reason } => {
                self.complete = true;
                self.stop_reason = stop_reason;
                return Ok(ControlFlow::Break(()));
            }
            StreamEvent::Exception { kind, message } => {
                return Err(BridgeError::AggregationFailure(format!(
                    "{}: {}",
                    kind, message
                )));
            }
            StreamEvent::MessageStart { .. }
            | StreamEvent::ContentBlockStart { .. }
            | StreamEvent::ContentBlockStop { .. }
            | StreamEvent::Metadata { .. } => {}
            StreamEvent::Unknown { kind } => {
                debug!("Ignoring unknown stream event: {}", kind);
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(self, request_id: String) -> AccumulatedResult {
        AccumulatedResult {
            text: self.text,
            event_count: self.event_count,
            request_id,
            complete: self.complete,
            stop_reason: self.stop_reason,
        }
    }
}

/// Drain `stream` until `messageStop` or exhaustion.
///
/// Exhaustion without `messageStop` still succeeds with `complete == false`. Any
/// error discards the partial text.
pub async fn aggregate(stream: EventStream) -> BridgeResult<AccumulatedResult> {
    let EventStream {
        request_id,
        mut events,
    } = stream;
    let mut aggregator = Aggregator::new();

    while let Some(event) = events.next().await {
        if aggregator.apply(event?)?.is_break() {
            break;
        }
    }

    let result = aggregator.finish(request_id);
    if !result.complete {
        warn!(
            request_id = %result.request_id,
            "Stream ended without messageStop after {} chunks",
            result.event_count
        );
    }
    Ok(result)
}
