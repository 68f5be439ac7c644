//! Stream events emitted by the upstream `converse-stream` call.
//!
//! The upstream vocabulary grows over time, so decoding is split in two: a closed set
//! of kinds we understand, plus [`StreamEvent::Unknown`] for everything else. An
//! unknown kind is never an error.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Role;
use crate::errors::{BridgeError, BridgeResult};

pub const MESSAGE_START: &str = "messageStart";
pub const CONTENT_BLOCK_START: &str = "contentBlockStart";
pub const CONTENT_BLOCK_DELTA: &str = "contentBlockDelta";
pub const CONTENT_BLOCK_STOP: &str = "contentBlockStop";
pub const MESSAGE_STOP: &str = "messageStop";
pub const METADATA: &str = "metadata";

/// SSE event name used when the server does not name the event
const UNNAMED_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseStart {
    pub tool_use_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart {
        role: Option<Role>,
    },
    ContentBlockStart {
        index: u32,
        tool_use: Option<ToolUseStart>,
    },
    /// Incremental content. `text` is absent for tool-use input fragments.
    ContentBlockDelta {
        index: u32,
        text: Option<String>,
        tool_input: Option<String>,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageStop {
        stop_reason: Option<String>,
    },
    Metadata {
        usage: Option<TokenUsage>,
    },
    /// An upstream failure delivered inside the stream
    Exception {
        kind: String,
        message: String,
    },
    Unknown {
        kind: String,
    },
}

#[derive(Deserialize)]
struct MessageStartPayload {
    #[serde(default)]
    role: Option<Role>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentBlockStartPayload {
    #[serde(default)]
    content_block_index: u32,
    #[serde(default)]
    start: Option<BlockStart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockStart {
    #[serde(default)]
    tool_use: Option<ToolUseStart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentBlockDeltaPayload {
    #[serde(default)]
    content_block_index: u32,
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Delta {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_use: Option<ToolUseDelta>,
}

#[derive(Deserialize)]
struct ToolUseDelta {
    input: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentBlockStopPayload {
    #[serde(default)]
    content_block_index: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageStopPayload {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct MetadataPayload {
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ExceptionPayload {
    #[serde(default)]
    message: Option<String>,
}

fn decode<T: DeserializeOwned>(kind: &str, payload: Value) -> BridgeResult<T> {
    serde_json::from_value(payload).map_err(|e| {
        BridgeError::AggregationFailure(format!("malformed {} event: {}", kind, e))
    })
}

fn is_exception(kind: &str) -> bool {
    kind.ends_with("Exception")
}

fn is_known(kind: &str) -> bool {
    matches!(
        kind,
        MESSAGE_START
            | CONTENT_BLOCK_START
            | CONTENT_BLOCK_DELTA
            | CONTENT_BLOCK_STOP
            | MESSAGE_STOP
            | METADATA
    ) || is_exception(kind)
}

impl StreamEvent {
    /// Decode one server-sent event.
    ///
    /// Named events carry the kind in the SSE event name and the payload in `data`.
    /// Unnamed events carry a single-key object `{"<kind>": payload}` in `data`.
    pub fn from_sse(name: &str, data: &str) -> BridgeResult<Self> {
        if name.is_empty() || name == UNNAMED_EVENT {
            let value: Value = serde_json::from_str(data).map_err(|e| {
                BridgeError::AggregationFailure(format!("malformed stream event: {}", e))
            })?;
            let Value::Object(map) = value else {
                return Err(BridgeError::AggregationFailure(
                    "stream event is not a JSON object".to_string(),
                ));
            };
            let Some((kind, payload)) = map.into_iter().next() else {
                return Err(BridgeError::AggregationFailure(
                    "stream event has no kind".to_string(),
                ));
            };
            return Self::from_parts(&kind, payload);
        }

        if !is_known(name) {
            return Ok(StreamEvent::Unknown {
                kind: name.to_string(),
            });
        }

        let payload: Value = serde_json::from_str(data).map_err(|e| {
            BridgeError::AggregationFailure(format!("malformed {} event: {}", name, e))
        })?;
        Self::from_parts(name, payload)
    }

    /// Decode a payload whose kind is already known
    pub fn from_parts(kind: &str, payload: Value) -> BridgeResult<Self> {
        let event = match kind {
            MESSAGE_START => {
                let p: MessageStartPayload = decode(kind, payload)?;
                StreamEvent::MessageStart { role: p.role }
            }
            CONTENT_BLOCK_START => {
                let p: ContentBlockStartPayload = decode(kind, payload)?;
                StreamEvent::ContentBlockStart {
                    index: p.content_block_index,
                    tool_use: p.start.and_then(|start| start.tool_use),
                }
            }
            CONTENT_BLOCK_DELTA => {
                let p: ContentBlockDeltaPayload = decode(kind, payload)?;
                let (text, tool_input) = match p.delta {
                    Some(delta) => (delta.text, delta.tool_use.map(|t| t.input)),
                    None => (None, None),
                };
                StreamEvent::ContentBlockDelta {
                    index: p.content_block_index,
                    text,
                    tool_input,
                }
            }
            CONTENT_BLOCK_STOP => {
                let p: ContentBlockStopPayload = decode(kind, payload)?;
                StreamEvent::ContentBlockStop {
                    index: p.content_block_index,
                }
            }
            MESSAGE_STOP => {
                let p: MessageStopPayload = decode(kind, payload)?;
                StreamEvent::MessageStop {
                    stop_reason: p.stop_reason,
                }
            }
            METADATA => {
                let p: MetadataPayload = decode(kind, payload)?;
                StreamEvent::Metadata { usage: p.usage }
            }
            k if is_exception(k) => {
                let p: ExceptionPayload = decode(kind, payload)?;
                StreamEvent::Exception {
                    kind: k.to_string(),
                    message: p.message.unwrap_or_default(),
                }
            }
            other => StreamEvent::Unknown {
                kind: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Shorthand for a text delta on block 0
    pub fn text_delta<S: Into<String>>(text: S) -> Self {
        StreamEvent::ContentBlockDelta {
            index: 0,
            text: Some(text.into()),
            tool_input: None,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::MessageStart { .. } => MESSAGE_START,
            StreamEvent::ContentBlockStart { .. } => CONTENT_BLOCK_START,
            StreamEvent::ContentBlockDelta { .. } => CONTENT_BLOCK_DELTA,
            StreamEvent::ContentBlockStop { .. } => CONTENT_BLOCK_STOP,
            StreamEvent::MessageStop { .. } => MESSAGE_STOP,
            StreamEvent::Metadata { .. } => METADATA,
            StreamEvent::Exception { kind, .. } => kind,
            StreamEvent::Unknown { kind } => kind,
        }
    }
}
