use serde::Serialize;

use super::message::Conversation;
use super::tool::ToolConfig;

/// Sampling parameters forwarded as `inferenceConfig`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Everything needed for one outbound call. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverseRequest {
    pub model_id: String,
    pub conversation: Conversation,
    pub system: Option<String>,
    pub tool_config: Option<ToolConfig>,
    pub inference: Option<InferenceConfig>,
}

impl ConverseRequest {
    pub fn new<M: Into<String>, Q: Into<String>>(model_id: M, question: Q) -> Self {
        Self {
            model_id: model_id.into(),
            conversation: Conversation::single_turn(question),
            system: None,
            tool_config: None,
            inference: None,
        }
    }

    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tool_config(mut self, tool_config: ToolConfig) -> Self {
        self.tool_config = Some(tool_config);
        self
    }

    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = Some(inference);
        self
    }
}
