use serde::{Deserialize, Serialize};

/// A tool capability the model may invoke during generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tool {
    /// A tool hosted by the inference service itself, referenced by name only
    SystemTool { name: String },
}

impl Tool {
    pub fn system<S: Into<String>>(name: S) -> Self {
        Tool::SystemTool { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            Tool::SystemTool { name } => name,
        }
    }
}

/// The set of tools offered to the model, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub tools: Vec<Tool>,
}

impl ToolConfig {
    /// A configuration offering exactly one tool
    pub fn single(tool: Tool) -> Self {
        Self { tools: vec![tool] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_tool_wire_shape() {
        let config = ToolConfig::single(Tool::system("web_search_v1"));
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({"tools": [{"systemTool": {"name": "web_search_v1"}}]})
        );
        assert_eq!(config.tools[0].name(), "web_search_v1");
    }
}
