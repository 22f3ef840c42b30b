//! Tools the agent can call
//!
//! A tool is a name, a description, a JSON schema for its arguments and an
//! async call. Tool failures are reported back to the model as text rather
//! than aborting the agent run.

pub mod code_reader;
pub mod docs;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::ollama::{Tool, ToolFunction};

pub use code_reader::CodeReaderTool;
pub use docs::QueryEngineTool;

/// Error type for tool calls
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing or invalid argument `{0}`")]
    InvalidArgument(&'static str),
    #[error("{0}")]
    Failed(String),
}

/// A named, described callable exposed to the agent
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the arguments object
    fn parameters(&self) -> serde_json::Value;
    async fn call(&self, arguments: &serde_json::Value) -> Result<String, ToolError>;

    /// Wire definition sent to Ollama
    fn definition(&self) -> Tool {
        Tool {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

/// The set of tools offered to one agent
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn AgentTool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Pull a required string argument out of a tool call.
///
/// Models sometimes wrap every value as `{"value": ...}`; that shape is accepted too.
pub(crate) fn string_arg<'a>(
    arguments: &'a serde_json::Value,
    key: &'static str,
) -> Result<&'a str, ToolError> {
    let value = arguments.get(key).ok_or(ToolError::InvalidArgument(key))?;
    value
        .as_str()
        .or_else(|| value.get("value").and_then(|v| v.as_str()))
        .ok_or(ToolError::InvalidArgument(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_arg_shapes() {
        let plain = serde_json::json!({"input": "hello"});
        assert_eq!(string_arg(&plain, "input").unwrap(), "hello");

        let wrapped = serde_json::json!({"input": {"value": "hello"}});
        assert_eq!(string_arg(&wrapped, "input").unwrap(), "hello");

        let missing = serde_json::json!({});
        assert!(matches!(
            string_arg(&missing, "input"),
            Err(ToolError::InvalidArgument("input"))
        ));

        let wrong_type = serde_json::json!({"input": 3});
        assert!(string_arg(&wrong_type, "input").is_err());
    }
}
