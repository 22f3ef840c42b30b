//! Documentation lookup tool backed by the query engine

use std::sync::Arc;

use async_trait::async_trait;

use super::{string_arg, AgentTool, ToolError};
use crate::index::QueryEngine;

pub const API_DOCS_TOOL_NAME: &str = "api_documentation";
pub const API_DOCS_TOOL_DESCRIPTION: &str =
    "this gives documentation about code for an API. Use this for reading docs for the API";

/// Exposes a [`QueryEngine`] to the agent
pub struct QueryEngineTool {
    engine: Arc<QueryEngine>,
    name: String,
    description: String,
}

impl QueryEngineTool {
    pub fn new(engine: Arc<QueryEngine>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            engine,
            name: name.into(),
            description: description.into(),
        }
    }

    /// The `api_documentation` tool
    pub fn api_documentation(engine: Arc<QueryEngine>) -> Self {
        Self::new(engine, API_DOCS_TOOL_NAME, API_DOCS_TOOL_DESCRIPTION)
    }
}

#[async_trait]
impl AgentTool for QueryEngineTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "Question to answer from the documentation"
                }
            },
            "required": ["input"]
        })
    }

    async fn call(&self, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let input = string_arg(arguments, "input")?;
        self.engine
            .query(input)
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))
    }
}
