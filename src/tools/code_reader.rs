//! Source file reader tool

use std::path::PathBuf;

use async_trait::async_trait;

use super::{string_arg, AgentTool, ToolError};

pub const CODE_READER_TOOL_NAME: &str = "code_reader";
pub const CODE_READER_TOOL_DESCRIPTION: &str = "this tool can read the contents of code files and return \
their results. Use this when you need to read the contents of a file";

/// Reads files relative to a base directory
///
/// I/O failures are part of the tool's answer (`{"error": ...}`) so the model
/// can react to them, not a [`ToolError`].
pub struct CodeReaderTool {
    base_dir: PathBuf,
}

impl CodeReaderTool {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl AgentTool for CodeReaderTool {
    fn name(&self) -> &str {
        CODE_READER_TOOL_NAME
    }

    fn description(&self) -> &str {
        CODE_READER_TOOL_DESCRIPTION
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_name": {
                    "type": "string",
                    "description": "Name of the file to read"
                }
            },
            "required": ["file_name"]
        })
    }

    async fn call(&self, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let file_name = string_arg(arguments, "file_name")?;
        let path = self.base_dir.join(file_name);

        let body = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::json!({ "file_content": content }),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        Ok(body.to_string())
    }
}
