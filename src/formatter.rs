//! Structured output: turn the agent's free-text answer into a [`CodeOutput`]
//!
//! The pipeline fills a fixed instruction template with the agent's answer,
//! appends the JSON schema of [`CodeOutput`], and sends it to the general
//! model. The reply is rendered as `assistant: <content>`; [`parse_code_output`]
//! strips that prefix and decodes the rest.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

use crate::ollama::{ChatBackend, ChatError, ChatMessage};

/// Instruction template; `{response}` is replaced by the agent's answer
pub const CODE_PARSER_TEMPLATE: &str = "Parse the response from a previous LLM into a description and a \
string of valid code, also come up with a valid filename this could be saved as that doesnt contain \
special characters. Here is the response: {response}. You should parse this in the following JSON Format: ";

/// Role prefix stripped before decoding
pub const ROLE_PREFIX: &str = "assistant:";

/// Generated code plus the metadata needed to save it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOutput {
    pub code: String,
    pub description: String,
    pub filename: String,
}

impl CodeOutput {
    /// JSON Schema describing the record
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "title": "CodeOutput",
            "type": "object",
            "properties": {
                "code": { "title": "Code", "type": "string" },
                "description": { "title": "Description", "type": "string" },
                "filename": { "title": "Filename", "type": "string" }
            },
            "required": ["code", "description", "filename"]
        })
    }
}

/// Error running the formatting pipeline
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("formatting model call failed: {0}")]
    Chat(#[from] ChatError),
}

/// Error decoding the formatter's text into a [`CodeOutput`]
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("formatter output is empty")]
    Empty,
    #[error("formatter output is not a valid CodeOutput: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Turns the agent's answer into text that [`parse_code_output`] can decode.
#[async_trait]
pub trait ResponseFormatter: Send + Sync {
    async fn format(&self, response: &str) -> Result<String, FormatError>;
}

/// The instruction template with the schema appended, `{response}` still unfilled
pub fn format_instructions(template: &str) -> String {
    let schema = serde_json::to_string(&CodeOutput::json_schema()).unwrap_or_default();
    format!(
        "{template}\n\n\
         Here's a JSON schema to follow:\n\
         {schema}\n\n\
         Output a valid JSON object but do not repeat the schema.\n"
    )
}

/// Template fill → chat call on the general model
pub struct OutputPipeline {
    chat: Arc<dyn ChatBackend>,
    model: String,
    prompt: String,
}

impl OutputPipeline {
    /// Pipeline using [`CODE_PARSER_TEMPLATE`]
    pub fn new(chat: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self::with_template(chat, model, CODE_PARSER_TEMPLATE)
    }

    fn with_template(chat: Arc<dyn ChatBackend>, model: impl Into<String>, template: &str) -> Self {
        Self {
            chat,
            model: model.into(),
            prompt: format_instructions(template),
        }
    }

    /// The prompt sent for `response`
    pub fn render(&self, response: &str) -> String {
        self.prompt.replace("{response}", response)
    }
}

#[async_trait]
impl ResponseFormatter for OutputPipeline {
    async fn format(&self, response: &str) -> Result<String, FormatError> {
        let span = info_span!("format_output", model = %self.model, otel.name = "format_output");
        let reply = self
            .chat
            .chat(vec![ChatMessage::user(self.render(response))], &self.model, None)
            .instrument(span)
            .await?;
        debug!(chars = reply.message.content.len(), "Formatter replied");
        Ok(reply.message.to_string())
    }
}

/// Decode formatter output into a [`CodeOutput`]
///
/// Every `assistant:` occurrence is removed, then the remainder is decoded as a
/// JSON object. A markdown code fence around the object is tolerated.
pub fn parse_code_output(text: &str) -> Result<CodeOutput, ParseError> {
    let cleaned = text.replace(ROLE_PREFIX, "");
    let body = strip_code_fence(cleaned.trim());
    if body.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(serde_json::from_str(body)?)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
