//! Ollama Chat API with tool calling support
//!
//! This module provides a client for Ollama's `/api/chat` endpoint,
//! which supports tool/function calling for agentic workflows.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant", "tool"
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

impl std::fmt::Display for ChatMessage {
    /// Renders as `<role>: <content>`, the textual form the output parser expects.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// A tool call from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

/// Function name and arguments inside a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

/// Function specification for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

/// Error type for chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Ollama returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Empty response from Ollama")]
    EmptyResponse,
}

/// Anything that can answer a chat request, so the agent and the output
/// pipeline can be driven without a live Ollama server.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ChatError>;
}

/// Client for Ollama's /api/chat endpoint with tool support
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
    /// Sampling temperature; `None` leaves the model's default
    temperature: Option<f32>,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            temperature: None,
        }
    }

    /// Create a chat client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            temperature: None,
        })
    }

    /// Sample every request at `temperature` instead of the model's default
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Send a chat request with optional tools
    ///
    /// # Arguments
    /// * `messages` - The conversation history
    /// * `model` - The model name (e.g., "codellama")
    /// * `tools` - Optional list of tools the model can use
    ///
    /// # Returns
    /// ChatResponse containing the model's reply and any tool calls
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ChatError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false
        });

        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }

        if let Some(t) = tools {
            body["tools"] = serde_json::to_value(t)?;
        }

        let response = self.client.post(&endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Status { status, body: text });
        }
        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)?;
        Ok(chat_response)
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ChatError> {
        let start = std::time::Instant::now();
        let result = ChatClient::chat(self, messages, model, tools).await;
        crate::metrics::observe_llm_call(model, start.elapsed());
        result
    }
}

/// Try to parse tool calls from the response content text
///
/// This handles models that output tool calls as JSON in the text
/// instead of using the native tool_calls field. Two shapes are recognised:
/// bare `{"name": ..., "arguments": {...}}` objects, and ReAct-style
/// `Action: <tool>` / `Action Input: <json>` lines.
pub fn parse_tool_calls_from_text(content: &str) -> Vec<ToolCall> {
    let content = content.trim();

    if let Some(tool_call) = parse_react_action(content) {
        return vec![tool_call];
    }

    // Try parsing the entire content as a tool call
    if let Some(tool_call) = try_parse_tool_call(content) {
        return vec![tool_call];
    }

    json_objects(content)
        .into_iter()
        .filter_map(try_parse_tool_call)
        .collect()
}

/// Parse a ReAct `Action:` / `Action Input:` pair
fn parse_react_action(content: &str) -> Option<ToolCall> {
    let mut name = None;
    let mut input_start = None;

    for (offset, line) in line_offsets(content) {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("Action Input:") {
            if name.is_some() {
                input_start = Some(offset + (line.len() - rest.len()));
                break;
            }
        } else if let Some(rest) = trimmed.strip_prefix("Action:") {
            let tool = rest.trim();
            if !tool.is_empty() {
                name = Some(tool.to_string());
            }
        }
    }

    let name = name?;
    let input = content[input_start?..].trim();

    let arguments = match json_objects(input).first() {
        Some(obj) => serde_json::from_str::<serde_json::Value>(obj).ok()?,
        None => {
            // Plain-text input; the first line is the argument
            let text = input.lines().next().unwrap_or("").trim();
            serde_json::json!({ "input": text })
        }
    };

    Some(ToolCall {
        function: FunctionCall { name, arguments },
    })
}

/// Iterate lines along with their byte offset in `content`
fn line_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content.split_inclusive('\n').scan(0usize, |pos, line| {
        let start = *pos;
        *pos += line.len();
        Some((start, line.trim_end_matches(['\n', '\r'])))
    })
}

/// Find top-level `{...}` spans in text, ignoring braces inside JSON strings
fn json_objects(content: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in content.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(&content[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    objects
}

/// Try to parse a single tool call from a JSON string
fn try_parse_tool_call(json_str: &str) -> Option<ToolCall> {
    let value = serde_json::from_str::<serde_json::Value>(json_str).ok()?;
    parse_tool_call_from_value(&value)
}

/// Parse a tool call from a JSON Value
fn parse_tool_call_from_value(value: &serde_json::Value) -> Option<ToolCall> {
    // Check for the expected format: {"name": "...", "arguments": {...}}
    let name = value.get("name").and_then(|n| n.as_str())?;

    // Some models use "parameters" instead of "arguments"
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))?
        .clone();

    Some(ToolCall {
        function: FunctionCall {
            name: name.to_string(),
            arguments: decode_arguments(arguments),
        },
    })
}

/// Decode arguments that arrived as a JSON-encoded string; anything else is returned as is
pub fn decode_arguments(arguments: serde_json::Value) -> serde_json::Value {
    match arguments {
        serde_json::Value::String(s) => serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_json_tool_call() {
        let calls = parse_tool_calls_from_text(
            r#"{"name": "code_reader", "arguments": {"file_name": "test.py"}}"#,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "code_reader");
        assert_eq!(calls[0].function.arguments["file_name"], "test.py");
    }

    #[test]
    fn test_parse_embedded_json_with_parameters_alias() {
        let text = r#"I will look at the docs.
{"name": "api_documentation", "parameters": {"input": "how do I {authenticate}?"}}
Then answer."#;
        let calls = parse_tool_calls_from_text(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "api_documentation");
        assert_eq!(calls[0].function.arguments["input"], "how do I {authenticate}?");
    }

    #[test]
    fn test_parse_react_action() {
        let text = "Thought: I need to read the file.\nAction: code_reader\nAction Input: {\"file_name\": \"main.py\"}\n";
        let calls = parse_tool_calls_from_text(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "code_reader");
        assert_eq!(calls[0].function.arguments["file_name"], "main.py");
    }

    #[test]
    fn test_parse_react_plain_input() {
        let text = "Action: api_documentation\nAction Input: list all endpoints\nObservation:";
        let calls = parse_tool_calls_from_text(text);
        assert_eq!(calls[0].function.arguments["input"], "list all endpoints");
    }

    #[test]
    fn test_stringified_arguments_decoded() {
        let calls = parse_tool_calls_from_text(
            r#"{"name": "code_reader", "arguments": "{\"file_name\": \"a.py\"}"}"#,
        );
        assert_eq!(calls[0].function.arguments["file_name"], "a.py");
    }

    #[test]
    fn test_plain_answer_has_no_tool_calls() {
        assert!(parse_tool_calls_from_text("Here is your code: print('hi')").is_empty());
        assert!(parse_tool_calls_from_text(r#"{"code": "x = {}", "filename": "a.py"}"#).is_empty());
    }

    #[test]
    fn test_message_display_has_role_prefix() {
        let msg = ChatMessage::assistant("{\"code\": \"\"}");
        assert_eq!(msg.to_string(), "assistant: {\"code\": \"\"}");
    }
}
