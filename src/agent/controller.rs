//! Agent Controller - tool-calling loop over Ollama's chat API
//!
//! The AgentController sends the conversation plus tool definitions to the
//! code model, runs whatever tools the model asks for, feeds the results back
//! and stops once the model answers without calling a tool.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::PromptAgent;
use crate::metrics::{AGENT_ITERATIONS, AGENT_TOOL_CALLS};
use crate::ollama::{
    decode_arguments, parse_tool_calls_from_text, ChatBackend, ChatError, ChatMessage,
};
use crate::tools::ToolSet;

/// Purpose statement given to the agent
pub const DEFAULT_AGENT_CONTEXT: &str = "Purpose: The primary role of this agent is to assist users by \
analyzing code. It should be able to generate code and answer questions about code provided.";

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model to use for Ollama (e.g., "codellama")
    pub model: String,
    /// Maximum number of iterations (LLM calls) before stopping
    pub max_iterations: usize,
    /// Custom context (uses [`DEFAULT_AGENT_CONTEXT`] if None)
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "codellama".to_string(),
            max_iterations: 10,
            system_prompt: None,
        }
    }
}

/// Result of an agent run
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Final response from the LLM
    pub final_response: String,
    /// Number of iterations (LLM calls) made
    pub iterations: usize,
    /// Number of tool calls executed
    pub tool_calls_made: usize,
    /// Records of all tool calls
    pub tool_records: Vec<ToolRecord>,
    /// Unique trace ID for this agent run
    pub trace_id: String,
    /// Time for first LLM call in milliseconds (includes model load time)
    pub model_load_time_ms: Option<f64>,
}

/// Record of a single tool call
#[derive(Debug, Clone)]
pub struct ToolRecord {
    pub tool: String,
    pub arguments: serde_json::Value,
    /// Text handed back to the model
    pub output: String,
    pub succeeded: bool,
}

/// Error type for agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    /// Maximum iterations reached without completing the task
    #[error("Maximum iterations reached")]
    MaxIterationsReached,
    /// Ollama chat error
    #[error("Ollama error: {0}")]
    OllamaError(#[from] ChatError),
}

/// Agent Controller orchestrating the model and its tools
pub struct AgentController {
    chat: Arc<dyn ChatBackend>,
    tools: ToolSet,
    config: AgentConfig,
}

impl AgentController {
    /// Create a new agent controller
    ///
    /// # Arguments
    /// * `chat` - Chat backend for LLM interactions
    /// * `tools` - Tools offered to the model
    /// * `config` - Agent configuration
    pub fn new(chat: Arc<dyn ChatBackend>, tools: ToolSet, config: AgentConfig) -> Self {
        Self {
            chat,
            tools,
            config,
        }
    }

    /// System prompt: the context followed by tool-use guidance
    fn system_prompt(&self) -> String {
        let context = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_AGENT_CONTEXT);

        if self.tools.is_empty() {
            return context.to_string();
        }

        format!(
            "{context}\n\n\
             You have access to these tools: {tools}.\n\
             Call a tool whenever you need documentation or the contents of a file. \
             If you cannot call tools natively, reply with a single JSON object \
             {{\"name\": <tool>, \"arguments\": {{...}}}}.\n\
             When the task is complete, respond with your final answer in plain text.",
            tools = self.tools.names().join(", ")
        )
    }

    /// Run the agent loop for a given task
    ///
    /// # Arguments
    /// * `task` - The user's task/prompt to accomplish
    ///
    /// # Returns
    /// AgentResult containing the final response and tool history
    pub async fn run(&self, task: &str) -> Result<AgentResult, AgentError> {
        let trace_id = Uuid::now_v7().to_string();

        // Create root span for the entire agent task
        let root_span = info_span!(
            "agent_task",
            trace_id = %trace_id,
            model = %self.config.model,
            otel.name = "agent_task"
        );

        async {
            info!(trace_id = %trace_id, task = %task, "Starting agent task");

            let tools = self.tools.definitions();
            let mut messages = vec![
                ChatMessage::system(self.system_prompt()),
                ChatMessage::user(task),
            ];

            let mut iterations = 0;
            let mut tool_calls_made = 0;
            let mut tool_records = vec![];
            let mut model_load_time_ms: Option<f64> = None;

            loop {
                iterations += 1;

                if iterations > self.config.max_iterations {
                    warn!(trace_id = %trace_id, iterations, "Max iterations reached");
                    AGENT_ITERATIONS.observe((iterations - 1) as f64);
                    return Err(AgentError::MaxIterationsReached);
                }

                let llm_span = info_span!(
                    "llm_call",
                    trace_id = %trace_id,
                    iteration = iterations,
                    model = %self.config.model,
                    otel.name = "llm_call"
                );

                let call_start = std::time::Instant::now();
                let offered = if tools.is_empty() {
                    None
                } else {
                    Some(tools.clone())
                };
                let response = self
                    .chat
                    .chat(messages.clone(), &self.config.model, offered)
                    .instrument(llm_span)
                    .await?;
                let call_duration_ms = call_start.elapsed().as_secs_f64() * 1000.0;

                if iterations == 1 {
                    model_load_time_ms = Some(call_duration_ms);
                    info!(trace_id = %trace_id, duration_ms = call_duration_ms, "First LLM call completed (includes model load)");
                } else {
                    debug!(trace_id = %trace_id, iteration = iterations, duration_ms = call_duration_ms, "LLM call completed");
                }

                // Add assistant response to history
                messages.push(response.message.clone());

                // Check for tool calls - try native format first, then fallback to text parsing
                let tool_calls = response
                    .message
                    .tool_calls
                    .clone()
                    .filter(|tc| !tc.is_empty())
                    .unwrap_or_else(|| parse_tool_calls_from_text(&response.message.content));

                if tool_calls.is_empty() {
                    // No tool calls - model is done
                    info!(trace_id = %trace_id, iterations, tool_calls = tool_calls_made, "Agent task completed");
                    AGENT_ITERATIONS.observe(iterations as f64);

                    return Ok(AgentResult {
                        final_response: response.message.content,
                        iterations,
                        tool_calls_made,
                        tool_records,
                        trace_id,
                        model_load_time_ms,
                    });
                }

                for tool_call in tool_calls {
                    let name = tool_call.function.name;
                    let arguments = decode_arguments(tool_call.function.arguments);
                    tool_calls_made += 1;

                    let tool = self.tools.get(&name);
                    // Model-supplied names would otherwise grow the label set without bound
                    let label = if tool.is_some() { name.as_str() } else { "unknown" };
                    AGENT_TOOL_CALLS.with_label_values(&[label]).inc();

                    let (output, succeeded) = match tool {
                        Some(tool) => {
                            let tool_span = info_span!(
                                "tool_call",
                                trace_id = %trace_id,
                                tool = %name,
                                otel.name = "tool_call"
                            );
                            info!(trace_id = %trace_id, tool = %name, arguments = %arguments, "Calling tool");
                            match tool.call(&arguments).instrument(tool_span).await {
                                Ok(output) => (output, true),
                                Err(e) => {
                                    warn!(trace_id = %trace_id, tool = %name, error = %e, "Tool call failed");
                                    (format!("Error: {}", e), false)
                                }
                            }
                        }
                        None => {
                            warn!(trace_id = %trace_id, tool = %name, "Model requested unknown tool");
                            (
                                format!(
                                    "Error: unknown tool `{}`. Available tools: {}",
                                    name,
                                    self.tools.names().join(", ")
                                ),
                                false,
                            )
                        }
                    };

                    messages.push(ChatMessage::tool(output.clone()));
                    tool_records.push(ToolRecord {
                        tool: name,
                        arguments,
                        output,
                        succeeded,
                    });
                }
            }
        }
        .instrument(root_span)
        .await
    }
}

#[async_trait]
impl PromptAgent for AgentController {
    async fn query(&self, prompt: &str) -> Result<String, AgentError> {
        self.run(prompt).await.map(|r| r.final_response)
    }
}
