//! Agent module for tool-assisted code generation
//!
//! This module provides the agent loop that orchestrates:
//! - Ollama LLM with tool calling (/api/chat)
//! - The documentation query tool (vector index + answer synthesis)
//! - The code reader tool
//!
//! # Architecture
//!
//! ```text
//! Prompt → AgentController → Ollama /api/chat (with tools)
//!                  ↓
//!      Tool Call: api_documentation | code_reader
//!                  ↓
//!      Feed result back to Ollama → Loop or Complete
//! ```

pub mod controller;

use async_trait::async_trait;

pub use controller::{
    AgentConfig, AgentController, AgentError, AgentResult, ToolRecord, DEFAULT_AGENT_CONTEXT,
};

/// Turns an operator prompt into a free-text answer.
#[async_trait]
pub trait PromptAgent: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String, AgentError>;
}
