//! Ollama LLM integration module
//!
//! This module provides clients for Ollama's HTTP API: completions and
//! embeddings in [`client`], chat with tool calling in [`tool_use`].

pub mod client;
pub mod tool_use;

// Re-export public types so other modules can do `use crate::ollama::ChatClient`
pub use client::{
    Embedder, GenerateResponse, OllamaClient, OllamaEmbedder, OllamaError, OllamaGenerator,
    TextGenerator,
};
pub use tool_use::{
    decode_arguments, parse_tool_calls_from_text, ChatBackend, ChatClient, ChatError, ChatMessage,
    ChatResponse, FunctionCall, Tool, ToolCall, ToolFunction,
};
