//! Ollama API client for completions and embeddings
//!
//! `/api/generate` backs the documentation query engine's answer synthesis and
//! `/api/embed` backs the vector index. Chat with tools lives in [`super::tool_use`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use serde::Deserialize;
use thiserror::Error;

/// Error type for generate/embed requests
#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Ollama returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Ollama returned {got} embeddings for {expected} inputs")]
    EmbeddingCount { expected: usize, got: usize },
}

/// Response from Ollama's generate endpoint with metadata
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    /// The generated text
    pub response: String,
    /// Number of tokens generated
    pub eval_count: u32,
    /// Number of tokens in the prompt
    pub prompt_eval_count: u32,
    /// Time spent generating tokens (nanoseconds)
    pub eval_duration_ns: u64,
}

impl GenerateResponse {
    /// Fold one line of the newline-delimited `/api/generate` stream into the response.
    ///
    /// Returns `true` once the final (`"done": true`) line has been seen.
    fn absorb_line(&mut self, line: &[u8]) -> Result<bool, OllamaError> {
        let data: serde_json::Value = serde_json::from_slice(line)?;

        if let Some(token) = data["response"].as_str() {
            self.response.push_str(token);
        }

        // Ollama sends metadata only in the final message
        if data["done"].as_bool() == Some(true) {
            self.eval_count = data["eval_count"].as_u64().unwrap_or(0) as u32;
            self.prompt_eval_count = data["prompt_eval_count"].as_u64().unwrap_or(0) as u32;
            self.eval_duration_ns = data["eval_duration"].as_u64().unwrap_or(0);
            return Ok(true);
        }
        Ok(false)
    }
}

/// Something that can turn texts into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OllamaError>;
}

/// Something that completes a raw prompt with a fixed model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OllamaError>;
}

/// Client for interacting with Ollama's HTTP API
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server (e.g., "http://localhost:11434")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests give up after `timeout`.
    ///
    /// Local models can take minutes to load, so callers usually pass something large.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OllamaError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Generate a complete response from Ollama
    ///
    /// The request is streamed and the tokens are accumulated, so long generations
    /// don't hit a single huge body read.
    ///
    /// # Arguments
    /// * `prompt` - The input prompt for the LLM
    /// * `model` - The model name (e.g., "mistral")
    /// * `trace_id` - Optional trace ID for request correlation
    pub async fn generate(
        &self,
        prompt: impl Into<String>,
        model: impl Into<String>,
        trace_id: Option<&str>,
    ) -> Result<GenerateResponse, OllamaError> {
        let endpoint = format!("{}/api/generate", self.base_url);

        // Build request with optional trace ID header
        let mut request = self.client.post(&endpoint).json(&serde_json::json!({
            "model": model.into(),
            "prompt": prompt.into(),
            "stream": true
        }));

        if let Some(tid) = trace_id {
            request = request.header("X-Trace-Id", tid);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::Status { status, body });
        }

        let mut bytes_stream = response.bytes_stream();
        let mut result = GenerateResponse::default();
        // HTTP chunks don't line up with JSON lines
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk_result) = bytes_stream.next().await {
            pending.extend_from_slice(&chunk_result?);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                if result.absorb_line(&line)? {
                    return Ok(result);
                }
            }
        }

        if !pending.iter().all(u8::is_ascii_whitespace) {
            result.absorb_line(&pending)?;
        }
        Ok(result)
    }

    /// Embed a batch of texts with `/api/embed`.
    pub async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, OllamaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        #[derive(Deserialize)]
        struct EmbedResponse {
            embeddings: Vec<Vec<f32>>,
        }

        let endpoint = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({
                "model": model,
                "input": texts,
                "truncate": true
            }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(OllamaError::Status { status, body: text });
        }

        let out: EmbedResponse = serde_json::from_str(&text)?;
        if out.embeddings.len() != texts.len() {
            return Err(OllamaError::EmbeddingCount {
                expected: texts.len(),
                got: out.embeddings.len(),
            });
        }
        Ok(out.embeddings)
    }

    /// Bind this client to an embedding model.
    pub fn embedder(&self, model: impl Into<String>) -> OllamaEmbedder {
        OllamaEmbedder {
            client: self.clone(),
            model: model.into(),
        }
    }

    /// Bind this client to a completion model.
    pub fn generator(&self, model: impl Into<String>) -> OllamaGenerator {
        OllamaGenerator {
            client: self.clone(),
            model: model.into(),
        }
    }
}

/// [`OllamaClient`] bound to an embedding model
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OllamaError> {
        self.client.embed(&self.model, texts).await
    }
}

/// [`OllamaClient`] bound to a completion model
#[derive(Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, OllamaError> {
        let start = std::time::Instant::now();
        let response = self.client.generate(prompt, self.model.as_str(), None).await;
        crate::metrics::observe_llm_call(&self.model, start.elapsed());
        let response = response?;
        tracing::debug!(
            model = %self.model,
            eval_count = response.eval_count,
            prompt_eval_count = response.prompt_eval_count,
            "Completion finished"
        );
        Ok(response.response)
    }
}
