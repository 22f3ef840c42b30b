//! Runtime configuration
//!
//! Every option can come from a flag or an environment variable (a `.env`
//! file is loaded first), and every option has a default, so running the
//! binary bare uses `./data`, `./output` and a local Ollama.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::agent::AgentConfig;
use crate::documents::llama_parse::DEFAULT_LLAMA_PARSE_URL;
use crate::index::ChunkConfig;

/// Answer prompts from local API docs with a code model and save the generated code
#[derive(Debug, Clone, Parser)]
#[command(name = "docsage", version, about)]
pub struct Config {
    /// Directory of documentation (PDFs and text files) to index
    #[arg(long, env = "DOCSAGE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Directory generated code is written to
    #[arg(long, env = "DOCSAGE_OUTPUT_DIR", default_value = "./output")]
    pub output_dir: PathBuf,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Model for answering documentation queries and formatting output
    #[arg(long, env = "DOCSAGE_MODEL", default_value = "mistral")]
    pub model: String,

    /// Model driving the tool-calling agent
    #[arg(long, env = "DOCSAGE_CODE_MODEL", default_value = "codellama")]
    pub code_model: String,

    /// Sampling temperature for agent and formatter chat calls
    #[arg(long, env = "DOCSAGE_TEMPERATURE", default_value_t = 0.75)]
    pub temperature: f32,

    /// Embedding model for the vector index
    #[arg(long, env = "DOCSAGE_EMBED_MODEL", default_value = "bge-m3")]
    pub embed_model: String,

    /// Timeout for each request to Ollama, in seconds
    #[arg(long, env = "DOCSAGE_REQUEST_TIMEOUT_SECS", default_value_t = 3600)]
    pub request_timeout_secs: u64,

    /// Model calls the agent may make per attempt
    #[arg(long, env = "DOCSAGE_MAX_ITERATIONS", default_value_t = 10)]
    pub max_iterations: usize,

    /// Chunks retrieved per documentation query
    #[arg(long, env = "DOCSAGE_TOP_K", default_value_t = 2)]
    pub top_k: usize,

    /// Words per indexed chunk
    #[arg(long, env = "DOCSAGE_CHUNK_SIZE", default_value_t = 1024)]
    pub chunk_size: usize,

    /// Words shared by consecutive chunks
    #[arg(long, env = "DOCSAGE_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// LlamaCloud API key; PDFs are skipped without it
    #[arg(long, env = "LLAMA_CLOUD_API_KEY", hide_env_values = true)]
    pub llama_cloud_api_key: Option<String>,

    /// LlamaParse API root
    #[arg(long, env = "LLAMA_PARSE_URL", default_value = DEFAULT_LLAMA_PARSE_URL)]
    pub llama_parse_url: String,

    /// Refuse generated filenames that would escape the output directory
    #[arg(long, env = "DOCSAGE_CONFINE_OUTPUT")]
    pub confine_output: bool,

    /// OTLP collector endpoint for trace export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log as JSON lines
    #[arg(long, env = "DOCSAGE_LOG_JSON")]
    pub log_json: bool,

    /// Write Prometheus metrics to this file on exit
    #[arg(long, env = "DOCSAGE_METRICS_OUT")]
    pub metrics_out: Option<PathBuf>,
}

impl Config {
    /// Load `.env` (if present) and parse the process arguments
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.code_model.clone(),
            max_iterations: self.max_iterations,
            system_prompt: None,
        }
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}
