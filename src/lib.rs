//! docsage - answer coding prompts from local API documentation
//!
//! A command-line agent that indexes a directory of documentation, lets a
//! code model consult it (and read source files) through Ollama tool calling,
//! coerces the answer into `{code, description, filename}` and writes the code
//! to disk.
//!
//! # Modules
//!
//! - `config` - Flags, environment variables and `.env` loading
//! - `documents` - Directory loading, PDF extraction via LlamaParse
//! - `index` - In-memory vector index and query engine
//! - `ollama` - Ollama clients (generate, embed, chat with tools)
//! - `tools` - Tools exposed to the agent
//! - `agent` - Tool-calling agent loop
//! - `formatter` - Structured output template and parser
//! - `repl` - Interactive prompt loop with bounded retries
//! - `metrics` - Prometheus metrics
//! - `tracing` - Logging and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use docsage::{Repl, AgentController, OutputPipeline};
//!
//! let repl = Repl::new(Arc::new(agent), Arc::new(pipeline), "./output");
//! repl.run(tokio::io::BufReader::new(tokio::io::stdin()), &mut std::io::stdout()).await?;
//! ```

pub mod agent;
pub mod config;
pub mod documents;
pub mod formatter;
pub mod index;
pub mod metrics;
pub mod ollama;
pub mod repl;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentController};
pub use config::Config;
pub use formatter::{CodeOutput, OutputPipeline};
pub use repl::Repl;
