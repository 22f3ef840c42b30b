//! Document loading for the retrieval index
//!
//! Every non-hidden file in the data directory becomes one [`Document`].
//! File types with a registered [`FileExtractor`] (PDF → LlamaParse) are
//! converted by that service; everything else is read as text.
//!
//! # Architecture
//!
//! ```text
//! ./data/*.pdf  → LlamaParseClient (upload → poll → markdown)
//! ./data/*      → read as UTF-8
//!                  ↓
//!            Vec<Document> → VectorIndex
//! ```

pub mod llama_parse;
pub mod loader;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use llama_parse::LlamaParseClient;
pub use loader::DocumentStore;

/// Text extracted from one file
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// File the text came from
    pub path: PathBuf,
    /// Extracted text
    pub text: String,
}

/// Error type for document loading
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("parse service returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("parse job {job_id} ended with status {status}")]
    JobFailed { job_id: String, status: String },
    #[error("parse job {job_id} did not finish within {waited_secs}s")]
    JobTimeout { job_id: String, waited_secs: u64 },
}

/// Converts a file of a particular type into text.
#[async_trait]
pub trait FileExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, DocumentError>;
}
