//! LlamaParse client for PDF extraction
//!
//! Upload the file, poll the job until it finishes, then fetch the markdown
//! rendering of the result.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{DocumentError, FileExtractor};

/// Default LlamaParse API endpoint
pub const DEFAULT_LLAMA_PARSE_URL: &str = "https://api.cloud.llamaindex.ai";

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Deserialize)]
struct JobStatus {
    status: String,
}

#[derive(Deserialize)]
struct MarkdownResult {
    markdown: String,
}

/// Client for the LlamaParse REST API
#[derive(Clone)]
pub struct LlamaParseClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    poll_interval: Duration,
    max_wait: Duration,
}

impl LlamaParseClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://api.cloud.llamaindex.ai")
    /// * `api_key` - LlamaCloud API key
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(2000),
        }
    }

    /// Override how often job status is polled and how long to wait overall
    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// Parse a file and return its markdown
    pub async fn parse_markdown(&self, path: &Path) -> Result<String, DocumentError> {
        let job_id = self.upload(path).await?;
        info!(path = %path.display(), job_id = %job_id, "Parse job submitted");
        self.wait_for_job(&job_id).await?;
        self.fetch_markdown(&job_id).await
    }

    async fn upload(&self, path: &Path) -> Result<String, DocumentError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| DocumentError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/parsing/upload", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let upload: UploadResponse = check(response).await?.json().await?;
        Ok(upload.id)
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<(), DocumentError> {
        let start = std::time::Instant::now();
        loop {
            let response = self
                .client
                .get(format!("{}/api/parsing/job/{}", self.base_url, job_id))
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            let job: JobStatus = check(response).await?.json().await?;

            // Anything but PENDING is terminal (ERROR, CANCELLED, PARTIAL_SUCCESS, ...)
            match job.status.as_str() {
                "SUCCESS" => return Ok(()),
                "PENDING" => debug!(job_id, "Parse job pending"),
                _ => {
                    return Err(DocumentError::JobFailed {
                        job_id: job_id.to_string(),
                        status: job.status,
                    })
                }
            }

            if start.elapsed() >= self.max_wait {
                return Err(DocumentError::JobTimeout {
                    job_id: job_id.to_string(),
                    waited_secs: start.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_markdown(&self, job_id: &str) -> Result<String, DocumentError> {
        let response = self
            .client
            .get(format!(
                "{}/api/parsing/job/{}/result/markdown",
                self.base_url, job_id
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let result: MarkdownResult = check(response).await?.json().await?;
        Ok(result.markdown)
    }
}

#[async_trait]
impl FileExtractor for LlamaParseClient {
    async fn extract(&self, path: &Path) -> Result<String, DocumentError> {
        self.parse_markdown(path).await
    }
}

/// Turn a non-2xx response into `DocumentError::Status`
async fn check(response: reqwest::Response) -> Result<reqwest::Response, DocumentError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(DocumentError::Status { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let client = LlamaParseClient::new("https://api.cloud.llamaindex.ai/", "llx-test");
        assert_eq!(client.base_url, DEFAULT_LLAMA_PARSE_URL);
        assert_eq!(client.poll_interval, Duration::from_secs(1));
        assert_eq!(client.max_wait, Duration::from_secs(2000));
    }

    #[test]
    fn test_status_payloads_deserialize() {
        let job: JobStatus = serde_json::from_str(r#"{"id":"j1","status":"PENDING"}"#).unwrap();
        assert_eq!(job.status, "PENDING");
        let md: MarkdownResult =
            serde_json::from_str(r##"{"markdown":"# Title","job_metadata":{}}"##).unwrap();
        assert_eq!(md.markdown, "# Title");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let client = LlamaParseClient::new(DEFAULT_LLAMA_PARSE_URL, "llx-test");
        let err = client
            .parse_markdown(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Io { .. }));
    }
}
