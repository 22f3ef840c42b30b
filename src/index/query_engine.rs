//! Retrieve-then-answer over the vector index

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info_span, Instrument};

use super::{IndexError, VectorIndex};
use crate::ollama::{OllamaError, TextGenerator};

/// Answer returned when nothing relevant was retrieved
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// Error type for query engine calls
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Retrieval(#[from] IndexError),
    #[error("answer synthesis failed: {0}")]
    Synthesis(#[from] OllamaError),
}

/// Fill the question-answering template
pub fn qa_prompt(context: &str, query: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         Answer: "
    )
}

/// Retrieves context from a [`VectorIndex`] and has a model answer from it
pub struct QueryEngine {
    index: Arc<VectorIndex>,
    llm: Arc<dyn TextGenerator>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(index: Arc<VectorIndex>, llm: Arc<dyn TextGenerator>, top_k: usize) -> Self {
        Self { index, llm, top_k }
    }

    /// Answer `query` from the indexed documents
    pub async fn query(&self, query: &str) -> Result<String, QueryError> {
        let span = info_span!("doc_query", top_k = self.top_k, otel.name = "doc_query");
        async {
            let hits = self.index.retrieve(query, self.top_k).await?;
            if hits.is_empty() {
                return Ok(EMPTY_RESPONSE.to_string());
            }

            let context = hits
                .iter()
                .map(|h| format!("file_path: {}\n\n{}", h.chunk.source.display(), h.chunk.text))
                .collect::<Vec<_>>()
                .join("\n\n");
            debug!(chunks = hits.len(), best_score = hits[0].score, "Context retrieved");

            let answer = self.llm.complete(&qa_prompt(&context, query)).await?;
            Ok(answer.trim().to_string())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::{doc, KeywordEmbedder};
    use crate::index::ChunkConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records prompts and echoes a canned answer
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for RecordingLlm {
        async fn complete(&self, prompt: &str) -> Result<String, OllamaError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("  Use the billing endpoint.\n".to_string())
        }
    }

    #[tokio::test]
    async fn test_query_includes_retrieved_context() {
        let docs = vec![doc("billing.md", "Billing endpoint is /v1/billing")];
        let index = VectorIndex::from_documents(&docs, Arc::new(KeywordEmbedder), ChunkConfig::default())
            .await
            .unwrap();
        let llm = Arc::new(RecordingLlm {
            prompts: Mutex::new(Vec::new()),
        });
        let engine = QueryEngine::new(Arc::new(index), llm.clone(), 2);

        let answer = engine.query("billing?").await.unwrap();
        assert_eq!(answer, "Use the billing endpoint.");

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Billing endpoint is /v1/billing"));
        assert!(prompts[0].contains("Query: billing?"));
    }

    #[tokio::test]
    async fn test_query_without_documents_skips_model() {
        let index = VectorIndex::from_documents(&[], Arc::new(KeywordEmbedder), ChunkConfig::default())
            .await
            .unwrap();
        let llm = Arc::new(RecordingLlm {
            prompts: Mutex::new(Vec::new()),
        });
        let engine = QueryEngine::new(Arc::new(index), llm.clone(), 2);

        assert_eq!(engine.query("anything").await.unwrap(), EMPTY_RESPONSE);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }
}
