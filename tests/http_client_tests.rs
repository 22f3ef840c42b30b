//! HTTP-level tests for the Ollama and LlamaParse clients against a mock server

use std::io::Write;
use std::time::Duration;

use docsage::documents::{DocumentError, LlamaParseClient};
use docsage::ollama::{ChatClient, ChatError, ChatMessage, OllamaClient, OllamaError};
use mockito::Matcher;
use serde_json::json;

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_embed_returns_vectors_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/embed")
        .match_body(Matcher::PartialJson(json!({
            "model": "bge-m3",
            "input": ["alpha", "beta"]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"embeddings": [[1.0, 0.0], [0.0, 1.0]]}).to_string())
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let vectors = client.embed("bge-m3", &texts(&["alpha", "beta"])).await.unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_embed_count_mismatch_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/embed")
        .with_status(200)
        .with_body(json!({"embeddings": [[1.0, 0.0]]}).to_string())
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let err = client.embed("bge-m3", &texts(&["a", "b"])).await.unwrap_err();

    assert!(matches!(
        err,
        OllamaError::EmbeddingCount {
            expected: 2,
            got: 1
        }
    ));
}

#[tokio::test]
async fn test_embed_http_error_keeps_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/embed")
        .with_status(404)
        .with_body(r#"{"error":"model \"bge-m3\" not found"}"#)
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    match client.embed("bge-m3", &texts(&["a"])).await {
        Err(OllamaError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 404);
            assert!(body.contains("not found"));
        }
        other => panic!("expected Status error, got {:?}", other.map(|v| v.len())),
    }
}

#[tokio::test]
async fn test_generate_joins_lines_split_across_chunks() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({"model": "mistral", "stream": true})))
        .match_header("x-trace-id", "trace-1")
        .with_status(200)
        .with_chunked_body(|w| {
            // The second JSON line is cut in the middle of a string
            w.write_all(b"{\"response\":\"Hel\",\"done\":false}\n{\"respo")?;
            w.flush()?;
            w.write_all(b"nse\":\"lo\",\"done\":false}\n")?;
            w.flush()?;
            w.write_all(b"{\"response\":\"\",\"done\":true,\"eval_count\":4,\"prompt_eval_count\":2}\n")
        })
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let response = client
        .generate("say hello", "mistral", Some("trace-1"))
        .await
        .unwrap();

    assert_eq!(response.response, "Hello");
    assert_eq!(response.eval_count, 4);
    assert_eq!(response.prompt_eval_count, 2);
}

#[tokio::test]
async fn test_generate_http_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/generate")
        .with_status(500)
        .with_body("model failed to load")
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let err = client.generate("hi", "mistral", None).await.unwrap_err();
    assert!(matches!(err, OllamaError::Status { .. }));
}

#[tokio::test]
async fn test_chat_sends_configured_temperature() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "mistral",
            "stream": false,
            "options": {"temperature": 0.75}
        })))
        .with_status(200)
        .with_body(
            json!({
                "message": {"role": "assistant", "content": "ok"},
                "done": true
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ChatClient::new(server.url()).with_temperature(Some(0.75));
    let response = client
        .chat(vec![ChatMessage::user("hi")], "mistral", None)
        .await
        .unwrap();

    assert_eq!(response.message.content, "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_chat_http_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(503)
        .with_body("busy")
        .create_async()
        .await;

    let client = ChatClient::new(server.url());
    let err = client
        .chat(vec![ChatMessage::user("hi")], "codellama", None)
        .await
        .unwrap_err();

    match err {
        ChatError::Status { status, body } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "busy");
        }
        other => panic!("expected Status error, got {other}"),
    }
}

#[tokio::test]
async fn test_chat_empty_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let client = ChatClient::new(server.url());
    let err = client
        .chat(vec![ChatMessage::user("hi")], "codellama", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::EmptyResponse));
}

fn sample_pdf() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manual.pdf");
    std::fs::write(&path, b"%PDF-1.4 fake").unwrap();
    (dir, path)
}

async fn mock_upload(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/api/parsing/upload")
        .match_header("authorization", "Bearer llx-test")
        .with_status(200)
        .with_body(json!({"id": "job1", "status": "PENDING"}).to_string())
        .create_async()
        .await
}

async fn mock_status(server: &mut mockito::ServerGuard, status: &str) -> mockito::Mock {
    server
        .mock("GET", "/api/parsing/job/job1")
        .expect_at_least(1)
        .with_status(200)
        .with_body(json!({"id": "job1", "status": status}).to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn test_llama_parse_upload_poll_fetch() {
    let mut server = mockito::Server::new_async().await;
    let upload = mock_upload(&mut server).await;
    let poll = mock_status(&mut server, "SUCCESS").await;
    let result = server
        .mock("GET", "/api/parsing/job/job1/result/markdown")
        .match_header("authorization", "Bearer llx-test")
        .with_status(200)
        .with_body(json!({"markdown": "# Manual\n\nUse `GET /items`."}).to_string())
        .create_async()
        .await;

    let (_dir, pdf) = sample_pdf();
    let client = LlamaParseClient::new(server.url(), "llx-test");
    let markdown = client.parse_markdown(&pdf).await.unwrap();

    assert_eq!(markdown, "# Manual\n\nUse `GET /items`.");
    upload.assert_async().await;
    poll.assert_async().await;
    result.assert_async().await;
}

#[tokio::test]
async fn test_llama_parse_cancelled_job_fails_without_waiting() {
    for terminal in ["CANCELLED", "PARTIAL_SUCCESS", "ERROR"] {
        let mut server = mockito::Server::new_async().await;
        mock_upload(&mut server).await;
        let poll = server
            .mock("GET", "/api/parsing/job/job1")
            .expect(1)
            .with_status(200)
            .with_body(json!({"id": "job1", "status": terminal}).to_string())
            .create_async()
            .await;

        let (_dir, pdf) = sample_pdf();
        let client = LlamaParseClient::new(server.url(), "llx-test")
            .with_polling(Duration::from_millis(50), Duration::from_secs(30));
        let start = std::time::Instant::now();
        let err = client.parse_markdown(&pdf).await.unwrap_err();

        match err {
            DocumentError::JobFailed { job_id, status } => {
                assert_eq!(job_id, "job1");
                assert_eq!(status, terminal);
            }
            other => panic!("expected JobFailed for {terminal}, got {other}"),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
        poll.assert_async().await;
    }
}

#[tokio::test]
async fn test_llama_parse_pending_job_times_out() {
    let mut server = mockito::Server::new_async().await;
    mock_upload(&mut server).await;
    mock_status(&mut server, "PENDING").await;

    let (_dir, pdf) = sample_pdf();
    let client = LlamaParseClient::new(server.url(), "llx-test")
        .with_polling(Duration::from_millis(10), Duration::from_millis(50));
    let err = client.parse_markdown(&pdf).await.unwrap_err();

    assert!(matches!(err, DocumentError::JobTimeout { ref job_id, .. } if job_id == "job1"));
}

#[tokio::test]
async fn test_llama_parse_rejected_upload() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/parsing/upload")
        .with_status(401)
        .with_body("invalid api key")
        .create_async()
        .await;

    let (_dir, pdf) = sample_pdf();
    let client = LlamaParseClient::new(server.url(), "llx-bad");
    let err = client.parse_markdown(&pdf).await.unwrap_err();
    assert!(matches!(err, DocumentError::Status { status, .. } if status.as_u16() == 401));
}
