//! End-to-end tests: agent → output pipeline → parser → file, over a scripted backend

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docsage::agent::{AgentConfig, AgentController};
use docsage::formatter::OutputPipeline;
use docsage::ollama::{ChatBackend, ChatError, ChatMessage, ChatResponse, Tool};
use docsage::repl::{Repl, MAX_ATTEMPTS};
use docsage::tools::ToolSet;

/// Answers per model name, so agent and formatter calls can be scripted separately
struct TwoModelChat {
    agent_replies: Mutex<VecDeque<Result<String, ()>>>,
    formatter_replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatBackend for TwoModelChat {
    async fn chat(
        &self,
        _messages: Vec<ChatMessage>,
        model: &str,
        _tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponse, ChatError> {
        self.calls.lock().unwrap().push(model.to_string());
        let content = if model == "codellama" {
            self.agent_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(()))
                .map_err(|_| ChatError::EmptyResponse)?
        } else {
            self.formatter_replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(ChatError::EmptyResponse)?
        };
        Ok(ChatResponse {
            message: ChatMessage::assistant(content),
            done: true,
            eval_count: 0,
            eval_duration: 0,
        })
    }
}

fn repl_over(chat: Arc<TwoModelChat>, output_dir: &std::path::Path) -> Repl {
    let agent = AgentController::new(chat.clone(), ToolSet::new(), AgentConfig::default());
    let pipeline = OutputPipeline::new(chat, "mistral");
    Repl::new(Arc::new(agent), Arc::new(pipeline), output_dir)
}

#[tokio::test]
async fn test_prompt_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let chat = Arc::new(TwoModelChat {
        agent_replies: Mutex::new(VecDeque::from([Ok("def add(a, b):\n    return a + b".to_string())])),
        formatter_replies: Mutex::new(VecDeque::from([serde_json::json!({
            "code": "def add(a, b):\n    return a + b\n",
            "description": "Adds two numbers",
            "filename": "add.py"
        })
        .to_string()])),
        calls: Mutex::new(Vec::new()),
    });
    let repl = repl_over(chat.clone(), dir.path());

    let mut out = Vec::new();
    let summary = repl
        .run(&b"write an add function\nq\n"[..], &mut out)
        .await
        .unwrap();

    assert_eq!(summary.saved, 1);
    assert_eq!(*chat.calls.lock().unwrap(), vec!["codellama", "mistral"]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("add.py")).unwrap(),
        "def add(a, b):\n    return a + b\n"
    );
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Description: Adds two numbers"));
}

#[tokio::test]
async fn test_unparseable_formatter_output_exhausts_retries() {
    let dir = tempfile::tempdir().unwrap();
    let chat = Arc::new(TwoModelChat {
        agent_replies: Mutex::new(VecDeque::from([
            Ok("a".to_string()),
            Ok("b".to_string()),
            Ok("c".to_string()),
        ])),
        formatter_replies: Mutex::new(VecDeque::from([
            "Sure! Here you go.".to_string(),
            "```python\nprint(1)\n```".to_string(),
            "{\"code\": 1}".to_string(),
        ])),
        calls: Mutex::new(Vec::new()),
    });
    let repl = repl_over(chat.clone(), dir.path());

    let mut out = Vec::new();
    let summary = repl.run(&b"p\nq\n"[..], &mut out).await.unwrap();

    assert_eq!(summary.exhausted, 1);
    let calls = chat.calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|m| *m == "codellama").count(), MAX_ATTEMPTS);
    assert_eq!(calls.iter().filter(|m| *m == "mistral").count(), MAX_ATTEMPTS);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
