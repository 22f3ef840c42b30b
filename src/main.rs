use std::sync::Arc;

use tracing::{error, info, warn};

use docsage::documents::{DocumentStore, LlamaParseClient};
use docsage::index::{QueryEngine, VectorIndex};
use docsage::ollama::{ChatClient, OllamaClient};
use docsage::tools::{CodeReaderTool, QueryEngineTool, ToolSet};
use docsage::{AgentController, Config, OutputPipeline, Repl};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::load();
    docsage::tracing::init_tracing("docsage", config.otlp_endpoint.as_deref(), config.log_json)?;

    let result = run(&config).await;
    if let Err(e) = &result {
        error!(error = %e, "docsage failed");
    }

    if let Some(path) = &config.metrics_out {
        if let Err(e) = docsage::metrics::write_metrics(path) {
            warn!(path = %path.display(), error = %e, "Failed to write metrics");
        }
    }
    docsage::tracing::shutdown_tracing();
    result
}

async fn run(config: &Config) -> Result<(), BoxError> {
    let timeout = config.request_timeout();
    let ollama = OllamaClient::with_timeout(&config.ollama_url, timeout)?;
    let chat = Arc::new(
        ChatClient::with_timeout(&config.ollama_url, timeout)?
            .with_temperature(Some(config.temperature)),
    );

    // 1. Load documents
    let mut store = DocumentStore::new(&config.data_dir);
    match &config.llama_cloud_api_key {
        Some(key) => {
            let parser = LlamaParseClient::new(&config.llama_parse_url, key);
            store = store.with_extractor("pdf", Arc::new(parser));
        }
        None => {
            warn!("LLAMA_CLOUD_API_KEY not set; PDF files will be skipped");
            store = store.skip_extension("pdf");
        }
    }
    let documents = store.load().await?;

    // 2. Build the index and the documentation tool
    let index = VectorIndex::from_documents(
        &documents,
        Arc::new(ollama.embedder(&config.embed_model)),
        config.chunk_config(),
    )
    .await?;
    let engine = QueryEngine::new(
        Arc::new(index),
        Arc::new(ollama.generator(&config.model)),
        config.top_k,
    );
    let tools = ToolSet::new()
        .with(Arc::new(QueryEngineTool::api_documentation(Arc::new(engine))))
        .with(Arc::new(CodeReaderTool::new(&config.data_dir)));

    // 3. Agent and output pipeline
    let agent = AgentController::new(chat.clone(), tools, config.agent_config());
    let pipeline = OutputPipeline::new(chat, &config.model);
    info!(
        agent_model = %config.code_model,
        model = %config.model,
        "Agent and output pipeline ready"
    );

    tokio::fs::create_dir_all(&config.output_dir).await?;

    // 4. Prompt loop
    let repl = Repl::new(Arc::new(agent), Arc::new(pipeline), &config.output_dir)
        .confine_output(config.confine_output);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let summary = repl.run(stdin, &mut std::io::stdout()).await?;

    info!(
        prompts = summary.prompts,
        saved = summary.saved,
        save_failed = summary.save_failed,
        exhausted = summary.exhausted,
        "Session finished"
    );
    Ok(())
}
