//! Prometheus metrics for the prompt loop and its collaborators
//!
//! Metrics live in the default registry. The binary dumps them in text
//! exposition format on exit when `--metrics-out` is set (suitable for the
//! node_exporter textfile collector).

use std::path::Path;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Prompt Loop Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Prompts processed, by outcome.
    ///
    /// Labels:
    /// - outcome: "saved", "save_failed" or "exhausted"
    pub static ref PROMPTS: CounterVec = register_counter_vec!(
        "docsage_prompts_total",
        "Prompts processed by the interactive loop",
        &["outcome"]
    ).expect("failed to register PROMPTS metric");

    /// Attempts consumed per prompt (1..=3).
    pub static ref PROMPT_ATTEMPTS: Histogram = register_histogram!(
        "docsage_prompt_attempts",
        "Agent/format/parse attempts used per prompt",
        vec![1.0, 2.0, 3.0]
    ).expect("failed to register PROMPT_ATTEMPTS metric");

    /// Generated files written, by status.
    ///
    /// Labels:
    /// - status: "ok" or "error"
    pub static ref FILES_WRITTEN: CounterVec = register_counter_vec!(
        "docsage_files_written_total",
        "Generated code files written to the output directory",
        &["status"]
    ).expect("failed to register FILES_WRITTEN metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Model calls made per agent run.
    pub static ref AGENT_ITERATIONS: Histogram = register_histogram!(
        "docsage_agent_iterations",
        "Model calls per agent run",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 15.0]
    ).expect("failed to register AGENT_ITERATIONS metric");

    /// Tool calls dispatched by the agent.
    ///
    /// Labels:
    /// - tool: tool name as requested by the model
    pub static ref AGENT_TOOL_CALLS: CounterVec = register_counter_vec!(
        "docsage_agent_tool_calls_total",
        "Tool calls dispatched by the agent",
        &["tool"]
    ).expect("failed to register AGENT_TOOL_CALLS metric");

    /// Latency of individual model calls.
    ///
    /// Labels:
    /// - model: Ollama model name
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "docsage_llm_call_seconds",
        "Latency of Ollama chat/generate calls",
        &["model"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).expect("failed to register LLM_CALL_TIME metric");
}

/// Record the latency of one model call.
pub fn observe_llm_call(model: &str, elapsed: Duration) {
    LLM_CALL_TIME
        .with_label_values(&[model])
        .observe(elapsed.as_secs_f64());
}

/// Record the outcome of one prompt and how many attempts it used.
pub fn record_prompt(outcome: &str, attempts: usize) {
    PROMPTS.with_label_values(&[outcome]).inc();
    PROMPT_ATTEMPTS.observe(attempts as f64);
}

/// Record a file write.
pub fn record_file_write(ok: bool) {
    FILES_WRITTEN
        .with_label_values(&[if ok { "ok" } else { "error" }])
        .inc();
}

/// Render every registered metric in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Write the current metrics to `path`.
pub fn write_metrics(path: &Path) -> std::io::Result<()> {
    std::fs::write(path, encode_metrics())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_metrics_include_recorded_prompt() {
        record_prompt("saved", 1);
        record_file_write(true);
        observe_llm_call("mistral", Duration::from_millis(20));

        let text = encode_metrics();
        assert!(text.contains("docsage_prompts_total"));
        assert!(text.contains("outcome=\"saved\""));
        assert!(text.contains("docsage_files_written_total"));
        assert!(text.contains("model=\"mistral\""));
    }

    #[test]
    fn test_write_metrics_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docsage.prom");
        record_prompt("exhausted", 3);
        write_metrics(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("docsage_prompt_attempts"));
    }
}
