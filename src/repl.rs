//! Interactive prompt loop
//!
//! ```text
//! awaiting input ──q/EOF──▶ exit
//!      │ prompt
//!      ▼
//! agent → formatter → parse   (≤ MAX_ATTEMPTS, any failure retries)
//!      │ CodeOutput
//!      ▼
//! print, write <output_dir>/<filename> (failure reported, not fatal)
//!      │
//!      └──▶ awaiting input
//! ```

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::agent::{AgentError, PromptAgent};
use crate::formatter::{parse_code_output, CodeOutput, FormatError, ParseError, ResponseFormatter};
use crate::metrics;

/// Text shown before each read
pub const PROMPT: &str = "Enter a prompt (q to quit): ";
/// Input that ends the loop
pub const QUIT_SENTINEL: &str = "q";
/// Attempts per prompt, shared by every failure cause
pub const MAX_ATTEMPTS: usize = 3;

/// One failed attempt at turning a prompt into a [`CodeOutput`]
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Why a generated file was not written
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("filename `{0}` escapes the output directory")]
    OutsideOutputDir(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to one prompt
#[derive(Debug)]
pub enum PromptOutcome {
    /// Code generated and written to `path`
    Saved {
        output: CodeOutput,
        path: PathBuf,
        retries: usize,
    },
    /// Code generated but the write failed
    SaveFailed {
        output: CodeOutput,
        error: SaveError,
        retries: usize,
    },
    /// Every attempt failed; nothing was written
    Exhausted { last_error: AttemptError },
}

impl PromptOutcome {
    fn label(&self) -> &'static str {
        match self {
            PromptOutcome::Saved { .. } => "saved",
            PromptOutcome::SaveFailed { .. } => "save_failed",
            PromptOutcome::Exhausted { .. } => "exhausted",
        }
    }

    fn attempts(&self) -> usize {
        match self {
            PromptOutcome::Saved { retries, .. } | PromptOutcome::SaveFailed { retries, .. } => {
                retries + 1
            }
            PromptOutcome::Exhausted { .. } => MAX_ATTEMPTS,
        }
    }
}

/// Counts for one run of the loop
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub prompts: usize,
    pub saved: usize,
    pub save_failed: usize,
    pub exhausted: usize,
}

/// The prompt loop and its collaborators
pub struct Repl {
    agent: Arc<dyn PromptAgent>,
    formatter: Arc<dyn ResponseFormatter>,
    output_dir: PathBuf,
    confine_output: bool,
}

impl Repl {
    pub fn new(
        agent: Arc<dyn PromptAgent>,
        formatter: Arc<dyn ResponseFormatter>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            agent,
            formatter,
            output_dir: output_dir.into(),
            confine_output: false,
        }
    }

    /// Refuse filenames that would land outside the output directory
    pub fn confine_output(mut self, confine: bool) -> Self {
        self.confine_output = confine;
        self
    }

    /// Read prompts from `input` until the quit sentinel or end of input
    pub async fn run<R, W>(&self, mut input: R, out: &mut W) -> std::io::Result<LoopSummary>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut summary = LoopSummary::default();
        let mut line = String::new();

        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line).await? == 0 {
                debug!("End of input");
                writeln!(out)?;
                break;
            }
            let prompt = line.trim_end_matches(['\n', '\r']);
            if prompt == QUIT_SENTINEL {
                break;
            }

            summary.prompts += 1;
            match self.handle_prompt(prompt, out).await? {
                PromptOutcome::Saved { .. } => summary.saved += 1,
                PromptOutcome::SaveFailed { .. } => summary.save_failed += 1,
                PromptOutcome::Exhausted { .. } => summary.exhausted += 1,
            }
        }

        Ok(summary)
    }

    /// Generate, print and save the code for one prompt
    pub async fn handle_prompt<W: Write>(
        &self,
        prompt: &str,
        out: &mut W,
    ) -> std::io::Result<PromptOutcome> {
        let span = info_span!("prompt", otel.name = "prompt");
        let outcome = async {
            let (output, retries) = match self.generate(prompt, out).await? {
                Ok(generated) => generated,
                Err(last_error) => {
                    writeln!(out, "Unable to process request, try again...")?;
                    return Ok(PromptOutcome::Exhausted { last_error });
                }
            };

            writeln!(out, "Code generated")?;
            writeln!(out, "{}", output.code)?;
            writeln!(out, "\n\nDescription: {}", output.description)?;

            let outcome = match self.save(&output).await {
                Ok(path) => {
                    info!(path = %path.display(), "File saved");
                    PromptOutcome::Saved {
                        output,
                        path,
                        retries,
                    }
                }
                Err(error) => {
                    warn!(filename = %output.filename, error = %error, "Failed to save file");
                    writeln!(out, "Error saving file... {}", error)?;
                    PromptOutcome::SaveFailed {
                        output,
                        error,
                        retries,
                    }
                }
            };
            Ok::<_, std::io::Error>(outcome)
        }
        .instrument(span)
        .await?;

        metrics::record_prompt(outcome.label(), outcome.attempts());
        Ok(outcome)
    }

    /// Agent → formatter → parse, retrying the whole chain on any failure.
    ///
    /// The outer `Result` is for writes to `out`; the inner one is the
    /// generation result along with the number of failed attempts before it.
    async fn generate<W: Write>(
        &self,
        prompt: &str,
        out: &mut W,
    ) -> std::io::Result<Result<(CodeOutput, usize), AttemptError>> {
        let mut retries = 0;
        loop {
            match self.attempt(prompt).await {
                Ok(output) => return Ok(Ok((output, retries))),
                Err(e) => {
                    retries += 1;
                    warn!(retry = retries, error = %e, "Attempt failed");
                    writeln!(out, "Error occurred, retry #{}: {}", retries, e)?;
                    if retries >= MAX_ATTEMPTS {
                        return Ok(Err(e));
                    }
                }
            }
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<CodeOutput, AttemptError> {
        debug!(prompt, "Sending query to agent");
        let result = self.agent.query(prompt).await?;
        debug!("Agent answered, running output pipeline");
        let formatted = self.formatter.format(&result).await?;
        let output = parse_code_output(&formatted)?;
        debug!(filename = %output.filename, "Parsed structured output");
        Ok(output)
    }

    /// Write `output.code` to `<output_dir>/<filename>`
    async fn save(&self, output: &CodeOutput) -> Result<PathBuf, SaveError> {
        if !stays_inside(&output.filename) {
            if self.confine_output {
                metrics::record_file_write(false);
                return Err(SaveError::OutsideOutputDir(output.filename.clone()));
            }
            warn!(filename = %output.filename, "Filename escapes the output directory; writing anyway");
        }

        let path = self.output_dir.join(&output.filename);
        debug!(path = %path.display(), "Attempting to save file");
        let result = tokio::fs::write(&path, &output.code).await;
        metrics::record_file_write(result.is_ok());
        result.map_err(|source| SaveError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// True when joining `filename` onto a directory stays inside it
fn stays_inside(filename: &str) -> bool {
    let path = Path::new(filename);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}
