//! LM invocation logging.
//!
//! Every extraction or OCR call appends one line to `logs/lm_log.jsonl` so a
//! user can see what was sent, how long it took and why it failed:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"seq":1,"kind":"extraction","document_id":"doc-001",...}
//! {"schema_version":1,"ts":1707900060000,"seq":2,"kind":"ocr","document_id":"doc-002",...}
//! ```
//!
//! With `log_full_content` enabled, full prompts and responses are stored in
//! `logs/lm_log/seq_NNN_<kind>_{prompt,response}.txt`.
use crate::session::SessionPaths;
use crate::util::{now_epoch_ms, truncate_string};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::time::Instant;

/// Current schema version for lm_log.jsonl entries.
pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_BYTES: usize = 500;

/// Kinds of LM invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmInvocationKind {
    /// Field extraction from document text.
    Extraction,
    /// Text recognition of a scan or image.
    Ocr,
}

impl std::fmt::Display for LmInvocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extraction => write!(f, "extraction"),
            Self::Ocr => write!(f, "ocr"),
        }
    }
}

/// Outcome of an LM invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmOutcome {
    Success,
    Failed,
}

/// A single LM invocation log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the entry was written.
    pub ts: u128,

    /// Sequence number within the session (1-indexed).
    pub seq: u32,

    pub kind: LmInvocationKind,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub document_id: Option<String>,

    /// Original file name of the source.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,

    pub duration_ms: u64,

    pub attempts: usize,

    pub outcome: LmOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// First ~500 bytes of the prompt for quick inspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Builder for constructing LM log entries with timing.
pub struct LmLogBuilder {
    start: Instant,
    seq: u32,
    kind: LmInvocationKind,
    document_id: Option<String>,
    source: Option<String>,
    prompt_preview: Option<String>,
}

impl LmLogBuilder {
    /// Start building a new log entry; the clock starts now.
    pub fn new(seq: u32, kind: LmInvocationKind) -> Self {
        Self {
            start: Instant::now(),
            seq,
            kind,
            document_id: None,
            source: None,
            prompt_preview: None,
        }
    }

    pub fn with_document(mut self, document_id: &str, source: &str) -> Self {
        self.document_id = Some(document_id.to_string());
        self.source = Some(source.to_string());
        self
    }

    /// Set a preview of the prompt (truncated to 500 bytes).
    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        let preview = if prompt.len() > PROMPT_PREVIEW_BYTES {
            format!("{}...", truncate_string(prompt, PROMPT_PREVIEW_BYTES))
        } else {
            prompt.to_string()
        };
        self.prompt_preview = Some(preview);
        self
    }

    /// Finish the entry with a success outcome.
    pub fn success(self, attempts: usize, summary: impl Into<String>) -> Result<LmLogEntry> {
        self.build(LmOutcome::Success, attempts, Some(summary.into()), None)
    }

    /// Finish the entry with a failure outcome.
    pub fn failed(self, attempts: usize, error: impl Into<String>) -> Result<LmLogEntry> {
        self.build(LmOutcome::Failed, attempts, None, Some(error.into()))
    }

    fn build(
        self,
        outcome: LmOutcome,
        attempts: usize,
        summary: Option<String>,
        error: Option<String>,
    ) -> Result<LmLogEntry> {
        Ok(LmLogEntry {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms()?,
            seq: self.seq,
            kind: self.kind,
            document_id: self.document_id,
            source: self.source,
            duration_ms: self.start.elapsed().as_millis() as u64,
            attempts,
            outcome,
            summary,
            error,
            prompt_preview: self.prompt_preview,
        })
    }
}

/// Append an LM log entry to the log file.
pub fn append_lm_log(paths: &SessionPaths, entry: &LmLogEntry) -> Result<()> {
    let log_path = paths.lm_log_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("create logs directory")?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open lm_log for append: {}", log_path.display()))?;

    let line = serde_json::to_string(entry).context("serialize lm_log entry")?;
    writeln!(file, "{}", line).context("write lm_log entry")?;
    Ok(())
}

/// Store full prompt/response content for one invocation.
pub fn store_lm_content(
    paths: &SessionPaths,
    seq: u32,
    kind: LmInvocationKind,
    prompt: &str,
    response: &str,
) -> Result<()> {
    let log_dir = paths.lm_log_dir();
    fs::create_dir_all(&log_dir).context("create lm_log directory")?;

    let prompt_path = log_dir.join(format!("seq_{:03}_{}_prompt.txt", seq, kind));
    let response_path = log_dir.join(format!("seq_{:03}_{}_response.txt", seq, kind));

    fs::write(&prompt_path, prompt)
        .with_context(|| format!("write prompt: {}", prompt_path.display()))?;
    fs::write(&response_path, response)
        .with_context(|| format!("write response: {}", response_path.display()))?;
    Ok(())
}

/// Load all LM log entries, skipping corrupt lines.
pub fn load_lm_log(paths: &SessionPaths) -> Result<Vec<LmLogEntry>> {
    let log_path = paths.lm_log_path();
    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let file =
        File::open(&log_path).with_context(|| format!("open lm_log: {}", log_path.display()))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} of lm_log", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LmLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(line = line_num + 1, error = %err, "skip corrupt lm_log entry");
            }
        }
    }
    Ok(entries)
}

/// Next sequence number based on existing log entries.
pub fn next_sequence_number(paths: &SessionPaths) -> Result<u32> {
    let entries = load_lm_log(paths)?;
    Ok(entries.iter().map(|e| e.seq).max().unwrap_or(0) + 1)
}
