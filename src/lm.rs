//! Language-model access for field extraction and OCR.
//!
//! # Backends
//!
//! Completions come from one of two backends, chosen by the session config
//! (or overridden with `--lm` / `VERBALE_LM_COMMAND`):
//!
//! - **http**: an OpenAI-compatible chat completion API. The same provider's
//!   OCR endpoint reads scanned PDFs and images.
//! - **command**: any local tool that reads a prompt on stdin and prints the
//!   response on stdout (`llm`, `ollama run`, a wrapper script, a test mock).
//!
//! # Error Recovery
//!
//! Each call runs under the session's timeout list: attempt `n` is bounded by
//! `timeouts_secs[n]` and attempts are separated by a fixed delay.
//!
//! 1. **Transport errors, timeouts, 429/5xx**: retried as-is
//! 2. **Unparsable JSON**: retried with the parse error in the prompt
//! 3. **Missing key, other 4xx, unusable command**: returned immediately
mod backend;
mod client;
mod log;
mod ocr;
mod response;

pub use backend::{build_backend, CompletionBackend};
pub use client::{invoke_extraction, RetryPolicy};
pub use log::{
    append_lm_log, next_sequence_number, store_lm_content, LmInvocationKind, LmLogBuilder,
};
pub use ocr::HttpOcr;

use anyhow::Result;

/// Converts a scanned document or image into text.
pub trait OcrProvider {
    fn ocr(&self, bytes: &[u8], mime: &str) -> Result<String>;
}
