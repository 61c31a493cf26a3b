//! Session directory: the on-disk state shared by every workflow step.
//!
//! Sources, extraction results, merged data and generated outputs all live
//! under one root, and each CLI step picks up where the previous one stopped.
mod document;
mod paths;

pub use document::{
    compare_ids, find_by_hash, find_failed_by_hash, load_documents, next_document_id,
    store_source, write_document, ExtractedDocument, SourceRef, TextMethod,
    DOCUMENT_SCHEMA_VERSION,
};
pub use paths::SessionPaths;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Names the session root when `--session` is omitted.
pub const ENV_SESSION: &str = "VERBALE_SESSION";

/// Resolve the session root from the CLI flag, environment, or data dir.
pub fn resolve_session_root(arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path.to_path_buf());
    }
    if let Ok(value) = std::env::var(ENV_SESSION) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine data directory; pass --session"))?;
    Ok(data_dir.join("verbale").join("default"))
}

/// Fail unless the session was initialized.
pub fn require_initialized(paths: &SessionPaths) -> Result<()> {
    if !paths.config_path().is_file() {
        return Err(anyhow!(
            "session not initialized at {} (run `verbale init --session {}`)",
            paths.root().display(),
            paths.root().display()
        ));
    }
    Ok(())
}

/// Create the directory skeleton of a session.
pub fn create_layout(paths: &SessionPaths) -> Result<()> {
    for dir in [
        paths.root().to_path_buf(),
        paths.sources_dir(),
        paths.documents_dir(),
        paths.logs_dir(),
    ] {
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    }
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(value).context("serialize JSON")?;
    text.push('\n');
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))
}
