//! Typed paths into a session layout.
//!
//! Centralizing path construction keeps file access consistent across the
//! workflow steps.
use std::path::{Path, PathBuf};

/// Convenience wrapper for locating session artifacts.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    /// Create a new path helper rooted at the session root.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the session root used for path derivation.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `config.json` path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Return the `sources/` directory holding copies of uploaded files.
    pub fn sources_dir(&self) -> PathBuf {
        self.root.join("sources")
    }

    /// Return the `documents/` directory holding extraction results.
    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    /// Return the `documents/<id>.json` path.
    pub fn document_path(&self, id: &str) -> PathBuf {
        self.documents_dir().join(format!("{id}.json"))
    }

    /// Return the `data.json` path holding merged fields and edits.
    pub fn data_path(&self) -> PathBuf {
        self.root.join("data.json")
    }

    /// Return the `logs/` directory path.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Return the `logs/lm_log.jsonl` path.
    pub fn lm_log_path(&self) -> PathBuf {
        self.logs_dir().join("lm_log.jsonl")
    }

    /// Return the `logs/lm_log/` directory for full prompt/response storage.
    pub fn lm_log_dir(&self) -> PathBuf {
        self.logs_dir().join("lm_log")
    }

    /// Return the output directory for generated documents.
    pub fn output_dir(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }
}
