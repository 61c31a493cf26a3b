//! Session configuration helpers.
//!
//! The config lives inside the session (`config.json`) so a session can be
//! moved or archived together with the settings that produced it. Secrets are
//! never stored: the API key is looked up from the environment at call time.
use crate::session::SessionPaths;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};

/// Schema version for `config.json`.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Forces the command backend with the given command line.
pub const ENV_LM_COMMAND: &str = "VERBALE_LM_COMMAND";
/// Overrides the chat model of the HTTP backend.
pub const ENV_MODEL: &str = "VERBALE_MODEL";
/// Overrides the base URL of the HTTP backend.
pub const ENV_BASE_URL: &str = "VERBALE_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";
const DEFAULT_MODEL: &str = "mistral-large-latest";
const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";
const DEFAULT_API_KEY_ENV: &str = "MISTRAL_API_KEY";

fn default_timeouts_secs() -> Vec<u64> {
    vec![120, 90, 60]
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_max_document_chars() -> usize {
    40_000
}

fn default_min_pdf_text_chars() -> usize {
    50
}

fn default_output_dir() -> String {
    "output".to_string()
}

/// Settings for a single session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    pub schema_version: u32,
    pub backend: BackendConfig,
    /// One entry per attempt; attempt `n` is bounded by `timeouts_secs[n]`.
    #[serde(default = "default_timeouts_secs")]
    pub timeouts_secs: Vec<u64>,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
    /// PDFs with less extracted text than this are treated as scans.
    #[serde(default = "default_min_pdf_text_chars")]
    pub min_pdf_text_chars: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub log_full_content: bool,
}

/// Where completions come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum BackendConfig {
    /// OpenAI-compatible chat completion API (plus OCR endpoint).
    Http {
        base_url: String,
        model: String,
        ocr_model: String,
        /// Name of the environment variable holding the API key.
        api_key_env: String,
    },
    /// Local command that reads the prompt on stdin and prints the response.
    Command { command: String },
}

/// Backend settings after environment and CLI overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedBackend {
    Http {
        base_url: String,
        model: String,
        ocr_model: String,
        api_key_env: String,
        api_key: Option<String>,
    },
    Command {
        command: String,
    },
}

impl ResolvedBackend {
    pub fn label(&self) -> String {
        match self {
            Self::Http {
                base_url, model, ..
            } => format!("http {model} @ {base_url}"),
            Self::Command { command } => format!("command `{command}`"),
        }
    }
}

/// Build the default config written by `init`.
pub fn default_config() -> SessionConfig {
    SessionConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        backend: BackendConfig::Http {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            ocr_model: DEFAULT_OCR_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        },
        timeouts_secs: default_timeouts_secs(),
        retry_delay_ms: default_retry_delay_ms(),
        max_document_chars: default_max_document_chars(),
        min_pdf_text_chars: default_min_pdf_text_chars(),
        output_dir: default_output_dir(),
        log_full_content: false,
    }
}

/// Default config with the command backend preselected.
pub fn command_config(command: &str) -> SessionConfig {
    SessionConfig {
        backend: BackendConfig::Command {
            command: command.to_string(),
        },
        ..default_config()
    }
}

/// Load and validate `config.json`.
pub fn load_config(paths: &SessionPaths) -> Result<SessionConfig> {
    let path = paths.config_path();
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: SessionConfig =
        serde_json::from_slice(&bytes).context("parse session config JSON")?;
    validate_config(&config)?;
    Ok(config)
}

/// Persist a config in a stable JSON format.
pub fn write_config(paths: &SessionPaths, config: &SessionConfig) -> Result<()> {
    let path = paths.config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create session dir")?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize session config")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate schema version and value ranges.
pub fn validate_config(config: &SessionConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported session config schema_version {}",
            config.schema_version
        ));
    }
    if config.timeouts_secs.is_empty() {
        return Err(anyhow!("timeouts_secs must list at least one attempt"));
    }
    if config.timeouts_secs.iter().any(|secs| *secs == 0) {
        return Err(anyhow!("timeouts_secs entries must be positive"));
    }
    if config.max_document_chars == 0 {
        return Err(anyhow!("max_document_chars must be positive"));
    }
    validate_relative_path(&config.output_dir, "output_dir")?;
    match &config.backend {
        BackendConfig::Http {
            base_url,
            model,
            api_key_env,
            ..
        } => {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(anyhow!("backend.base_url must be an http(s) URL"));
            }
            if model.trim().is_empty() {
                return Err(anyhow!("backend.model must be non-empty"));
            }
            if api_key_env.trim().is_empty() {
                return Err(anyhow!("backend.api_key_env must be non-empty"));
            }
        }
        BackendConfig::Command { command } => {
            let argv = shell_words::split(command)
                .with_context(|| format!("parse backend.command: {command}"))?;
            if argv.is_empty() {
                return Err(anyhow!("backend.command is empty"));
            }
        }
    }
    Ok(())
}

/// Apply the CLI override and environment variables to the configured backend.
///
/// Priority: `--lm` flag, then `VERBALE_LM_COMMAND`, then `config.json`.
pub fn resolve_backend<F>(
    config: &SessionConfig,
    lm_override: Option<&str>,
    env: F,
) -> ResolvedBackend
where
    F: Fn(&str) -> Option<String>,
{
    let command_override = lm_override
        .map(str::to_string)
        .or_else(|| env(ENV_LM_COMMAND))
        .filter(|value| !value.trim().is_empty());
    if let Some(command) = command_override {
        return ResolvedBackend::Command { command };
    }
    match &config.backend {
        BackendConfig::Http {
            base_url,
            model,
            ocr_model,
            api_key_env,
        } => ResolvedBackend::Http {
            base_url: env(ENV_BASE_URL)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| base_url.clone())
                .trim_end_matches('/')
                .to_string(),
            model: env(ENV_MODEL)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| model.clone()),
            ocr_model: ocr_model.clone(),
            api_key_env: api_key_env.clone(),
            api_key: env(api_key_env).filter(|value| !value.trim().is_empty()),
        },
        BackendConfig::Command { command } => ResolvedBackend::Command {
            command: command.clone(),
        },
    }
}

/// Environment lookup used outside tests.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn validate_relative_path(rel: &str, label: &str) -> Result<()> {
    let path = Path::new(rel);
    if rel.trim().is_empty() || path.is_absolute() || has_parent_components(path) {
        return Err(anyhow!(
            "{label} must be a relative path without '..' (got {rel:?})"
        ));
    }
    Ok(())
}

fn has_parent_components(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, Component::ParentDir))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
