//! Session status and the next step to run.
//!
//! Status is computed from session files only, so the same session always
//! yields the same `next_action`. Steps run in order:
//!
//! ```text
//! init → extract → review (conflicts + merge) → generate
//! ```
use crate::config::{load_config, resolve_backend, ResolvedBackend};
use crate::conflicts::detect_conflicts;
use crate::merge::{load_merged_optional, MergedData};
use crate::session::{load_documents, ExtractedDocument, SessionPaths};
use crate::util::now_epoch_ms;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Current schema version for `verbale status --json`.
pub const STATUS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Init,
    Extract,
    Review,
    Generate,
    Complete,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Extract => "extract",
            Self::Review => "review",
            Self::Generate => "generate",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Next action for a human or a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextAction {
    Command { command: String, reason: String },
    Done { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub label: String,
    pub available: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentCounts {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub by_kind: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedStatus {
    pub present: bool,
    /// A document was added, removed or re-extracted after the merge.
    pub stale: bool,
    pub edits: usize,
}

/// Summary emitted by `verbale status --json`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub schema_version: u32,
    pub generated_at_epoch_ms: u128,
    pub session: String,
    pub initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendStatus>,
    pub documents: DocumentCounts,
    pub conflicts: usize,
    pub merged: MergedStatus,
    pub outputs: Vec<String>,
    pub step: Step,
    pub next_action: NextAction,
    pub warnings: Vec<String>,
}

/// Everything status needs, already loaded.
pub struct StatusInputs<'a> {
    pub root: &'a Path,
    pub initialized: bool,
    pub backend: Option<BackendStatus>,
    pub documents: &'a [ExtractedDocument],
    pub merged: Option<&'a MergedData>,
    pub outputs: Vec<String>,
}

/// Load session state and evaluate it.
pub fn collect_status<F>(
    paths: &SessionPaths,
    lm_override: Option<&str>,
    env: F,
) -> Result<StatusSummary>
where
    F: Fn(&str) -> Option<String>,
{
    if !paths.config_path().is_file() {
        return evaluate_status(StatusInputs {
            root: paths.root(),
            initialized: false,
            backend: None,
            documents: &[],
            merged: None,
            outputs: Vec::new(),
        });
    }
    let config = load_config(paths)?;
    let resolved = resolve_backend(&config, lm_override, env);
    let documents = load_documents(paths)?;
    let merged = load_merged_optional(paths)?;
    let outputs = list_outputs(&paths.output_dir(&config.output_dir), paths.root())?;
    evaluate_status(StatusInputs {
        root: paths.root(),
        initialized: true,
        backend: Some(backend_status(&resolved)),
        documents: &documents,
        merged: merged.as_ref(),
        outputs,
    })
}

/// Whether the resolved backend can be called right now.
pub fn backend_status(resolved: &ResolvedBackend) -> BackendStatus {
    let label = resolved.label();
    match resolved {
        ResolvedBackend::Http {
            api_key_env,
            api_key,
            ..
        } => match api_key {
            Some(_) => BackendStatus {
                label,
                available: true,
                detail: format!("API key found in {api_key_env}"),
            },
            None => BackendStatus {
                label,
                available: false,
                detail: format!("API key missing: set {api_key_env}"),
            },
        },
        ResolvedBackend::Command { command } => {
            let program = shell_words::split(command)
                .ok()
                .and_then(|argv| argv.into_iter().next());
            match program {
                Some(program) => match which::which(&program) {
                    Ok(path) => BackendStatus {
                        label,
                        available: true,
                        detail: format!("{program} found at {}", path.display()),
                    },
                    Err(_) => BackendStatus {
                        label,
                        available: false,
                        detail: format!("{program} not found on PATH"),
                    },
                },
                None => BackendStatus {
                    label,
                    available: false,
                    detail: "command is empty or unparsable".to_string(),
                },
            }
        }
    }
}

/// Compute the summary from loaded inputs.
pub fn evaluate_status(inputs: StatusInputs<'_>) -> Result<StatusSummary> {
    let session = inputs.root.display().to_string();
    let quoted = shell_words::quote(&session).into_owned();
    let mut warnings = Vec::new();

    let mut documents = DocumentCounts {
        total: inputs.documents.len(),
        ..DocumentCounts::default()
    };
    for doc in inputs.documents {
        if doc.is_failed() {
            documents.failed += 1;
            warnings.push(format!(
                "{} ({}) failed extraction: {}",
                doc.id,
                doc.source.original_name,
                doc.error.as_deref().unwrap_or_default()
            ));
        } else {
            documents.ok += 1;
        }
        *documents.by_kind.entry(doc.kind.to_string()).or_default() += 1;
    }
    let conflicts = detect_conflicts(inputs.documents).len();
    let merged = merged_status(inputs.documents, inputs.merged);

    if let Some(backend) = inputs.backend.as_ref().filter(|backend| !backend.available) {
        warnings.push(format!("backend unavailable: {}", backend.detail));
    }

    let (step, next_action) = if !inputs.initialized {
        (
            Step::Init,
            NextAction::Command {
                command: format!("verbale init --session {quoted}"),
                reason: "session not initialized".to_string(),
            },
        )
    } else if documents.ok == 0 {
        let reason = if documents.failed > 0 {
            "every extraction failed; fix the cause and extract again"
        } else {
            "no documents extracted yet"
        };
        (
            Step::Extract,
            NextAction::Command {
                command: format!("verbale extract --session {quoted} --kind visura <FILE>"),
                reason: reason.to_string(),
            },
        )
    } else if !merged.present || merged.stale {
        let reason = match (merged.present, conflicts) {
            (false, 0) => "documents extracted; build the merged data".to_string(),
            (true, 0) => "documents changed since the last merge".to_string(),
            (_, count) => format!(
                "{count} conflicting field(s); inspect with `verbale conflicts` and choose with --prefer <DOC_ID>"
            ),
        };
        (
            Step::Review,
            NextAction::Command {
                command: format!("verbale merge --session {quoted}"),
                reason,
            },
        )
    } else if inputs.outputs.is_empty() {
        (
            Step::Generate,
            NextAction::Command {
                command: format!("verbale generate --session {quoted} --template <TEMPLATE>"),
                reason: "merged data ready; list templates with `verbale templates`".to_string(),
            },
        )
    } else {
        (
            Step::Complete,
            NextAction::Done {
                reason: format!("{} verbale(s) generated", inputs.outputs.len()),
            },
        )
    };

    Ok(StatusSummary {
        schema_version: STATUS_SCHEMA_VERSION,
        generated_at_epoch_ms: now_epoch_ms()?,
        session,
        initialized: inputs.initialized,
        backend: inputs.backend,
        documents,
        conflicts,
        merged,
        outputs: inputs.outputs,
        step,
        next_action,
        warnings,
    })
}

fn merged_status(documents: &[ExtractedDocument], merged: Option<&MergedData>) -> MergedStatus {
    let Some(merged) = merged else {
        return MergedStatus::default();
    };
    let current: BTreeSet<&str> = documents.iter().map(|doc| doc.id.as_str()).collect();
    let merged_ids: BTreeSet<&str> = merged.documents.iter().map(String::as_str).collect();
    let newer = documents
        .iter()
        .any(|doc| doc.extracted_at_epoch_ms > merged.merged_at_epoch_ms);
    MergedStatus {
        present: true,
        stale: newer || current != merged_ids,
        edits: merged.edits.len(),
    }
}

/// Generated `.docx` files, relative to the session root.
fn list_outputs(dir: &Path, root: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut outputs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry.context("read output entry")?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("docx") {
            outputs.push(crate::util::display_path(&path, Some(root)));
        }
    }
    outputs.sort();
    Ok(outputs)
}

pub fn print_status(summary: &StatusSummary) {
    println!("session: {}", summary.session);
    if !summary.initialized {
        println!("initialized: no");
    }
    if let Some(backend) = summary.backend.as_ref() {
        let state = if backend.available {
            "available"
        } else {
            "unavailable"
        };
        println!("backend: {} ({state}: {})", backend.label, backend.detail);
    }
    let docs = &summary.documents;
    println!(
        "documents: {} ({} ok, {} failed)",
        docs.total, docs.ok, docs.failed
    );
    for (kind, count) in &docs.by_kind {
        println!("  - {kind}: {count}");
    }
    println!("conflicts: {}", summary.conflicts);
    let merged_state = if !summary.merged.present {
        "missing"
    } else if summary.merged.stale {
        "stale"
    } else {
        "fresh"
    };
    println!(
        "merged data: {merged_state} ({} edit(s))",
        summary.merged.edits
    );
    if !summary.outputs.is_empty() {
        println!("outputs:");
        for output in &summary.outputs {
            println!("  - {output}");
        }
    }
    println!("step: {}", summary.step);
    match &summary.next_action {
        NextAction::Command { command, reason } => {
            println!("next: {command}");
            println!("next detail: {reason}");
        }
        NextAction::Done { reason } => println!("done: {reason}"),
    }
    if !summary.warnings.is_empty() {
        println!("warnings: {}", summary.warnings.join("; "));
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
