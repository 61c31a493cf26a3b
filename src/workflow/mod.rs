//! Workflow steps behind each CLI command.
//!
//! Every step loads what it needs from the session directory, does one thing,
//! and writes its result back, so steps can be re-run in any order.
mod context;
mod extract;
mod generate;
mod init;
mod review;
mod status;

pub(crate) use extract::run_extract;
pub(crate) use generate::{run_generate, run_templates};
pub(crate) use init::run_init;
pub(crate) use review::{run_conflicts, run_documents, run_edit, run_merge, run_show};
pub(crate) use status::run_status;

use anyhow::{Context, Result};
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize JSON output")?;
    println!("{text}");
    Ok(())
}
