//! Workflow status step.
//!
//! Status never requires an initialized session; it reports where the session
//! stands and which command to run next.
use super::print_json;
use crate::cli::StatusArgs;
use crate::config::process_env;
use crate::session::{resolve_session_root, SessionPaths};
use crate::status::{collect_status, print_status};
use anyhow::Result;

pub fn run_status(args: &StatusArgs) -> Result<()> {
    let paths = SessionPaths::new(resolve_session_root(args.session.session.as_deref())?);
    let summary = collect_status(&paths, args.lm.as_deref(), process_env)?;
    if args.json {
        return print_json(&summary);
    }
    print_status(&summary);
    Ok(())
}
