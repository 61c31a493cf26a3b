use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod conflicts;
mod fieldpath;
mod ingest;
mod lm;
mod merge;
mod processors;
mod session;
mod status;
mod templates;
mod util;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Init(args) => workflow::run_init(&args),
        Command::Extract(args) => workflow::run_extract(&args),
        Command::Documents(args) => workflow::run_documents(&args),
        Command::Conflicts(args) => workflow::run_conflicts(&args),
        Command::Merge(args) => workflow::run_merge(&args),
        Command::Edit(args) => workflow::run_edit(&args),
        Command::Show(args) => workflow::run_show(&args),
        Command::Templates(args) => workflow::run_templates(&args),
        Command::Generate(args) => workflow::run_generate(&args),
        Command::Status(args) => workflow::run_status(&args),
    }
}

/// Diagnostics go to stderr so stdout stays parseable; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "verbale=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
