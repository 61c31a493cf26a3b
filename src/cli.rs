//! CLI argument parsing for the verbale workflow.
//!
//! Each subcommand is one step over a session directory; the steps only
//! communicate through files in that directory.
use crate::processors::DocumentKind;
use crate::templates::TemplateId;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "verbale",
    version,
    about = "Assemble Italian meeting minutes (verbale di assemblea) from company documents",
    after_help = "Commands:\n  init                          Create a session (config + layout)\n  extract --kind <kind> <FILE>  Extract fields from documents with the language model\n  documents                     List extracted documents\n  conflicts                     Report fields on which documents disagree\n  merge                         Merge documents into one data set\n  edit --set PATH=VALUE         Edit merged data (edits survive re-merging)\n  show                          Print merged data\n  templates                     List verbale templates\n  generate --template <id>      Write the verbale as .docx\n  status                        Summarize the session and the next step\n\nExamples:\n  verbale init --session ./alfa\n  verbale extract --session ./alfa --kind visura visura_alfa.pdf\n  verbale extract --session ./alfa --kind bilancio bilancio_2025.pdf\n  verbale merge --session ./alfa --prefer doc-001\n  verbale edit --session ./alfa --set assemblea.data=30/04/2026 --set assemblea.luogo=Milano\n  verbale generate --session ./alfa --template approvazione-bilancio\n  verbale status --session ./alfa --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Extract(ExtractArgs),
    Documents(DocumentsArgs),
    Conflicts(ConflictsArgs),
    Merge(MergeArgs),
    Edit(EditArgs),
    Show(ShowArgs),
    Templates(TemplatesArgs),
    Generate(GenerateArgs),
    Status(StatusArgs),
}

/// Session root shared by every session-bound command.
#[derive(Args, Debug, Clone)]
pub struct SessionArg {
    /// Session directory (default: $VERBALE_SESSION, then the user data dir)
    #[arg(long, value_name = "DIR")]
    pub session: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Create a session directory and its config.json")]
pub struct InitArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Overwrite an existing config.json
    #[arg(long)]
    pub force: bool,

    /// Use a local command as the model backend instead of the HTTP API
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Upload documents and extract their fields")]
pub struct ExtractArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Kind of the documents being uploaded
    #[arg(long, value_enum)]
    pub kind: DocumentKind,

    /// Override the model backend with a command (prompt on stdin, JSON on stdout)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Fail instead of storing default fields when extraction fails
    #[arg(long)]
    pub strict: bool,

    /// Extract again even if the same content was already extracted
    #[arg(long)]
    pub force: bool,

    /// Source files (.pdf, .docx, .txt, .md, .png, .jpg, .jpeg)
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "List extracted documents")]
pub struct DocumentsArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Report identity fields on which documents disagree")]
pub struct ConflictsArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Merge extracted documents into data.json")]
pub struct MergeArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Document ids whose values win, in priority order (repeatable)
    #[arg(long, value_name = "DOC_ID")]
    pub prefer: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Edit merged data; edits are re-applied after every merge")]
pub struct EditArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Set a field: dotted path with numeric indexes, e.g. soci.0.nome=Mario Rossi
    #[arg(long, value_name = "PATH=VALUE")]
    pub set: Vec<String>,

    /// Remove a field or list element
    #[arg(long, value_name = "PATH")]
    pub unset: Vec<String>,

    /// Drop every stored edit before applying new ones
    #[arg(long)]
    pub reset: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print merged data")]
pub struct ShowArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Print only the value at this dotted path
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "List verbale templates and their required fields")]
pub struct TemplatesArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Fill a template with merged data and write a .docx")]
pub struct GenerateArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Template to fill
    #[arg(long, value_enum)]
    pub template: TemplateId,

    /// Output path (default: <session>/<output_dir>/<template>_<company>_<date>.docx)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Render blank placeholders for missing required fields
    #[arg(long)]
    pub allow_missing: bool,

    /// Print the document text instead of writing a .docx
    #[arg(long, conflicts_with = "out")]
    pub preview: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize session state and the next action")]
pub struct StatusArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Check availability of this backend command instead of the configured one
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_requires_kind_and_files() {
        let args = RootArgs::try_parse_from([
            "verbale",
            "extract",
            "--session",
            "/tmp/s",
            "--kind",
            "documento-identita",
            "ci.pdf",
            "cf.jpg",
        ])
        .unwrap();
        match args.command {
            Command::Extract(extract) => {
                assert_eq!(extract.kind, DocumentKind::DocumentoIdentita);
                assert_eq!(extract.files.len(), 2);
                assert_eq!(extract.session.session, Some(PathBuf::from("/tmp/s")));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(RootArgs::try_parse_from(["verbale", "extract", "--kind", "visura"]).is_err());
    }

    #[test]
    fn repeated_flags_collect_in_order() {
        let args = RootArgs::try_parse_from([
            "verbale",
            "edit",
            "--set",
            "assemblea.data=30/04/2026",
            "--set",
            "soci.0.nome=Mario Rossi",
            "--unset",
            "pec",
            "-v",
        ])
        .unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Edit(edit) => {
                assert_eq!(edit.set, vec!["assemblea.data=30/04/2026", "soci.0.nome=Mario Rossi"]);
                assert_eq!(edit.unset, vec!["pec"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn template_ids_are_kebab_case() {
        let args = RootArgs::try_parse_from([
            "verbale",
            "generate",
            "--template",
            "aumento-capitale",
            "--allow-missing",
        ])
        .unwrap();
        match args.command {
            Command::Generate(generate) => {
                assert_eq!(generate.template, TemplateId::AumentoCapitale);
                assert!(generate.allow_missing);
                assert!(!generate.preview);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(RootArgs::try_parse_from([
            "verbale",
            "generate",
            "--template",
            "nomina-sindaci",
            "--preview",
            "--out",
            "v.docx",
        ])
        .is_err());
    }
}
