//! Workflow init step.
//!
//! Init creates the session layout and a config with defaults; later steps
//! refuse to run without it.
use crate::cli::InitArgs;
use crate::config::{command_config, default_config, validate_config, write_config, ENV_LM_COMMAND};
use crate::session::{create_layout, resolve_session_root, SessionPaths};
use anyhow::{anyhow, Result};

/// Run the init step.
pub fn run_init(args: &InitArgs) -> Result<()> {
    let paths = SessionPaths::new(resolve_session_root(args.session.session.as_deref())?);
    let config_path = paths.config_path();
    if config_path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }
    create_layout(&paths)?;

    let config = match args.lm.as_deref().map(str::trim).filter(|cmd| !cmd.is_empty()) {
        Some(command) => command_config(command),
        None => default_config(),
    };
    validate_config(&config)?;
    write_config(&paths, &config)?;
    tracing::info!(session = %paths.root().display(), "initialized session");
    println!("wrote {}", config_path.display());
    if args.lm.is_none() {
        println!(
            "backend: http (set the API key env var, or pass --lm / {ENV_LM_COMMAND} to use a local command)"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SessionArg;
    use crate::config::{load_config, BackendConfig};

    fn init_args(root: &std::path::Path, lm: Option<&str>, force: bool) -> InitArgs {
        InitArgs {
            session: SessionArg {
                session: Some(root.to_path_buf()),
            },
            force,
            lm: lm.map(str::to_string),
        }
    }

    #[test]
    fn init_writes_config_and_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("sessione");
        run_init(&init_args(&root, None, false)).unwrap();

        let paths = SessionPaths::new(root.clone());
        assert!(paths.documents_dir().is_dir());
        assert!(paths.sources_dir().is_dir());
        let config = load_config(&paths).unwrap();
        assert!(matches!(config.backend, BackendConfig::Http { .. }));

        let err = run_init(&init_args(&root, None, false)).unwrap_err();
        assert!(err.to_string().contains("--force"));

        run_init(&init_args(&root, Some("llm -m mistral"), true)).unwrap();
        let config = load_config(&paths).unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Command {
                command: "llm -m mistral".to_string()
            }
        );
    }
}
