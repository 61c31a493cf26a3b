use crate::cli::SessionArg;
use crate::config::{load_config, SessionConfig};
use crate::session::{require_initialized, resolve_session_root, SessionPaths};
use anyhow::Result;

/// An initialized session with its validated config.
pub(crate) struct SessionContext {
    pub(crate) paths: SessionPaths,
    pub(crate) config: SessionConfig,
}

impl SessionContext {
    pub(crate) fn load(arg: &SessionArg) -> Result<Self> {
        let paths = SessionPaths::new(resolve_session_root(arg.session.as_deref())?);
        require_initialized(&paths)?;
        let config = load_config(&paths)?;
        tracing::debug!(session = %paths.root().display(), "loaded session");
        Ok(Self { paths, config })
    }

    /// Shell-quoted session root for suggested commands.
    pub(crate) fn session_flag(&self) -> String {
        shell_words::quote(&self.paths.root().display().to_string()).into_owned()
    }
}
