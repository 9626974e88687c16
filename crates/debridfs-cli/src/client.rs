//! Engine construction and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use debridfs_namespace::{NamespaceConfig, NamespaceEngine, NamespaceError};
use debridfs_remote::{DebridApi, RealDebridClient, RemoteConfig};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;

/// Rule file name inside the per-user config directory.
pub(crate) const RULE_FILE_NAME: &str = "sorting.txt";

/// Command failure; validation problems exit with 2, everything else with 3.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        if matches!(self, Self::Validation(_)) { 2 } else { 3 }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(message) => f.write_str(message),
            Self::Failure(error) => write!(f, "{error:#}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<NamespaceError> for CliError {
    fn from(error: NamespaceError) -> Self {
        let subject = match &error {
            NamespaceError::NotFound { path }
            | NamespaceError::DirNotFound { path }
            | NamespaceError::DirExists { path }
            | NamespaceError::NotAFile { path }
            | NamespaceError::CantShareDirectories { path }
            | NamespaceError::DirectoryNotEmpty { path } => Some(path.clone()),
            NamespaceError::RootReserved { leaf } => Some(format!("/{leaf}/")),
            NamespaceError::InvalidInput { field, reason, value } => Some(match value {
                Some(value) => format!("{field} '{value}' {reason}"),
                None => format!("{field} {reason}"),
            }),
            _ => None,
        };
        match subject {
            Some(subject) => Self::validation(format!("{error}: {subject}")),
            None => {
                let context = match &error {
                    NamespaceError::BrokenLink { job_id }
                    | NamespaceError::RecoveryScheduled { job_id }
                    | NamespaceError::RecoveryFailed { job_id, .. } => format!("job {job_id}"),
                    NamespaceError::NoDownloadLink { path } => path.clone(),
                    NamespaceError::RuleFileIo { path, .. } => path.display().to_string(),
                    NamespaceError::InvalidRule { line, pattern, .. } => {
                        format!("line {line} ({pattern})")
                    }
                    _ => String::from("debridfs"),
                };
                Self::failure(anyhow::Error::new(error).context(context))
            }
        }
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) engine: Arc<NamespaceEngine>,
    pub(crate) cancel: CancellationToken,
}

impl AppContext {
    pub(crate) fn new(engine: NamespaceEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            cancel: CancellationToken::new(),
        }
    }

    /// Build the engine from parsed flags and environment fallbacks.
    pub(crate) fn from_cli(cli: &Cli) -> CliResult<Self> {
        let api_key = cli
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                CliError::validation("an API key is required (--api-key or DEBRIDFS_API_KEY)")
            })?;
        let remote = RemoteConfig::new(api_key)
            .and_then(|config| config.with_base_url(cli.api_url.as_str()))
            .map_err(|err| CliError::failure(anyhow::Error::new(err).context("remote settings")))?
            .with_timeout(Duration::from_secs(cli.timeout));
        let client = RealDebridClient::new(remote)
            .map_err(|err| CliError::failure(anyhow::Error::new(err).context("http client")))?;
        let api: Arc<dyn DebridApi> = Arc::new(client);

        let rule_file = resolve_rule_file(cli.rule_file.clone())?;
        let mut config = NamespaceConfig::new(rule_file);
        if let Some(root) = &cli.root {
            config = config.with_root(root);
        }
        let engine = NamespaceEngine::new(config, api)?;
        Ok(Self::new(engine))
    }
}

/// Rule file from the flag, or the per-user default location.
pub(crate) fn resolve_rule_file(flag: Option<PathBuf>) -> CliResult<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("debridfs").join(RULE_FILE_NAME))
        .ok_or_else(|| {
            CliError::validation(
                "no config directory found; pass --rule-file or set DEBRIDFS_RULE_FILE",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use debridfs_remote::{ApiProblem, RemoteError};

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
    }

    #[test]
    fn user_errors_become_validation_messages() {
        let err = CliError::from(NamespaceError::DirectoryNotEmpty {
            path: "/movies/".into(),
        });
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "directory not empty: /movies/");

        let reserved = CliError::from(NamespaceError::RootReserved { leaf: "new".into() });
        assert_eq!(
            reserved.to_string(),
            "root is reserved for rule-derived folders: /new/"
        );
    }

    #[test]
    fn remote_failures_keep_their_chain() {
        let err = CliError::from(NamespaceError::from(RemoteError::status_error(
            "torrents.list",
            ApiProblem {
                message: "bad_token".into(),
                status: 401,
            },
        )));
        assert_eq!(err.exit_code(), 3);
        let message = err.to_string();
        assert!(message.starts_with("debridfs: remote operation failed"));
    }

    #[test]
    fn explicit_rule_file_wins() -> Result<(), CliError> {
        let path = resolve_rule_file(Some(PathBuf::from("/tmp/rules.txt")))?;
        assert_eq!(path, PathBuf::from("/tmp/rules.txt"));
        Ok(())
    }
}
