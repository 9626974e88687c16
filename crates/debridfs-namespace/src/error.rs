//! # Design
//!
//! - Constant messages; paths, keys and job ids travel as fields.
//! - Not-found conditions are typed so callers can tell "missing" from "failed".
//! - Remote failures keep their structured [`RemoteError`] as the source.

use std::io;
use std::path::PathBuf;

use debridfs_remote::RemoteError;
use thiserror::Error;

/// Result alias for namespace operations.
pub type NamespaceResult<T> = Result<T, NamespaceError>;

/// Errors produced by the namespace engine.
#[derive(Debug, Error)]
pub enum NamespaceError {
    /// Reading or writing the rule file failed; the operation was aborted.
    #[error("rule file io failure")]
    RuleFileIo {
        /// Operation that touched the rule file.
        operation: &'static str,
        /// Rule file path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A regex directive failed to compile under the strict policy.
    #[error("invalid rule")]
    InvalidRule {
        /// 1-based line number in the rule file.
        line: usize,
        /// Offending pattern.
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// A remote call failed permanently.
    #[error("remote operation failed")]
    Remote {
        /// Underlying remote error.
        #[from]
        source: RemoteError,
    },
    /// No object exists at the path.
    #[error("object not found")]
    NotFound {
        /// Requested path.
        path: String,
    },
    /// No directory exists at the path.
    #[error("directory not found")]
    DirNotFound {
        /// Requested path.
        path: String,
    },
    /// The destination directory already exists.
    #[error("directory already exists")]
    DirExists {
        /// Conflicting path.
        path: String,
    },
    /// Directories cannot be created directly under the root.
    #[error("root is reserved for rule-derived folders")]
    RootReserved {
        /// Requested leaf name.
        leaf: String,
    },
    /// The direct link is dead and the job was already known to be broken.
    #[error("download link is broken")]
    BrokenLink {
        /// Owning job.
        job_id: String,
    },
    /// The direct link is dead; the job will be re-created on the next refresh.
    #[error("download link is broken; job scheduled for recovery")]
    RecoveryScheduled {
        /// Owning job.
        job_id: String,
    },
    /// Re-creating a dead job failed.
    #[error("job recovery failed")]
    RecoveryFailed {
        /// Job being recovered.
        job_id: String,
        /// Step that failed.
        step: &'static str,
        /// Underlying remote error.
        source: RemoteError,
    },
    /// The path names a directory where a file was expected.
    #[error("path is not a file")]
    NotAFile {
        /// Requested path.
        path: String,
    },
    /// Public links cannot be produced for directories.
    #[error("directories cannot be shared")]
    CantShareDirectories {
        /// Requested path.
        path: String,
    },
    /// The directory still has children.
    #[error("directory not empty")]
    DirectoryNotEmpty {
        /// Requested path.
        path: String,
    },
    /// The file has no resolved download URL.
    #[error("no download link available")]
    NoDownloadLink {
        /// Requested path.
        path: String,
    },
    /// The caller cancelled the operation.
    #[error("namespace operation cancelled")]
    Cancelled {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Caller input or configuration failed validation.
    #[error("invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl NamespaceError {
    /// Build a rule-file IO error.
    pub(crate) fn rule_io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::RuleFileIo {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the error means the requested path or object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::DirNotFound { .. } => true,
            Self::Remote { source } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether the caller cancelled the operation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::Remote { source } => source.is_cancelled(),
            _ => false,
        }
    }
}
