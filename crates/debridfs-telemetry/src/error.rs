//! Telemetry failures.

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Shorthand used across the telemetry crate.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failures while configuring logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already set, or installation failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Error reported by `tracing-subscriber`.
        #[source]
        source: TryInitError,
    },
    /// A log format name was not recognised.
    #[error("unknown log format")]
    UnknownFormat {
        /// Rejected value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use tracing_subscriber::util::SubscriberInitExt;

    /// Installs a no-op registry until the second attempt is refused.
    fn refused_install() -> Option<TryInitError> {
        (0..2).find_map(|_| tracing_subscriber::registry().try_init().err())
    }

    #[test]
    fn install_failure_keeps_its_source() {
        let Some(source) = refused_install() else {
            panic!("a second global subscriber must be refused");
        };
        let err = TelemetryError::SubscriberInstall { source };
        assert_eq!(err.to_string(), "failed to install tracing subscriber");
        assert!(err.source().is_some());
    }

    #[test]
    fn unknown_format_has_no_source() {
        let err = TelemetryError::UnknownFormat {
            value: "xml".into(),
        };
        assert_eq!(err.to_string(), "unknown log format");
        assert!(err.source().is_none());
    }
}
