//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use debridfs_remote::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{NamespaceError, NamespaceResult};
use crate::path::NormalizedPath;

/// Full remote refresh cadence.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);
/// Minimum spacing between rule-file modification checks.
pub const DEFAULT_RULE_DEBOUNCE: Duration = Duration::from_secs(5);
/// Page size used for full inventory fetches.
pub const DEFAULT_PAGE_SIZE: usize = 2500;
/// Upper bound accepted by the remote for a single page.
const MAX_PAGE_SIZE: usize = 5000;

/// What to do with a regex directive that fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRegexPolicy {
    /// Drop the line, record a warning, and keep loading.
    #[default]
    Warn,
    /// Abort the load with [`NamespaceError::InvalidRule`].
    Reject,
}

/// Settings for a [`crate::NamespaceEngine`].
#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    /// Location of the rule file.
    pub rule_file: PathBuf,
    /// Namespace path the host treats as its root.
    pub root: NormalizedPath,
    /// Time after which the inventory is refetched regardless of counts.
    pub refresh_interval: Duration,
    /// Minimum spacing between rule-file mtime checks.
    pub rule_debounce: Duration,
    /// Page size for full inventory fetches.
    pub page_size: usize,
    /// Handling of malformed regex directives.
    pub invalid_regex: InvalidRegexPolicy,
    /// Retry policy for transient remote failures.
    pub retry: RetryPolicy,
    /// Polling policy while waiting for a re-created job.
    pub recovery_poll: RetryPolicy,
}

impl NamespaceConfig {
    /// Defaults for a rule file at `rule_file`.
    #[must_use]
    pub fn new(rule_file: impl Into<PathBuf>) -> Self {
        Self {
            rule_file: rule_file.into(),
            root: NormalizedPath::root(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            rule_debounce: DEFAULT_RULE_DEBOUNCE,
            page_size: DEFAULT_PAGE_SIZE,
            invalid_regex: InvalidRegexPolicy::default(),
            retry: RetryPolicy::TRANSIENT,
            recovery_poll: RetryPolicy::POLL,
        }
    }

    /// Serve a sub-tree of the namespace as the host root.
    #[must_use]
    pub fn with_root(mut self, root: &str) -> Self {
        self.root = NormalizedPath::dir(root);
        self
    }

    /// Override the refresh cadence.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Override the rule-file debounce window.
    #[must_use]
    pub const fn with_rule_debounce(mut self, debounce: Duration) -> Self {
        self.rule_debounce = debounce;
        self
    }

    /// Override the inventory page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Override the malformed-regex policy.
    #[must_use]
    pub const fn with_invalid_regex(mut self, policy: InvalidRegexPolicy) -> Self {
        self.invalid_regex = policy;
        self
    }

    /// Override the transient retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the recovery polling policy.
    #[must_use]
    pub const fn with_recovery_poll(mut self, poll: RetryPolicy) -> Self {
        self.recovery_poll = poll;
        self
    }

    /// Check settings for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::InvalidInput`] naming the offending field.
    pub fn validate(&self) -> NamespaceResult<()> {
        if self.rule_file.as_os_str().is_empty() {
            return Err(NamespaceError::InvalidInput {
                field: "rule_file",
                reason: "must not be empty",
                value: None,
            });
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(NamespaceError::InvalidInput {
                field: "page_size",
                reason: "must be between 1 and 5000",
                value: Some(self.page_size.to_string()),
            });
        }
        if self.retry.attempts == 0 {
            return Err(NamespaceError::InvalidInput {
                field: "retry.attempts",
                reason: "must be at least 1",
                value: Some(self.retry.attempts.to_string()),
            });
        }
        if self.recovery_poll.attempts == 0 {
            return Err(NamespaceError::InvalidInput {
                field: "recovery_poll.attempts",
                reason: "must be at least 1",
                value: Some(self.recovery_poll.attempts.to_string()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_remote_cadence() {
        let config = NamespaceConfig::new("/tmp/sorting.txt");
        assert_eq!(config.refresh_interval, Duration::from_secs(900));
        assert_eq!(config.page_size, 2500);
        assert_eq!(config.retry, RetryPolicy::TRANSIENT);
        assert_eq!(config.invalid_regex, InvalidRegexPolicy::Warn);
        assert!(config.root.is_root());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_page_size() {
        let err = NamespaceConfig::new("/tmp/sorting.txt")
            .with_page_size(0)
            .validate()
            .err();
        assert!(matches!(
            err,
            Some(NamespaceError::InvalidInput {
                field: "page_size",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_empty_rule_file() {
        let err = NamespaceConfig::new("").validate().err();
        assert!(matches!(
            err,
            Some(NamespaceError::InvalidInput {
                field: "rule_file",
                ..
            })
        ));
    }
}
