//! Error taxonomy shared by every poolward crate.
//!
//! Failures fall into four families: the external tool timed out (or was
//! cancelled), the external tool ran and failed, a local precondition rejected
//! the request before anything was spawned, or the tool succeeded but printed
//! something we cannot parse. Context wrappers (`Operation`, `PoolNotFound`)
//! keep the root cause reachable through [`PoolError::kind`].

use std::io;
use std::time::Duration;
use thiserror::Error;

pub type PoolResult<T> = Result<T, PoolError>;

/// Root-cause classification of a [`PoolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Cancelled,
    Execution,
    Precondition,
    MalformedOutput,
    Config,
    Io,
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("{operation} failed: {reason}")]
    Execution {
        operation: String,
        /// Exit code when the process ran to completion; `None` for spawn failures
        /// and signal deaths.
        status: Option<i32>,
        reason: String,
        stderr: String,
    },

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("malformed output from {query} (line {line}): {reason}")]
    MalformedOutput {
        query: String,
        line: usize,
        reason: String,
    },

    #[error("zpool `{pool}` does not exist: {source}")]
    PoolNotFound {
        pool: String,
        #[source]
        source: Box<PoolError>,
    },

    #[error("{action}: {source}")]
    Operation {
        action: String,
        #[source]
        source: Box<PoolError>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSerialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl PoolError {
    /// Wrap `self` with a description of the attempted action.
    pub fn context(self, action: impl Into<String>) -> Self {
        PoolError::Operation {
            action: action.into(),
            source: Box::new(self),
        }
    }

    /// Classify the innermost cause, looking through context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::Timeout { .. } => ErrorKind::Timeout,
            PoolError::Cancelled { .. } => ErrorKind::Cancelled,
            PoolError::Execution { .. } => ErrorKind::Execution,
            PoolError::Precondition(_) => ErrorKind::Precondition,
            PoolError::MalformedOutput { .. } => ErrorKind::MalformedOutput,
            PoolError::PoolNotFound { source, .. } | PoolError::Operation { source, .. } => {
                source.kind()
            }
            PoolError::InvalidConfig(_)
            | PoolError::Toml(_)
            | PoolError::TomlSerialize(_)
            | PoolError::Yaml(_) => ErrorKind::Config,
            PoolError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    pub fn is_execution_failure(&self) -> bool {
        self.kind() == ErrorKind::Execution
    }

    /// True when this error (at any wrapping depth) reports a missing pool.
    pub fn is_pool_not_found(&self) -> bool {
        match self {
            PoolError::PoolNotFound { .. } => true,
            PoolError::Operation { source, .. } => source.is_pool_not_found(),
            _ => false,
        }
    }

    /// Standard error captured from the failing process, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            PoolError::Execution { stderr, .. } => Some(stderr.as_str()),
            PoolError::PoolNotFound { source, .. } | PoolError::Operation { source, .. } => {
                source.stderr()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec_failure() -> PoolError {
        PoolError::Execution {
            operation: "zfs list".into(),
            status: Some(1),
            reason: "exit code 1".into(),
            stderr: "cannot open 'tank/missing': dataset does not exist".into(),
        }
    }

    #[test]
    fn kind_looks_through_context_wrappers() {
        let timeout = PoolError::Timeout {
            operation: "list filesystems".into(),
            timeout: Duration::from_secs(1),
        }
        .context("unable to list filesystems for pool `tank`");
        assert!(timeout.is_timeout());
        assert!(!timeout.is_execution_failure());

        let failed = exec_failure().context("unable to create filesystem `tank/a`");
        assert!(failed.is_execution_failure());
        assert!(!failed.is_timeout());
        assert_eq!(
            failed.stderr(),
            Some("cannot open 'tank/missing': dataset does not exist")
        );
    }

    #[test]
    fn pool_not_found_keeps_cause() {
        let err = PoolError::PoolNotFound {
            pool: "tank".into(),
            source: Box::new(exec_failure()),
        };
        assert!(err.is_pool_not_found());
        assert_eq!(err.kind(), ErrorKind::Execution);
        let rendered = err.to_string();
        assert!(rendered.starts_with("zpool `tank` does not exist"), "{rendered}");
    }

    #[test]
    fn context_message_names_action_and_cause() {
        let err = PoolError::Precondition("name is empty".into()).context("unable to get filesystem");
        assert_eq!(
            err.to_string(),
            "unable to get filesystem: precondition failed: name is empty"
        );
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }
}
