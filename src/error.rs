//! Consolidated error handling for the prober.
//!
//! External errors (I/O, network, JSON, SQL) are preserved verbatim via
//! `#[from]`; everything else is categorized into an [`ErrorKind`] so the
//! CLI can report a consistent, stable set of failure classes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{kind}: {message}")]
    Internal { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Requested service does not exist in the store.
    ServiceNotFound,
    /// A probe run could not complete (phase 0 failed, bad config, ...).
    ProbeFailed,
    /// Config key/value could not be parsed or applied.
    Config,
    /// Export target could not be rendered/written.
    Export,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ServiceNotFound => "service not found",
            Self::ProbeFailed => "probe failed",
            Self::Config => "config error",
            Self::Export => "export error",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn service_not_found(name: &str) -> Self {
        Self::Internal {
            kind: ErrorKind::ServiceNotFound,
            message: format!("service '{name}' not found"),
        }
    }

    pub fn probe_failed(message: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::ProbeFailed,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Config,
            message: message.into(),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Internal {
            kind: ErrorKind::Export,
            message: message.into(),
        }
    }

    /// Maps this error to the process exit code from the error-handling design:
    /// 1 when phase 0 aborted or a requested service doesn't exist, 0 otherwise
    /// is handled by the caller (this only ever applies to hard failures).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T> = std::result::Result<T, Error>;
