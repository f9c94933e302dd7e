//! # Terminal Error Type
//!
//! Unified error type for register operations, and the `Notice` the
//! operator sees when one of them fails.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Mostrador                              │
//! │                                                                         │
//! │  Operator                    Terminal                                   │
//! │  ────────                    ────────                                   │
//! │                                                                         │
//! │  checkout(Cash)                                                         │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Terminal operation                                              │  │
//! │  │  TerminalResult<T>                                               │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Business rule? ─── CoreError::InsufficientTender ──┐           │  │
//! │  │         │                                           │           │  │
//! │  │         ▼                                           ▼           │  │
//! │  │  Storage? ──── DbError::QueryFailed ───────── TerminalError     │  │
//! │  │         │                                           │           │  │
//! │  │         ▼                                           │           │  │
//! │  │  Sale written, stock failed? ── PartialFailure ─────┤           │  │
//! │  │                                                     ▼           │  │
//! │  │                                               Notice ──────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "PARTIAL_FAILURE",                                          │
//! │    "message": "checkout stopped at stock after committing: sale" }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed operation never retries and never compensates. A
//! `PartialFailure` names what was committed so the operator can reconcile
//! by hand.

use serde::Serialize;
use thiserror::Error;

use mostrador_core::{CoreError, ErrorKind};
use mostrador_db::DbError;

// =============================================================================
// Terminal Error
// =============================================================================

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Persistence(#[from] DbError),

    /// A multi-step operation stopped after some of its writes committed.
    #[error("{operation} stopped at {failed_step} after committing: {}", .committed.join(", "))]
    PartialFailure {
        operation: String,
        committed: Vec<String>,
        failed_step: String,
        #[source]
        source: Box<TerminalError>,
    },

    /// The shift session task is gone (shift closed or runtime shutting down).
    #[error("Shift session is no longer running")]
    SessionClosed,

    #[error("No shift is open on this register")]
    NoOpenShift,

    #[error("Shift {0} is already open on this register")]
    ShiftAlreadyOpen(String),

    #[error("No product matches code {0}")]
    UnknownCode(String),

    #[error("Supervisor credential error: {0}")]
    Credential(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Print error: {0}")]
    Print(#[from] PrintError),
}

pub type TerminalResult<T> = Result<T, TerminalError>;

// =============================================================================
// Step Log
// =============================================================================

/// Tracks the committed writes of a multi-step operation.
///
/// A failure before anything committed is returned as-is; after the first
/// commit it becomes a [`TerminalError::PartialFailure`].
#[derive(Debug)]
pub(crate) struct StepLog {
    operation: &'static str,
    committed: Vec<String>,
}

impl StepLog {
    pub(crate) fn new(operation: &'static str) -> Self {
        StepLog {
            operation,
            committed: Vec::new(),
        }
    }

    pub(crate) fn committed(&mut self, step: impl Into<String>) {
        self.committed.push(step.into());
    }

    pub(crate) fn fail(&self, step: &str, err: impl Into<TerminalError>) -> TerminalError {
        let err = err.into();
        if self.committed.is_empty() {
            return err;
        }
        tracing::error!(
            operation = self.operation,
            failed_step = step,
            committed = ?self.committed,
            error = %err,
            "Operation partially committed; manual reconciliation required"
        );
        TerminalError::PartialFailure {
            operation: self.operation.to_string(),
            committed: self.committed.clone(),
            failed_step: step.to_string(),
            source: Box::new(err),
        }
    }
}

// =============================================================================
// Configuration Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

// =============================================================================
// Print Error
// =============================================================================

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("Printer unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to render ticket: {0}")]
    Render(String),
}

// =============================================================================
// Notice
// =============================================================================

/// Blocking notification shown to the operator.
///
/// ## Serialization
/// ```json
/// {
///   "code": "STALE_WINDOW",
///   "message": "Return window expired for sale 9f1c...: 9 days old, window is 8 days"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub code: NoticeCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeCode {
    ValidationError,
    Unauthorized,
    StaleWindow,
    AlreadyClosed,
    NotFound,
    InvalidState,
    /// Storage failed before anything was written.
    PersistenceError,
    /// Storage failed after part of the operation was written.
    PartialFailure,
    PrintError,
    Internal,
}

impl Notice {
    pub fn new(code: NoticeCode, message: impl Into<String>) -> Self {
        Notice {
            code,
            message: message.into(),
        }
    }
}

impl From<&TerminalError> for Notice {
    fn from(err: &TerminalError) -> Self {
        match err {
            TerminalError::Core(e) => {
                let code = match e.kind() {
                    ErrorKind::Validation => NoticeCode::ValidationError,
                    ErrorKind::Authorization => NoticeCode::Unauthorized,
                    ErrorKind::StaleWindow => NoticeCode::StaleWindow,
                    ErrorKind::AlreadyClosed => NoticeCode::AlreadyClosed,
                    ErrorKind::NotFound => NoticeCode::NotFound,
                    ErrorKind::InvalidState => NoticeCode::InvalidState,
                };
                Notice::new(code, e.to_string())
            }
            TerminalError::Persistence(e) => persistence_notice(e),
            TerminalError::PartialFailure { source, .. } => {
                tracing::error!(error = %err, cause = %source, "Partial failure surfaced to operator");
                Notice::new(NoticeCode::PartialFailure, err.to_string())
            }
            TerminalError::SessionClosed | TerminalError::NoOpenShift => {
                Notice::new(NoticeCode::InvalidState, err.to_string())
            }
            TerminalError::ShiftAlreadyOpen(_) => Notice::new(NoticeCode::InvalidState, err.to_string()),
            TerminalError::UnknownCode(_) => Notice::new(NoticeCode::NotFound, err.to_string()),
            TerminalError::Credential(e) => {
                tracing::error!("Credential setup failed: {}", e);
                Notice::new(NoticeCode::Internal, "Supervisor credential is misconfigured")
            }
            TerminalError::Config(e) => {
                tracing::error!("Configuration failed: {}", e);
                Notice::new(NoticeCode::Internal, "Register configuration is invalid")
            }
            TerminalError::Print(e) => Notice::new(NoticeCode::PrintError, e.to_string()),
        }
    }
}

impl From<TerminalError> for Notice {
    fn from(err: TerminalError) -> Self {
        Notice::from(&err)
    }
}

fn persistence_notice(err: &DbError) -> Notice {
    match err {
        DbError::NotFound { .. } => Notice::new(NoticeCode::NotFound, err.to_string()),
        DbError::UniqueViolation { field, value } => Notice::new(
            NoticeCode::ValidationError,
            format!("{} '{}' already exists", field, value),
        ),
        DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
            Notice::new(NoticeCode::PersistenceError, "Database unavailable")
        }
        other => {
            // Log the actual error but return a generic message
            tracing::error!("Database operation failed: {}", other);
            Notice::new(NoticeCode::PersistenceError, "Database operation failed")
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}
