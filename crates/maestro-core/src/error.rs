//! Error types for maestro-core
//!
//! The error kinds mirror the orchestration failure taxonomy. Routing
//! ambiguity is deliberately absent: a clarification is a normal response,
//! not an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// External classifier unusable after the repair attempt
    #[error("classification error: {0}")]
    Classification(String),

    /// Capability name registered twice
    #[error("duplicate capability: {0}")]
    DuplicateCapability(String),

    /// Capability name not present in the registry
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// Handler failed with a retryable error and retries are exhausted
    #[error("handler transient error in '{capability}': {message}")]
    HandlerTransient {
        /// Capability whose handler failed
        capability: String,
        /// Failure detail
        message: String,
    },

    /// Handler failed with a non-retryable error
    #[error("handler permanent error in '{capability}': {message}")]
    HandlerPermanent {
        /// Capability whose handler failed
        capability: String,
        /// Failure detail
        message: String,
    },

    /// A second concurrent turn hit the same session
    #[error("session busy: {0}")]
    SessionBusy(String),

    /// Stored session state is corrupt or a reference no longer resolves
    #[error("session state error: {0}")]
    SessionState(String),

    /// Internal error (serialization, persistence backend, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable error kind carried inside a [`crate::Response`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Classifier unusable
    Classification,
    /// Registry misconfiguration
    UnknownCapability,
    /// Registry misconfiguration
    DuplicateCapability,
    /// Retries exhausted on a transient handler failure
    HandlerTransient,
    /// Non-retryable handler failure
    HandlerPermanent,
    /// Concurrent-turn conflict
    SessionBusy,
    /// Corrupt session memory
    SessionState,
    /// Anything else
    Internal,
}

impl Error {
    /// The machine-readable kind for response payloads
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Classification(_) => ErrorKind::Classification,
            Error::DuplicateCapability(_) => ErrorKind::DuplicateCapability,
            Error::UnknownCapability(_) => ErrorKind::UnknownCapability,
            Error::HandlerTransient { .. } => ErrorKind::HandlerTransient,
            Error::HandlerPermanent { .. } => ErrorKind::HandlerPermanent,
            Error::SessionBusy(_) => ErrorKind::SessionBusy,
            Error::SessionState(_) => ErrorKind::SessionState,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable message for the user-facing half of a response
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Error::Classification(_) => {
                "I could not understand that request. Please try rephrasing it.".to_string()
            }
            Error::DuplicateCapability(name) => {
                format!("Capability '{name}' is registered more than once.")
            }
            Error::UnknownCapability(name) => {
                format!("Capability '{name}' is not available.")
            }
            Error::HandlerTransient { capability, .. } => {
                format!("'{capability}' is temporarily unavailable. Please try again shortly.")
            }
            Error::HandlerPermanent { capability, message } => {
                format!("'{capability}' could not complete the request: {message}")
            }
            Error::SessionBusy(_) => {
                "A previous request for this session is still running.".to_string()
            }
            Error::SessionState(_) => {
                "Session memory was reset; earlier references may need repeating.".to_string()
            }
            Error::Internal(_) => "Something went wrong processing the request.".to_string(),
        }
    }
}
