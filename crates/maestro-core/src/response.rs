//! User-facing response types
//!
//! Every call to the orchestrator answers with a [`Response`]: success,
//! partial success, clarification, rejection, or error. Nothing is ever
//! silently dropped.

use crate::error::ErrorKind;
use crate::session::PendingConfirmation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Every dispatched handler succeeded
    Success,
    /// At least one handler succeeded, at least one failed
    PartialSuccess,
    /// Nothing succeeded
    Failed,
    /// The orchestrator needs the user to choose between capabilities
    Clarification,
    /// No capability matched the request
    Rejected,
}

/// Machine-readable error half of a failed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    /// Error kind
    pub kind: ErrorKind,
    /// Diagnostic message (not necessarily user-facing)
    pub message: String,
}

/// The answer to one `process_request` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Session the turn belongs to
    pub session_id: String,
    /// Turn id, for correlating diagnostics
    pub turn_id: Uuid,
    /// User-facing text
    pub text: String,
    /// Outcome
    pub status: TurnStatus,
    /// Machine-readable error, present on `Failed` turns
    pub error: Option<ResponseError>,
}

/// Introspection view of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Completed turns
    pub turn_count: usize,
    /// Top intent of the most recent turn
    pub last_intent: Option<String>,
    /// Outstanding clarification, if any
    pub pending_confirmation: Option<PendingConfirmation>,
}

/// Introspection view of the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Registered capability names, sorted
    pub capabilities: Vec<String>,
    /// Number of registered capabilities
    pub capability_count: usize,
}
