//! Handler contract
//!
//! A handler is the execution side of a registered capability. The core
//! never interprets handler payloads; it only enforces the contract:
//! deadline, error classification, and the `memory_hints` side channel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameters extracted for one handler invocation
pub type Parameters = BTreeMap<String, String>;

/// Read-only context a handler receives
///
/// For sequential dispatch the entity map also carries the memory hints of
/// the steps that already ran; for parallel dispatch every handler sees the
/// same snapshot and never another member's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Session the turn belongs to
    pub session_id: String,
    /// Entity memory snapshot (plus prior-step hints when sequential)
    pub entities: BTreeMap<String, String>,
}

impl ExecutionContext {
    /// Create a context for a session
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            entities: BTreeMap::new(),
        }
    }

    /// Look up an entity value
    #[must_use]
    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }
}

/// Output of a successful handler invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerOutput {
    /// Opaque payload; a `"response"` string field is rendered as the
    /// user-facing text
    pub payload: serde_json::Value,
    /// Entity-memory updates the handler wants remembered
    #[serde(default)]
    pub memory_hints: BTreeMap<String, String>,
}

impl HandlerOutput {
    /// Plain-text output with no memory hints
    #[must_use]
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            payload: serde_json::json!({ "response": response.into() }),
            memory_hints: BTreeMap::new(),
        }
    }

    /// Attach a memory hint
    #[must_use]
    pub fn with_hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.memory_hints.insert(key.into(), value.into());
        self
    }

    /// The user-facing text of this output, if the payload carries one
    #[must_use]
    pub fn response_text(&self) -> Option<&str> {
        self.payload.get("response").and_then(|v| v.as_str())
    }
}

/// Handler failure, classified for the retry policy
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Retryable failure (rate limit, timeout, flaky dependency)
    #[error("transient: {0}")]
    Transient(String),

    /// Non-retryable failure (invalid parameters, business error)
    #[error("permanent: {0}")]
    Permanent(String),
}

impl HandlerError {
    /// Whether the retry policy applies
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}

/// Resolve a parameter name against an entity map
///
/// `project_id` matches `last_project_id` first, then an exact key, then
/// any key ending in `_project_id`.
pub(crate) fn lookup_entity<'a>(
    entities: &'a BTreeMap<String, String>,
    param: &str,
) -> Option<&'a str> {
    let direct = format!("last_{param}");
    entities
        .get(&direct)
        .or_else(|| entities.get(param))
        .or_else(|| {
            let suffix = format!("_{param}");
            entities
                .iter()
                .find(|(key, _)| key.ends_with(&suffix))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// Contract every capability handler implements
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    /// Execute the capability with extracted parameters and session context
    async fn execute(
        &self,
        parameters: &Parameters,
        context: &ExecutionContext,
    ) -> std::result::Result<HandlerOutput, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_output_text() {
        let output = HandlerOutput::text("Project 42 created")
            .with_hint("last_project_id", "42");

        assert_eq!(output.response_text(), Some("Project 42 created"));
        assert_eq!(
            output.memory_hints.get("last_project_id").map(String::as_str),
            Some("42")
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(HandlerError::Transient("rate limited".to_string()).is_transient());
        assert!(!HandlerError::Permanent("bad input".to_string()).is_transient());
    }
}
