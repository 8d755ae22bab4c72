//! Session and turn model
//!
//! A session carries the conversational memory that lets a user say "now
//! generate the charter" without repeating ids: an entity-memory map with
//! overwrite semantics, an ordered turn history, and at most one pending
//! confirmation.

use crate::engine::ExecutionResult;
use crate::resolver::IntentCandidate;
use crate::response::TurnStatus;
use crate::router::RoutingPlan;
use chrono::{DateTime, Utc};
use maestro_classify::MemoryEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// A clarification the orchestrator is waiting on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// The capabilities the user must choose between
    pub options: Vec<String>,
    /// The input that triggered the clarification
    pub original_input: String,
}

/// One completed request/response cycle
///
/// Immutable once appended to a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Turn id
    pub id: Uuid,
    /// Raw user input
    pub input: String,
    /// When the turn started
    pub timestamp: DateTime<Utc>,
    /// Resolved intent candidates, confidence-sorted
    pub candidates: Vec<IntentCandidate>,
    /// The routing decision
    pub plan: Option<RoutingPlan>,
    /// Per-handler execution results
    pub results: Vec<ExecutionResult>,
    /// Final synthesized response text
    pub response: String,
    /// Outcome of the turn
    pub status: TurnStatus,
}

/// Per-conversation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session id
    pub id: String,
    /// Ordered turn history
    pub turns: Vec<Turn>,
    /// Entity memory; keys are overwritten, never appended
    pub entities: BTreeMap<String, String>,
    /// At most one outstanding clarification
    pub pending_confirmation: Option<PendingConfirmation>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a fresh, empty session
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            entities: BTreeMap::new(),
            pending_confirmation: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Store an entity-memory value, overwriting any previous one
    pub fn remember(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        debug!(session_id = %self.id, key = %key, "Entity memory updated");
        self.entities.insert(key, value);
    }

    /// Look up an entity-memory value by exact key
    #[must_use]
    pub fn recall(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }

    /// Resolve a semantic reference hint against entity memory
    ///
    /// A key like `last_project_id` matches any hint mentioning its noun
    /// ("project"): "the project I just created", "that project". Exact key
    /// mentions always win. Returns the matched key and value.
    #[must_use]
    pub fn resolve_reference(&self, hint: &str) -> Option<(&str, &str)> {
        let hint_tokens: Vec<String> = hint
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect();

        let mut best: Option<(usize, &str, &str)> = None;
        for (key, value) in &self.entities {
            if hint_tokens.contains(key) {
                return Some((key.as_str(), value.as_str()));
            }
            let nouns: Vec<&str> = key
                .strip_prefix("last_")
                .unwrap_or(key)
                .split('_')
                .filter(|t| !t.is_empty() && *t != "id" && *t != "name")
                .collect();
            if !nouns.is_empty() && nouns.iter().all(|n| hint_tokens.iter().any(|t| t == n)) {
                // Prefer the most specific (longest-noun) match
                if best.is_none_or(|(n, _, _)| nouns.len() > n) {
                    best = Some((nouns.len(), key.as_str(), value.as_str()));
                }
            }
        }
        best.map(|(_, k, v)| (k, v))
    }

    /// A bounded window of entity memory for prompt context
    #[must_use]
    pub fn memory_window(&self, limit: usize) -> Vec<MemoryEntry> {
        self.entities
            .iter()
            .take(limit)
            .map(|(key, value)| MemoryEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// The most recent turn inputs, oldest first, bounded for prompt context
    #[must_use]
    pub fn history_window(&self, limit: usize) -> Vec<String> {
        let skip = self.turns.len().saturating_sub(limit);
        self.turns.iter().skip(skip).map(|t| t.input.clone()).collect()
    }

    /// Append a completed turn; a completed turn supersedes any pending
    /// confirmation unless it set a new one
    pub fn push_turn(&mut self, turn: Turn) {
        if turn.status != TurnStatus::Clarification {
            self.pending_confirmation = None;
        }
        self.last_activity = Utc::now();
        self.turns.push(turn);
    }

    /// Number of completed turns
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// The top intent of the most recent turn, if any
    #[must_use]
    pub fn last_intent(&self) -> Option<&str> {
        self.turns
            .last()
            .and_then(|t| t.candidates.first())
            .map(|c| c.capability.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_turn(input: &str, capability: &str) -> Turn {
        Turn {
            id: Uuid::new_v4(),
            input: input.to_string(),
            timestamp: Utc::now(),
            candidates: vec![IntentCandidate {
                capability: capability.to_string(),
                parameters: BTreeMap::new(),
                confidence: 0.9,
                requires_collaboration: false,
            }],
            plan: None,
            results: Vec::new(),
            response: "done".to_string(),
            status: TurnStatus::Success,
        }
    }

    #[test]
    fn test_entity_memory_overwrites() {
        let mut session = Session::new("s1");
        session.remember("last_project_id", "1");
        session.remember("last_project_id", "2");

        assert_eq!(session.recall("last_project_id"), Some("2"));
        assert_eq!(session.entities.len(), 1);
    }

    #[test]
    fn test_resolve_reference_by_noun() {
        let mut session = Session::new("s1");
        session.remember("last_project_id", "42");
        session.remember("last_mentioned_topic", "present_perfect");

        let (key, value) = session
            .resolve_reference("the project I just created")
            .unwrap();
        assert_eq!(key, "last_project_id");
        assert_eq!(value, "42");

        let (key, _) = session.resolve_reference("that topic again").unwrap();
        assert_eq!(key, "last_mentioned_topic");
    }

    #[test]
    fn test_resolve_reference_exact_key_wins() {
        let mut session = Session::new("s1");
        session.remember("last_project_id", "42");

        let (key, value) = session.resolve_reference("use last_project_id").unwrap();
        assert_eq!(key, "last_project_id");
        assert_eq!(value, "42");
    }

    #[test]
    fn test_resolve_reference_no_match() {
        let mut session = Session::new("s1");
        session.remember("last_project_id", "42");

        assert!(session.resolve_reference("the weather tomorrow").is_none());
    }

    #[test]
    fn test_history_window_keeps_most_recent() {
        let mut session = Session::new("s1");
        for i in 0..5 {
            session.push_turn(completed_turn(&format!("turn {i}"), "general_query"));
        }

        let window = session.history_window(2);
        assert_eq!(window, vec!["turn 3".to_string(), "turn 4".to_string()]);
    }

    #[test]
    fn test_completed_turn_clears_pending_confirmation() {
        let mut session = Session::new("s1");
        session.pending_confirmation = Some(PendingConfirmation {
            options: vec!["a".to_string(), "b".to_string()],
            original_input: "do the thing".to_string(),
        });

        session.push_turn(completed_turn("crear proyecto App", "create_project"));
        assert!(session.pending_confirmation.is_none());
    }

    #[test]
    fn test_last_intent() {
        let mut session = Session::new("s1");
        assert!(session.last_intent().is_none());

        session.push_turn(completed_turn("crear proyecto App", "create_project"));
        assert_eq!(session.last_intent(), Some("create_project"));
    }
}
