//! Classification request and response types

use crate::catalog::CatalogEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A recalled entity-memory entry included in the prompt context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Entity-memory key (e.g. `last_project_id`)
    pub key: String,
    /// Stored value
    pub value: String,
}

/// Prompt context sent to the classification provider
///
/// Contains everything a provider needs to produce intent candidates: the
/// raw user text, the capability catalog that constrains valid answers, a
/// bounded window of recent entity memory, and a bounded window of recent
/// turn inputs for conversational context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Raw user input
    pub text: String,
    /// Capability catalog (valid answer space)
    pub catalog: Vec<CatalogEntry>,
    /// Recent entity memory, most recent last
    pub memory: Vec<MemoryEntry>,
    /// Recent turn inputs, most recent last
    pub history: Vec<String>,
    /// Set on the single repair attempt: the provider must answer with the
    /// exact JSON schema and nothing else
    pub strict: bool,
}

impl ClassifyRequest {
    /// Create a request with an empty context
    #[must_use]
    pub fn new(text: impl Into<String>, catalog: Vec<CatalogEntry>) -> Self {
        Self {
            text: text.into(),
            catalog,
            memory: Vec::new(),
            history: Vec::new(),
            strict: false,
        }
    }

    /// Attach the entity-memory window
    #[must_use]
    pub fn with_memory(mut self, memory: Vec<MemoryEntry>) -> Self {
        self.memory = memory;
        self
    }

    /// Attach the recent-turn window
    #[must_use]
    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }

    /// Mark this as the strict repair attempt
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Raw provider response
///
/// `content` is expected to be a JSON array of [`IntentPayload`] objects.
/// Parsing and validation happen in the consumer; a provider that cannot
/// produce the schema should still return its raw text so the consumer can
/// decide to repair or fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    /// Raw structured content (JSON array of intent candidates)
    pub content: String,
    /// Provider name, for diagnostics
    pub provider: String,
}

/// The wire schema each intent candidate must follow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentPayload {
    /// Capability name (must come from the catalog)
    pub capability: String,
    /// Extracted parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    /// Whether the provider believes multiple capabilities must jointly
    /// satisfy the request
    #[serde(default)]
    pub requires_collaboration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ClassifyRequest::new("genera el charter", Vec::new())
            .with_memory(vec![MemoryEntry {
                key: "last_project_id".to_string(),
                value: "42".to_string(),
            }])
            .with_history(vec!["crear proyecto App".to_string()]);

        assert_eq!(request.text, "genera el charter");
        assert_eq!(request.memory.len(), 1);
        assert_eq!(request.history.len(), 1);
        assert!(!request.strict);
        assert!(request.strict().strict);
    }

    #[test]
    fn test_intent_payload_roundtrip() {
        let raw = r#"[{"capability":"create_project","parameters":{"name":"App"},"confidence":0.93}]"#;
        let parsed: Vec<IntentPayload> = serde_json::from_str(raw).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].capability, "create_project");
        assert_eq!(parsed[0].parameters.get("name").map(String::as_str), Some("App"));
        assert!(!parsed[0].requires_collaboration);
    }
}
