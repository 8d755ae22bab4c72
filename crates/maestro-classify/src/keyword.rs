//! Keyword classifier
//!
//! A deterministic, offline classification provider. Scores each catalog
//! entry by token overlap between the input and the entry's example
//! utterances, and extracts parameters with simple lexical rules:
//!
//! - an example that is a prefix of the input donates the remainder to the
//!   first missing required string parameter ("crear proyecto App" →
//!   `name = "App"`)
//! - explicit numeric references fill a declared `project_id`
//!   ("el charter del proyecto 13" → `project_id = "13"`)
//!
//! Useful as a demo backend and as a fallback when no live provider is
//! configured. An exact example match scores 1.0.

use crate::catalog::{CatalogEntry, ParamKind};
use crate::error::Result;
use crate::provider::Classifier;
use crate::request::{ClassifyRequest, ClassifyResponse, IntentPayload};

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

/// Minimum overlap score for an entry to become a candidate
const MIN_SCORE: f64 = 0.3;

/// Score at which co-matching entries are flagged as collaborators
const COLLABORATION_FLOOR: f64 = 0.5;

static PROJECT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:proyecto|project)\s+#?(\d+)").expect("static regex")
});

/// Deterministic keyword/overlap classifier
pub struct KeywordClassifier;

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordClassifier {
    /// Create a new keyword classifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn tokens(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Overlap score of the input against one example utterance.
    ///
    /// 1.0 for an exact normalized match, otherwise the fraction of the
    /// example's tokens that appear in the input.
    fn example_score(input_tokens: &[String], example: &str) -> f64 {
        let example_tokens = Self::tokens(example);
        if example_tokens.is_empty() {
            return 0.0;
        }
        if input_tokens == example_tokens.as_slice() {
            return 1.0;
        }
        let hits = example_tokens
            .iter()
            .filter(|t| input_tokens.contains(*t))
            .count();
        // Cap partial matches below the exact-match score
        (hits as f64 / example_tokens.len() as f64).min(0.95)
    }

    fn score_entry(input_tokens: &[String], entry: &CatalogEntry) -> f64 {
        entry
            .examples
            .iter()
            .map(|e| Self::example_score(input_tokens, e))
            .fold(0.0, f64::max)
    }

    /// Extract parameters for a matched entry.
    fn extract_parameters(text: &str, entry: &CatalogEntry) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::new();

        // Numeric project reference anywhere in the input
        if entry.parameters.iter().any(|p| p.name == "project_id") {
            if let Some(caps) = PROJECT_ID_RE.captures(text) {
                parameters.insert("project_id".to_string(), caps[1].to_string());
            }
        }

        // Prefix remainder fills the first missing required string parameter
        let lowered = text.to_lowercase();
        for example in &entry.examples {
            let prefix = example.to_lowercase();
            if let Some(rest) = lowered.strip_prefix(&prefix) {
                let rest = rest.trim();
                if rest.is_empty() {
                    continue;
                }
                let target = entry.parameters.iter().find(|p| {
                    p.required && p.kind == ParamKind::String && !parameters.contains_key(&p.name)
                });
                if let Some(param) = target {
                    // Preserve original casing when lowercasing kept byte
                    // offsets stable; otherwise keep the lowered remainder
                    let value = if lowered.len() == text.len() {
                        text.get(prefix.len()..).map(str::trim).unwrap_or(rest)
                    } else {
                        rest
                    };
                    parameters.insert(param.name.clone(), value.to_string());
                    break;
                }
            }
        }

        parameters
    }
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, request: ClassifyRequest) -> Result<ClassifyResponse> {
        let input_tokens = Self::tokens(&request.text);

        let mut scored: Vec<(f64, &CatalogEntry)> = request
            .catalog
            .iter()
            .map(|entry| (Self::score_entry(&input_tokens, entry), entry))
            .filter(|(score, _)| *score >= MIN_SCORE)
            .collect();

        // Deterministic order: score descending, then name
        scored.sort_by(|(sa, ea), (sb, eb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ea.name.cmp(&eb.name))
        });

        let collaborators = scored
            .iter()
            .filter(|(score, _)| *score >= COLLABORATION_FLOOR)
            .count();

        let candidates: Vec<IntentPayload> = scored
            .iter()
            .map(|(score, entry)| IntentPayload {
                capability: entry.name.clone(),
                parameters: Self::extract_parameters(&request.text, entry),
                confidence: (*score * 100.0).round() / 100.0,
                requires_collaboration: collaborators >= 2 && *score >= COLLABORATION_FLOOR,
            })
            .collect();

        debug!(
            input = %request.text,
            candidates = candidates.len(),
            "Keyword classification complete"
        );

        let content = serde_json::to_string(&candidates)
            .map_err(|e| crate::error::Error::InvalidResponse(e.to_string()))?;

        Ok(ClassifyResponse {
            content,
            provider: "keyword".to_string(),
        })
    }
}
