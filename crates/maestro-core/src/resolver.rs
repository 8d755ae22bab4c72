//! Intent resolution
//!
//! Maps free-form input plus session memory into confidence-sorted intent
//! candidates by calling exactly one external classification capability.
//! The classifier's raw output is parsed against the registry; a transient
//! provider error earns one retry, an unparseable response earns one strict
//! repair re-prompt, and then the turn fails with a classification error.

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::handler::Parameters;
use crate::registry::CapabilityRegistry;
use crate::session::Session;
use maestro_classify::{Classifier, ClassifyRequest, ClassifyResponse, IntentPayload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// One candidate intent produced for a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentCandidate {
    /// Capability name (validated against the registry)
    pub capability: String,
    /// Extracted parameters
    pub parameters: Parameters,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    /// Whether multiple capabilities must jointly satisfy the request
    pub requires_collaboration: bool,
}

/// The resolver's answer for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResolution {
    /// Candidates, confidence-sorted descending
    pub candidates: Vec<IntentCandidate>,
    /// Set when the top candidates are too close to act on safely
    pub ambiguous: bool,
}

/// Resolves free-form input into intent candidates
pub struct IntentResolver {
    classifier: Arc<dyn Classifier>,
}

impl IntentResolver {
    /// Create a resolver over a classification provider
    #[must_use]
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Resolve input into candidates
    ///
    /// # Errors
    /// Returns `Classification` when the provider is unusable after the
    /// retry and repair attempts.
    pub async fn resolve(
        &self,
        text: &str,
        session: &Session,
        registry: &CapabilityRegistry,
        config: &OrchestratorConfig,
    ) -> Result<IntentResolution> {
        let request = ClassifyRequest::new(text, registry.catalog())
            .with_memory(session.memory_window(config.memory_window))
            .with_history(session.history_window(config.history_window));

        let response = self.call_with_retry(request.clone(), config).await?;

        let payloads = match Self::parse(&response.content, registry) {
            Ok(payloads) => payloads,
            Err(parse_error) => {
                warn!(
                    provider = %response.provider,
                    error = %parse_error,
                    "Unparseable classification, attempting repair"
                );
                let repaired = self.call_with_retry(request.strict(), config).await?;
                Self::parse(&repaired.content, registry).map_err(|e| {
                    Error::Classification(format!("unusable after repair attempt: {e}"))
                })?
            }
        };

        let mut candidates: Vec<IntentCandidate> = payloads
            .into_iter()
            .map(|p| IntentCandidate {
                capability: p.capability,
                parameters: p.parameters,
                confidence: p.confidence.clamp(0.0, 1.0),
                requires_collaboration: p.requires_collaboration,
            })
            .collect();

        for candidate in &mut candidates {
            Self::fill_parameters(candidate, session, registry);
        }

        // Confidence descending; name keeps equal scores deterministic
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.capability.cmp(&b.capability))
        });

        let ambiguous = Self::is_ambiguous(&candidates, config.ambiguity_window);

        debug!(
            input = %text,
            candidates = candidates.len(),
            ambiguous,
            "Intent resolution complete"
        );

        Ok(IntentResolution { candidates, ambiguous })
    }

    /// One classifier call with a deadline, retried once on a transient error
    async fn call_with_retry(
        &self,
        request: ClassifyRequest,
        config: &OrchestratorConfig,
    ) -> Result<ClassifyResponse> {
        match self.call(request.clone(), config).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Transient classifier error, retrying once");
                self.call(request, config)
                    .await
                    .map_err(|e| Error::Classification(e.to_string()))
            }
            Err(e) => Err(Error::Classification(e.to_string())),
        }
    }

    async fn call(
        &self,
        request: ClassifyRequest,
        config: &OrchestratorConfig,
    ) -> std::result::Result<ClassifyResponse, maestro_classify::Error> {
        let timeout_ms = config.classify_timeout.as_millis() as u64;
        match tokio::time::timeout(config.classify_timeout, self.classifier.classify(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(maestro_classify::Error::Timeout(timeout_ms)),
        }
    }

    /// Parse raw content into payloads, dropping unknown capability names.
    ///
    /// An empty array is a valid "no intent" answer; a non-empty array whose
    /// every entry is invalid counts as unparseable.
    fn parse(
        content: &str,
        registry: &CapabilityRegistry,
    ) -> std::result::Result<Vec<IntentPayload>, String> {
        let payloads: Vec<IntentPayload> =
            serde_json::from_str(content).map_err(|e| format!("bad intent schema: {e}"))?;

        let total = payloads.len();
        let valid: Vec<IntentPayload> = payloads
            .into_iter()
            .filter(|p| {
                let known = registry.contains(&p.capability);
                if !known {
                    warn!(capability = %p.capability, "Dropping unknown capability from classifier");
                }
                known
            })
            .collect();

        if total > 0 && valid.is_empty() {
            return Err(format!("all {total} candidates named unknown capabilities"));
        }
        Ok(valid)
    }

    /// Fill missing required parameters from entity memory
    ///
    /// `project_id` is looked up as `last_project_id` first, then as any
    /// memory key ending in `_project_id`.
    fn fill_parameters(
        candidate: &mut IntentCandidate,
        session: &Session,
        registry: &CapabilityRegistry,
    ) {
        let Ok(descriptor) = registry.find(&candidate.capability) else {
            return;
        };
        for param in descriptor.required_parameters() {
            if candidate.parameters.contains_key(param) {
                continue;
            }
            let value =
                crate::handler::lookup_entity(&session.entities, param).map(ToString::to_string);
            if let Some(value) = value {
                debug!(
                    capability = %candidate.capability,
                    parameter = %param,
                    "Filled parameter from entity memory"
                );
                candidate.parameters.insert(param.to_string(), value);
            }
        }
    }

    /// Two or more close candidates for different capabilities are ambiguous
    /// unless both were flagged as collaborators (complementary, not
    /// competing).
    fn is_ambiguous(candidates: &[IntentCandidate], window: f64) -> bool {
        let [first, second, ..] = candidates else {
            return false;
        };
        first.capability != second.capability
            && (first.confidence - second.confidence).abs() <= window
            && !(first.requires_collaboration && second.requires_collaboration)
    }
}
