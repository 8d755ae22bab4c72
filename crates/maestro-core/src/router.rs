//! Routing
//!
//! Pure decision logic: given resolved intents and the registry, produce a
//! [`RoutingPlan`]. Every routing outcome is a variant of one closed enum,
//! so downstream handling is exhaustive by construction.

use crate::config::OrchestratorConfig;
use crate::handler::Parameters;
use crate::registry::CapabilityRegistry;
use crate::resolver::{IntentCandidate, IntentResolution};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One capability invocation within a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchStep {
    /// Capability to invoke
    pub capability: String,
    /// Extracted parameters
    pub parameters: Parameters,
}

/// The router's decision for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingPlan {
    /// No candidate above the confidence threshold
    Reject {
        /// Closest capability, for the user-facing suggestion
        suggestion: Option<String>,
    },
    /// Competing candidates too close to act on
    Clarify {
        /// The capabilities the user must choose between
        options: Vec<String>,
    },
    /// Exactly one confident, unambiguous candidate
    Single {
        /// The chosen invocation
        step: DispatchStep,
    },
    /// Collaboration with a dependency order between steps
    Sequential {
        /// Steps in execution order
        steps: Vec<DispatchStep>,
    },
    /// Collaboration between independent steps
    Parallel {
        /// Steps, executed concurrently
        steps: Vec<DispatchStep>,
    },
}

impl RoutingPlan {
    /// Whether this plan dispatches any handler
    #[must_use]
    pub fn dispatches(&self) -> bool {
        matches!(
            self,
            RoutingPlan::Single { .. } | RoutingPlan::Sequential { .. } | RoutingPlan::Parallel { .. }
        )
    }
}

/// Decide how to dispatch a resolved turn
#[must_use]
pub fn decide(
    input: &str,
    resolution: &IntentResolution,
    registry: &CapabilityRegistry,
    config: &OrchestratorConfig,
) -> RoutingPlan {
    let confident: Vec<&IntentCandidate> = resolution
        .candidates
        .iter()
        .filter(|c| c.confidence >= config.confidence_threshold)
        .collect();

    if confident.is_empty() {
        let suggestion = resolution
            .candidates
            .first()
            .map(|c| c.capability.clone())
            .or_else(|| closest_by_example(input, registry));
        debug!(input = %input, ?suggestion, "Routing: reject");
        return RoutingPlan::Reject { suggestion };
    }

    if resolution.ambiguous {
        let options = clarify_options(&resolution.candidates, config.ambiguity_window);
        debug!(input = %input, ?options, "Routing: clarify");
        return RoutingPlan::Clarify { options };
    }

    let collaborators: Vec<&IntentCandidate> = confident
        .iter()
        .copied()
        .filter(|c| c.requires_collaboration)
        .collect();

    if collaborators.len() >= 2 {
        let steps = dedup_steps(&collaborators);
        return if has_dependency(&steps, registry) {
            let ordered = order_by_dependencies(steps, registry);
            debug!(input = %input, steps = ordered.len(), "Routing: sequential dispatch");
            RoutingPlan::Sequential { steps: ordered }
        } else {
            debug!(input = %input, steps = steps.len(), "Routing: parallel dispatch");
            RoutingPlan::Parallel { steps }
        };
    }

    let winner = break_tie(input, &confident, registry);
    debug!(input = %input, capability = %winner.capability, "Routing: single dispatch");
    RoutingPlan::Single {
        step: DispatchStep {
            capability: winner.capability.clone(),
            parameters: winner.parameters.clone(),
        },
    }
}

/// Competing capabilities within the ambiguity window of the top candidate
fn clarify_options(candidates: &[IntentCandidate], window: f64) -> Vec<String> {
    let Some(top) = candidates.first() else {
        return Vec::new();
    };
    let mut options = Vec::new();
    for candidate in candidates {
        if (top.confidence - candidate.confidence).abs() <= window
            && !options.contains(&candidate.capability)
        {
            options.push(candidate.capability.clone());
        }
    }
    options
}

/// Highest-confidence step per capability, confidence order preserved
fn dedup_steps(candidates: &[&IntentCandidate]) -> Vec<DispatchStep> {
    let mut steps: Vec<DispatchStep> = Vec::new();
    for candidate in candidates {
        if !steps.iter().any(|s| s.capability == candidate.capability) {
            steps.push(DispatchStep {
                capability: candidate.capability.clone(),
                parameters: candidate.parameters.clone(),
            });
        }
    }
    steps
}

/// Whether any step requires a parameter another step provides
fn has_dependency(steps: &[DispatchStep], registry: &CapabilityRegistry) -> bool {
    steps.iter().any(|step| {
        depends_on_any(step, steps, registry)
    })
}

fn depends_on_any(
    step: &DispatchStep,
    steps: &[DispatchStep],
    registry: &CapabilityRegistry,
) -> bool {
    let Ok(descriptor) = registry.find(&step.capability) else {
        return false;
    };
    descriptor.required_parameters().iter().any(|param| {
        steps.iter().any(|other| {
            other.capability != step.capability && provides_param(&other.capability, param, registry)
        })
    })
}

fn provides_param(capability: &str, param: &str, registry: &CapabilityRegistry) -> bool {
    registry
        .find(capability)
        .map(|d| {
            d.provides
                .iter()
                .any(|key| key == param || key.ends_with(&format!("_{param}")))
        })
        .unwrap_or(false)
}

/// Topological order: providers before the steps that consume their output.
/// A dependency cycle falls back to the incoming (confidence) order.
fn order_by_dependencies(
    steps: Vec<DispatchStep>,
    registry: &CapabilityRegistry,
) -> Vec<DispatchStep> {
    let mut remaining = steps;
    let mut ordered: Vec<DispatchStep> = Vec::new();

    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .position(|step| !depends_on_any(step, &remaining, registry));
        match ready {
            Some(index) => ordered.push(remaining.remove(index)),
            None => {
                warn!("Dependency cycle between dispatch steps, keeping confidence order");
                ordered.append(&mut remaining);
            }
        }
    }
    ordered
}

/// Tie-break equal-confidence candidates: higher priority rank, then higher
/// example-utterance overlap with the input.
fn break_tie<'a>(
    input: &str,
    confident: &[&'a IntentCandidate],
    registry: &CapabilityRegistry,
) -> &'a IntentCandidate {
    let top = confident[0];
    let tied: Vec<&'a IntentCandidate> = confident
        .iter()
        .filter(|c| c.confidence == top.confidence)
        .copied()
        .collect();
    if tied.len() < 2 {
        return top;
    }

    tied.into_iter()
        .max_by(|a, b| {
            let pa = registry.find(&a.capability).map(|d| d.priority).unwrap_or(0);
            let pb = registry.find(&b.capability).map(|d| d.priority).unwrap_or(0);
            pa.cmp(&pb).then_with(|| {
                let oa = example_overlap(input, &a.capability, registry);
                let ob = example_overlap(input, &b.capability, registry);
                oa.partial_cmp(&ob).unwrap_or(std::cmp::Ordering::Equal)
            })
        })
        .unwrap_or(top)
}

/// Best capability by example overlap, for reject suggestions
fn closest_by_example(input: &str, registry: &CapabilityRegistry) -> Option<String> {
    registry
        .list()
        .into_iter()
        .map(|d| (example_overlap(input, &d.name, registry), d.name.clone()))
        .filter(|(score, _)| *score > 0.0)
        .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, name)| name)
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Fraction of an example's tokens present in the input, maximized over the
/// capability's examples
fn example_overlap(input: &str, capability: &str, registry: &CapabilityRegistry) -> f64 {
    let Ok(descriptor) = registry.find(capability) else {
        return 0.0;
    };
    let input_tokens = tokens(input);
    descriptor
        .examples
        .iter()
        .map(|example| {
            let example_tokens = tokens(example);
            if example_tokens.is_empty() {
                return 0.0;
            }
            let hits = example_tokens
                .iter()
                .filter(|t| input_tokens.contains(*t))
                .count();
            hits as f64 / example_tokens.len() as f64
        })
        .fold(0.0, f64::max)
}
