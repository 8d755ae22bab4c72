//! Result synthesis
//!
//! Merges handler results into one user-facing response plus the
//! entity-memory updates the controller applies afterwards. Multi-handler
//! responses always state which sub-tasks succeeded and which failed; a
//! partial failure is never dressed up as full success.

use crate::engine::{ExecutionOutcome, ExecutionResult, FailureKind};
use crate::error::ErrorKind;
use crate::response::{ResponseError, TurnStatus};
use crate::router::RoutingPlan;
use std::collections::BTreeMap;
use tracing::debug;

/// The synthesizer's product for one turn
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// User-facing response text
    pub text: String,
    /// Turn outcome
    pub status: TurnStatus,
    /// Entity-memory updates to apply to the session
    pub memory_updates: BTreeMap<String, String>,
    /// Machine-readable error, present when the turn failed
    pub error: Option<ResponseError>,
}

/// Merge a plan's execution outcome into a single response
#[must_use]
pub fn synthesize(plan: &RoutingPlan, outcome: &ExecutionOutcome) -> Synthesis {
    let synthesis = match plan {
        RoutingPlan::Reject { suggestion } => Synthesis {
            text: match suggestion {
                Some(capability) => format!(
                    "I couldn't match that request to anything I can do. \
                     Did you mean '{capability}'?"
                ),
                None => "I couldn't match that request to anything I can do.".to_string(),
            },
            status: TurnStatus::Rejected,
            memory_updates: BTreeMap::new(),
            error: None,
        },
        RoutingPlan::Clarify { options } => Synthesis {
            text: format!(
                "That request could mean more than one thing. Which did you want: {}?",
                options.join(" or ")
            ),
            status: TurnStatus::Clarification,
            memory_updates: BTreeMap::new(),
            error: None,
        },
        RoutingPlan::Single { .. } => synthesize_single(outcome),
        RoutingPlan::Sequential { .. } => synthesize_multi(outcome, /* sort */ false),
        RoutingPlan::Parallel { .. } => synthesize_multi(outcome, /* sort */ true),
    };

    debug!(status = ?synthesis.status, updates = synthesis.memory_updates.len(), "Synthesis complete");
    synthesis
}

fn synthesize_single(outcome: &ExecutionOutcome) -> Synthesis {
    let Some(result) = outcome.results.first() else {
        return Synthesis {
            text: "Nothing was executed.".to_string(),
            status: TurnStatus::Failed,
            memory_updates: BTreeMap::new(),
            error: Some(ResponseError {
                kind: ErrorKind::Internal,
                message: "dispatch plan produced no result".to_string(),
            }),
        };
    };

    if result.success {
        Synthesis {
            text: render_output(result),
            status: TurnStatus::Success,
            memory_updates: collect_hints(std::slice::from_ref(result)),
            error: None,
        }
    } else {
        Synthesis {
            text: render_failure(result),
            status: TurnStatus::Failed,
            memory_updates: BTreeMap::new(),
            error: result.error.as_ref().map(|f| ResponseError {
                kind: failure_error_kind(f.kind),
                message: format!("{}: {}", result.capability, f.message),
            }),
        }
    }
}

/// Multi-handler merge. Parallel results are sorted by capability name so
/// the merged response is invariant to arrival order.
fn synthesize_multi(outcome: &ExecutionOutcome, sort: bool) -> Synthesis {
    let mut results: Vec<&ExecutionResult> = outcome.results.iter().collect();
    if sort {
        results.sort_by(|a, b| a.capability.cmp(&b.capability));
    }

    let mut sections: Vec<String> = Vec::new();
    for result in &results {
        if result.success {
            sections.push(format!("[ok] {}: {}", result.capability, render_output(result)));
        } else {
            sections.push(format!("[failed] {}: {}", result.capability, render_failure(result)));
        }
    }
    for capability in &outcome.skipped {
        sections.push(format!(
            "[skipped] {capability}: not run because an earlier step failed"
        ));
    }

    let status = if outcome.all_succeeded() {
        TurnStatus::Success
    } else if outcome.any_succeeded() {
        TurnStatus::PartialSuccess
    } else {
        TurnStatus::Failed
    };

    let successes: Vec<&ExecutionResult> = results.iter().filter(|r| r.success).copied().collect();
    let memory_updates = collect_hints_ref(&successes);

    let error = if status == TurnStatus::Failed {
        results
            .iter()
            .find_map(|r| r.error.as_ref().map(|f| (r, f)))
            .map(|(r, f)| ResponseError {
                kind: failure_error_kind(f.kind),
                message: format!("{}: {}", r.capability, f.message),
            })
    } else {
        None
    };

    Synthesis {
        text: sections.join("\n"),
        status,
        memory_updates,
        error,
    }
}

/// A handler payload with a `response` field passes through unchanged;
/// anything else is rendered as JSON.
fn render_output(result: &ExecutionResult) -> String {
    result
        .output
        .as_ref()
        .map(|output| {
            output
                .response_text()
                .map(ToString::to_string)
                .unwrap_or_else(|| output.payload.to_string())
        })
        .unwrap_or_default()
}

fn render_failure(result: &ExecutionResult) -> String {
    match result.error.as_ref() {
        Some(failure) => match failure.kind {
            FailureKind::Transient => format!(
                "temporarily unavailable after {} attempts ({})",
                result.attempts, failure.message
            ),
            FailureKind::Permanent => failure.message.clone(),
        },
        None => "unknown failure".to_string(),
    }
}

fn failure_error_kind(kind: FailureKind) -> ErrorKind {
    match kind {
        FailureKind::Transient => ErrorKind::HandlerTransient,
        FailureKind::Permanent => ErrorKind::HandlerPermanent,
    }
}

fn collect_hints(results: &[ExecutionResult]) -> BTreeMap<String, String> {
    let refs: Vec<&ExecutionResult> = results.iter().collect();
    collect_hints_ref(&refs)
}

fn collect_hints_ref(results: &[&ExecutionResult]) -> BTreeMap<String, String> {
    let mut updates = BTreeMap::new();
    for result in results {
        if let Some(output) = &result.output {
            for (key, value) in &output.memory_hints {
                updates.insert(key.clone(), value.clone());
            }
        }
    }
    updates
}
