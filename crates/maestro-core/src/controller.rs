//! Orchestration controller
//!
//! The public entry point. One `process_request` call drives the turn state
//! machine: `Received → ContextResolved → IntentResolved → Routed →
//! Executing → Synthesized → Responded`, with `Errored` reachable from any
//! step. Every call returns a response; nothing is silently dropped and
//! nothing escapes this boundary as a panic or unhandled error.

use crate::config::OrchestratorConfig;
use crate::engine::{ExecutionEngine, ExecutionOutcome};
use crate::error::{Error, Result};
use crate::handler::ExecutionContext;
use crate::registry::CapabilityRegistry;
use crate::resolver::IntentResolver;
use crate::response::{Response, ResponseError, SessionSummary, SystemStatus, TurnStatus};
use crate::router::{self, RoutingPlan};
use crate::session::{PendingConfirmation, Session, SessionLocks, SessionStore, Turn};
use crate::synthesizer::synthesize;
use chrono::Utc;
use maestro_classify::Classifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// States of the per-turn machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Request accepted
    Received,
    /// Session loaded, references resolvable
    ContextResolved,
    /// Intent candidates produced
    IntentResolved,
    /// Routing plan fixed
    Routed,
    /// Handlers running
    Executing,
    /// Response and memory updates built
    Synthesized,
    /// Session persisted, response returned
    Responded,
    /// Failed at some step; a response is still returned
    Errored,
}

fn advance(turn_id: Uuid, state: &mut TurnState, next: TurnState) {
    debug!(turn_id = %turn_id, from = ?*state, to = ?next, "Turn state transition");
    *state = next;
}

/// Wires registry, resolver, router, engine and synthesizer into the
/// end-to-end request flow
pub struct OrchestrationController {
    registry: Arc<CapabilityRegistry>,
    resolver: IntentResolver,
    engine: ExecutionEngine,
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    config: OrchestratorConfig,
}

impl OrchestrationController {
    /// Create a controller over a fully-registered capability set
    ///
    /// The registry is sealed here: registration is over, reads are
    /// lock-free from now on.
    #[must_use]
    pub fn new(
        registry: CapabilityRegistry,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn SessionStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        info!(capabilities = registry.len(), "Orchestration controller ready");
        Self {
            resolver: IntentResolver::new(classifier),
            engine: ExecutionEngine::new(registry.clone(), config.clone()),
            registry,
            store,
            locks: SessionLocks::new(),
            config,
        }
    }

    /// Process one request; always answers
    pub async fn process_request(&self, session_id: &str, text: &str) -> Response {
        let turn_id = Uuid::new_v4();
        let mut state = TurnState::Received;
        info!(session_id = %session_id, turn_id = %turn_id, "Processing request");

        // Single-flight: one turn per session at a time
        let _permit = match self.locks.acquire(session_id, self.config.busy_policy).await {
            Ok(permit) => permit,
            Err(e) => {
                advance(turn_id, &mut state, TurnState::Errored);
                return Self::error_response(session_id, turn_id, &e);
            }
        };

        let mut session = match self.load_session(session_id).await {
            Ok(session) => session,
            Err(e) => {
                advance(turn_id, &mut state, TurnState::Errored);
                return Self::error_response(session_id, turn_id, &e);
            }
        };
        advance(turn_id, &mut state, TurnState::ContextResolved);

        let resolution = match self
            .resolver
            .resolve(text, &session, &self.registry, &self.config)
            .await
        {
            Ok(resolution) => resolution,
            Err(e) => {
                // The turn is still recorded and answered with a generic
                // fallback, never dropped
                advance(turn_id, &mut state, TurnState::Errored);
                let response = Self::error_response(session_id, turn_id, &e);
                session.push_turn(Turn {
                    id: turn_id,
                    input: text.to_string(),
                    timestamp: Utc::now(),
                    candidates: Vec::new(),
                    plan: None,
                    results: Vec::new(),
                    response: response.text.clone(),
                    status: TurnStatus::Failed,
                });
                self.persist(session_id, &session).await;
                return response;
            }
        };
        advance(turn_id, &mut state, TurnState::IntentResolved);

        let plan = router::decide(text, &resolution, &self.registry, &self.config);
        advance(turn_id, &mut state, TurnState::Routed);

        let outcome = if plan.dispatches() {
            advance(turn_id, &mut state, TurnState::Executing);
            let context = ExecutionContext {
                session_id: session_id.to_string(),
                entities: session.entities.clone(),
            };
            self.engine.execute(&plan, &context).await
        } else {
            ExecutionOutcome::default()
        };

        let synthesis = synthesize(&plan, &outcome);
        advance(turn_id, &mut state, TurnState::Synthesized);

        for (key, value) in &synthesis.memory_updates {
            session.remember(key.clone(), value.clone());
        }
        if let RoutingPlan::Clarify { options } = &plan {
            // Only one confirmation may be pending; newer wins
            session.pending_confirmation = Some(PendingConfirmation {
                options: options.clone(),
                original_input: text.to_string(),
            });
        }

        session.push_turn(Turn {
            id: turn_id,
            input: text.to_string(),
            timestamp: Utc::now(),
            candidates: resolution.candidates,
            plan: Some(plan),
            results: outcome.results,
            response: synthesis.text.clone(),
            status: synthesis.status,
        });
        self.persist(session_id, &session).await;
        advance(turn_id, &mut state, TurnState::Responded);

        Response {
            session_id: session_id.to_string(),
            turn_id,
            text: synthesis.text,
            status: synthesis.status,
            error: synthesis.error,
        }
    }

    /// Introspection: turn count, last intent, pending confirmation
    ///
    /// # Errors
    /// Propagates backend failures other than corrupt state.
    pub async fn session_summary(&self, session_id: &str) -> Result<SessionSummary> {
        let session = self
            .store
            .load(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));
        Ok(SessionSummary {
            turn_count: session.turn_count(),
            last_intent: session.last_intent().map(ToString::to_string),
            pending_confirmation: session.pending_confirmation.clone(),
        })
    }

    /// Introspection: registered capabilities
    #[must_use]
    pub fn system_status(&self) -> SystemStatus {
        let capabilities: Vec<String> =
            self.registry.list().iter().map(|d| d.name.clone()).collect();
        SystemStatus {
            capability_count: capabilities.len(),
            capabilities,
        }
    }

    /// The sealed registry
    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Load the session, degrading corrupt state to a fresh session
    async fn load_session(&self, session_id: &str) -> Result<Session> {
        match self.store.load(session_id).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Ok(Session::new(session_id)),
            Err(Error::SessionState(message)) => {
                warn!(
                    session_id = %session_id,
                    %message,
                    "Corrupt session state, starting fresh"
                );
                Ok(Session::new(session_id))
            }
            Err(e) => Err(e),
        }
    }

    /// Persist the session; a failed save loses memory for later turns but
    /// never the answer to this one
    async fn persist(&self, session_id: &str, session: &Session) {
        if let Err(e) = self.store.save(session_id, session).await {
            error!(session_id = %session_id, error = %e, "Failed to persist session");
        }
    }

    fn error_response(session_id: &str, turn_id: Uuid, error: &Error) -> Response {
        Response {
            session_id: session_id.to_string(),
            turn_id,
            text: error.user_message(),
            status: TurnStatus::Failed,
            error: Some(ResponseError {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }
}
