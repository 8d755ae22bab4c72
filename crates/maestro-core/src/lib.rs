//! Maestro Core - Orchestration Engine
//!
//! This crate provides the multi-agent orchestration core:
//! - Registry: capability catalog, sealed after startup
//! - Session: per-conversation memory, turn history, single-flight access
//! - Resolver: intent classification through an external provider
//! - Router: the closed routing-plan decision
//! - Engine: handler execution with deadlines, retries, partial results
//! - Synthesizer: merging handler results into one response
//! - Controller: the `process_request` state machine tying it together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod handler;
pub mod registry;
pub mod resolver;
pub mod response;
pub mod router;
pub mod session;
pub mod synthesizer;
pub mod utils;

pub use config::{BusyPolicy, OrchestratorConfig};
pub use controller::{OrchestrationController, TurnState};
pub use engine::{
    ExecutionEngine, ExecutionFailure, ExecutionOutcome, ExecutionResult, FailureKind,
};
pub use error::{Error, ErrorKind, Result};
pub use handler::{ExecutionContext, Handler, HandlerError, HandlerOutput, Parameters};
pub use registry::{CapabilityDescriptor, CapabilityRegistry, ParameterSpec};
pub use resolver::{IntentCandidate, IntentResolution, IntentResolver};
pub use response::{Response, ResponseError, SessionSummary, SystemStatus, TurnStatus};
pub use router::{decide, DispatchStep, RoutingPlan};
pub use session::{
    MemorySessionStore, PendingConfirmation, Session, SessionLocks, SessionPermit, SessionStore,
    Turn,
};
pub use synthesizer::{synthesize, Synthesis};
pub use utils::{retry_with_backoff, RetryConfig, RetryError};
