//! Execution engine
//!
//! Invokes the handlers a routing plan selected, under the common contract:
//! per-step deadlines, transient-failure retries with exponential backoff,
//! context carry-over for sequential chains, and independent collection of
//! parallel results. Partial results are never discarded.

use crate::config::OrchestratorConfig;
use crate::handler::{lookup_entity, ExecutionContext, HandlerError, HandlerOutput, Parameters};
use crate::registry::CapabilityRegistry;
use crate::router::{DispatchStep, RoutingPlan};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Failure classification carried in an execution result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retryable failure; retries were exhausted
    Transient,
    /// Non-retryable failure
    Permanent,
}

/// Error half of a failed execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Failure classification
    pub kind: FailureKind,
    /// Failure detail
    pub message: String,
}

/// Outcome of one handler invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Capability that was invoked
    pub capability: String,
    /// Whether the invocation succeeded
    pub success: bool,
    /// Handler output on success
    pub output: Option<HandlerOutput>,
    /// Failure details on failure
    pub error: Option<ExecutionFailure>,
    /// Wall-clock latency including retries
    pub latency_ms: u64,
    /// Attempts made (1 = no retry)
    pub attempts: u32,
}

impl ExecutionResult {
    fn succeeded(capability: &str, output: HandlerOutput, latency_ms: u64, attempts: u32) -> Self {
        Self {
            capability: capability.to_string(),
            success: true,
            output: Some(output),
            error: None,
            latency_ms,
            attempts,
        }
    }

    fn failed(
        capability: &str,
        kind: FailureKind,
        message: String,
        latency_ms: u64,
        attempts: u32,
    ) -> Self {
        Self {
            capability: capability.to_string(),
            success: false,
            output: None,
            error: Some(ExecutionFailure { kind, message }),
            latency_ms,
            attempts,
        }
    }
}

/// Everything the engine produced for one plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Per-step results, in invocation order
    pub results: Vec<ExecutionResult>,
    /// Sequential steps never invoked because an earlier step failed
    pub skipped: Vec<String>,
}

impl ExecutionOutcome {
    /// Whether every invoked step succeeded and nothing was skipped
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.results.iter().all(|r| r.success)
    }

    /// Whether at least one step succeeded
    #[must_use]
    pub fn any_succeeded(&self) -> bool {
        self.results.iter().any(|r| r.success)
    }
}

/// Executes routing plans against registered handlers
pub struct ExecutionEngine {
    registry: Arc<CapabilityRegistry>,
    config: OrchestratorConfig,
}

impl ExecutionEngine {
    /// Create an engine over a sealed registry
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>, config: OrchestratorConfig) -> Self {
        Self { registry, config }
    }

    /// Execute a plan
    ///
    /// `Reject`/`Clarify` plans dispatch nothing and return an empty outcome.
    pub async fn execute(
        &self,
        plan: &RoutingPlan,
        context: &ExecutionContext,
    ) -> ExecutionOutcome {
        match plan {
            RoutingPlan::Reject { .. } | RoutingPlan::Clarify { .. } => ExecutionOutcome::default(),
            RoutingPlan::Single { step } => {
                let result = self.execute_step(step, context).await;
                ExecutionOutcome {
                    results: vec![result],
                    skipped: Vec::new(),
                }
            }
            RoutingPlan::Sequential { steps } => self.execute_sequential(steps, context).await,
            RoutingPlan::Parallel { steps } => self.execute_parallel(steps, context).await,
        }
    }

    /// Run steps in order, merging each step's memory hints into the context
    /// for the steps after it. A failed step skips the rest of the chain.
    async fn execute_sequential(
        &self,
        steps: &[DispatchStep],
        context: &ExecutionContext,
    ) -> ExecutionOutcome {
        let mut working = context.clone();
        let mut outcome = ExecutionOutcome::default();

        for (index, step) in steps.iter().enumerate() {
            let result = self.execute_step(step, &working).await;
            let success = result.success;

            if let Some(output) = &result.output {
                for (key, value) in &output.memory_hints {
                    working.entities.insert(key.clone(), value.clone());
                }
            }
            outcome.results.push(result);

            if !success {
                outcome.skipped = steps[index + 1..]
                    .iter()
                    .map(|s| s.capability.clone())
                    .collect();
                if !outcome.skipped.is_empty() {
                    warn!(
                        failed = %step.capability,
                        skipped = ?outcome.skipped,
                        "Sequential chain aborted"
                    );
                }
                break;
            }
        }
        outcome
    }

    /// Run all steps concurrently against the same read-only snapshot.
    /// No step observes another's output; failures stay independent.
    async fn execute_parallel(
        &self,
        steps: &[DispatchStep],
        context: &ExecutionContext,
    ) -> ExecutionOutcome {
        let futures: Vec<_> = steps
            .iter()
            .map(|step| self.execute_step(step, context))
            .collect();

        let results = join_all(futures).await;
        info!(
            steps = results.len(),
            succeeded = results.iter().filter(|r| r.success).count(),
            "Parallel dispatch complete"
        );
        ExecutionOutcome {
            results,
            skipped: Vec::new(),
        }
    }

    /// One handler invocation: parameter validation, deadline, retry policy.
    async fn execute_step(
        &self,
        step: &DispatchStep,
        context: &ExecutionContext,
    ) -> ExecutionResult {
        let start = std::time::Instant::now();
        let capability = step.capability.as_str();

        let (descriptor, handler) = match (
            self.registry.find(capability),
            self.registry.handler(capability),
        ) {
            (Ok(d), Ok(h)) => (d, h),
            _ => {
                return ExecutionResult::failed(
                    capability,
                    FailureKind::Permanent,
                    format!("capability '{capability}' is not registered"),
                    start.elapsed().as_millis() as u64,
                    1,
                );
            }
        };

        // Late parameter fill: a sequential step may consume an id an
        // earlier step just produced
        let mut parameters = step.parameters.clone();
        for param in descriptor.required_parameters() {
            if !parameters.contains_key(param) {
                if let Some(value) = lookup_entity(&context.entities, param) {
                    parameters.insert(param.to_string(), value.to_string());
                }
            }
        }

        let missing: Vec<&str> = descriptor
            .required_parameters()
            .into_iter()
            .filter(|p| !parameters.contains_key(*p))
            .collect();
        if !missing.is_empty() {
            return ExecutionResult::failed(
                capability,
                FailureKind::Permanent,
                format!("missing required parameters: {}", missing.join(", ")),
                start.elapsed().as_millis() as u64,
                1,
            );
        }

        let timeout = descriptor.timeout.unwrap_or(self.config.handler_timeout);
        let timeout_ms = timeout.as_millis() as u64;

        let attempt_result = crate::utils::retry_with_backoff(
            &self.config.retry,
            || Self::attempt(handler.clone(), &parameters, context, timeout, timeout_ms),
            HandlerError::is_transient,
        )
        .await;

        let latency_ms = start.elapsed().as_millis() as u64;
        match attempt_result {
            Ok((output, attempts)) => {
                debug!(capability = %capability, latency_ms, attempts, "Handler succeeded");
                ExecutionResult::succeeded(capability, output, latency_ms, attempts)
            }
            Err(retry_error) => {
                let kind = if retry_error.last_error.is_transient() {
                    FailureKind::Transient
                } else {
                    FailureKind::Permanent
                };
                warn!(
                    capability = %capability,
                    attempts = retry_error.attempts,
                    error = %retry_error.last_error,
                    "Handler failed"
                );
                ExecutionResult::failed(
                    capability,
                    kind,
                    retry_error.last_error.to_string(),
                    latency_ms,
                    retry_error.attempts,
                )
            }
        }
    }

    /// One attempt under the deadline; expiry counts as a transient timeout
    async fn attempt(
        handler: Arc<dyn crate::handler::Handler>,
        parameters: &Parameters,
        context: &ExecutionContext,
        timeout: std::time::Duration,
        timeout_ms: u64,
    ) -> std::result::Result<HandlerOutput, HandlerError> {
        match tokio::time::timeout(timeout, handler.execute(parameters, context)).await {
            Ok(result) => result,
            Err(_) => Err(HandlerError::Transient(format!(
                "timed out after {timeout_ms}ms"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::registry::CapabilityDescriptor;
    use crate::utils::RetryConfig;
    use maestro_classify::ParamKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct EchoHandler;

    #[async_trait::async_trait]
    impl Handler for EchoHandler {
        async fn execute(
            &self,
            parameters: &Parameters,
            _context: &ExecutionContext,
        ) -> std::result::Result<HandlerOutput, HandlerError> {
            Ok(HandlerOutput::text(format!("echo: {parameters:?}")))
        }
    }

    /// Fails with a transient error until `failures` attempts have happened
    struct FlakyHandler {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Handler for FlakyHandler {
        async fn execute(
            &self,
            _parameters: &Parameters,
            _context: &ExecutionContext,
        ) -> std::result::Result<HandlerOutput, HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(HandlerError::Transient("rate limited".to_string()))
            } else {
                Ok(HandlerOutput::text("finally"))
            }
        }
    }

    struct PermanentFailHandler {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Handler for PermanentFailHandler {
        async fn execute(
            &self,
            _parameters: &Parameters,
            _context: &ExecutionContext,
        ) -> std::result::Result<HandlerOutput, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::Permanent("invalid project".to_string()))
        }
    }

    struct SlowHandler;

    #[async_trait::async_trait]
    impl Handler for SlowHandler {
        async fn execute(
            &self,
            _parameters: &Parameters,
            _context: &ExecutionContext,
        ) -> std::result::Result<HandlerOutput, HandlerError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(HandlerOutput::text("too late"))
        }
    }

    struct CreateProjectHandler;

    #[async_trait::async_trait]
    impl Handler for CreateProjectHandler {
        async fn execute(
            &self,
            parameters: &Parameters,
            _context: &ExecutionContext,
        ) -> std::result::Result<HandlerOutput, HandlerError> {
            let name = parameters
                .get("name")
                .ok_or_else(|| HandlerError::Permanent("name missing".to_string()))?;
            Ok(HandlerOutput::text(format!("Project '{name}' created with id 42"))
                .with_hint("last_project_id", "42"))
        }
    }

    struct CharterHandler {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Handler for CharterHandler {
        async fn execute(
            &self,
            parameters: &Parameters,
            _context: &ExecutionContext,
        ) -> std::result::Result<HandlerOutput, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = parameters
                .get("project_id")
                .ok_or_else(|| HandlerError::Permanent("project_id missing".to_string()))?;
            Ok(HandlerOutput::text(format!("Charter for project {id}")))
        }
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_handler_timeout(Duration::from_millis(50))
            .with_retry(
                RetryConfig::new()
                    .with_max_attempts(3)
                    .with_initial_delay(Duration::from_millis(1)),
            )
    }

    fn step(capability: &str) -> DispatchStep {
        DispatchStep {
            capability: capability.to_string(),
            parameters: Parameters::new(),
        }
    }

    fn step_with(capability: &str, key: &str, value: &str) -> DispatchStep {
        let mut parameters = Parameters::new();
        parameters.insert(key.to_string(), value.to_string());
        DispatchStep {
            capability: capability.to_string(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_single_dispatch_success() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(CapabilityDescriptor::new("echo", "Echo"), Arc::new(EchoHandler))
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Single { step: step("echo") };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_to_success() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                CapabilityDescriptor::new("flaky", "Flaky"),
                Arc::new(FlakyHandler {
                    failures: 2,
                    calls: AtomicU32::new(0),
                }),
            )
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Single { step: step("flaky") };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        assert!(outcome.all_succeeded());
        // Two transient failures then success; retry count stays visible
        assert_eq!(outcome.results[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_retries() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                CapabilityDescriptor::new("flaky", "Flaky"),
                Arc::new(FlakyHandler {
                    failures: 10,
                    calls: AtomicU32::new(0),
                }),
            )
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Single { step: step("flaky") };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        let result = &outcome.results[0];
        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.error.as_ref().unwrap().kind, FailureKind::Transient);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                CapabilityDescriptor::new("doomed", "Doomed"),
                Arc::new(PermanentFailHandler { calls: calls.clone() }),
            )
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Single { step: step("doomed") };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        let result = &outcome.results[0];
        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.error.as_ref().unwrap().kind, FailureKind::Permanent);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_transient() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(CapabilityDescriptor::new("slow", "Slow"), Arc::new(SlowHandler))
            .unwrap();
        let config = fast_config().with_retry(
            RetryConfig::new()
                .with_max_attempts(1)
                .with_initial_delay(Duration::from_millis(1)),
        );
        let engine = ExecutionEngine::new(Arc::new(registry), config);

        let plan = RoutingPlan::Single { step: step("slow") };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        let result = &outcome.results[0];
        assert!(!result.success);
        assert_eq!(result.error.as_ref().unwrap().kind, FailureKind::Transient);
        assert!(result.error.as_ref().unwrap().message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_required_parameter_is_permanent() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                CapabilityDescriptor::new("generate_charter", "Charter")
                    .with_parameter("project_id", true, ParamKind::Integer),
                Arc::new(CharterHandler { calls: calls.clone() }),
            )
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Single { step: step("generate_charter") };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        let result = &outcome.results[0];
        assert!(!result.success);
        assert_eq!(result.error.as_ref().unwrap().kind, FailureKind::Permanent);
        // Handler never invoked
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sequential_carries_memory_hints_forward() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                CapabilityDescriptor::new("create_project", "Create")
                    .with_parameter("name", true, ParamKind::String)
                    .with_provides("last_project_id"),
                Arc::new(CreateProjectHandler),
            )
            .unwrap();
        registry
            .register(
                CapabilityDescriptor::new("generate_charter", "Charter")
                    .with_parameter("project_id", true, ParamKind::Integer),
                Arc::new(CharterHandler { calls: calls.clone() }),
            )
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Sequential {
            steps: vec![
                step_with("create_project", "name", "App"),
                step("generate_charter"),
            ],
        };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        assert!(outcome.all_succeeded());
        let charter = &outcome.results[1];
        assert_eq!(
            charter.output.as_ref().unwrap().response_text(),
            Some("Charter for project 42")
        );
    }

    #[tokio::test]
    async fn test_sequential_permanent_failure_skips_rest() {
        let charter_calls = Arc::new(AtomicU32::new(0));
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                CapabilityDescriptor::new("doomed", "Doomed"),
                Arc::new(PermanentFailHandler {
                    calls: Arc::new(AtomicU32::new(0)),
                }),
            )
            .unwrap();
        registry
            .register(
                CapabilityDescriptor::new("generate_charter", "Charter"),
                Arc::new(CharterHandler {
                    calls: charter_calls.clone(),
                }),
            )
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Sequential {
            steps: vec![step("doomed"), step("generate_charter")],
        };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.skipped, vec!["generate_charter"]);
        assert_eq!(charter_calls.load(Ordering::SeqCst), 0);
        assert!(!outcome.all_succeeded());
    }

    #[tokio::test]
    async fn test_parallel_failure_does_not_stop_others() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(CapabilityDescriptor::new("echo", "Echo"), Arc::new(EchoHandler))
            .unwrap();
        registry
            .register(
                CapabilityDescriptor::new("doomed", "Doomed"),
                Arc::new(PermanentFailHandler {
                    calls: Arc::new(AtomicU32::new(0)),
                }),
            )
            .unwrap();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Parallel {
            steps: vec![step("doomed"), step("echo")],
        };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.any_succeeded());
        assert!(!outcome.all_succeeded());
        let echo = outcome.results.iter().find(|r| r.capability == "echo").unwrap();
        assert!(echo.success);
    }

    #[tokio::test]
    async fn test_reject_plan_executes_nothing() {
        let registry = CapabilityRegistry::new();
        let engine = ExecutionEngine::new(Arc::new(registry), fast_config());

        let plan = RoutingPlan::Reject { suggestion: None };
        let outcome = engine.execute(&plan, &ExecutionContext::new("s1")).await;
        assert!(outcome.results.is_empty());
    }
}
