//! Demo capability set
//!
//! A small project-management capability catalog used by the CLI: enough to
//! exercise single, sequential and parallel dispatch, entity memory, and
//! clarification from a terminal.

use maestro_classify::ParamKind;
use maestro_core::{
    CapabilityDescriptor, CapabilityRegistry, ExecutionContext, Handler, HandlerError,
    HandlerOutput, Parameters,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct CreateProjectHandler {
    next_id: AtomicU64,
}

#[async_trait::async_trait]
impl Handler for CreateProjectHandler {
    async fn execute(
        &self,
        parameters: &Parameters,
        _context: &ExecutionContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let name = parameters
            .get("name")
            .ok_or_else(|| HandlerError::Permanent("a project name is required".to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(
            HandlerOutput::text(format!("Created project '{name}' with id {id}."))
                .with_hint("last_project_id", id.to_string())
                .with_hint("last_project_name", name.clone()),
        )
    }
}

struct GenerateCharterHandler;

#[async_trait::async_trait]
impl Handler for GenerateCharterHandler {
    async fn execute(
        &self,
        parameters: &Parameters,
        context: &ExecutionContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let id = parameters
            .get("project_id")
            .ok_or_else(|| HandlerError::Permanent("which project?".to_string()))?;
        let name = context.entity("last_project_name").unwrap_or("the project");
        Ok(HandlerOutput::text(format!(
            "Charter for project {id} ({name}): objectives, scope, stakeholders, milestones."
        )))
    }
}

struct AnalyzeRisksHandler;

#[async_trait::async_trait]
impl Handler for AnalyzeRisksHandler {
    async fn execute(
        &self,
        _parameters: &Parameters,
        context: &ExecutionContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let scope = context
            .entity("last_project_id")
            .map(|id| format!("project {id}"))
            .unwrap_or_else(|| "the portfolio".to_string());
        Ok(HandlerOutput::text(format!(
            "Risk register for {scope}: 2 high (schedule, budget), 1 medium (staffing)."
        )))
    }
}

struct ShowScheduleHandler;

#[async_trait::async_trait]
impl Handler for ShowScheduleHandler {
    async fn execute(
        &self,
        _parameters: &Parameters,
        _context: &ExecutionContext,
    ) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput::text(
            "Schedule: kickoff done, design review Wednesday, milestone demo Friday.",
        ))
    }
}

/// The demo registry: create/charter/risks/schedule
pub fn build_registry() -> anyhow::Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();
    registry.register(
        CapabilityDescriptor::new("create_project", "Create a new project")
            .with_example("crear proyecto")
            .with_example("nuevo proyecto")
            .with_example("new project")
            .with_parameter("name", true, ParamKind::String)
            .with_provides("last_project_id")
            .with_provides("last_project_name")
            .with_priority(10),
        Arc::new(CreateProjectHandler {
            next_id: AtomicU64::new(1),
        }),
    )?;
    registry.register(
        CapabilityDescriptor::new("generate_charter", "Generate a project charter")
            .with_example("genera el charter")
            .with_example("generate charter")
            .with_example("generate the charter")
            .with_parameter("project_id", true, ParamKind::Integer),
        Arc::new(GenerateCharterHandler),
    )?;
    registry.register(
        CapabilityDescriptor::new("analyze_risks", "Analyze project risks")
            .with_example("analiza los riesgos")
            .with_example("show me the risks")
            .with_parameter("project_id", false, ParamKind::Integer),
        Arc::new(AnalyzeRisksHandler),
    )?;
    registry.register(
        CapabilityDescriptor::new("show_schedule", "Show the project schedule")
            .with_example("muestra el cronograma")
            .with_example("show the schedule"),
        Arc::new(ShowScheduleHandler),
    )?;
    Ok(registry)
}
