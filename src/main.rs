//! Maestro demo CLI
//!
//! Runs the orchestration core against the demo capability catalog and the
//! deterministic keyword classifier. One-shot mode answers a single input;
//! without an input it reads lines from stdin.

mod demo;

use anyhow::Context;
use clap::Parser;
use maestro_core::{
    BusyPolicy, MemorySessionStore, OrchestrationController, OrchestratorConfig, TurnStatus,
};
use maestro_classify::KeywordClassifier;
use serde::Deserialize;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maestro", about = "Multi-agent orchestration demo", version)]
struct Cli {
    /// One-shot input; starts a line-oriented REPL when omitted
    input: Option<String>,

    /// Session id carrying memory across turns
    #[arg(long, default_value = "local")]
    session: String,

    /// Print the session summary after each response
    #[arg(long)]
    summary: bool,
}

/// File/env settings (config/default.toml, MAESTRO_* overrides)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
    confidence_threshold: f64,
    ambiguity_window: f64,
    handler_timeout_secs: u64,
    queue_busy_turns: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            ambiguity_window: 0.05,
            handler_timeout_secs: 30,
            queue_busy_turns: false,
        }
    }
}

impl Settings {
    fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("MAESTRO"))
            .build()
            .context("failed to read configuration")?;
        settings
            .try_deserialize()
            .context("invalid configuration values")
    }

    fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new()
            .with_confidence_threshold(self.confidence_threshold)
            .with_ambiguity_window(self.ambiguity_window)
            .with_handler_timeout(Duration::from_secs(self.handler_timeout_secs))
            .with_busy_policy(if self.queue_busy_turns {
                BusyPolicy::Queue
            } else {
                BusyPolicy::FailFast
            })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maestro=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load()?;

    let controller = OrchestrationController::new(
        demo::build_registry()?,
        Arc::new(KeywordClassifier::new()),
        Arc::new(MemorySessionStore::new()),
        settings.orchestrator_config(),
    );

    let status = controller.system_status();
    info!(
        capabilities = status.capability_count,
        "Maestro ready: {}",
        status.capabilities.join(", ")
    );

    match cli.input {
        Some(text) => {
            respond(&controller, &cli.session, &text, cli.summary).await;
        }
        None => {
            println!("maestro: type a request, or 'quit' to exit.");
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = line.context("failed to read stdin")?;
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if text == "quit" || text == "exit" {
                    break;
                }
                respond(&controller, &cli.session, text, cli.summary).await;
            }
        }
    }
    Ok(())
}

async fn respond(
    controller: &OrchestrationController,
    session: &str,
    text: &str,
    summary: bool,
) {
    let response = controller.process_request(session, text).await;
    match response.status {
        TurnStatus::Success => println!("{}", response.text),
        status => println!("[{}] {}", status_label(status), response.text),
    }
    if summary {
        if let Ok(s) = controller.session_summary(session).await {
            println!(
                "-- turns: {}, last intent: {}",
                s.turn_count,
                s.last_intent.as_deref().unwrap_or("none")
            );
        }
    }
}

fn status_label(status: TurnStatus) -> &'static str {
    match status {
        TurnStatus::Success => "ok",
        TurnStatus::PartialSuccess => "partial",
        TurnStatus::Failed => "failed",
        TurnStatus::Clarification => "clarify",
        TurnStatus::Rejected => "rejected",
    }
}
