//! Orchestrator configuration

use crate::utils::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when a second turn arrives for a session that is mid-turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Return `SessionBusy` immediately
    FailFast,
    /// Wait for the running turn; waiters proceed in arrival order
    Queue,
}

/// Configuration for the orchestration core
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Candidates below this confidence trigger clarification/rejection
    pub confidence_threshold: f64,
    /// Candidates within this window of each other are ambiguous
    pub ambiguity_window: f64,
    /// Default per-handler deadline
    pub handler_timeout: Duration,
    /// Deadline for the classification call
    pub classify_timeout: Duration,
    /// Retry behavior for transient handler failures
    pub retry: RetryConfig,
    /// Concurrent-turn policy per session id
    pub busy_policy: BusyPolicy,
    /// How many entity-memory entries are sent to the classifier
    pub memory_window: usize,
    /// How many recent turn inputs are sent to the classifier
    pub history_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            ambiguity_window: 0.05,
            handler_timeout: Duration::from_secs(30),
            classify_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            busy_policy: BusyPolicy::FailFast,
            memory_window: 16,
            history_window: 8,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confidence threshold
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the ambiguity window
    #[must_use]
    pub fn with_ambiguity_window(mut self, window: f64) -> Self {
        self.ambiguity_window = window;
        self
    }

    /// Set the default per-handler deadline
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Set the classification deadline
    #[must_use]
    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the busy policy
    #[must_use]
    pub fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }

    /// Set the entity-memory window size
    #[must_use]
    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.ambiguity_window, 0.05);
        assert_eq!(config.handler_timeout, Duration::from_secs(30));
        assert_eq!(config.busy_policy, BusyPolicy::FailFast);
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::new()
            .with_confidence_threshold(0.7)
            .with_handler_timeout(Duration::from_secs(5))
            .with_busy_policy(BusyPolicy::Queue);

        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.handler_timeout, Duration::from_secs(5));
        assert_eq!(config.busy_policy, BusyPolicy::Queue);
    }
}
