//! Mock classifier for testing
//!
//! Returns queued responses (or errors) in FIFO order, with an empty
//! candidate list as the default when the queue runs dry.

use crate::error::{Error, Result};
use crate::provider::Classifier;
use crate::request::{ClassifyRequest, ClassifyResponse};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A mock classifier that returns queued responses or a default empty one.
pub struct MockClassifier {
    queue: Arc<Mutex<VecDeque<Result<ClassifyResponse>>>>,
    requests: Arc<Mutex<Vec<ClassifyRequest>>>,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassifier {
    /// Create a new mock classifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a raw content response.
    pub fn push_content(&self, content: impl Into<String>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(ClassifyResponse {
                content: content.into(),
                provider: "mock".to_string(),
            }));
    }

    /// Queue an error.
    pub fn push_error(&self, error: Error) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Requests seen so far (for asserting prompt context).
    #[must_use]
    pub fn seen_requests(&self) -> Vec<ClassifyRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl Classifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn classify(&self, request: ClassifyRequest) -> Result<ClassifyResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = queue.pop_front() {
            next
        } else {
            // Default behavior if queue empty: no candidates
            Ok(ClassifyResponse {
                content: "[]".to_string(),
                provider: "mock".to_string(),
            })
        }
    }
}
