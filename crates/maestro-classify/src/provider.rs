//! Classifier provider trait

use crate::error::Result;
use crate::request::{ClassifyRequest, ClassifyResponse};

/// Contract every classification provider implements
///
/// A provider maps a [`ClassifyRequest`] to a structured response whose
/// `content` is a JSON array of intent candidates. Live providers wrap an
/// LLM endpoint; the in-tree implementations are the deterministic
/// [`crate::KeywordClassifier`] and the test-only [`crate::MockClassifier`].
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Provider name, for diagnostics
    fn name(&self) -> &str;

    /// Classify the request into intent candidates
    async fn classify(&self, request: ClassifyRequest) -> Result<ClassifyResponse>;
}
