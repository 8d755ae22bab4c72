//! Capability catalog wire types
//!
//! The catalog is the read-only view of registered capabilities that is sent
//! to the classification provider with every request. It constrains the set
//! of capability names the provider may answer with.

use serde::{Deserialize, Serialize};

/// Parameter kinds a capability may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Free-form text
    String,
    /// Whole number (ids, counts)
    Integer,
    /// true/false flag
    Boolean,
}

/// One declared parameter of a capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogParameter {
    /// Parameter name
    pub name: String,
    /// Whether the parameter must be present for dispatch
    pub required: bool,
    /// Parameter kind
    pub kind: ParamKind,
}

/// One capability as presented to the classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Unique capability name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Example utterances / keyword triggers
    pub examples: Vec<String>,
    /// Declared parameters
    pub parameters: Vec<CatalogParameter>,
}

impl CatalogEntry {
    /// Create a catalog entry
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            examples: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Add an example utterance
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Add a declared parameter
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, required: bool, kind: ParamKind) -> Self {
        self.parameters.push(CatalogParameter {
            name: name.into(),
            required,
            kind,
        });
        self
    }
}
