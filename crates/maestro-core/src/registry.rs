//! Capability registry
//!
//! Capabilities are registered once at startup on `&mut self`; the registry
//! is then shared behind an `Arc` and read concurrently without locking.

use crate::error::{Error, Result};
use crate::handler::Handler;
use maestro_classify::{CatalogEntry, CatalogParameter, ParamKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One declared parameter of a capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,
    /// Whether dispatch requires a value
    pub required: bool,
    /// Parameter kind
    pub kind: ParamKind,
}

/// Static description of a registered capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Unique capability name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Example utterances / keyword triggers
    pub examples: Vec<String>,
    /// Declared parameter schema
    pub parameters: Vec<ParameterSpec>,
    /// Priority rank used to break confidence ties (higher wins)
    pub priority: u32,
    /// Entity-memory keys this capability's handler emits; used to order
    /// sequential dispatch (a step requiring one of these keys runs after
    /// the step that provides it)
    pub provides: Vec<String>,
    /// Per-handler deadline override
    pub timeout: Option<Duration>,
}

impl CapabilityDescriptor {
    /// Create a descriptor
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            examples: Vec::new(),
            parameters: Vec::new(),
            priority: 0,
            provides: Vec::new(),
            timeout: None,
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
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        required: bool,
        kind: ParamKind,
    ) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            required,
            kind,
        });
        self
    }

    /// Set the priority rank
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Declare an emitted entity-memory key
    #[must_use]
    pub fn with_provides(mut self, key: impl Into<String>) -> Self {
        self.provides.push(key.into());
        self
    }

    /// Override the per-handler deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Names of required parameters
    #[must_use]
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// The catalog view sent to the classifier
    #[must_use]
    pub fn to_catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            name: self.name.clone(),
            description: self.description.clone(),
            examples: self.examples.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|p| CatalogParameter {
                    name: p.name.clone(),
                    required: p.required,
                    kind: p.kind,
                })
                .collect(),
        }
    }
}

struct Capability {
    descriptor: CapabilityDescriptor,
    handler: Arc<dyn Handler>,
}

/// Catalog of registered capabilities
///
/// Write path exists only before the registry is shared; afterwards all
/// access is read-only.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Capability>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability with its handler
    ///
    /// # Errors
    /// Returns `DuplicateCapability` if the name is already registered.
    pub fn register(
        &mut self,
        descriptor: CapabilityDescriptor,
        handler: Arc<dyn Handler>,
    ) -> Result<()> {
        if self.capabilities.contains_key(&descriptor.name) {
            return Err(Error::DuplicateCapability(descriptor.name));
        }
        info!(capability = %descriptor.name, "Registered capability");
        self.capabilities
            .insert(descriptor.name.clone(), Capability { descriptor, handler });
        Ok(())
    }

    /// All descriptors, sorted by name
    #[must_use]
    pub fn list(&self) -> Vec<&CapabilityDescriptor> {
        let mut descriptors: Vec<_> = self.capabilities.values().map(|c| &c.descriptor).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Find a descriptor by name
    ///
    /// # Errors
    /// Returns `UnknownCapability` if absent.
    pub fn find(&self, name: &str) -> Result<&CapabilityDescriptor> {
        self.capabilities
            .get(name)
            .map(|c| &c.descriptor)
            .ok_or_else(|| Error::UnknownCapability(name.to_string()))
    }

    /// The handler for a capability
    ///
    /// # Errors
    /// Returns `UnknownCapability` if absent.
    pub fn handler(&self, name: &str) -> Result<Arc<dyn Handler>> {
        self.capabilities
            .get(name)
            .map(|c| c.handler.clone())
            .ok_or_else(|| Error::UnknownCapability(name.to_string()))
    }

    /// Whether a capability is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Number of registered capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// The catalog sent to the classifier, sorted by name
    #[must_use]
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.list()
            .into_iter()
            .map(CapabilityDescriptor::to_catalog_entry)
            .collect()
    }
}
