//! Registry of tools available to the active agent.
//!
//! Populated once at session setup and read-only afterwards; tool sets are
//! not added or removed mid-conversation, so the registry is shared without
//! locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::VoiceError;

use super::definition::ToolDefinition;

/// Named set of callable tool definitions.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<ToolDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from definitions, failing on duplicate names.
    pub fn from_definitions<I>(definitions: I) -> Result<Self, VoiceError>
    where
        I: IntoIterator<Item = ToolDefinition>,
    {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Register a definition. Fails when the name is already taken.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), VoiceError> {
        if self.tools.contains_key(&definition.name) {
            return Err(VoiceError::DuplicateTool(definition.name));
        }
        self.tools
            .insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Resolve a definition by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<ToolDefinition>, VoiceError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| VoiceError::UnknownTool(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names, sorted for stable output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
