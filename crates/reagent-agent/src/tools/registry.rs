//! Tool Registry — maps tool ids to descriptors and collaborators.
//!
//! Built once at startup (`install` each collaborator), then shared read-only
//! behind an `Arc`. Nothing here mutates after construction, so lookups need
//! no locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::base::{Collaborator, ToolDescriptor};

/// Startup-time configuration mistakes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("collaborator '{0}' is already registered")]
    DuplicateCollaborator(String),

    #[error("tool '{tool_id}' names unknown collaborator '{collaborator}'")]
    UnknownCollaborator { tool_id: String, collaborator: String },
}

/// Lowercase and fold `_` into `-`, so `clock.get_current_time` and
/// `Clock.get-current-time` land on the same key.
fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

#[derive(Default)]
pub struct ToolRegistry {
    collaborators: HashMap<String, Arc<dyn Collaborator>>,
    tools: HashMap<String, ToolDescriptor>,
    /// Normalized tool id or `collaborator.operation` → canonical tool id.
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a collaborator available for descriptors to reference.
    pub fn add_collaborator(
        &mut self,
        collaborator: Arc<dyn Collaborator>,
    ) -> Result<(), RegistryError> {
        let name = collaborator.name().to_string();
        if self.collaborators.contains_key(&name) {
            return Err(RegistryError::DuplicateCollaborator(name));
        }
        self.collaborators.insert(name, collaborator);
        Ok(())
    }

    /// Register one tool. The id must be new and its collaborator already added.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if self.tools.contains_key(&descriptor.tool_id) {
            return Err(RegistryError::DuplicateTool(descriptor.tool_id));
        }
        if !self.collaborators.contains_key(&descriptor.collaborator) {
            return Err(RegistryError::UnknownCollaborator {
                tool_id: descriptor.tool_id,
                collaborator: descriptor.collaborator,
            });
        }

        let keys = [
            normalize(&descriptor.tool_id),
            normalize(&descriptor.qualified_name()),
        ];
        // A normalized spelling already claimed by another tool would make lookups ambiguous.
        if let Some(taken) = keys.iter().find(|k| self.aliases.contains_key(*k)) {
            return Err(RegistryError::DuplicateTool(taken.clone()));
        }
        for key in keys {
            self.aliases.insert(key, descriptor.tool_id.clone());
        }

        info!(
            tool = %descriptor.tool_id,
            collaborator = %descriptor.collaborator,
            "registered tool"
        );
        self.tools.insert(descriptor.tool_id.clone(), descriptor);
        Ok(())
    }

    /// Add a collaborator and register every tool it advertises.
    pub fn install(&mut self, collaborator: Arc<dyn Collaborator>) -> Result<(), RegistryError> {
        let tools = collaborator.tools();
        self.add_collaborator(collaborator)?;
        for descriptor in tools {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Look up a tool by id, or by `collaborator.operation`.
    ///
    /// Exact ids win; otherwise the lookup ignores case and treats `-` and `_`
    /// as the same character.
    pub fn resolve(&self, tool_id: &str) -> Option<&ToolDescriptor> {
        self.tools.get(tool_id).or_else(|| {
            self.aliases
                .get(&normalize(tool_id))
                .and_then(|id| self.tools.get(id))
        })
    }

    /// The collaborator a descriptor points at.
    pub fn collaborator(&self, name: &str) -> Option<&Arc<dyn Collaborator>> {
        self.collaborators.get(name)
    }

    /// Check if a tool id resolves.
    pub fn has(&self, tool_id: &str) -> bool {
        self.resolve(tool_id).is_some()
    }

    /// All descriptors, sorted by tool id for determinism.
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        let mut all: Vec<&ToolDescriptor> = self.tools.values().collect();
        all.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        all
    }

    /// Tool catalogue for the system prompt, one tool per block.
    pub fn describe(&self) -> String {
        self.descriptors()
            .into_iter()
            .map(|d| {
                let mut block = format!("- {}: {}", d.signature(), d.description);
                for p in &d.params {
                    block.push_str(&format!("\n    {}: {}", p.name, p.description));
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut collaborators: Vec<&str> = self.collaborators.keys().map(String::as_str).collect();
        collaborators.sort_unstable();
        let tools: Vec<&str> = self.descriptors().iter().map(|d| d.tool_id.as_str()).collect();
        f.debug_struct("ToolRegistry")
            .field("collaborators", &collaborators)
            .field("tools", &tools)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EchoCollaborator;
    use crate::tools::base::{ParamKind, ParamSpec};

    fn echo_registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.install(Arc::new(EchoCollaborator::default())).unwrap();
        reg
    }

    #[test]
    fn test_install_registers_all_tools() {
        let reg = echo_registry();
        assert!(reg.has("echo"));
        assert!(reg.has("fail"));
        assert_eq!(reg.len(), EchoCollaborator::default().tools().len());
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut reg = echo_registry();
        let dup = ToolDescriptor::new("echo", "test", "echo", "again");
        assert_eq!(
            reg.register(dup),
            Err(RegistryError::DuplicateTool("echo".into()))
        );
    }

    #[test]
    fn test_alias_collision_rejected() {
        let mut reg = echo_registry();
        // "ECHO" normalizes onto the existing "echo"
        let clash = ToolDescriptor::new("ECHO", "test", "shout", "louder");
        assert!(matches!(reg.register(clash), Err(RegistryError::DuplicateTool(_))));
    }

    #[test]
    fn test_duplicate_collaborator_rejected() {
        let mut reg = echo_registry();
        let err = reg.install(Arc::new(EchoCollaborator::default())).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCollaborator("test".into()));
    }

    #[test]
    fn test_unknown_collaborator_rejected() {
        let mut reg = ToolRegistry::new();
        let orphan = ToolDescriptor::new("get-time", "clock", "get_current_time", "now");
        assert_eq!(
            reg.register(orphan),
            Err(RegistryError::UnknownCollaborator {
                tool_id: "get-time".into(),
                collaborator: "clock".into(),
            })
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_resolve_exact_and_qualified() {
        let reg = echo_registry();
        assert_eq!(reg.resolve("echo").unwrap().operation, "echo");
        assert_eq!(reg.resolve("test.echo").unwrap().tool_id, "echo");
        assert_eq!(reg.resolve("add-numbers").unwrap().tool_id, "add-numbers");
        assert_eq!(reg.resolve("add_numbers").unwrap().tool_id, "add-numbers");
        assert_eq!(reg.resolve("TEST.ADD").unwrap().tool_id, "add-numbers");
        assert!(reg.resolve("nope").is_none());
    }

    #[test]
    fn test_descriptors_sorted_and_describe() {
        let mut reg = echo_registry();
        reg.register(
            ToolDescriptor::new("aaa", "test", "aaa", "First alphabetically")
                .param(ParamSpec::optional("n", ParamKind::Integer, "How many")),
        )
        .unwrap();

        let ids: Vec<&str> = reg.descriptors().iter().map(|d| d.tool_id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        let catalogue = reg.describe();
        assert!(catalogue.starts_with("- aaa(n?: integer): First alphabetically"));
        assert!(catalogue.contains("n: How many"));
        assert!(catalogue.contains("- echo(text: string)"));
    }

    #[test]
    fn test_debug_lists_collaborators_and_tools() {
        let rendered = format!("{:?}", echo_registry());
        assert!(rendered.starts_with("ToolRegistry"));
        assert!(rendered.contains(r#"collaborators: ["test"]"#));
        assert!(rendered.contains(r#"tools: ["add-numbers", "browse-url", "echo", "#));
    }
}
