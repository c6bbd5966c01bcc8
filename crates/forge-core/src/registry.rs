//! Registry of installable commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::command::{Command, CommandMetadata, UiContext};
use crate::controller::{Controller, StepController};
use crate::error::{ForgeError, Result};

/// Maps command names to implementations. Names are kept sorted so error
/// messages and listings are stable.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_builtin_commands() -> Self {
        let mut registry = Self::new();
        for command in crate::commands::builtin() {
            registry.register(command);
        }
        registry
    }

    /// Register a command under its metadata name, replacing any previous one.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.metadata().name;
        debug!("Registering command: {}", name);
        self.commands.insert(name, command);
    }

    /// Keep only the named commands. Unknown names are ignored.
    pub fn retain(&mut self, names: &[String]) {
        self.commands.retain(|name, _| names.contains(name));
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn metadata(&self) -> Vec<CommandMetadata> {
        self.commands.values().map(|c| c.metadata()).collect()
    }

    pub fn is_wizard(&self, name: &str) -> bool {
        self.commands
            .get(name)
            .is_some_and(|c| c.steps().len() > 1)
    }

    /// Fail with [`ForgeError::CommandNotFound`] unless `name` is registered.
    pub fn ensure(&self, name: &str) -> Result<Arc<dyn Command>> {
        self.commands
            .get(name)
            .cloned()
            .ok_or_else(|| ForgeError::CommandNotFound {
                name: name.to_string(),
                known: self.names(),
            })
    }

    /// Create and initialize a fresh controller bound to `ui`.
    pub fn open(&self, name: &str, ui: UiContext) -> Result<Box<dyn Controller>> {
        let command = self.ensure(name)?;
        let mut controller = StepController::new(command, ui);
        controller.initialize()?;
        Ok(Box::new(controller))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_commands_are_sorted() {
        let registry = CommandRegistry::with_builtin_commands();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"new-project".to_string()));
    }

    #[test]
    fn unknown_command_lists_known_names() {
        let registry = CommandRegistry::with_builtin_commands();
        let err = registry
            .open("unknown-cmd", UiContext::new("/tmp"))
            .err()
            .unwrap();
        match err {
            ForgeError::CommandNotFound { name, known } => {
                assert_eq!(name, "unknown-cmd");
                assert_eq!(known, registry.names());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn open_returns_initialized_controller() {
        let registry = CommandRegistry::with_builtin_commands();
        let mut controller = registry
            .open("new-project", UiContext::new("/tmp"))
            .unwrap();
        assert!(controller.as_wizard_mut().is_some());
        let inputs = controller.describe_inputs();
        let version = inputs["inputs"]
            .as_array()
            .unwrap()
            .iter()
            .find(|i| i["name"] == "version")
            .unwrap();
        assert_eq!(version["value"], "1.0.0-SNAPSHOT");
    }

    #[test]
    fn retain_restricts_commands() {
        let mut registry = CommandRegistry::with_builtin_commands();
        registry.retain(&["import-git".to_string(), "missing".to_string()]);
        assert_eq!(registry.names(), vec!["import-git".to_string()]);
    }
}
