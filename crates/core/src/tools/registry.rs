//! Registry of version managers and configuration sources.
//!
//! Built once at startup, then shared read-only (typically behind an `Arc`)
//! by the command layer and the batch orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use super::manager::ToolVersionManager;
use super::model::{Tool, validate_tool_ids};
use crate::config::ConfigStore;
use crate::{Error, Result};

/// Maps tool type tags to their manager and configuration source.
#[derive(Default)]
pub struct Registry {
    managers: HashMap<&'static str, Arc<dyn ToolVersionManager>>,
    configs: HashMap<String, Arc<dyn ConfigStore>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version manager under its own tool type.
    ///
    /// Fails if a manager is already registered for that type.
    pub fn register_manager(&mut self, manager: Arc<dyn ToolVersionManager>) -> Result<()> {
        let tool_type = manager.tool_type();
        if self.managers.contains_key(tool_type) {
            return Err(Error::DuplicateRegistration {
                kind: "Tool manager",
                tool_type: tool_type.to_string(),
            });
        }
        tracing::debug!(tool_type, "Registered tool manager");
        self.managers.insert(tool_type, manager);
        Ok(())
    }

    /// Register the configuration source owning tools of `tool_type`.
    ///
    /// Fails if a source is already registered for that type.
    pub fn register_config(
        &mut self,
        tool_type: impl Into<String>,
        config: Arc<dyn ConfigStore>,
    ) -> Result<()> {
        let tool_type = tool_type.into();
        if self.configs.contains_key(&tool_type) {
            return Err(Error::DuplicateRegistration {
                kind: "Config source",
                tool_type,
            });
        }
        tracing::debug!(tool_type = %tool_type, "Registered config source");
        self.configs.insert(tool_type, config);
        Ok(())
    }

    /// The manager for a tool type.
    pub fn manager(&self, tool_type: &str) -> Result<&Arc<dyn ToolVersionManager>> {
        self.managers
            .get(tool_type)
            .ok_or_else(|| Error::ManagerNotRegistered {
                tool_type: tool_type.to_string(),
                registered: self.tool_types().iter().map(ToString::to_string).collect(),
            })
    }

    /// The configuration source for a tool type.
    pub fn config(&self, tool_type: &str) -> Result<&Arc<dyn ConfigStore>> {
        self.configs
            .get(tool_type)
            .ok_or_else(|| Error::ConfigNotRegistered {
                tool_type: tool_type.to_string(),
                registered: self.config_types().iter().map(ToString::to_string).collect(),
            })
    }

    /// Tool types with a registered manager, sorted.
    #[must_use]
    pub fn tool_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.managers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Tool types with a registered configuration source, sorted.
    #[must_use]
    pub fn config_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.configs.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Every tool declared by every configuration source.
    ///
    /// Sources are visited in type order; each contributes only the tools of
    /// the type it is registered for.
    #[must_use]
    pub fn all_tools(&self) -> Vec<Tool> {
        self.config_types()
            .into_iter()
            .filter_map(|tool_type| {
                self.configs
                    .get(tool_type)
                    .map(|config| (tool_type, config))
            })
            .flat_map(|(tool_type, config)| {
                config
                    .tools()
                    .iter()
                    .filter(move |tool| tool.tool_type() == tool_type)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Ids of every declared tool.
    #[must_use]
    pub fn tool_ids(&self) -> Vec<String> {
        self.all_tools()
            .iter()
            .map(|tool| tool.id().to_string())
            .collect()
    }

    /// Find a tool by id across all configuration sources.
    pub fn find_tool(&self, id: &str) -> Result<Tool> {
        let tools = self.all_tools();
        if let Some(tool) = tools.iter().find(|tool| tool.id() == id) {
            return Ok(tool.clone());
        }
        Err(Error::ToolNotFound {
            id: id.to_string(),
            available: tools.iter().map(|tool| tool.id().to_string()).collect(),
        })
    }

    /// Find a tool and the manager responsible for it.
    pub fn resolve(&self, id: &str) -> Result<(Tool, Arc<dyn ToolVersionManager>)> {
        let tool = self.find_tool(id)?;
        let manager = Arc::clone(self.manager(tool.tool_type())?);
        Ok((tool, manager))
    }

    /// Check that every declared tool has a manager and that ids are unique
    /// across all configuration sources.
    pub fn validate(&self) -> Result<()> {
        let tools = self.all_tools();
        for tool in &tools {
            self.manager(tool.tool_type())?;
        }
        validate_tool_ids(tools.iter().map(Tool::id))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("managers", &self.tool_types())
            .field("configs", &self.config_types())
            .finish()
    }
}
