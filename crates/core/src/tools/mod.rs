//! Tool records, the version manager trait and the registry that ties them together.
//!
//! # Architecture
//!
//! - [`Tool`] - A declared tool; a closed set of variants tagged by `type`
//! - [`ToolVersionManager`] - Trait implemented by each driver (script-driven, ...)
//! - [`Registry`] - Maps a type tag to its manager and configuration source
//! - [`TransitionOutcome`] - Result of the link/unlink protocol
//!
//! # Example
//!
//! ```ignore
//! use tvm_core::tools::Registry;
//!
//! let mut registry = Registry::new();
//! registry.register_config(SCRIPTS_DRIVEN, Arc::new(config))?;
//! registry.register_manager(Arc::new(ScriptsDrivenManager::new(scope_config, executor)))?;
//! registry.validate()?;
//!
//! let (tool, manager) = registry.resolve("jq")?;
//! let latest = manager.latest_remote_version(&tool).await?;
//! ```

mod manager;
mod model;
mod registry;

pub use manager::{LinkState, ToolLinkInfo, ToolVersionManager, TransitionOutcome};
pub use model::{
    ALL_TOOLS, LifecycleOperation, LifecycleScripts, SCRIPTS_DRIVEN, ScriptSource,
    ScriptsDrivenTool, Tool, ToolSet, ToolSymlink, shell_symlinks, validate_tool_id,
    validate_tool_ids,
};
pub use registry::Registry;
