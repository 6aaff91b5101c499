//! Command handlers.
//!
//! [`Context::bootstrap`] builds everything a command needs in a fixed
//! order: load the configuration file, build the script-driven manager from
//! it, register both, validate the registry, then open the version cache.
//! Handlers write their human-readable output to the writer they are given.

pub mod batch;
pub mod link;
pub mod query;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, debug};
use tvm_core::cache::RemoteVersionsCache;
use tvm_core::config::LocalFileConfig;
use tvm_core::tools::{Registry, SCRIPTS_DRIVEN, Tool, ToolVersionManager};
use tvm_tools_script::ScriptsDrivenManager;

use crate::cli::{Cli, CliError, Commands, ListCommands};

/// File name looked up in the platform configuration directory.
pub const CONFIG_FILE_NAME: &str = "tvm_config.yaml";

/// `<platform config dir>/tvm/tvm_config.yaml`
pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("tvm").join(CONFIG_FILE_NAME))
        .ok_or_else(|| {
            CliError::config_with_help(
                "Could not determine the configuration directory",
                "Pass --config or set TVM_CONFIG",
            )
        })
}

/// Everything a command runs against.
pub struct Context {
    /// Tool managers and configuration sources.
    pub registry: Arc<Registry>,
    /// Latest remote versions seen so far.
    pub cache: RemoteVersionsCache,
}

impl Context {
    /// Load the configuration at `config_path` and wire up the registry.
    pub fn bootstrap(config_path: &Path) -> Result<Self, CliError> {
        debug!(config = %config_path.display(), "Bootstrapping");

        let config = LocalFileConfig::open(config_path).map_err(|e| {
            CliError::from(e).with_help(format!(
                "Check the configuration file at {}",
                config_path.display()
            ))
        })?;
        let manager = ScriptsDrivenManager::from_config(&config);
        let cache = RemoteVersionsCache::open(config.cache_file_path())?;

        let mut registry = Registry::new();
        registry.register_config(SCRIPTS_DRIVEN, Arc::new(config))?;
        registry.register_manager(Arc::new(manager))?;
        registry.validate()?;

        Ok(Self {
            registry: Arc::new(registry),
            cache,
        })
    }

    /// Look up a tool and the manager for its type.
    pub fn resolve(&self, id: &str) -> Result<(Tool, Arc<dyn ToolVersionManager>), CliError> {
        Ok(self.registry.resolve(id)?)
    }
}

/// Run the parsed command line, writing command output to `out`.
pub async fn run(cli: Cli, out: &mut dyn Write) -> Result<(), CliError> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut ctx = Context::bootstrap(&config_path)?;

    let span = crate::tracing::command_span(cli.command.name());
    execute(cli.command, &mut ctx, out).instrument(span).await
}

/// Dispatch one command against a bootstrapped context.
pub async fn execute(
    command: Commands,
    ctx: &mut Context,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Commands::Fetch { batch } => batch::fetch(ctx, &batch, out).await,
        Commands::Upgrade { batch, force } => batch::upgrade(ctx, &batch, force, out).await,
        Commands::Install { tool_id, version } => {
            link::install(ctx, &tool_id, &version, out).await
        }
        Commands::Link { tool_id, version } => link::link(ctx, &tool_id, &version, out).await,
        Commands::Unlink { tool_id } => link::unlink(ctx, &tool_id, out).await,
        Commands::Latest { tool_id } => query::latest(ctx, &tool_id, out).await,
        Commands::Current { tool_id } => query::current(ctx, &tool_id, out).await,
        Commands::List { subcommand } => match subcommand {
            ListCommands::Local { tool_id } => query::list_local(ctx, &tool_id, out).await,
            ListCommands::Remote { tool_id } => query::list_remote(ctx, &tool_id, out).await,
        },
    }
}
