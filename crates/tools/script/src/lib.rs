//! Script-driven version manager for tvm.
//!
//! Every lifecycle operation of a `scripts_driven` tool is a list of shell
//! steps from its configuration:
//! - `getAllLocalVersions` / `getAllRemoteVersions`: one version per output line
//! - `getLatestRemoteVersion`: the trimmed output is the version
//! - `fetchToolForVersion`: receives the version as `Arg`, must print nothing
//! - `getLinkInfo`: prints `{"version": ..., "linked_at": ...}`
//! - `linkTool` / `unlinkTool`: switch the active version, with best-effort
//!   compensation when they fail part way

use async_trait::async_trait;
use tracing::{info, warn};
use tvm_core::config::LocalFileConfig;
use tvm_core::steps::{ExecutionScope, ScopeConfig, StepExecutor};
use tvm_core::tools::{
    LifecycleOperation, LinkState, SCRIPTS_DRIVEN, Tool, ToolLinkInfo, ToolVersionManager,
    TransitionOutcome,
};
use tvm_core::{Error, Result, ToolVersion};

/// Version manager for `scripts_driven` tools.
#[derive(Debug, Clone)]
pub struct ScriptsDrivenManager {
    scope_config: ScopeConfig,
    executor: StepExecutor,
}

impl ScriptsDrivenManager {
    /// Create a manager exposing `scope_config` to templates and running
    /// steps with `executor`.
    #[must_use]
    pub fn new(scope_config: ScopeConfig, executor: StepExecutor) -> Self {
        Self {
            scope_config,
            executor,
        }
    }

    /// Create a manager from a loaded configuration file.
    #[must_use]
    pub fn from_config(config: &LocalFileConfig) -> Self {
        Self::new(config.scope_config(), StepExecutor::new(config.shell()))
    }

    /// Run the step list of `operation` with `arg` for the first step.
    async fn run(&self, tool: &Tool, operation: LifecycleOperation, arg: &str) -> Result<String> {
        let Tool::ScriptsDriven(spec) = tool;
        let steps = spec.source.scripts.steps(operation);
        let scope =
            ExecutionScope::new(self.scope_config.clone(), tool.template_value()?).with_arg(arg);

        self.executor
            .execute(operation.as_str(), steps, &scope)
            .await
            .map_err(|e| Error::script(tool.id(), operation.as_str(), e))
    }

    async fn versions(&self, tool: &Tool, operation: LifecycleOperation) -> Result<Vec<ToolVersion>> {
        let output = self.run(tool, operation, "").await?;
        Ok(parse_versions(&output))
    }

    /// Put the tool back into `state` after a failed transition.
    async fn restore(&self, tool: &Tool, state: &LinkState) -> Result<()> {
        match state {
            LinkState::LinkedTo(previous) => {
                warn!(tool = tool.id(), version = %previous, "Restoring previous version");
                self.run(tool, LifecycleOperation::Link, previous.as_str())
                    .await
                    .map(drop)
            }
            LinkState::Unlinked => {
                warn!(tool = tool.id(), "Restoring unlinked state");
                self.run(tool, LifecycleOperation::Unlink, "").await.map(drop)
            }
        }
    }

    async fn compensate(&self, tool: &Tool, error: Error, state: &LinkState) -> TransitionOutcome {
        match self.restore(tool, state).await {
            Ok(()) => TransitionOutcome::FailedRestored { error },
            Err(compensation_error) => {
                warn!(
                    tool = tool.id(),
                    error = %compensation_error,
                    "Failed to restore previous link state"
                );
                TransitionOutcome::FailedUnrestored {
                    error,
                    compensation_error,
                }
            }
        }
    }
}

/// Split script output into versions, one per non-blank line.
fn parse_versions(output: &str) -> Vec<ToolVersion> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToolVersion::from)
        .collect()
}

#[async_trait]
impl ToolVersionManager for ScriptsDrivenManager {
    fn tool_type(&self) -> &'static str {
        SCRIPTS_DRIVEN
    }

    fn description(&self) -> &'static str {
        "Runs user-supplied shell steps for every lifecycle operation"
    }

    async fn local_versions(&self, tool: &Tool) -> Result<Vec<ToolVersion>> {
        self.versions(tool, LifecycleOperation::LocalVersions).await
    }

    async fn remote_versions(&self, tool: &Tool) -> Result<Vec<ToolVersion>> {
        self.versions(tool, LifecycleOperation::RemoteVersions).await
    }

    async fn latest_remote_version(&self, tool: &Tool) -> Result<ToolVersion> {
        let output = self
            .run(tool, LifecycleOperation::LatestRemoteVersion, "")
            .await?;
        Ok(ToolVersion::from(output.trim()))
    }

    async fn link_info(&self, tool: &Tool) -> Result<ToolLinkInfo> {
        let operation = LifecycleOperation::LinkInfo;
        let output = self.run(tool, operation, "").await?;
        serde_json::from_str(output.trim()).map_err(|e| {
            Error::malformed_output(
                tool.id(),
                operation.as_str(),
                format!("expected a JSON object with version and linked_at ({e}), got: {output}"),
            )
        })
    }

    async fn install(&self, tool: &Tool, version: &ToolVersion) -> Result<()> {
        let output = self
            .run(tool, LifecycleOperation::Fetch, version.as_str())
            .await?;
        if !output.is_empty() {
            return Err(Error::UnexpectedOutput {
                tool: tool.id().to_string(),
                version: version.to_string(),
                output,
            });
        }
        info!(tool = tool.id(), %version, "Installed");
        Ok(())
    }

    async fn link(&self, tool: &Tool, version: &ToolVersion) -> Result<TransitionOutcome> {
        if version.is_empty() {
            return Err(Error::invalid_argument(format!(
                "Cannot link {} to an empty version",
                tool.id()
            )));
        }

        let previous = self.link_info(tool).await?.state();

        match self.run(tool, LifecycleOperation::Link, version.as_str()).await {
            Ok(_) => {
                info!(tool = tool.id(), %version, "Linked");
                Ok(TransitionOutcome::Succeeded)
            }
            Err(error) => Ok(self.compensate(tool, error, &previous).await),
        }
    }

    async fn unlink(&self, tool: &Tool) -> Result<TransitionOutcome> {
        let previous = self.link_info(tool).await?.state();
        if previous == LinkState::Unlinked {
            return Err(Error::NotLinked {
                tool: tool.id().to_string(),
            });
        }

        match self.run(tool, LifecycleOperation::Unlink, "").await {
            Ok(_) => {
                info!(tool = tool.id(), "Unlinked");
                Ok(TransitionOutcome::Succeeded)
            }
            Err(error) => Ok(self.compensate(tool, error, &previous).await),
        }
    }
}
