//! Step-chained script execution.
//!
//! A lifecycle operation is an ordered list of [`ScriptStep`]s. Each step's
//! template is rendered against an [`ExecutionScope`], run as a single
//! command line by the configured shell, and its combined output is recorded
//! under the step's name so later steps can refer to it as
//! `{{ StepOutputs.<name> }}`.

mod template;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};

use crate::{Error, Result};

pub use template::render;

/// Shell used when none is configured.
pub const DEFAULT_SHELL: &str = "bash";

/// One named script in a step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Log label and key in `StepOutputs`.
    pub name: String,
    /// Template rendered into a single shell command line.
    pub script: String,
}

impl ScriptStep {
    /// Create a step.
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
        }
    }
}

/// Configuration values exposed to templates as `Config.*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeConfig {
    /// `Config.DownloadsDir`
    pub downloads_dir: String,
    /// `Config.SymlinksDir`
    pub symlinks_dir: String,
    /// `Config.GitHubToken`
    pub github_token: String,
}

/// Variables visible to step templates during one invocation.
///
/// Cloned for every chain run, so concurrent operations on the same tool
/// never share step outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionScope {
    /// `Config.*` values.
    pub config: ScopeConfig,
    /// The tool record exposed as `Tool`.
    pub tool: Value,
    /// Positional argument, visible as `Arg` to the first step only.
    pub arg: String,
    /// Outputs of steps that already ran, by step name.
    pub step_outputs: BTreeMap<String, String>,
}

impl ExecutionScope {
    /// Scope with no argument and no recorded outputs.
    #[must_use]
    pub fn new(config: ScopeConfig, tool: Value) -> Self {
        Self {
            config,
            tool,
            arg: String::new(),
            step_outputs: BTreeMap::new(),
        }
    }

    /// Set the positional argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = arg.into();
        self
    }

    fn template_data(&self, arg: &str) -> Value {
        json!({
            "Config": {
                "DownloadsDir": self.config.downloads_dir,
                "SymlinksDir": self.config.symlinks_dir,
                "GitHubToken": self.config.github_token,
            },
            "Tool": self.tool,
            "Arg": arg,
            "StepOutputs": self.step_outputs,
        })
    }
}

/// Result of a completed step chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    /// Captured output of the last step.
    pub output: String,
    /// The scope after every step ran, including all step outputs.
    pub scope: ExecutionScope,
}

/// Runs step lists through a shell interpreter.
#[derive(Debug, Clone)]
pub struct StepExecutor {
    shell: String,
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl StepExecutor {
    /// Executor invoking `<shell> -c <script>` for every step.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// The interpreter this executor launches.
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Run `steps` in order and return the output of the last one.
    ///
    /// `label` names the step list in errors and logs.
    pub async fn execute(
        &self,
        label: &str,
        steps: &[ScriptStep],
        scope: &ExecutionScope,
    ) -> Result<String> {
        Ok(self.run_chain(label, steps, scope).await?.output)
    }

    /// Run `steps` in order, returning the last output and the final scope.
    ///
    /// Stops at the first failing step. The caller's scope is never mutated.
    pub async fn run_chain(
        &self,
        label: &str,
        steps: &[ScriptStep],
        scope: &ExecutionScope,
    ) -> Result<ChainOutput> {
        if steps.is_empty() {
            return Err(Error::EmptySteps {
                operation: label.to_string(),
            });
        }

        let mut scope = scope.clone();
        let mut output = String::new();

        for (index, step) in steps.iter().enumerate() {
            let arg = if index == 0 { scope.arg.as_str() } else { "" };
            let script = render(&step.script, &scope.template_data(arg))
                .map_err(|message| Error::template(&step.name, message))?;

            debug!(chain = label, step = %step.name, %script, "Running step");
            output = self.run_step(&step.name, &script).await?;
            debug!(chain = label, step = %step.name, %output, "Step finished");

            scope.step_outputs.insert(step.name.clone(), output.clone());
        }

        Ok(ChainOutput { output, scope })
    }

    async fn run_step(&self, name: &str, script: &str) -> Result<String> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| Error::StepSpawn {
                step: name.to_string(),
                shell: self.shell.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            error!(
                step = name,
                code = ?output.status.code(),
                output = %combined,
                "Step failed"
            );
            return Err(Error::StepFailed {
                step: name.to_string(),
                status: output.status.code(),
                output: combined,
            });
        }

        Ok(combined)
    }
}
