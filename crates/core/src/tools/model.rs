//! Declarative tool records.
//!
//! Tools are a closed set of variants discriminated by their `type` field.
//! The only variant today is the script-driven one, whose lifecycle is a set
//! of named step lists run through the [`StepExecutor`](crate::steps::StepExecutor).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::steps::ScriptStep;
use crate::{Error, Result};

/// Type tag of [`Tool::ScriptsDriven`].
pub const SCRIPTS_DRIVEN: &str = "scripts_driven";

/// Reserved selector meaning "every configured tool". Never a valid tool id.
pub const ALL_TOOLS: &str = "all";

/// A declared tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Tool {
    /// Lifecycle driven entirely by user-supplied shell steps.
    #[serde(rename = "scripts_driven")]
    ScriptsDriven(ScriptsDrivenTool),
}

impl Tool {
    /// Unique tool id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::ScriptsDriven(tool) => &tool.id,
        }
    }

    /// Type tag used to pick the version manager.
    #[must_use]
    pub fn tool_type(&self) -> &'static str {
        match self {
            Self::ScriptsDriven(_) => SCRIPTS_DRIVEN,
        }
    }

    /// Declared symlinks.
    #[must_use]
    pub fn symlinks(&self) -> &[ToolSymlink] {
        match self {
            Self::ScriptsDriven(tool) => &tool.symlinks,
        }
    }

    /// The script-driven payload, if this is a script-driven tool.
    #[must_use]
    pub fn as_scripts_driven(&self) -> Option<&ScriptsDrivenTool> {
        match self {
            Self::ScriptsDriven(tool) => Some(tool),
        }
    }

    /// The record as seen by step templates: the serialized tool plus a
    /// derived `shell_symlinks` field.
    pub fn template_value(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| Error::serialization(format!("Failed to serialize tool: {e}")))?;
        if let serde_json::Value::Object(fields) = &mut value {
            fields.insert(
                "shell_symlinks".to_string(),
                serde_json::Value::String(shell_symlinks(self.symlinks())),
            );
        }
        Ok(value)
    }
}

/// A tool whose lifecycle is described by shell steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptsDrivenTool {
    /// Unique tool id.
    pub id: String,
    /// Binaries to expose in the symlinks directory.
    #[serde(default)]
    pub symlinks: Vec<ToolSymlink>,
    /// Lifecycle scripts.
    pub source: ScriptSource,
    /// Free-form data available to templates as `Tool.extra`.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Source payload of a script-driven tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSource {
    /// One step list per lifecycle operation.
    #[serde(default)]
    pub scripts: LifecycleScripts,
}

/// Step lists for every lifecycle operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleScripts {
    /// Lists installed versions, one per line.
    #[serde(default)]
    pub get_all_local_versions: Vec<ScriptStep>,
    /// Lists upstream versions, one per line.
    #[serde(default)]
    pub get_all_remote_versions: Vec<ScriptStep>,
    /// Prints the newest upstream version.
    #[serde(default)]
    pub get_latest_remote_version: Vec<ScriptStep>,
    /// Downloads and installs `Arg`; prints nothing on success.
    #[serde(default)]
    pub fetch_tool_for_version: Vec<ScriptStep>,
    /// Prints the active version as JSON.
    #[serde(default)]
    pub get_link_info: Vec<ScriptStep>,
    /// Makes `Arg` the active version.
    #[serde(default)]
    pub link_tool: Vec<ScriptStep>,
    /// Removes the active version.
    #[serde(default)]
    pub unlink_tool: Vec<ScriptStep>,
}

impl LifecycleScripts {
    /// Steps configured for an operation.
    #[must_use]
    pub fn steps(&self, operation: LifecycleOperation) -> &[ScriptStep] {
        match operation {
            LifecycleOperation::LocalVersions => &self.get_all_local_versions,
            LifecycleOperation::RemoteVersions => &self.get_all_remote_versions,
            LifecycleOperation::LatestRemoteVersion => &self.get_latest_remote_version,
            LifecycleOperation::Fetch => &self.fetch_tool_for_version,
            LifecycleOperation::LinkInfo => &self.get_link_info,
            LifecycleOperation::Link => &self.link_tool,
            LifecycleOperation::Unlink => &self.unlink_tool,
        }
    }
}

/// Lifecycle operations a script-driven tool declares steps for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOperation {
    /// `getAllLocalVersions`
    LocalVersions,
    /// `getAllRemoteVersions`
    RemoteVersions,
    /// `getLatestRemoteVersion`
    LatestRemoteVersion,
    /// `fetchToolForVersion`
    Fetch,
    /// `getLinkInfo`
    LinkInfo,
    /// `linkTool`
    Link,
    /// `unlinkTool`
    Unlink,
}

impl LifecycleOperation {
    /// The config key of the step list.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalVersions => "getAllLocalVersions",
            Self::RemoteVersions => "getAllRemoteVersions",
            Self::LatestRemoteVersion => "getLatestRemoteVersion",
            Self::Fetch => "fetchToolForVersion",
            Self::LinkInfo => "getLinkInfo",
            Self::Link => "linkTool",
            Self::Unlink => "unlinkTool",
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binary exposed by a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSymlink {
    /// Path of the binary inside the installed tool.
    pub from: String,
    /// Link name; defaults to the basename of `from`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl ToolSymlink {
    /// Name of the link in the symlinks directory.
    #[must_use]
    pub fn target_name(&self) -> String {
        match self.to.as_deref().map(str::trim) {
            Some(to) if !to.is_empty() => to.to_string(),
            _ => {
                let from = self.from.trim();
                Path::new(from)
                    .file_name()
                    .map_or_else(|| from.to_string(), |name| name.to_string_lossy().into_owned())
            }
        }
    }
}

/// Render symlinks as `from:to` lines for consumption by shell loops.
#[must_use]
pub fn shell_symlinks(symlinks: &[ToolSymlink]) -> String {
    symlinks
        .iter()
        .map(|link| format!("{}:{}", link.from.trim(), link.target_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check one tool id against the id rules.
pub fn validate_tool_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::configuration("Tool id must not be empty"));
    }
    if id.trim() != id {
        return Err(Error::configuration(format!(
            "Tool id '{id}' must not have leading or trailing whitespace"
        )));
    }
    if id == ALL_TOOLS {
        return Err(Error::configuration(format!(
            "Tool id '{ALL_TOOLS}' is reserved"
        )));
    }
    Ok(())
}

/// Check every id and reject duplicates.
pub fn validate_tool_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        validate_tool_id(id)?;
        if !seen.insert(id) {
            return Err(Error::configuration(format!("Duplicate tool id '{id}'")));
        }
    }
    Ok(())
}

/// A list of tools whose ids have been validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Tool>", into = "Vec<Tool>")]
pub struct ToolSet(Vec<Tool>);

impl ToolSet {
    /// Validate and wrap a list of tools.
    pub fn new(tools: Vec<Tool>) -> Result<Self> {
        validate_tool_ids(tools.iter().map(Tool::id))?;
        Ok(Self(tools))
    }

    /// The tools in declaration order.
    #[must_use]
    pub fn as_slice(&self) -> &[Tool] {
        &self.0
    }

    /// Look up a tool by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Tool> {
        self.0.iter().find(|tool| tool.id() == id)
    }

    /// Number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no tools are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<Tool>> for ToolSet {
    type Error = Error;

    fn try_from(tools: Vec<Tool>) -> Result<Self> {
        Self::new(tools)
    }
}

impl From<ToolSet> for Vec<Tool> {
    fn from(set: ToolSet) -> Self {
        set.0
    }
}
