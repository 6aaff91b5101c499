//! Version manager trait implemented by every tool driver.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;

use super::model::Tool;
use crate::error::LinkAction;
use crate::version::{ToolVersion, compare_versions};
use crate::{Error, Result};

/// Active version of a tool as reported by its link-info script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolLinkInfo {
    /// Active version; empty when unlinked.
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: ToolVersion,
    /// When the version was linked, as printed by the script.
    #[serde(default, deserialize_with = "null_as_default")]
    pub linked_at: String,
}

// Scripts may print `null` for either field when nothing is linked.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ToolLinkInfo {
    /// The link state this record describes.
    #[must_use]
    pub fn state(&self) -> LinkState {
        if self.version.is_empty() {
            LinkState::Unlinked
        } else {
            LinkState::LinkedTo(self.version.clone())
        }
    }
}

/// Link state of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// No active version.
    Unlinked,
    /// The given version is active.
    LinkedTo(ToolVersion),
}

/// How a link or unlink transition ended.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// The tool reached the requested state.
    Succeeded,
    /// The transition failed and the previous state was restored.
    FailedRestored {
        /// Why the transition failed.
        error: Error,
    },
    /// The transition failed and restoring the previous state failed too.
    FailedUnrestored {
        /// Why the transition failed.
        error: Error,
        /// Why the compensating action failed.
        compensation_error: Error,
    },
}

impl TransitionOutcome {
    /// Whether the requested state was reached.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Collapse into a `Result`, wrapping failures in [`Error::Transition`].
    pub fn into_result(self, tool: &str, action: LinkAction) -> Result<()> {
        match self {
            Self::Succeeded => Ok(()),
            Self::FailedRestored { error } => Err(Error::Transition {
                tool: tool.to_string(),
                action,
                source: Box::new(error),
                compensation: None,
            }),
            Self::FailedUnrestored {
                error,
                compensation_error,
            } => Err(Error::Transition {
                tool: tool.to_string(),
                action,
                source: Box::new(error),
                compensation: Some(Box::new(compensation_error)),
            }),
        }
    }
}

/// Drives the lifecycle of one tool type.
///
/// Implementations are registered in the [`Registry`](super::Registry) under
/// [`tool_type`](Self::tool_type) and are shared across concurrent batch
/// tasks, so they must be `Send + Sync` and keep no per-call state.
#[async_trait]
pub trait ToolVersionManager: Send + Sync {
    /// Type tag of the tools this manager handles.
    fn tool_type(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Versions installed locally.
    async fn local_versions(&self, tool: &Tool) -> Result<Vec<ToolVersion>>;

    /// Versions available remotely.
    async fn remote_versions(&self, tool: &Tool) -> Result<Vec<ToolVersion>>;

    /// The newest remote version.
    async fn latest_remote_version(&self, tool: &Tool) -> Result<ToolVersion>;

    /// The currently active version.
    async fn link_info(&self, tool: &Tool) -> Result<ToolLinkInfo>;

    /// Download and install a version.
    async fn install(&self, tool: &Tool, version: &ToolVersion) -> Result<()>;

    /// Make `version` the active version.
    ///
    /// Errors raised before any side effect (invalid target, unreadable link
    /// state) are returned as `Err`; everything after is reported through
    /// the outcome.
    async fn link(&self, tool: &Tool, version: &ToolVersion) -> Result<TransitionOutcome>;

    /// Remove the active version.
    async fn unlink(&self, tool: &Tool) -> Result<TransitionOutcome>;

    /// Order two versions of a tool.
    fn compare_versions(&self, a: &ToolVersion, b: &ToolVersion) -> Ordering {
        compare_versions(a.as_str(), b.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_info_decodes_script_json() {
        let info: ToolLinkInfo =
            serde_json::from_str(r#"{"version":"1.7.1","linked_at":"2026-01-02T03:04:05Z"}"#)
                .unwrap();
        assert_eq!(info.state(), LinkState::LinkedTo(ToolVersion::from("1.7.1")));
        assert_eq!(info.linked_at, "2026-01-02T03:04:05Z");

        let unlinked: ToolLinkInfo = serde_json::from_str("{}").unwrap();
        assert_eq!(unlinked.state(), LinkState::Unlinked);
    }

    #[test]
    fn test_link_info_null_fields_mean_unlinked() {
        let info: ToolLinkInfo =
            serde_json::from_str(r#"{"version":null,"linked_at":null}"#).unwrap();
        assert_eq!(info.state(), LinkState::Unlinked);
        assert_eq!(info.linked_at, "");
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(TransitionOutcome::Succeeded.into_result("jq", LinkAction::Link).is_ok());

        let restored = TransitionOutcome::FailedRestored {
            error: Error::invalid_argument("boom"),
        }
        .into_result("jq", LinkAction::Unlink)
        .unwrap_err();
        assert!(matches!(
            restored,
            Error::Transition { compensation: None, action: LinkAction::Unlink, .. }
        ));

        let unrestored = TransitionOutcome::FailedUnrestored {
            error: Error::invalid_argument("boom"),
            compensation_error: Error::invalid_argument("again"),
        };
        assert!(!unrestored.is_success());
        let err = unrestored.into_result("jq", LinkAction::Link).unwrap_err();
        assert!(matches!(err, Error::Transition { compensation: Some(_), .. }));
    }
}
