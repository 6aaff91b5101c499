//! Error types for tvm-core

use miette::Diagnostic;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which half of the link protocol produced a [`Error::Transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Switching the active version to a new target.
    Link,
    /// Removing the active version.
    Unlink,
}

impl fmt::Display for LinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => write!(f, "link"),
            Self::Unlink => write!(f, "unlink"),
        }
    }
}

/// Main error type for tvm-core operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(tvm_core::config::invalid))]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(tvm_core::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<std::path::Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(tvm_core::serialization))]
    Serialization {
        /// The error message describing the serialization issue
        message: String,
    },

    /// No configured tool carries the requested id
    #[error("Tool '{id}' not found. Known tools: {}", available.join(", "))]
    #[diagnostic(code(tvm_core::lookup::tool))]
    ToolNotFound {
        /// The id that was looked up
        id: String,
        /// Every id declared by the registered configuration sources
        available: Vec<String>,
    },

    /// No version manager is registered for a tool type
    #[error("Tool manager not registered for '{tool_type}'. Allowed types are: {}", registered.join(", "))]
    #[diagnostic(code(tvm_core::lookup::manager))]
    ManagerNotRegistered {
        /// The tool type tag that was looked up
        tool_type: String,
        /// Tool types that do have a manager
        registered: Vec<String>,
    },

    /// No configuration source is registered for a tool type
    #[error("Config source not registered for '{tool_type}'. Allowed types are: {}", registered.join(", "))]
    #[diagnostic(code(tvm_core::lookup::config))]
    ConfigNotRegistered {
        /// The tool type tag that was looked up
        tool_type: String,
        /// Tool types that do have a configuration source
        registered: Vec<String>,
    },

    /// A second manager or configuration source was registered for the same type
    #[error("{kind} already registered for tool type '{tool_type}'")]
    #[diagnostic(code(tvm_core::registry::duplicate))]
    DuplicateRegistration {
        /// What was being registered ("Tool manager", "Config source")
        kind: &'static str,
        /// The tool type tag
        tool_type: String,
    },

    /// A lifecycle operation has no steps configured
    #[error("No steps provided to execute for {operation}")]
    #[diagnostic(code(tvm_core::steps::empty))]
    EmptySteps {
        /// The lifecycle operation (or caller label) that had no steps
        operation: String,
    },

    /// A step template could not be rendered
    #[error("Failed to render script for step '{step}': {message}")]
    #[diagnostic(code(tvm_core::steps::template))]
    Template {
        /// Name of the step whose template failed
        step: String,
        /// What went wrong while rendering
        message: String,
    },

    /// The interpreter process for a step could not be started
    #[error("Failed to start '{shell}' for step '{step}': {source}")]
    #[diagnostic(code(tvm_core::steps::spawn))]
    StepSpawn {
        /// Name of the step
        step: String,
        /// Interpreter that was being launched
        shell: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A step exited with a non-zero status
    #[error("Failed to execute script {step} ({}): {output}", exit_label(*status))]
    #[diagnostic(code(tvm_core::steps::failed))]
    StepFailed {
        /// Name of the step
        step: String,
        /// Exit code, `None` when terminated by a signal
        status: Option<i32>,
        /// Combined stdout/stderr captured from the step
        output: String,
    },

    /// Step execution failure wrapped with tool and operation context
    #[error("{operation} failed for tool {tool}: {source}")]
    #[diagnostic(code(tvm_core::script))]
    Script {
        /// Tool id
        tool: String,
        /// Lifecycle operation label
        operation: String,
        /// The underlying step error
        #[source]
        source: Box<Error>,
    },

    /// A script produced output that could not be parsed into the expected shape
    #[error("Malformed output from {operation} for tool {tool}: {message}")]
    #[diagnostic(
        code(tvm_core::driver::malformed_output),
        help("Check the tool's scripts; the last step must print the expected format")
    )]
    MalformedOutput {
        /// Tool id
        tool: String,
        /// Lifecycle operation label
        operation: String,
        /// Parse failure details
        message: String,
    },

    /// Install scripts must be silent on success
    #[error("Install of {tool} {version} succeeded but printed unexpected output: {output}")]
    #[diagnostic(code(tvm_core::driver::unexpected_output))]
    UnexpectedOutput {
        /// Tool id
        tool: String,
        /// Version that was installed
        version: String,
        /// The output the last fetch step produced
        output: String,
    },

    /// A caller-supplied argument was rejected before any side effect
    #[error("Invalid argument: {message}")]
    #[diagnostic(code(tvm_core::invalid_argument))]
    InvalidArgument {
        /// Why the argument was rejected
        message: String,
    },

    /// Unlink was requested for a tool with no active version
    #[error("Tool {tool} is not linked to any version")]
    #[diagnostic(code(tvm_core::link::not_linked))]
    NotLinked {
        /// Tool id
        tool: String,
    },

    /// A link or unlink transition failed
    #[error("Failed to {action} tool {tool}: {source}{}", compensation_suffix(compensation.as_deref()))]
    #[diagnostic(code(tvm_core::link::transition))]
    Transition {
        /// Tool id
        tool: String,
        /// Which transition failed
        action: LinkAction,
        /// The original failure
        #[source]
        source: Box<Error>,
        /// Failure of the compensating action, when restoring also failed
        compensation: Option<Box<Error>>,
    },

    /// A per-tool batch task panicked or was cancelled
    #[error("Task for tool {tool} did not complete: {message}")]
    #[diagnostic(code(tvm_core::batch::task))]
    TaskAborted {
        /// Tool id
        tool: String,
        /// Panic or cancellation details
        message: String,
    },

    /// One or more tools failed inside a batch operation
    #[error("{operation} failed for {} tool(s): {}", failures.len(), format_failures(failures))]
    #[diagnostic(code(tvm_core::batch))]
    Batch {
        /// Batch operation label ("fetch", "upgrade")
        operation: String,
        /// `(tool id, error message)` for every failed tool, in input order
        failures: Vec<(String, String)>,
    },
}

fn exit_label(status: Option<i32>) -> String {
    status.map_or_else(
        || "terminated by signal".to_string(),
        |code| format!("exit status {code}"),
    )
}

fn compensation_suffix(compensation: Option<&Error>) -> String {
    compensation.map_or_else(String::new, |e| {
        format!("; restoring the previous state also failed: {e}")
    })
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(id, message)| format!("{id}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(|p| p.into_boxed_path()),
            operation: operation.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a template rendering error for a step
    pub fn template(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Wrap a step execution error with tool and operation context
    pub fn script(tool: impl Into<String>, operation: impl Into<String>, source: Self) -> Self {
        Self::Script {
            tool: tool.into(),
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Create a malformed-output error
    pub fn malformed_output(
        tool: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedOutput {
            tool: tool.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// True for lookup and configuration problems the operator fixes by editing
    /// the config or the command line, as opposed to failing scripts.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::ToolNotFound { .. }
                | Self::ManagerNotRegistered { .. }
                | Self::ConfigNotRegistered { .. }
                | Self::DuplicateRegistration { .. }
                | Self::InvalidArgument { .. }
        )
    }
}

/// Result type for tvm-core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_not_found_lists_alternatives() {
        let err = Error::ToolNotFound {
            id: "rg".to_string(),
            available: vec!["fd".to_string(), "fzf".to_string()],
        };
        assert_eq!(err.to_string(), "Tool 'rg' not found. Known tools: fd, fzf");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_step_failed_message() {
        let err = Error::StepFailed {
            step: "download".to_string(),
            status: Some(2),
            output: "curl: not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to execute script download (exit status 2): curl: not found"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_transition_mentions_compensation_failure() {
        let err = Error::Transition {
            tool: "rg".to_string(),
            action: LinkAction::Link,
            source: Box::new(Error::invalid_argument("boom")),
            compensation: Some(Box::new(Error::invalid_argument("revert boom"))),
        };
        let message = err.to_string();
        assert!(message.starts_with("Failed to link tool rg: Invalid argument: boom"));
        assert!(message.contains("restoring the previous state also failed"));
    }

    #[test]
    fn test_batch_lists_every_failure() {
        let err = Error::Batch {
            operation: "fetch".to_string(),
            failures: vec![
                ("b".to_string(), "offline".to_string()),
                ("d".to_string(), "bad script".to_string()),
            ],
        };
        assert_eq!(
            err.to_string(),
            "fetch failed for 2 tool(s): b: offline; d: bad script"
        );
    }
}
