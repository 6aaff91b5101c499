use crate::tracing::{LogLevel, TracingFormat};
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI, configuration or lookup error exit code
pub const EXIT_CLI: i32 = 2;
/// Tool operation failure exit code
pub const EXIT_TOOL: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI, configuration or lookup error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(tvm::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A tool's scripts failed or misbehaved (exit code 3)
    #[error("Tool operation failed: {message}")]
    #[diagnostic(code(tvm::cli::tool))]
    Tool {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(tvm::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new tool operation error
    #[must_use]
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new tool operation error with help text
    #[must_use]
    pub fn tool_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Add help text to an existing error, returning a new error with the help text set.
    #[must_use]
    pub fn with_help(self, help_text: impl Into<String>) -> Self {
        let help = Some(help_text.into());
        match self {
            Self::Config { message, .. } => Self::Config { message, help },
            Self::Tool { message, .. } => Self::Tool { message, help },
            Self::Other { message, .. } => Self::Other { message, help },
        }
    }
}

/// Convert `tvm_core::Error` to the matching `CliError` variant.
///
/// - Configuration and lookup problems -> Config (exit code 2)
/// - Script, output and link protocol failures -> Tool (exit code 3)
/// - I/O and serialization errors -> Other (exit code 3)
impl From<tvm_core::Error> for CliError {
    fn from(err: tvm_core::Error) -> Self {
        match err {
            // Avoid "Configuration error: Configuration error:"
            tvm_core::Error::Configuration { message } => Self::config(message),
            tvm_core::Error::InvalidArgument { message } => Self::config(message),
            ref e if e.is_configuration() => Self::config(err.to_string()),
            tvm_core::Error::Transition {
                compensation: Some(_),
                ..
            } => Self::tool_with_help(
                err.to_string(),
                "The previous link state could not be restored; inspect the symlinks directory before retrying",
            ),
            tvm_core::Error::Batch { .. } => Self::tool_with_help(
                err.to_string(),
                "Re-run with --level debug to see each step's output",
            ),
            tvm_core::Error::Io { .. } | tvm_core::Error::Serialization { .. } => {
                Self::other(err.to_string())
            }
            _ => Self::tool(err.to_string()),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::other(format!("Failed to write output: {err}"))
    }
}

/// Map a `CliError` to its exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Tool { .. } | CliError::Other { .. } => EXIT_TOOL,
    }
}

/// Render an error through miette on stderr
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    let _ = io::stderr().flush();
}

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "tvm")]
#[command(about = "Tool Version Manager - install, link and upgrade development tools with your own scripts")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file.
    #[arg(
        short = 'c',
        long,
        global = true,
        env = "TVM_CONFIG",
        value_name = "FILE",
        help = "Path to configuration file (default: <config dir>/tvm/tvm_config.yaml)"
    )]
    pub config: Option<PathBuf>,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Shorthand for `--level debug`.
    #[arg(short = 'v', long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Log output format.
    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

impl Cli {
    /// Effective log level after applying `--verbose`.
    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        if self.verbose && matches!(self.level, LogLevel::Warn | LogLevel::Error | LogLevel::Info) {
            LogLevel::Debug
        } else {
            self.level
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch and cache the latest remote versions for tools.
    #[command(
        about = "Fetch and cache the latest remote versions for tools",
        after_help = "Examples:\n  tvm fetch --all       # every configured tool\n  tvm fetch ripgrep     # one tool\n  tvm fetch rg,fzf,fd   # several tools"
    )]
    Fetch {
        /// Which tools to fetch.
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Upgrade tools to their latest versions.
    #[command(about = "Upgrade tools to their latest versions")]
    Upgrade {
        /// Which tools to upgrade.
        #[command(flatten)]
        batch: BatchArgs,
        /// Relink even when the linked version is already the latest.
        #[arg(short = 'f', long, help = "Relink even when already at the latest version")]
        force: bool,
    },
    /// Install a specific version of a tool.
    #[command(about = "Install a specific version of a tool")]
    Install {
        /// Tool id.
        tool_id: String,
        /// Version to install.
        version: String,
    },
    /// Link a tool version (make it active).
    #[command(about = "Link a tool version (make it active)")]
    Link {
        /// Tool id.
        tool_id: String,
        /// Version to link.
        version: String,
    },
    /// Unlink a tool (remove the active version).
    #[command(about = "Unlink a tool (remove the active version)")]
    Unlink {
        /// Tool id.
        tool_id: String,
    },
    /// Show the latest available version of a tool.
    #[command(about = "Show the latest available version of a tool")]
    Latest {
        /// Tool id.
        tool_id: String,
    },
    /// Show the currently linked version of a tool.
    #[command(about = "Show the currently linked version of a tool")]
    Current {
        /// Tool id.
        tool_id: String,
    },
    /// List versions of a tool.
    #[command(about = "List local or remote versions of a tool")]
    List {
        /// Where to look.
        #[command(subcommand)]
        subcommand: ListCommands,
    },
}

impl Commands {
    /// Command name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Upgrade { .. } => "upgrade",
            Self::Install { .. } => "install",
            Self::Link { .. } => "link",
            Self::Unlink { .. } => "unlink",
            Self::Latest { .. } => "latest",
            Self::Current { .. } => "current",
            Self::List {
                subcommand: ListCommands::Local { .. },
            } => "list local",
            Self::List {
                subcommand: ListCommands::Remote { .. },
            } => "list remote",
        }
    }
}

/// `list` subcommands.
#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// List all locally installed versions of a tool.
    #[command(about = "List all locally installed versions of a tool")]
    Local {
        /// Tool id.
        tool_id: String,
    },
    /// List all remote versions of a tool.
    #[command(about = "List all remote versions of a tool")]
    Remote {
        /// Tool id.
        tool_id: String,
    },
}

/// Tool selection shared by the batch commands.
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Select every configured tool.
    #[arg(short = 'a', long, conflicts_with = "tool_ids", help = "Apply to every configured tool")]
    pub all: bool,

    /// Comma-separated tool ids.
    #[arg(value_name = "TOOL_IDS", required_unless_present = "all")]
    pub tool_ids: Option<String>,

    /// Maximum number of tools processed at once.
    #[arg(
        short = 'j',
        long,
        value_name = "N",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..),
        help = "Process at most N tools at once (default: all at once)"
    )]
    pub jobs: Option<usize>,
}

/// Which tools a batch command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    /// Every configured tool.
    All,
    /// Explicit ids, in the order given.
    Ids(Vec<String>),
}

impl BatchArgs {
    /// Parse the selection.
    pub fn selection(&self) -> Result<ToolSelection, CliError> {
        if self.all {
            return Ok(ToolSelection::All);
        }
        let raw = self.tool_ids.as_deref().ok_or_else(|| {
            CliError::config("You must provide either a tool ID or use the --all flag")
        })?;
        parse_tool_ids(raw).map(ToolSelection::Ids)
    }
}

/// Split a comma-separated id list. Repeated ids are kept once.
pub fn parse_tool_ids(raw: &str) -> Result<Vec<String>, CliError> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim) {
        if id.is_empty() {
            return Err(CliError::config_with_help(
                format!("Invalid empty tool ID in '{raw}'"),
                "Separate tool ids with single commas, e.g. rg,fzf,fd",
            ));
        }
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

/// Parse the process arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvm_core::{Error, LinkAction};

    fn parse_args(args: &[&str]) -> Cli {
        temp_env::with_var_unset("TVM_CONFIG", || Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn test_cli_default_values() {
        let cli = parse_args(&["tvm", "current", "jq"]);

        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.log_level(), LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert!(cli.config.is_none());
        assert!(matches!(cli.command, Commands::Current { ref tool_id } if tool_id == "jq"));
    }

    #[test]
    fn test_config_flag_and_env() {
        let cli = parse_args(&["tvm", "-c", "/tmp/tvm.yaml", "latest", "jq"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tvm.yaml")));

        let cli = temp_env::with_var("TVM_CONFIG", Some("/etc/tvm.yaml"), || {
            Cli::try_parse_from(["tvm", "latest", "jq"]).unwrap()
        });
        assert_eq!(cli.config, Some(PathBuf::from("/etc/tvm.yaml")));

        // The flag wins over the environment.
        let cli = temp_env::with_var("TVM_CONFIG", Some("/etc/tvm.yaml"), || {
            Cli::try_parse_from(["tvm", "--config", "mine.yaml", "latest", "jq"]).unwrap()
        });
        assert_eq!(cli.config, Some(PathBuf::from("mine.yaml")));
    }

    #[test]
    fn test_cli_log_level_parsing() {
        let cli = parse_args(&["tvm", "--level", "trace", "current", "jq"]);
        assert_eq!(cli.level, LogLevel::Trace);

        let cli = parse_args(&["tvm", "-L", "error", "current", "jq"]);
        assert_eq!(cli.level, LogLevel::Error);

        let cli = parse_args(&["tvm", "-v", "current", "jq"]);
        assert_eq!(cli.log_level(), LogLevel::Debug);

        // --verbose never lowers an explicit trace level.
        let cli = parse_args(&["tvm", "-v", "-L", "trace", "current", "jq"]);
        assert_eq!(cli.log_level(), LogLevel::Trace);

        let cli = parse_args(&["tvm", "--log-format", "json", "current", "jq"]);
        assert_eq!(cli.log_format, TracingFormat::Json);
    }

    #[test]
    fn test_fetch_selection() {
        let cli = parse_args(&["tvm", "fetch", "--all"]);
        let Commands::Fetch { batch } = cli.command else {
            panic!("Expected Fetch command");
        };
        assert_eq!(batch.selection().unwrap(), ToolSelection::All);
        assert_eq!(batch.jobs, None);

        let cli = parse_args(&["tvm", "fetch", "rg, fzf,fd", "-j", "2"]);
        let Commands::Fetch { batch } = cli.command else {
            panic!("Expected Fetch command");
        };
        assert_eq!(
            batch.selection().unwrap(),
            ToolSelection::Ids(vec!["rg".into(), "fzf".into(), "fd".into()])
        );
        assert_eq!(batch.jobs, Some(2));
    }

    #[test]
    fn test_batch_selection_is_validated_by_clap() {
        let parse = |args: &[&str]| {
            temp_env::with_var_unset("TVM_CONFIG", || Cli::try_parse_from(args).is_err())
        };
        // Neither ids nor --all.
        assert!(parse(&["tvm", "fetch"]));
        // Both.
        assert!(parse(&["tvm", "upgrade", "--all", "rg"]));
        // Zero jobs.
        assert!(parse(&["tvm", "fetch", "--all", "--jobs", "0"]));
    }

    #[test]
    fn test_upgrade_flags() {
        let cli = parse_args(&["tvm", "upgrade", "-a", "-f"]);
        match cli.command {
            Commands::Upgrade { batch, force } => {
                assert!(batch.all);
                assert!(force);
            }
            other => panic!("Expected Upgrade command, got {other:?}"),
        }
    }

    #[test]
    fn test_list_subcommands() {
        let cli = parse_args(&["tvm", "list", "remote", "jq"]);
        assert_eq!(cli.command.name(), "list remote");
        assert!(matches!(
            cli.command,
            Commands::List { subcommand: ListCommands::Remote { ref tool_id } } if tool_id == "jq"
        ));
    }

    #[test]
    fn test_parse_tool_ids() {
        assert_eq!(parse_tool_ids("rg").unwrap(), vec!["rg"]);
        assert_eq!(parse_tool_ids("rg,fd,rg").unwrap(), vec!["rg", "fd"]);
        assert!(matches!(parse_tool_ids("rg,,fd"), Err(CliError::Config { .. })));
        assert!(matches!(parse_tool_ids(" "), Err(CliError::Config { .. })));
    }

    #[test]
    fn test_core_error_mapping() {
        let err = CliError::from(Error::configuration("bad file"));
        assert_eq!(exit_code_for(&err), EXIT_CLI);
        assert_eq!(err.to_string(), "CLI/configuration error: bad file");

        let err = CliError::from(Error::ToolNotFound {
            id: "zz".into(),
            available: vec!["jq".into()],
        });
        assert_eq!(exit_code_for(&err), EXIT_CLI);
        assert!(err.to_string().contains("Known tools: jq"));

        let err = CliError::from(Error::NotLinked { tool: "jq".into() });
        assert_eq!(exit_code_for(&err), EXIT_TOOL);
        assert!(matches!(err, CliError::Tool { help: None, .. }));

        let err = CliError::from(Error::Transition {
            tool: "jq".into(),
            action: LinkAction::Link,
            source: Box::new(Error::invalid_argument("first")),
            compensation: Some(Box::new(Error::invalid_argument("second"))),
        });
        assert!(matches!(err, CliError::Tool { help: Some(_), .. }));

        let err = CliError::from(Error::Batch {
            operation: "fetch".into(),
            failures: vec![("b".into(), "boom".into())],
        });
        assert_eq!(exit_code_for(&err), EXIT_TOOL);
        assert!(err.to_string().contains("b: boom"));

        let err = CliError::from(Error::serialization("nope"));
        assert!(matches!(err, CliError::Other { .. }));
    }

    #[test]
    fn test_with_help_keeps_category() {
        let err = CliError::tool("x").with_help("try again");
        assert!(matches!(err, CliError::Tool { help: Some(ref h), .. } if h == "try again"));
        assert_eq!(exit_code_for(&CliError::other("y")), EXIT_TOOL);
    }
}
