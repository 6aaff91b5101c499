//! Configuration sources.
//!
//! A [`ConfigStore`] owns the declared tools of one or more tool types plus
//! the directories and credentials their scripts need. [`LocalFileConfig`]
//! is the YAML-file backed implementation used by the `tvm` binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::steps::{DEFAULT_SHELL, ScopeConfig};
use crate::tools::{Tool, ToolSet};
use crate::{Error, Result};

/// Environment variable overriding the configured GitHub token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// A source of declared tools.
pub trait ConfigStore: Send + Sync {
    /// Read the configuration from durable storage.
    fn load(&mut self) -> Result<()>;

    /// Write the configuration back.
    fn save(&self) -> Result<()>;

    /// Declared tools, in declaration order.
    fn tools(&self) -> &[Tool];
}

fn default_downloads_dir() -> String {
    "./tvm_cache".to_string()
}

fn default_symlinks_dir() -> String {
    "./bin".to_string()
}

fn default_cache_file_path() -> String {
    "./.tools.state.yaml".to_string()
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

/// On-disk layout of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Declared tools.
    #[serde(default)]
    pub tools: ToolSet,
    /// Where fetched tool versions are stored.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: String,
    /// Where tool binaries are linked.
    #[serde(default = "default_symlinks_dir")]
    pub symlinks_dir: String,
    /// Token exposed to scripts as `Config.GitHubToken`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub github_token: String,
    /// Path of the remote versions cache.
    #[serde(default = "default_cache_file_path")]
    pub remote_versions_cache_file_path: String,
    /// Interpreter that runs every script step.
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tools: ToolSet::default(),
            downloads_dir: default_downloads_dir(),
            symlinks_dir: default_symlinks_dir(),
            github_token: String::new(),
            remote_versions_cache_file_path: default_cache_file_path(),
            shell: default_shell(),
        }
    }
}

/// Configuration stored in a local YAML file.
#[derive(Debug, Clone)]
pub struct LocalFileConfig {
    path: PathBuf,
    file: ConfigFile,
    token_override: Option<String>,
}

impl LocalFileConfig {
    /// Unloaded configuration bound to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: ConfigFile::default(),
            token_override: None,
        }
    }

    /// Create and load in one step.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self::new(path);
        config.load()?;
        Ok(config)
    }

    /// Path of the configuration file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The values as read from the file.
    #[must_use]
    pub fn file(&self) -> &ConfigFile {
        &self.file
    }

    /// Downloads directory.
    #[must_use]
    pub fn downloads_dir(&self) -> &Path {
        Path::new(&self.file.downloads_dir)
    }

    /// Symlinks directory.
    #[must_use]
    pub fn symlinks_dir(&self) -> &Path {
        Path::new(&self.file.symlinks_dir)
    }

    /// Effective GitHub token; the environment wins over the file when set.
    #[must_use]
    pub fn github_token(&self) -> &str {
        self.token_override
            .as_deref()
            .unwrap_or(&self.file.github_token)
    }

    /// Path of the remote versions cache file.
    #[must_use]
    pub fn cache_file_path(&self) -> &Path {
        Path::new(&self.file.remote_versions_cache_file_path)
    }

    /// Shell interpreter for script steps.
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.file.shell
    }

    /// The `Config.*` values handed to step templates.
    #[must_use]
    pub fn scope_config(&self) -> ScopeConfig {
        ScopeConfig {
            downloads_dir: self.file.downloads_dir.clone(),
            symlinks_dir: self.file.symlinks_dir.clone(),
            github_token: self.github_token().to_string(),
        }
    }

    fn ensure_directories(&self) -> Result<()> {
        for dir in [self.downloads_dir(), self.symlinks_dir()] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::io(e, Some(dir.to_path_buf()), "create configured directory")
            })?;
        }
        Ok(())
    }
}

impl ConfigStore for LocalFileConfig {
    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Err(Error::configuration(format!(
                "Config file {} does not exist",
                self.path.display()
            )));
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::io(e, Some(self.path.clone()), "read config file"))?;
        if content.trim().is_empty() {
            return Err(Error::configuration(format!(
                "Config file {} is empty",
                self.path.display()
            )));
        }

        self.file = serde_yaml::from_str(&content).map_err(|e| {
            Error::configuration(format!(
                "Failed to parse config file {}: {e}",
                self.path.display()
            ))
        })?;

        self.token_override = std::env::var(GITHUB_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty());

        self.ensure_directories()?;

        tracing::debug!(
            path = %self.path.display(),
            tools = self.file.tools.len(),
            "Loaded configuration"
        );
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let content = serde_yaml::to_string(&self.file)
            .map_err(|e| Error::serialization(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::io(e, Some(self.path.clone()), "write config file"))
    }

    fn tools(&self) -> &[Tool] {
        self.file.tools.as_slice()
    }
}
