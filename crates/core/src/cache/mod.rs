//! Remote version cache.
//!
//! Remembers the latest remote version seen for each tool so listing
//! commands can show it without running scripts. Loading never fails: a
//! missing or unreadable file is an empty cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::version::ToolVersion;
use crate::{Error, Result};

/// Persisted map of tool id to latest known remote version.
pub trait VersionCache: Send + Sync {
    /// Read the cache. Never fails on a missing or corrupt file.
    fn load(&mut self) -> Result<()>;

    /// Write the cache back.
    fn save(&self) -> Result<()>;

    /// Cached latest version for a tool.
    fn get(&self, id: &str) -> Option<ToolVersion>;

    /// Record a latest version, stamped with the current time. Not persisted
    /// until [`save`](Self::save).
    fn set(&mut self, id: &str, version: ToolVersion);

    /// Record a latest version and return the one it replaces.
    fn replace(&mut self, id: &str, version: ToolVersion) -> Option<ToolVersion> {
        let previous = self.get(id);
        self.set(id, version);
        previous
    }
}

/// One cached tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Latest remote version seen.
    pub latest_version: ToolVersion,
    /// When it was seen.
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    tools: BTreeMap<String, CacheEntry>,
}

/// YAML-file backed [`VersionCache`].
#[derive(Debug, Clone)]
pub struct RemoteVersionsCache {
    path: PathBuf,
    file: CacheFile,
}

impl RemoteVersionsCache {
    /// Empty cache bound to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: CacheFile::default(),
        }
    }

    /// Create and load in one step.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut cache = Self::new(path);
        cache.load()?;
        Ok(cache)
    }

    /// Path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full entry for a tool, including when it was checked.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&CacheEntry> {
        self.file.tools.get(id)
    }

    /// Number of cached tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.file.tools.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file.tools.is_empty()
    }
}

impl VersionCache for RemoteVersionsCache {
    fn load(&mut self) -> Result<()> {
        self.file = match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_yaml::from_str::<Option<CacheFile>>(&content)
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Ignoring unreadable version cache"
                    );
                    None
                })
                .unwrap_or_default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheFile::default(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable version cache"
                );
                CacheFile::default()
            }
        };
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let content = serde_yaml::to_string(&self.file)
            .map_err(|e| Error::serialization(format!("Failed to serialize version cache: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::io(e, Some(parent.to_path_buf()), "create version cache directory")
            })?;
        }
        std::fs::write(&self.path, content)
            .map_err(|e| Error::io(e, Some(self.path.clone()), "write version cache"))
    }

    fn get(&self, id: &str) -> Option<ToolVersion> {
        self.file
            .tools
            .get(id)
            .map(|entry| entry.latest_version.clone())
    }

    fn set(&mut self, id: &str, version: ToolVersion) {
        self.file.tools.insert(
            id.to_string(),
            CacheEntry {
                latest_version: version,
                last_checked: Utc::now(),
            },
        );
    }
}
