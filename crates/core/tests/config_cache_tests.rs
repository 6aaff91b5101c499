//! Integration tests for the YAML configuration file and the version cache.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tvm_core::cache::{RemoteVersionsCache, VersionCache};
use tvm_core::config::{ConfigStore, GITHUB_TOKEN_ENV, LocalFileConfig};
use tvm_core::tools::{LifecycleOperation, SCRIPTS_DRIVEN};
use tvm_core::ToolVersion;

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("tvm_config.yaml");
    std::fs::write(&path, body).unwrap();
    path
}

fn full_config(dir: &Path) -> String {
    format!(
        r"
downloads_dir: {dl}
symlinks_dir: {bin}
github_token: from-file
remote_versions_cache_file_path: {state}
shell: sh
tools:
  - type: scripts_driven
    id: jq
    symlinks:
      - from: jq-linux-amd64
        to: jq
    source:
      scripts:
        getLatestRemoteVersion:
          - name: latest
            script: echo 1.7.1
  - type: scripts_driven
    id: fd
    source:
      scripts: {{}}
",
        dl = dir.join("downloads").display(),
        bin = dir.join("bin").display(),
        state = dir.join("state.yaml").display(),
    )
}

#[test]
fn test_load_full_config_creates_directories() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &full_config(dir.path()));

    let config = temp_env::with_var_unset(GITHUB_TOKEN_ENV, || LocalFileConfig::open(&path))
        .unwrap();

    assert!(dir.path().join("downloads").is_dir());
    assert!(dir.path().join("bin").is_dir());
    assert_eq!(config.shell(), "sh");
    assert_eq!(config.github_token(), "from-file");
    assert_eq!(config.cache_file_path(), dir.path().join("state.yaml"));

    let ids: Vec<_> = config.tools().iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec!["jq", "fd"]);
    assert!(config.tools().iter().all(|t| t.tool_type() == SCRIPTS_DRIVEN));

    let jq = config.tools()[0].as_scripts_driven().unwrap();
    assert_eq!(
        jq.source.scripts.steps(LifecycleOperation::LatestRemoteVersion)[0].script,
        "echo 1.7.1"
    );
}

#[test]
fn test_environment_token_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &full_config(dir.path()));

    let config = temp_env::with_var(GITHUB_TOKEN_ENV, Some("from-env"), || {
        LocalFileConfig::open(&path)
    })
    .unwrap();
    assert_eq!(config.github_token(), "from-env");
    assert_eq!(config.scope_config().github_token, "from-env");

    // An empty variable does not override.
    let config = temp_env::with_var(GITHUB_TOKEN_ENV, Some(""), || LocalFileConfig::open(&path))
        .unwrap();
    assert_eq!(config.github_token(), "from-file");
}

#[test]
fn test_save_keeps_file_token() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &full_config(dir.path()));

    let config = temp_env::with_var(GITHUB_TOKEN_ENV, Some("from-env"), || {
        LocalFileConfig::open(&path)
    })
    .unwrap();
    config.save().unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains("from-file"));
    assert!(!saved.contains("from-env"));
}

#[test]
fn test_defaults_apply_when_absent() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "tools: []\n");

    // Default directories are relative to the working directory.
    let mut config = LocalFileConfig::new(&path);
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let loaded = temp_env::with_var_unset(GITHUB_TOKEN_ENV, || config.load());
    std::env::set_current_dir(previous).unwrap();
    loaded.unwrap();

    assert_eq!(config.downloads_dir(), Path::new("./tvm_cache"));
    assert_eq!(config.symlinks_dir(), Path::new("./bin"));
    assert_eq!(config.cache_file_path(), Path::new("./.tools.state.yaml"));
    assert_eq!(config.shell(), "bash");
    assert_eq!(config.github_token(), "");
    assert!(dir.path().join("tvm_cache").is_dir());
    assert!(dir.path().join("bin").is_dir());
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        "tools:\n  - {type: scripts_driven, id: jq, source: {}}\n  - {type: scripts_driven, id: jq, source: {}}\n",
    );
    let err = LocalFileConfig::open(&path).unwrap_err();
    assert!(err.to_string().contains("Duplicate tool id 'jq'"));
}

#[test]
fn test_cache_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("state.yaml");

    let mut cache = RemoteVersionsCache::open(&path).unwrap();
    cache.set("x", ToolVersion::from("1.2.3"));
    cache.save().unwrap();

    let reloaded = RemoteVersionsCache::open(&path).unwrap();
    assert_eq!(reloaded.get("x"), Some(ToolVersion::from("1.2.3")));
    assert_eq!(
        reloaded.entry("x").unwrap().last_checked,
        cache.entry("x").unwrap().last_checked
    );
    assert_eq!(reloaded.get("y"), None);
}
