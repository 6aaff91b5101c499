//! Read-only commands: `current`, `latest`, `list local`, `list remote`.

use std::io::Write;
use tvm_core::ToolVersion;
use tvm_core::batch::latest_version;
use tvm_core::cache::VersionCache;
use tvm_core::tools::LinkState;

use super::Context;
use crate::cli::CliError;

/// Print the linked version of a tool.
pub async fn current(ctx: &Context, id: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let (tool, manager) = ctx.resolve(id)?;
    let info = manager.link_info(&tool).await?;
    match info.state() {
        LinkState::Unlinked => writeln!(out, "No version linked for {id}")?,
        LinkState::LinkedTo(version) => {
            writeln!(out, "Current version of {id}: {version}")?;
            if !info.linked_at.is_empty() {
                writeln!(out, "Linked at: {}", info.linked_at)?;
            }
        }
    }
    Ok(())
}

/// Print the latest remote version of a tool and remember it in the cache.
pub async fn latest(ctx: &mut Context, id: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let (tool, manager) = ctx.resolve(id)?;
    let version = latest_version(&tool, manager.as_ref()).await?;

    if let Some(entry) = ctx.cache.entry(id) {
        tracing::debug!(
            tool = id,
            previous = %entry.latest_version,
            last_checked = %entry.last_checked,
            "Replacing cached latest version"
        );
    }
    ctx.cache.set(id, version.clone());
    if let Err(e) = ctx.cache.save() {
        tracing::warn!(tool = id, error = %e, "Failed to update the version cache");
    }

    writeln!(out, "{version}")?;
    Ok(())
}

/// Print locally installed versions.
pub async fn list_local(ctx: &Context, id: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let (tool, manager) = ctx.resolve(id)?;
    let versions = manager.local_versions(&tool).await?;
    print_versions(out, "local", id, &versions)
}

/// Print versions available upstream.
pub async fn list_remote(ctx: &Context, id: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let (tool, manager) = ctx.resolve(id)?;
    let versions = manager.remote_versions(&tool).await?;
    print_versions(out, "remote", id, &versions)
}

fn print_versions(
    out: &mut dyn Write,
    kind: &str,
    id: &str,
    versions: &[ToolVersion],
) -> Result<(), CliError> {
    if versions.is_empty() {
        writeln!(out, "No {kind} versions found for {id}")?;
        return Ok(());
    }
    writeln!(out, "{} versions for {id}:", capitalize(kind))?;
    for version in versions {
        writeln!(out, "  {version}")?;
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
