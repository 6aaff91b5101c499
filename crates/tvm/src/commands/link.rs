//! State-changing single-tool commands: `install`, `link`, `unlink`.

use std::io::Write;
use tvm_core::{LinkAction, ToolVersion};

use super::Context;
use crate::cli::CliError;

/// Install one version of a tool.
pub async fn install(
    ctx: &Context,
    id: &str,
    version: &str,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let (tool, manager) = ctx.resolve(id)?;
    let version = ToolVersion::from(version);

    writeln!(out, "Installing {id} version {version}...")?;
    manager.install(&tool, &version).await?;
    writeln!(out, "Successfully installed {id} version {version}")?;
    Ok(())
}

/// Make one version of a tool the active one.
pub async fn link(
    ctx: &Context,
    id: &str,
    version: &str,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let (tool, manager) = ctx.resolve(id)?;
    let version = ToolVersion::from(version);

    writeln!(out, "Linking {id} version {version}...")?;
    manager
        .link(&tool, &version)
        .await?
        .into_result(id, LinkAction::Link)?;
    writeln!(out, "Successfully linked {id} version {version}")?;
    Ok(())
}

/// Remove the active version of a tool.
pub async fn unlink(ctx: &Context, id: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let (tool, manager) = ctx.resolve(id)?;

    writeln!(out, "Unlinking {id}...")?;
    manager
        .unlink(&tool)
        .await?
        .into_result(id, LinkAction::Unlink)?;
    writeln!(out, "Successfully unlinked {id}")?;
    Ok(())
}
