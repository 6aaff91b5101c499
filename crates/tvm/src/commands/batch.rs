//! Multi-tool commands: `fetch` and `upgrade`.
//!
//! Each outcome is printed as soon as the orchestrator reports it. The
//! command fails if any tool failed, after every tool has run.

use std::io::{self, Write};
use tracing::debug;
use tvm_core::ToolVersion;
use tvm_core::batch::{BatchOrchestrator, ToolOutcome, UpgradeOutcome};

use super::Context;
use crate::cli::{BatchArgs, CliError, ToolSelection};

/// Resolve the selection to tool ids, rejecting unknown ids up front.
pub fn selected_ids(ctx: &Context, args: &BatchArgs) -> Result<Vec<String>, CliError> {
    match args.selection()? {
        ToolSelection::All => Ok(ctx.registry.tool_ids()),
        ToolSelection::Ids(ids) => {
            for id in &ids {
                ctx.registry.find_tool(id)?;
            }
            Ok(ids)
        }
    }
}

fn orchestrator(ctx: &Context, args: &BatchArgs) -> BatchOrchestrator {
    BatchOrchestrator::new(ctx.registry.clone()).with_max_concurrency(args.jobs)
}

/// Fetch and cache the latest remote version of the selected tools.
pub async fn fetch(
    ctx: &mut Context,
    args: &BatchArgs,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let ids = selected_ids(ctx, args)?;
    debug!(tools = ?ids, "Fetching latest versions");

    let mut write_error = None;
    let report = orchestrator(ctx, args)
        .fetch_latest(&ids, &mut ctx.cache, |outcome| {
            if let Err(e) = print_fetch(&mut *out, outcome) {
                write_error.get_or_insert(e);
            }
        })
        .await?;
    if let Some(e) = write_error {
        return Err(e.into());
    }

    let count = report.outcomes().len();
    report.into_result()?;
    writeln!(
        out,
        "\nSuccessfully fetched and cached latest versions for {count} tool(s)"
    )?;
    Ok(())
}

/// Upgrade the selected tools to their latest remote versions.
pub async fn upgrade(
    ctx: &mut Context,
    args: &BatchArgs,
    force: bool,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let ids = selected_ids(ctx, args)?;
    debug!(tools = ?ids, force, "Upgrading");

    let mut write_error = None;
    let report = orchestrator(ctx, args)
        .upgrade(&ids, force, &mut ctx.cache, |outcome| {
            if let Err(e) = print_upgrade(&mut *out, outcome) {
                write_error.get_or_insert(e);
            }
        })
        .await?;
    if let Some(e) = write_error {
        return Err(e.into());
    }

    report.into_result()?;
    writeln!(out, "All specified tools upgraded successfully.")?;
    Ok(())
}

fn print_fetch(out: &mut dyn Write, outcome: &ToolOutcome<ToolVersion>) -> io::Result<()> {
    match &outcome.result {
        Ok(version) => writeln!(out, "{}: {version}", outcome.id),
        Err(e) => writeln!(out, "Failed to fetch {}: {e}", outcome.id),
    }
}

fn print_upgrade(out: &mut dyn Write, outcome: &ToolOutcome<UpgradeOutcome>) -> io::Result<()> {
    let id = &outcome.id;
    match &outcome.result {
        Ok(UpgradeOutcome::AlreadyLatest { current, .. }) => {
            writeln!(out, "{id} is already at the latest version ({current})")
        }
        Ok(UpgradeOutcome::Upgraded { from, to, .. }) if from.is_empty() => {
            writeln!(out, "Successfully upgraded {id} to version {to}")
        }
        Ok(UpgradeOutcome::Upgraded { from, to, .. }) => {
            writeln!(out, "Successfully upgraded {id} from {from} to version {to}")
        }
        Err(e) => writeln!(out, "Failed to upgrade {id}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvm_core::Error;

    fn render<T>(
        print: fn(&mut dyn Write, &ToolOutcome<T>) -> io::Result<()>,
        outcome: &ToolOutcome<T>,
    ) -> String {
        let mut out = Vec::new();
        print(&mut out, outcome).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_print_fetch() {
        let ok = ToolOutcome {
            id: "jq".to_string(),
            latest: Some(ToolVersion::from("1.7.1")),
            result: Ok(ToolVersion::from("1.7.1")),
        };
        assert_eq!(render(print_fetch, &ok), "jq: 1.7.1\n");

        let failed = ToolOutcome::<ToolVersion> {
            id: "fd".to_string(),
            latest: None,
            result: Err(Error::NotLinked {
                tool: "fd".to_string(),
            }),
        };
        assert!(render(print_fetch, &failed).starts_with("Failed to fetch fd: "));
    }

    #[test]
    fn test_print_upgrade() {
        let outcome = |result| ToolOutcome {
            id: "rg".to_string(),
            latest: Some(ToolVersion::from("14.1.0")),
            result,
        };

        assert_eq!(
            render(
                print_upgrade,
                &outcome(Ok(UpgradeOutcome::AlreadyLatest {
                    current: ToolVersion::from("14.1.0"),
                    latest: ToolVersion::from("14.1.0"),
                }))
            ),
            "rg is already at the latest version (14.1.0)\n"
        );
        assert_eq!(
            render(
                print_upgrade,
                &outcome(Ok(UpgradeOutcome::Upgraded {
                    from: ToolVersion::empty(),
                    to: ToolVersion::from("14.1.0"),
                    installed: true,
                }))
            ),
            "Successfully upgraded rg to version 14.1.0\n"
        );
        assert_eq!(
            render(
                print_upgrade,
                &outcome(Ok(UpgradeOutcome::Upgraded {
                    from: ToolVersion::from("13.0.0"),
                    to: ToolVersion::from("14.1.0"),
                    installed: false,
                }))
            ),
            "Successfully upgraded rg from 13.0.0 to version 14.1.0\n"
        );
    }
}
