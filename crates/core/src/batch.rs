//! Concurrent fan-out of lifecycle operations across many tools.
//!
//! Every tool gets its own task and its own result slot (indexed by its
//! position in the input), so one tool's failure never touches another's
//! result. Reports come back in input order once every task has finished.
//! The version cache is written only here, from the collected results,
//! never by the per-tool tasks.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::cache::VersionCache;
use crate::error::LinkAction;
use crate::tools::{LifecycleOperation, Registry, Tool, ToolVersionManager};
use crate::version::ToolVersion;
use crate::{Error, Result};

/// Result of one tool inside a batch.
#[derive(Debug)]
pub struct ToolOutcome<T> {
    /// Tool id.
    pub id: String,
    /// Latest remote version discovered on the way, if any.
    pub latest: Option<ToolVersion>,
    /// What happened.
    pub result: Result<T>,
}

impl<T> ToolOutcome<T> {
    fn failed(id: &str, error: Error) -> Self {
        Self {
            id: id.to_string(),
            latest: None,
            result: Err(error),
        }
    }
}

/// Per-tool results of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    operation: &'static str,
    outcomes: Vec<ToolOutcome<T>>,
}

impl<T> BatchReport<T> {
    /// Batch operation label.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Every outcome, in input order.
    #[must_use]
    pub fn outcomes(&self) -> &[ToolOutcome<T>] {
        &self.outcomes
    }

    /// Outcome for one tool.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ToolOutcome<T>> {
        self.outcomes.iter().find(|outcome| outcome.id == id)
    }

    /// Ids of the tools that failed, in input order.
    #[must_use]
    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .map(|outcome| outcome.id.as_str())
            .collect()
    }

    /// Whether every tool succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    /// Successful values by tool id, or an [`Error::Batch`] naming every
    /// failed tool.
    pub fn into_result(self) -> Result<Vec<(String, T)>> {
        let mut values = Vec::with_capacity(self.outcomes.len());
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(value) => values.push((outcome.id, value)),
                Err(e) => failures.push((outcome.id, e.to_string())),
            }
        }
        if failures.is_empty() {
            Ok(values)
        } else {
            Err(Error::Batch {
                operation: self.operation.to_string(),
                failures,
            })
        }
    }
}

/// What an upgrade did for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The linked version is already at or above the latest.
    AlreadyLatest {
        /// Linked version.
        current: ToolVersion,
        /// Latest remote version.
        latest: ToolVersion,
    },
    /// The latest version was (installed if needed and) linked.
    Upgraded {
        /// Previously linked version; empty when the tool was unlinked.
        from: ToolVersion,
        /// Newly linked version.
        to: ToolVersion,
        /// Whether an install ran.
        installed: bool,
    },
}

/// Value produced by a per-tool task.
struct Attempt<T> {
    latest: Option<ToolVersion>,
    result: Result<T>,
}

impl<T> Attempt<T> {
    fn before_latest(error: Error) -> Self {
        Self {
            latest: None,
            result: Err(error),
        }
    }
}

/// Runs lifecycle operations for many tools concurrently.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    registry: Arc<Registry>,
    max_concurrency: Option<usize>,
}

impl BatchOrchestrator {
    /// Unbounded orchestrator over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            max_concurrency: None,
        }
    }

    /// Limit the number of tools processed at once. `None` means unbounded.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Fetch the latest remote version of every tool and record the
    /// successful ones in `cache`.
    ///
    /// `observer` sees each outcome as soon as it is known. The returned
    /// `Err` is reserved for failing to persist the cache; per-tool failures
    /// are in the report.
    pub async fn fetch_latest(
        &self,
        ids: &[String],
        cache: &mut dyn VersionCache,
        mut observer: impl FnMut(&ToolOutcome<ToolVersion>),
    ) -> Result<BatchReport<ToolVersion>> {
        let outcomes = self
            .run(
                ids,
                |tool, manager| async move {
                    match latest_version(&tool, manager.as_ref()).await {
                        Ok(latest) => Attempt {
                            latest: Some(latest.clone()),
                            result: Ok(latest),
                        },
                        Err(e) => Attempt::before_latest(e),
                    }
                },
                &mut observer,
            )
            .await;

        record_latest(cache, &outcomes)?;
        Ok(BatchReport {
            operation: "fetch",
            outcomes,
        })
    }

    /// Upgrade every tool to its latest remote version.
    ///
    /// The latest version of every tool whose fetch succeeded is recorded in
    /// `cache`, even when a later step of its upgrade failed.
    pub async fn upgrade(
        &self,
        ids: &[String],
        force: bool,
        cache: &mut dyn VersionCache,
        mut observer: impl FnMut(&ToolOutcome<UpgradeOutcome>),
    ) -> Result<BatchReport<UpgradeOutcome>> {
        let outcomes = self
            .run(
                ids,
                move |tool, manager| async move {
                    upgrade_tool(&tool, manager.as_ref(), force).await
                },
                &mut observer,
            )
            .await;

        record_latest(cache, &outcomes)?;
        Ok(BatchReport {
            operation: "upgrade",
            outcomes,
        })
    }

    async fn run<T, F, Fut>(
        &self,
        ids: &[String],
        op: F,
        observer: &mut impl FnMut(&ToolOutcome<T>),
    ) -> Vec<ToolOutcome<T>>
    where
        T: Send + 'static,
        F: Fn(Tool, Arc<dyn ToolVersionManager>) -> Fut,
        Fut: Future<Output = Attempt<T>> + Send + 'static,
    {
        let semaphore = self
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        let mut slots: Vec<Option<ToolOutcome<T>>> = ids.iter().map(|_| None).collect();
        let mut join_set = JoinSet::new();

        for (index, id) in ids.iter().enumerate() {
            let (tool, manager) = match self.registry.resolve(id) {
                Ok(resolved) => resolved,
                Err(e) => {
                    let outcome = ToolOutcome::failed(id, e);
                    observer(&outcome);
                    slots[index] = Some(outcome);
                    continue;
                }
            };

            let semaphore = semaphore.clone();
            let tool_id = id.clone();
            let work = op(tool, manager);
            join_set.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                // Inner task so a panicking driver only fails its own slot.
                let attempt = tokio::spawn(work).await.unwrap_or_else(|e| {
                    Attempt::before_latest(Error::TaskAborted {
                        tool: tool_id,
                        message: e.to_string(),
                    })
                });
                (index, attempt)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, attempt)) => {
                    let outcome = ToolOutcome {
                        id: ids[index].clone(),
                        latest: attempt.latest,
                        result: attempt.result,
                    };
                    observer(&outcome);
                    slots[index] = Some(outcome);
                }
                Err(e) => warn!(error = %e, "Batch task was aborted"),
            }
        }

        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| {
                    ToolOutcome::failed(
                        id,
                        Error::TaskAborted {
                            tool: id.clone(),
                            message: "task never reported a result".to_string(),
                        },
                    )
                })
            })
            .collect()
    }
}

/// Latest remote version of a tool; an empty answer is malformed output.
pub async fn latest_version(tool: &Tool, manager: &dyn ToolVersionManager) -> Result<ToolVersion> {
    let latest = manager.latest_remote_version(tool).await?;
    if latest.is_empty() {
        return Err(Error::malformed_output(
            tool.id(),
            LifecycleOperation::LatestRemoteVersion.as_str(),
            "script printed no version",
        ));
    }
    Ok(latest)
}

async fn upgrade_tool(
    tool: &Tool,
    manager: &dyn ToolVersionManager,
    force: bool,
) -> Attempt<UpgradeOutcome> {
    let latest = match latest_version(tool, manager).await {
        Ok(latest) => latest,
        Err(e) => return Attempt::before_latest(e),
    };
    let result = upgrade_to(tool, manager, &latest, force).await;
    Attempt {
        latest: Some(latest),
        result,
    }
}

async fn upgrade_to(
    tool: &Tool,
    manager: &dyn ToolVersionManager,
    latest: &ToolVersion,
    force: bool,
) -> Result<UpgradeOutcome> {
    let current = match manager.link_info(tool).await {
        Ok(info) => info.version,
        Err(e) => {
            warn!(tool = tool.id(), error = %e, "Could not read link state, treating as unlinked");
            ToolVersion::empty()
        }
    };

    if !force
        && !current.is_empty()
        && manager.compare_versions(&current, latest) != Ordering::Less
    {
        info!(tool = tool.id(), %current, %latest, "Already at latest version");
        return Ok(UpgradeOutcome::AlreadyLatest {
            current,
            latest: latest.clone(),
        });
    }

    let installed = match manager.local_versions(tool).await {
        Ok(versions) => versions.contains(latest),
        Err(e) => {
            warn!(tool = tool.id(), error = %e, "Could not list local versions, installing");
            false
        }
    };
    if !installed {
        info!(tool = tool.id(), version = %latest, "Installing");
        manager.install(tool, latest).await?;
    }

    info!(tool = tool.id(), from = %current, to = %latest, "Linking");
    manager
        .link(tool, latest)
        .await?
        .into_result(tool.id(), LinkAction::Link)?;

    Ok(UpgradeOutcome::Upgraded {
        from: current,
        to: latest.clone(),
        installed: !installed,
    })
}

fn record_latest<T>(cache: &mut dyn VersionCache, outcomes: &[ToolOutcome<T>]) -> Result<()> {
    let mut changed = false;
    for outcome in outcomes {
        if let Some(latest) = &outcome.latest {
            if let Some(previous) = cache
                .replace(&outcome.id, latest.clone())
                .filter(|previous| previous != latest)
            {
                info!(tool = %outcome.id, %previous, %latest, "Latest upstream version changed");
            }
            changed = true;
        }
    }
    if changed {
        cache.save()?;
    }
    Ok(())
}
