//! Concurrent multi-provider collection.
//!
//! One task per provider; finished rows come back over a channel to the
//! collecting task, which is the only owner of the result list.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::error::CloudError;
use crate::core::models::result::{ProviderCostResult, ProviderOutcome, ProviderWasteResult};
use crate::core::orchestrator::{self, Workflow};
use crate::core::providers::capability::ProviderCapabilitySet;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy)]
pub struct Collector {
    timeout: Duration,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Collector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `run` once per provider and gather every row, sorted AWS, GCP, Azure.
    ///
    /// A provider that errors, panics or exceeds the timeout yields a failed
    /// row; the call itself only fails when there is nothing to run or when
    /// every provider failed.
    pub async fn collect<R, F, Fut>(
        &self,
        workflow: Workflow,
        providers: Vec<ProviderCapabilitySet>,
        run: F,
    ) -> Result<Vec<R>, CloudError>
    where
        R: ProviderOutcome,
        F: Fn(ProviderCapabilitySet) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        if providers.is_empty() {
            return Err(CloudError::NoProvidersConfigured { workflow });
        }

        let count = providers.len();
        let (tx, mut rx) = mpsc::channel::<R>(count);

        for caps in providers {
            let provider = caps.provider;
            let tx = tx.clone();
            let limit = self.timeout;
            let work = run(caps);

            tokio::spawn(async move {
                info!(%provider, "provider started");
                let mut handle = tokio::spawn(work);
                let row = match tokio::time::timeout(limit, &mut handle).await {
                    Ok(Ok(row)) => row,
                    Ok(Err(join_err)) => {
                        let err = CloudError::TaskFailed {
                            provider,
                            message: join_err.to_string(),
                        };
                        warn!(%provider, error = %err, "provider task failed");
                        R::from_error(provider, &err)
                    }
                    Err(_) => {
                        handle.abort();
                        let err = CloudError::Timeout {
                            provider,
                            limit,
                        };
                        warn!(%provider, "provider timed out");
                        R::from_error(provider, &err)
                    }
                };
                if let Some(e) = row.error().filter(|e| !e.is_empty()) {
                    info!(%provider, error = e, "provider finished with error");
                } else {
                    info!(%provider, "provider finished");
                }
                if tx.send(row).await.is_err() {
                    debug!(%provider, "collector dropped before result was delivered");
                }
            });
        }
        drop(tx);

        let mut rows = Vec::with_capacity(count);
        while let Some(row) = rx.recv().await {
            rows.push(row);
        }
        rows.sort_by_key(|r| r.provider().priority());

        if rows.iter().all(|r| r.is_failed()) {
            let details = rows
                .iter()
                .map(|r| format!("  - {}: {}", r.provider(), r.error().unwrap_or_default()))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(CloudError::AllProvidersFailed {
                count: rows.len(),
                details,
            });
        }

        Ok(rows)
    }

    /// Cost or trend rows, depending on `workflow`.
    pub async fn collect_costs(
        &self,
        workflow: Workflow,
        providers: Vec<ProviderCapabilitySet>,
    ) -> Result<Vec<ProviderCostResult>, CloudError> {
        match workflow {
            Workflow::Trend => {
                self.collect(workflow, providers, |caps| async move {
                    orchestrator::run_trend(&caps).await
                })
                .await
            }
            _ => {
                self.collect(workflow, providers, |caps| async move {
                    orchestrator::run_cost(&caps).await
                })
                .await
            }
        }
    }

    pub async fn collect_waste(
        &self,
        providers: Vec<ProviderCapabilitySet>,
    ) -> Result<Vec<ProviderWasteResult>, CloudError> {
        self.collect(Workflow::Waste, providers, |caps| async move {
            orchestrator::run_waste(&caps).await
        })
        .await
    }
}
