use crate::platform::client::PlatformError;
use crate::platform::traits::{MeasurementSpec, ProbePlatform};
use crate::results::types::VantagePoint;
use crate::scheduler::batch::MeasurementBatch;
use crate::scheduler::budget::{BudgetError, ConcurrencyBudget};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler config error: {0}")]
    Config(String),

    #[error("concurrency budget error: {0}")]
    Budget(#[from] BudgetError),
}

/// Per-batch retrieval outcome handed back to the campaign controller.
///
/// Failures stay attributed to their batch and tag; the campaign decides
/// whether to continue (it does).
#[derive(Debug)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub tag: String,
    pub payload: Result<Value, PlatformError>,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub max_concurrent: usize,
    pub nb_packets: u32,
    pub address_family: u8,
    pub dry_run: bool,
}

/// Partition a target set into submission batches that each fit inside the
/// concurrency budget. Pure; dry runs and real runs share it so their
/// partitioning is identical by construction.
pub fn plan_batches(targets: &[String], max_concurrent: usize) -> Vec<Vec<String>> {
    targets
        .chunks(max_concurrent.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Submits probe batches under the campaign's concurrency budget and spawns
/// one retrieval task per submitted batch.
pub struct JobScheduler {
    platform: Arc<dyn ProbePlatform>,
    budget: ConcurrencyBudget,
    settings: SchedulerSettings,
}

impl JobScheduler {
    pub fn new(platform: Arc<dyn ProbePlatform>, settings: SchedulerSettings) -> Self {
        let budget = ConcurrencyBudget::new(settings.max_concurrent);
        Self {
            platform,
            budget,
            settings,
        }
    }

    /// Submit all batches in order, never exceeding the budget of
    /// outstanding platform jobs. A batch's permits are acquired before it
    /// is dispatched and released only once its results have been retrieved
    /// and sent through `results_tx`, so batch k+1 waits for capacity freed
    /// by earlier batches rather than firing and forgetting.
    ///
    /// Cancellation stops new submissions immediately; already-submitted
    /// batches drain through their retrieval tasks, since accepted jobs
    /// cannot be recalled from the platform.
    ///
    /// Returns every batch created, submitted or not. Per-batch platform
    /// failures are reported through the channel, not as an error here.
    pub async fn run(
        &self,
        targets: &[String],
        vantage_points: &BTreeMap<String, VantagePoint>,
        tag: &str,
        results_tx: mpsc::Sender<BatchResult>,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<MeasurementBatch>, SchedulerError> {
        if vantage_points.is_empty() {
            return Err(SchedulerError::Config(
                "at least one vantage point is required".to_string(),
            ));
        }

        let probe_ids: Vec<u64> = vantage_points
            .values()
            .filter_map(|vp| vp.probe_id)
            .collect();

        let plan = plan_batches(targets, self.settings.max_concurrent);
        info!(
            tag,
            targets = targets.len(),
            batches = plan.len(),
            max_concurrent = self.settings.max_concurrent,
            dry_run = self.settings.dry_run,
            "Planned measurement batches"
        );

        let mut batches = Vec::with_capacity(plan.len());

        for batch_targets in plan {
            if *cancel.borrow() {
                warn!(tag, "Cancellation requested, halting batch submission");
                break;
            }

            let mut batch = MeasurementBatch::new(tag, batch_targets, vantage_points.clone());

            if self.settings.dry_run {
                debug!(
                    batch_id = %batch.batch_id,
                    targets = batch.targets.len(),
                    "Dry run: batch planned but not dispatched"
                );
                batch.completed_at = Some(Utc::now());
                batches.push(batch);
                continue;
            }

            // Backpressure point: waits for capacity freed by earlier batches.
            let permits = self.budget.acquire_jobs(batch.job_count()).await?;

            let mut ids = Vec::with_capacity(batch.job_count());
            let mut submit_failure: Option<PlatformError> = None;

            for target in &batch.targets {
                let spec = MeasurementSpec {
                    target: target.clone(),
                    address_family: self.settings.address_family,
                    packets: self.settings.nb_packets,
                    tag: tag.to_string(),
                    probe_ids: probe_ids.clone(),
                };

                match self.platform.submit(&spec).await {
                    Ok(mut job_ids) => ids.append(&mut job_ids),
                    Err(e) => {
                        submit_failure = Some(e);
                        break;
                    }
                }
            }

            batch.ids = ids.clone();
            batch.submitted_at = Some(Utc::now());

            if let Some(e) = submit_failure {
                error!(
                    batch_id = %batch.batch_id,
                    tag,
                    error = %e,
                    "Batch submission failed"
                );
                let _ = results_tx
                    .send(BatchResult {
                        batch_id: batch.batch_id,
                        tag: tag.to_string(),
                        payload: Err(e),
                    })
                    .await;
                drop(permits);
                batches.push(batch);
                continue;
            }

            debug!(
                batch_id = %batch.batch_id,
                jobs = ids.len(),
                "Batch submitted, spawning retrieval task"
            );

            let platform = Arc::clone(&self.platform);
            let tx = results_tx.clone();
            let batch_id = batch.batch_id;
            let task_tag = tag.to_string();

            tokio::spawn(async move {
                let payload = fetch_batch_results(platform, &ids).await;

                if tx
                    .send(BatchResult {
                        batch_id,
                        tag: task_tag,
                        payload,
                    })
                    .await
                    .is_err()
                {
                    warn!(batch_id = %batch_id, "Results channel closed before delivery");
                }

                // Capacity frees only once results are in: submit and
                // complete are one accounting transaction.
                drop(permits);
            });

            batches.push(batch);
        }

        Ok(batches)
    }
}

/// Retrieve and concatenate the result arrays for every job in a batch.
/// The first job failure fails the whole batch; partial payloads would be
/// silent data loss.
async fn fetch_batch_results(
    platform: Arc<dyn ProbePlatform>,
    ids: &[u64],
) -> Result<Value, PlatformError> {
    let fetches = ids.iter().map(|id| platform.results_by_id(*id));
    let outcomes = futures::future::join_all(fetches).await;

    let mut combined = Vec::new();
    for outcome in outcomes {
        match outcome? {
            Value::Array(mut entries) => combined.append(&mut entries),
            other => combined.push(other),
        }
    }

    Ok(Value::Array(combined))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.0.0.{}", i)).collect()
    }

    #[test]
    fn test_plan_batches_partitions_by_budget() {
        let plan = plan_batches(&addresses(7), 3);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].len(), 3);
        assert_eq!(plan[1].len(), 3);
        assert_eq!(plan[2].len(), 1);
    }

    #[test]
    fn test_plan_batches_single_batch_under_budget() {
        let plan = plan_batches(&addresses(4), 90);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].len(), 4);
    }

    #[test]
    fn test_plan_batches_empty_targets() {
        let plan = plan_batches(&[], 90);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_batches_is_deterministic() {
        // Dry runs rely on partitioning being a pure function of the input
        let targets = addresses(10);
        assert_eq!(plan_batches(&targets, 4), plan_batches(&targets, 4));
    }
}
