use crate::campaign::state::{Campaign, CampaignState, StateError};
use crate::config::types::CampaignSettings;
use crate::geoloc::{Geolocator, GeolocatorError};
use crate::platform::traits::ProbePlatform;
use crate::results::types::{ProbeReading, TargetRecord, VantagePoint};
use crate::results::{normalize, reduce};
use crate::scheduler::batch::MeasurementBatch;
use crate::scheduler::runner::{BatchResult, JobScheduler, SchedulerError, SchedulerSettings};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("campaign config error: {0}")]
    Config(String),

    #[error("campaign state error: {0}")]
    State(#[from] StateError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("geolocation collaborator error: {0}")]
    Geolocator(#[from] GeolocatorError),
}

/// A batch that ultimately failed, attributed to its tag so the caller can
/// audit or re-run it. Never aborts the campaign.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch_id: Uuid,
    pub tag: String,
    pub error: String,
}

/// Outcome of a full campaign: the aggregated dataset, audit timestamps and
/// every batch with its per-batch failure attribution.
#[derive(Debug)]
pub struct CampaignReport {
    pub uuid: Uuid,
    pub dry_run: bool,
    pub ids: Vec<u64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub batches: Vec<MeasurementBatch>,
    pub records: BTreeMap<String, TargetRecord>,
    pub failures: Vec<BatchFailure>,
}

/// Select up to `per_prefix` representative targets from each prefix's
/// candidate list, in prefix order, deduplicated. Prefixes missing from the
/// hitlist are skipped with a warning.
pub fn select_targets(
    target_prefixes: &[String],
    targets_per_prefix: &BTreeMap<String, Vec<String>>,
    per_prefix: usize,
) -> BTreeMap<String, Vec<String>> {
    let mut selected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen: HashSet<&String> = HashSet::new();

    for prefix in target_prefixes {
        let candidates = match targets_per_prefix.get(prefix) {
            Some(candidates) => candidates,
            None => {
                warn!(prefix = %prefix, "Prefix has no hitlist candidates, skipping");
                continue;
            }
        };

        let chosen: Vec<String> = candidates
            .iter()
            .filter(|t| seen.insert(*t))
            .take(per_prefix)
            .cloned()
            .collect();

        if chosen.is_empty() {
            continue;
        }
        selected.entry(prefix.clone()).or_default().extend(chosen);
    }

    selected
}

/// Orchestrates scheduler, transport, normalizer and reducer across a full
/// campaign, then hands the aggregated dataset to the geolocation
/// collaborator.
pub struct CampaignController {
    platform: Arc<dyn ProbePlatform>,
    geolocator: Arc<dyn Geolocator>,
    settings: CampaignSettings,
}

impl CampaignController {
    pub fn new(
        platform: Arc<dyn ProbePlatform>,
        geolocator: Arc<dyn Geolocator>,
        settings: CampaignSettings,
    ) -> Self {
        Self {
            platform,
            geolocator,
            settings,
        }
    }

    /// Run one campaign end to end: select representative targets per
    /// prefix, submit batches under the concurrency budget, poll results,
    /// normalize and reduce them, and deliver the aggregated records.
    ///
    /// Cancellation stops new submissions; batches already accepted by the
    /// platform drain, and whatever was reduced by then is returned rather
    /// than discarded.
    pub async fn estimate_probing_targets(
        &self,
        target_prefixes: &[String],
        vantage_points: &BTreeMap<String, VantagePoint>,
        targets_per_prefix: &BTreeMap<String, Vec<String>>,
        tag: Uuid,
        dry_run: bool,
        cancel: watch::Receiver<bool>,
    ) -> Result<CampaignReport, CampaignError> {
        // The only fatal condition: caller-supplied invalid configuration,
        // surfaced before any network activity.
        if vantage_points.is_empty() {
            return Err(CampaignError::Config(
                "campaign requires at least one vantage point".to_string(),
            ));
        }

        let mut campaign = Campaign::new(tag, dry_run);

        let prefix_groups =
            select_targets(target_prefixes, targets_per_prefix, self.settings.targets_per_prefix);
        let targets: Vec<String> = prefix_groups.values().flatten().cloned().collect();

        info!(
            campaign = %tag,
            prefixes = prefix_groups.len(),
            targets = targets.len(),
            vantage_points = vantage_points.len(),
            dry_run,
            "Campaign drafted"
        );

        let start_time = Utc::now();
        campaign.start_time = Some(start_time);

        let scheduler = JobScheduler::new(
            Arc::clone(&self.platform),
            SchedulerSettings {
                max_concurrent: self.settings.max_concurrent,
                nb_packets: self.settings.nb_packets,
                address_family: self.settings.address_family,
                dry_run,
            },
        );

        let (results_tx, mut results_rx) = mpsc::channel::<BatchResult>(64);

        let mut scheduler_task = tokio::spawn({
            let targets = targets.clone();
            let vantage_points = vantage_points.clone();
            let tag = tag.to_string();
            let cancel = cancel.clone();
            async move {
                scheduler
                    .run(&targets, &vantage_points, &tag, results_tx, cancel)
                    .await
            }
        });

        // Drain batch results concurrently with submission: retrieval tasks
        // hold budget permits until their result is consumed here, so waiting
        // for the scheduler first would deadlock the backpressure loop.
        let mut readings: BTreeMap<String, Vec<ProbeReading>> = BTreeMap::new();
        let mut failures: Vec<BatchFailure> = Vec::new();
        let mut completion_times: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        let mut submitted: Option<Vec<MeasurementBatch>> = None;

        loop {
            tokio::select! {
                joined = &mut scheduler_task, if submitted.is_none() => {
                    submitted = Some(joined??);
                    campaign.transition(CampaignState::Submitted)?;
                    campaign.transition(CampaignState::Polling)?;
                }
                maybe_result = results_rx.recv() => {
                    match maybe_result {
                        Some(result) => {
                            // Re-entered per batch as retries resolve
                            if campaign.state == CampaignState::Polling {
                                campaign.transition(CampaignState::Polling)?;
                            }
                            self.absorb_batch_result(
                                result,
                                &mut readings,
                                &mut failures,
                                &mut completion_times,
                            );
                        }
                        None => break,
                    }
                }
            }
        }

        // The channel can close before the join branch fires; collect the
        // scheduler's outcome either way.
        let mut batches = match submitted {
            Some(batches) => batches,
            None => {
                let batches = scheduler_task.await??;
                campaign.transition(CampaignState::Submitted)?;
                campaign.transition(CampaignState::Polling)?;
                batches
            }
        };
        for batch in &mut batches {
            if let Some(completed_at) = completion_times.get(&batch.batch_id) {
                batch.completed_at = Some(*completed_at);
            }
        }

        let records = reduce(&readings);

        campaign.transition(CampaignState::Aggregated)?;

        let end_time = Utc::now();
        campaign.end_time = Some(end_time);
        campaign.batches = batches.clone();

        let ids: Vec<u64> = batches.iter().flat_map(|b| b.ids.iter().copied()).collect();

        info!(
            campaign = %tag,
            jobs = ids.len(),
            targets_with_results = records.len(),
            failed_batches = failures.len(),
            "Campaign aggregated"
        );

        self.geolocator.deliver(&records, &prefix_groups).await?;

        Ok(CampaignReport {
            uuid: tag,
            dry_run,
            ids,
            start_time,
            end_time,
            batches,
            records,
            failures,
        })
    }

    fn absorb_batch_result(
        &self,
        result: BatchResult,
        readings: &mut BTreeMap<String, Vec<ProbeReading>>,
        failures: &mut Vec<BatchFailure>,
        completion_times: &mut HashMap<Uuid, DateTime<Utc>>,
    ) {
        match result.payload {
            Ok(payload) => {
                // Only a retrieved batch counts as completed; failed batches
                // keep `completed_at` unset in the audit record.
                completion_times.insert(result.batch_id, Utc::now());
                let normalized = normalize(&payload);
                debug!(
                    batch_id = %result.batch_id,
                    targets = normalized.len(),
                    "Normalized batch payload"
                );
                for (target, mut probe_readings) in normalized {
                    readings.entry(target).or_default().append(&mut probe_readings);
                }
            }
            Err(e) => {
                error!(
                    batch_id = %result.batch_id,
                    tag = %result.tag,
                    error = %e,
                    "Batch failed, campaign continues with remaining batches"
                );
                failures.push(BatchFailure {
                    batch_id: result.batch_id,
                    tag: result.tag,
                    error: e.to_string(),
                });
            }
        }
    }
}
