use crate::results::types::VantagePoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One unit of submitted work: a slice of the target set probed from every
/// vantage point, correlated by tag for later bulk retrieval.
///
/// Created by the scheduler at submission time. Immutable once submitted,
/// except for the terminal `completed_at` stamp set when all of its results
/// have been retrieved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementBatch {
    pub batch_id: Uuid,

    pub tag: String,

    pub targets: Vec<String>,

    pub vantage_points: BTreeMap<String, VantagePoint>,

    /// None until dispatched; stays None for dry-run batches.
    pub submitted_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Platform-assigned job ids; empty for dry-run batches.
    pub ids: Vec<u64>,
}

impl MeasurementBatch {
    pub fn new(
        tag: &str,
        targets: Vec<String>,
        vantage_points: BTreeMap<String, VantagePoint>,
    ) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            tag: tag.to_string(),
            targets,
            vantage_points,
            submitted_at: None,
            completed_at: None,
            ids: Vec::new(),
        }
    }

    /// Number of platform jobs this batch accounts for against the
    /// concurrency budget (one job per target).
    pub fn job_count(&self) -> usize {
        self.targets.len()
    }
}
