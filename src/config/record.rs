use crate::results::types::VantagePoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to write campaign record: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize campaign record: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Audit record for one campaign, written before submission and again after
/// aggregation so a crashed campaign can be audited or resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub uuid: Uuid,
    pub is_dry_run: bool,
    pub description: String,
    pub address_family: u8,
    pub targets: Vec<String>,
    pub vantage_points: BTreeMap<String, VantagePoint>,
    #[serde(default)]
    pub ids: Vec<u64>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl CampaignRecord {
    /// Path of this record inside the record directory, keyed by campaign UUID.
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.yml", self.uuid))
    }

    /// Write the record, creating the directory if needed. Overwrites the
    /// previous snapshot of the same campaign.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, RecordError> {
        fs::create_dir_all(dir)?;
        let path = self.path_in(dir);
        let yaml = serde_yaml::to_string(self)?;
        fs::write(&path, yaml)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let yaml = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&yaml)?)
    }
}
