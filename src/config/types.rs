use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub platform: PlatformSettings,
    pub campaign: CampaignSettings,
    #[serde(default)]
    pub record: RecordSettings,
}

/// Connection settings for the external measurement platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    pub credentials: Credentials,

    /// Per-request network timeout; bounds a single stalled connection,
    /// not the whole retry loop.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,

    #[serde(default)]
    pub retry: RetrySettings,
}

/// Credential pair attached to every platform request.
/// Treated as an opaque blob; rotation and storage are out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub key: String,
}

/// Bounded retry loop for pending/empty platform responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(with = "humantime_serde", default = "default_retry_interval")]
    pub interval: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval: default_retry_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSettings {
    /// Hard cap on concurrently outstanding platform jobs.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Packets sent per probe; each yields one RTT sample.
    #[serde(default = "default_nb_packets")]
    pub nb_packets: u32,

    /// Representative targets sampled from each target prefix.
    #[serde(default = "default_targets_per_prefix")]
    pub targets_per_prefix: usize,

    #[serde(default = "default_address_family")]
    pub address_family: u8,

    #[serde(default)]
    pub description: String,
}

/// Where campaign audit records are written before and after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSettings {
    #[serde(default = "default_record_dir")]
    pub dir: PathBuf,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            dir: default_record_dir(),
        }
    }
}

fn default_base_url() -> String {
    "https://atlas.ripe.net/api/v2".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_max_attempts() -> usize {
    60
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_concurrent() -> usize {
    90
}

fn default_nb_packets() -> u32 {
    3
}

fn default_targets_per_prefix() -> usize {
    3
}

fn default_address_family() -> u8 {
    4
}

fn default_record_dir() -> PathBuf {
    PathBuf::from("measurement_config")
}
