use crate::platform::client::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Description of one probe job: a single target measured from a set of
/// vantage points, correlated to its campaign through the tag.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSpec {
    pub target: String,
    pub address_family: u8,
    pub packets: u32,
    pub tag: String,
    pub probe_ids: Vec<u64>,
}

/// Seam to the external measurement platform.
///
/// The scheduler and campaign controller only see this trait, so tests can
/// substitute a mock platform and dry runs can be verified to make zero
/// network calls.
#[async_trait]
pub trait ProbePlatform: Send + Sync {
    /// Submit one probe job, returning the platform-assigned job ids.
    async fn submit(&self, spec: &MeasurementSpec) -> Result<Vec<u64>>;

    /// Retrieve results for a single job id, polling until the platform has
    /// something to report.
    async fn results_by_id(&self, id: u64) -> Result<Value>;

    /// Retrieve results for every job sharing a tag. The payload may need
    /// structural repair before it decodes.
    async fn results_by_tag(&self, tag: &str) -> Result<Value>;
}
