use serde::{Deserialize, Serialize};

/// One probe's valid RTT samples toward a target, as seen from a single
/// vantage point. Sentinel ("no reply") samples are filtered out before
/// construction, so `rtt_samples` is always non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReading {
    pub vantage_point: String,
    pub target: String,
    pub rtt_samples: Vec<f64>,
}

/// A reduced reading: the minimum RTT over one probe's samples.
///
/// Invariant: `min_rtt == min(rtt_samples)`, computed after sentinel
/// filtering. Zero is a valid RTT (same-host or sub-millisecond link).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub vantage_point: String,
    pub min_rtt: f64,
    pub rtt_samples: Vec<f64>,
}

/// All observations collected for one target during a campaign.
///
/// Repeated probes from the same vantage point stay separate observations;
/// the downstream geolocation collaborator decides how to combine them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub target: String,
    pub observations: Vec<Observation>,
}

/// Metadata for a vantage point, keyed by address in the input datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VantagePoint {
    /// Platform-assigned probe identifier, used for job submission.
    #[serde(default)]
    pub probe_id: Option<u64>,

    #[serde(default)]
    pub country_code: Option<String>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,
}
