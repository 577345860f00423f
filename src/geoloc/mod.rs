use crate::results::types::TargetRecord;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("geolocation collaborator error: {0}")]
pub struct GeolocatorError(pub String);

/// Boundary to the downstream geolocation system.
///
/// The campaign controller hands over the aggregated min-RTT dataset plus the
/// per-prefix target grouping; everything past that point (RTT-to-distance
/// conversion, region intersection) lives outside this crate.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn deliver(
        &self,
        records: &BTreeMap<String, TargetRecord>,
        prefix_groups: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), GeolocatorError>;
}

/// Default collaborator for CLI runs: logs a dataset summary and discards it.
pub struct LoggingGeolocator;

#[async_trait]
impl Geolocator for LoggingGeolocator {
    async fn deliver(
        &self,
        records: &BTreeMap<String, TargetRecord>,
        prefix_groups: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), GeolocatorError> {
        let observations: usize = records.values().map(|r| r.observations.len()).sum();
        info!(
            targets = records.len(),
            observations,
            prefixes = prefix_groups.len(),
            "Aggregated dataset ready for geolocation"
        );
        Ok(())
    }
}
