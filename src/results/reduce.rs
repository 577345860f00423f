use crate::results::types::{Observation, ProbeReading, TargetRecord};
use std::collections::BTreeMap;
use tracing::warn;

/// Reduce normalized probe readings to per-target records with one min-RTT
/// observation per reading.
///
/// Repeated readings for the same (target, vantage point) pair are kept as
/// independent observations, not merged; combining re-probes is the
/// downstream geolocation collaborator's call.
pub fn reduce(readings: &BTreeMap<String, Vec<ProbeReading>>) -> BTreeMap<String, TargetRecord> {
    let mut records = BTreeMap::new();

    for (target, target_readings) in readings {
        let mut observations = Vec::with_capacity(target_readings.len());

        for reading in target_readings {
            // Upstream filtering guarantees non-empty samples; a violation is
            // dropped here rather than producing a bogus observation.
            let min_rtt = match min_sample(&reading.rtt_samples) {
                Some(min_rtt) => min_rtt,
                None => {
                    warn!(
                        target = %target,
                        vantage_point = %reading.vantage_point,
                        "Reading with no samples reached the reducer, dropping"
                    );
                    continue;
                }
            };

            observations.push(Observation {
                vantage_point: reading.vantage_point.clone(),
                min_rtt,
                rtt_samples: reading.rtt_samples.clone(),
            });
        }

        if observations.is_empty() {
            continue;
        }

        records.insert(
            target.clone(),
            TargetRecord {
                target: target.clone(),
                observations,
            },
        );
    }

    records
}

fn min_sample(samples: &[f64]) -> Option<f64> {
    samples.iter().copied().reduce(f64::min)
}
