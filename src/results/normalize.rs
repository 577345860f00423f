use crate::results::types::ProbeReading;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Normalize a raw platform payload into probe readings grouped by target.
///
/// Partial platform failures are expected: entries without a `result` field
/// are warned about and skipped, never fatal. Per-probe results arrive either
/// as a list of keyed RTT entries or as a single object with an `rtt` field;
/// both flatten to one sample sequence. Non-numeric sentinel samples ("no
/// reply") are filtered out, and an entry left with zero valid samples is
/// dropped entirely rather than recorded as a zero-RTT reading.
pub fn normalize(payload: &Value) -> BTreeMap<String, Vec<ProbeReading>> {
    let mut grouped: BTreeMap<String, Vec<ProbeReading>> = BTreeMap::new();

    let entries = match payload.as_array() {
        Some(entries) => entries,
        None => {
            warn!("Expected a result array, got a non-array payload");
            return grouped;
        }
    };

    for entry in entries {
        let result = match entry.get("result") {
            Some(result) if !result.is_null() => result,
            _ => {
                warn!(entry = %entry, "Probe entry carries no result, skipping");
                continue;
            }
        };

        let target = entry.get("dst_addr").and_then(Value::as_str);
        let vantage_point = entry.get("from").and_then(Value::as_str);
        let (target, vantage_point) = match (target, vantage_point) {
            (Some(target), Some(vantage_point)) => (target, vantage_point),
            _ => {
                warn!(entry = %entry, "Probe entry missing addresses, skipping");
                continue;
            }
        };

        let rtt_samples = collect_samples(result);
        if rtt_samples.is_empty() {
            warn!(
                target = %target,
                vantage_point = %vantage_point,
                "No valid RTT samples after sentinel filtering, dropping entry"
            );
            continue;
        }

        grouped
            .entry(target.to_string())
            .or_default()
            .push(ProbeReading {
                vantage_point: vantage_point.to_string(),
                target: target.to_string(),
                rtt_samples,
            });
    }

    grouped
}

/// Flatten the two result shapes into numeric samples, excluding sentinels.
fn collect_samples(result: &Value) -> Vec<f64> {
    match result {
        // List shape: each element is a single-key object holding one sample
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_object())
            .filter_map(|fields| fields.values().next())
            .filter_map(Value::as_f64)
            .collect(),
        // Scalar shape: one object with an rtt field
        Value::Object(fields) => fields
            .get("rtt")
            .and_then(Value::as_f64)
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}
