#![allow(dead_code)]

use async_trait::async_trait;
use geoprobe::platform::client::{PlatformError, Result};
use geoprobe::platform::traits::{MeasurementSpec, ProbePlatform};
use geoprobe::results::types::VantagePoint;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    next_id: u64,
    outstanding: usize,
    max_outstanding: usize,
    submit_calls: usize,
    fetch_calls: usize,
    targets_by_id: HashMap<u64, String>,
}

/// In-memory measurement platform. Tracks how many jobs are outstanding
/// between submission and retrieval so tests can assert the concurrency cap.
#[derive(Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
    fetch_delay: Duration,
    fail_submit_targets: HashSet<String>,
    fail_fetch_targets: HashSet<String>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_delay(delay: Duration) -> Self {
        Self {
            fetch_delay: delay,
            ..Self::default()
        }
    }

    pub fn failing_fetch_for(targets: &[&str]) -> Self {
        Self {
            fail_fetch_targets: targets.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_submit_for(targets: &[&str]) -> Self {
        Self {
            fail_submit_targets: targets.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn submit_calls(&self) -> usize {
        self.state.lock().unwrap().submit_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn max_outstanding(&self) -> usize {
        self.state.lock().unwrap().max_outstanding
    }
}

#[async_trait]
impl ProbePlatform for MockPlatform {
    async fn submit(&self, spec: &MeasurementSpec) -> Result<Vec<u64>> {
        let mut state = self.state.lock().unwrap();
        state.submit_calls += 1;

        if self.fail_submit_targets.contains(&spec.target) {
            return Err(PlatformError::PlatformStatus {
                status: 400,
                message: format!("rejected submission for {}", spec.target),
            });
        }

        state.next_id += 1;
        let id = state.next_id;
        state.outstanding += 1;
        state.max_outstanding = state.max_outstanding.max(state.outstanding);
        state.targets_by_id.insert(id, spec.target.clone());
        Ok(vec![id])
    }

    async fn results_by_id(&self, id: u64) -> Result<Value> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        state.outstanding -= 1;

        let target = state
            .targets_by_id
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "0.0.0.0".to_string());

        if self.fail_fetch_targets.contains(&target) {
            return Err(PlatformError::ExhaustedRetries { attempts: 60 });
        }

        Ok(json!([{
            "dst_addr": target,
            "from": "5.6.7.8",
            "result": [{"rtt": 10.0}, {"rtt": "*"}, {"rtt": 8.5}]
        }]))
    }

    async fn results_by_tag(&self, _tag: &str) -> Result<Value> {
        Ok(json!([]))
    }
}

pub fn vantage_points(n: usize) -> BTreeMap<String, VantagePoint> {
    (0..n)
        .map(|i| {
            (
                format!("5.6.7.{}", i + 8),
                VantagePoint {
                    probe_id: Some(6000 + i as u64),
                    country_code: Some("FR".to_string()),
                    latitude: None,
                    longitude: None,
                },
            )
        })
        .collect()
}

pub fn targets(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("10.0.0.{}", i)).collect()
}

/// Hitlist with one /24 prefix per target group.
pub fn hitlist(groups: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    groups
        .iter()
        .map(|(prefix, addrs)| {
            (
                prefix.to_string(),
                addrs.iter().map(|a| a.to_string()).collect(),
            )
        })
        .collect()
}
