//! Per-action wall-time histograms, simulated delay included.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::types::ActionKind;

/// Tracks 1ms to 100s, 3 significant figures.
const MAX_TRACKED_MS: u64 = 100_000;

#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub action: ActionKind,
    pub samples: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

/// Shared action latency stats. Refresher records, API reads.
#[derive(Default)]
pub struct ActionLatency {
    inner: Mutex<HashMap<ActionKind, Histogram<u64>>>,
}

impl ActionLatency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: ActionKind, elapsed: Duration) {
        let ms = (elapsed.as_millis().min(u128::from(MAX_TRACKED_MS)) as u64).max(1);
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        if !map.contains_key(&action) {
            match Histogram::new_with_bounds(1, MAX_TRACKED_MS, 3) {
                Ok(h) => {
                    map.insert(action, h);
                }
                Err(_) => return,
            }
        }
        if let Some(h) = map.get_mut(&action) {
            let _ = h.record(ms);
        }
    }

    /// One summary per action that has at least one sample.
    pub fn summaries(&self) -> Vec<LatencySummary> {
        let Ok(map) = self.inner.lock() else {
            return Vec::new();
        };
        let mut out: Vec<LatencySummary> = map
            .iter()
            .filter(|(_, h)| h.len() > 0)
            .map(|(action, h)| LatencySummary {
                action: *action,
                samples: h.len(),
                p50_ms: h.value_at_quantile(0.5),
                p95_ms: h.value_at_quantile(0.95),
                p99_ms: h.value_at_quantile(0.99),
            })
            .collect();
        out.sort_by_key(|s| s.action.to_string());
        out
    }
}
