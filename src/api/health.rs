//! Shared health counters for the /health endpoint.
//! Updated by the refresher, the real-time ticker and the change consumer.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared engine counters. Written by background tasks, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Bulk actions that ran to completion.
    pub actions_completed: AtomicU64,
    /// Bulk actions rejected because another one was running.
    pub actions_rejected: AtomicU64,
    /// Dashboard ticks that mutated analytics.
    pub ticks_applied: AtomicU64,
    /// Millisecond timestamp of the last applied tick (0 = none).
    pub last_tick_at_ms: AtomicU64,
    /// State-change notifications dropped because the channel was full.
    pub notifications_dropped: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub actions_completed: u64,
    pub actions_rejected: u64,
    pub ticks_applied: u64,
    pub last_tick_at_ms: u64,
    pub notifications_dropped: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_actions_completed(&self) {
        self.actions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_actions_rejected(&self) {
        self.actions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self, at_ms: u64) {
        self.ticks_applied.fetch_add(1, Ordering::Relaxed);
        self.last_tick_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn inc_notifications_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            actions_completed: self.actions_completed.load(Ordering::Relaxed),
            actions_rejected: self.actions_rejected.load(Ordering::Relaxed),
            ticks_applied: self.ticks_applied.load(Ordering::Relaxed),
            last_tick_at_ms: self.last_tick_at_ms.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
        }
    }
}
