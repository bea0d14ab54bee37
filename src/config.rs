use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::ActionKind;

/// Channel capacity for state-change notifications.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Real-time dashboard tick interval (seconds).
pub const TICK_INTERVAL_SECS: u64 = 30;

/// Number of revenue / ML-boost points retained for the dashboard chart.
pub const HISTORY_CAPACITY: usize = 10;

/// Nominal simulated latency per bulk action (milliseconds).
pub const REFRESH_DELAY_MS: u64 = 2_000;
pub const BULK_OPTIMIZE_DELAY_MS: u64 = 3_000;
pub const RETRAIN_DELAY_MS: u64 = 4_000;
pub const SYNC_COMPETITORS_DELAY_MS: u64 = 2_500;

/// Upper bound on any scaled simulated delay, so a misconfigured scale
/// cannot park an action forever.
pub const MAX_SIMULATED_DELAY_MS: u64 = 10_000;

/// Model accuracy ceilings and per-retrain increments.
pub mod retrain {
    pub const PRICE_ACCURACY_STEP: f64 = 0.001;
    pub const PRICE_ACCURACY_CAP: f64 = 0.995;
    pub const DEMAND_ACCURACY_STEP: f64 = 0.005;
    pub const DEMAND_ACCURACY_CAP: f64 = 0.85;
}

/// Confidence band the refresh nudge is clamped into.
pub const CONFIDENCE_FLOOR: f64 = 0.70;
pub const CONFIDENCE_CEIL: f64 = 0.99;

/// Prices closer than this are treated as already converged.
pub const PRICE_EPSILON: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Fixed seed for the shared random source (RNG_SEED). None = OS entropy.
    pub rng_seed: Option<u64>,
    /// Real-time ticker interval (TICK_INTERVAL_SECS)
    pub tick_interval_secs: u64,
    /// Multiplier applied to every nominal action latency (DELAY_SCALE).
    /// 0 disables waiting entirely.
    pub delay_scale: f64,
    /// Rolling window size for the revenue chart (HISTORY_CAPACITY)
    pub history_capacity: usize,
    /// Whether dashboard ticks append chart points (RECORD_HISTORY)
    pub record_history: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            rng_seed: match std::env::var("RNG_SEED") {
                Ok(raw) => Some(
                    raw.trim()
                        .parse::<u64>()
                        .map_err(|_| AppError::Config("RNG_SEED must be an unsigned integer".to_string()))?,
                ),
                Err(_) => None,
            },
            tick_interval_secs: std::env::var("TICK_INTERVAL_SECS")
                .unwrap_or_else(|_| TICK_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(TICK_INTERVAL_SECS)
                .max(1),
            delay_scale: std::env::var("DELAY_SCALE")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .unwrap_or(1.0),
            history_capacity: std::env::var("HISTORY_CAPACITY")
                .unwrap_or_else(|_| HISTORY_CAPACITY.to_string())
                .parse::<usize>()
                .unwrap_or(HISTORY_CAPACITY)
                .max(1),
            record_history: std::env::var("RECORD_HISTORY")
                .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }

    /// Nominal latency for `kind`, scaled and bounded.
    pub fn action_delay(&self, kind: ActionKind) -> Duration {
        let nominal = match kind {
            ActionKind::Refresh => REFRESH_DELAY_MS,
            ActionKind::BulkOptimize => BULK_OPTIMIZE_DELAY_MS,
            ActionKind::Retrain => RETRAIN_DELAY_MS,
            ActionKind::SyncCompetitors => SYNC_COMPETITORS_DELAY_MS,
        };
        let scaled = (nominal as f64 * self.delay_scale).round() as u64;
        Duration::from_millis(scaled.min(MAX_SIMULATED_DELAY_MS))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            api_port: 3000,
            rng_seed: None,
            tick_interval_secs: TICK_INTERVAL_SECS,
            delay_scale: 1.0,
            history_capacity: HISTORY_CAPACITY,
            record_history: true,
        }
    }
}
