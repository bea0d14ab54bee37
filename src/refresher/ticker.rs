use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info};

use crate::api::health::HealthState;
use crate::config::Config;
use crate::refresher::actions::{now_ms, send_change};
use crate::rng::SharedRandom;
use crate::state::ProductStore;
use crate::types::{ChangeSource, HistoryPoint, StateChange, View};

/// Revenue drift per tick is `(u - REVENUE_BIAS) * REVENUE_SWING`; the bias
/// above 0.5 makes the walk drift slightly downward.
const REVENUE_BIAS: f64 = 0.4;
const REVENUE_SWING: f64 = 1_000.0;
/// Chart points move on a larger scale than the headline figure.
const CHART_REVENUE_SWING: f64 = 5_000.0;
const CHART_BOOST_SWING: f64 = 1_000.0;

/// Background task that perturbs dashboard metrics on a fixed interval.
/// Ticks are skipped unless the dashboard view is active.
pub struct RealTimeTicker {
    cfg: Config,
    store: Arc<ProductStore>,
    rng: SharedRandom,
    change_tx: mpsc::Sender<StateChange>,
    health: Arc<HealthState>,
}

impl RealTimeTicker {
    pub fn new(
        cfg: Config,
        store: Arc<ProductStore>,
        rng: SharedRandom,
        change_tx: mpsc::Sender<StateChange>,
        health: Arc<HealthState>,
    ) -> Self {
        Self { cfg, store, rng, change_tx, health }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.cfg.tick_interval_secs));
        ticker.tick().await; // consume immediate first tick

        loop {
            ticker.tick().await;
            if let Some(change) = self.tick(now_ms()) {
                send_change(&self.change_tx, &self.health, change);
            }
        }
    }

    /// One dashboard update. Returns None when the dashboard is not active.
    pub fn tick(&self, at_ms: u64) -> Option<StateChange> {
        let view = self.store.active_view();
        if view != View::Dashboard {
            debug!(view = %view, "Tick skipped, dashboard not active");
            return None;
        }

        let (revenue, point) = self.rng.with(|rng| {
            let delta = (rng.next_f64() - REVENUE_BIAS) * REVENUE_SWING;
            let revenue = self.store.update_analytics(|a| {
                a.total_revenue += delta;
                a.total_revenue
            });

            let point = self.cfg.record_history.then(|| {
                let u_revenue = rng.next_f64();
                let u_boost = rng.next_f64();
                self.store.extend_history(|prev| match prev {
                    Some(prev) => HistoryPoint {
                        revenue: prev.revenue + (u_revenue - REVENUE_BIAS) * CHART_REVENUE_SWING,
                        ml_boost: prev.ml_boost + u_boost * CHART_BOOST_SWING,
                        recorded_at_ms: at_ms,
                    },
                    None => HistoryPoint { revenue, ml_boost: 0.0, recorded_at_ms: at_ms },
                })
            });
            (revenue, point)
        });

        self.health.record_tick(at_ms);
        info!(
            total_revenue = revenue,
            chart_revenue = point.map(|p| p.revenue),
            "Dashboard tick: total revenue ${revenue:.2}",
        );

        Some(StateChange {
            source: ChangeSource::Tick,
            changed_skus: Vec::new(),
            analytics_changed: true,
            history_appended: point.is_some(),
            message: format!("Total revenue now ${revenue:.2}"),
        })
    }
}
