mod api;
mod config;
mod error;
mod estimator;
mod refresher;
mod rng;
mod state;
mod types;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::ActionLatency;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::error::Result;
use crate::refresher::actions::now_ms;
use crate::refresher::{PeriodicRefresher, RealTimeTicker};
use crate::rng::SharedRandom;
use crate::state::ProductStore;
use crate::types::{ChangeSource, StateChange};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- In-memory state, seeded from the built-in catalog ---
    let store = ProductStore::seeded(cfg.history_capacity, now_ms());
    let analytics = store.analytics();
    info!(
        products = store.product_count(),
        total_revenue = analytics.total_revenue,
        price_accuracy = analytics.models.price_model_accuracy,
        demand_accuracy = analytics.models.demand_model_accuracy,
        "Catalog loaded: {} products, {} chart points",
        store.product_count(),
        store.history().len(),
    );

    match cfg.rng_seed {
        Some(seed) => info!(seed, "Random source seeded"),
        None => info!("Random source seeded from OS entropy (set RNG_SEED for reproducible runs)"),
    }
    let rng = SharedRandom::from_seed(cfg.rng_seed);

    let health = Arc::new(HealthState::new());
    let latency = Arc::new(ActionLatency::new());

    // --- Channels ---
    let (change_tx, change_rx) = mpsc::channel::<StateChange>(CHANNEL_CAPACITY);

    // --- Spawn tasks ---

    // State change consumer: the render side's feed
    tokio::spawn(async move { change_consumer(change_rx).await });

    // Command interface for bulk actions and product edits
    let refresher = Arc::new(PeriodicRefresher::new(
        cfg.clone(),
        Arc::clone(&store),
        rng.clone(),
        change_tx.clone(),
        Arc::clone(&health),
        Arc::clone(&latency),
    ));

    // Real-time dashboard ticker (background, every TICK_INTERVAL_SECS)
    let ticker = RealTimeTicker::new(
        cfg.clone(),
        Arc::clone(&store),
        rng,
        change_tx,
        Arc::clone(&health),
    );
    tokio::spawn(async move { ticker.run().await });

    // HTTP API server
    let api_state = ApiState {
        store: Arc::clone(&store),
        refresher,
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        tick_secs = cfg.tick_interval_secs,
        delay_scale = cfg.delay_scale,
        "HTTP API listening on {bind_addr}"
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Consumes state-change notifications and logs them for the render side.
async fn change_consumer(mut rx: mpsc::Receiver<StateChange>) {
    while let Some(change) = rx.recv().await {
        log_change(&change);
    }
}

fn log_change(c: &StateChange) {
    let skus = if c.changed_skus.is_empty() {
        "-".to_string()
    } else {
        c.changed_skus.join(",")
    };
    match c.source {
        ChangeSource::Tick => tracing::debug!(
            event = "STATE_CHANGED",
            source = %c.source,
            history_appended = c.history_appended,
            "{}",
            c.message,
        ),
        _ => info!(
            event = "STATE_CHANGED",
            source = %c.source,
            skus = %skus,
            analytics = c.analytics_changed,
            "STATE CHANGED | {} | skus: {skus}",
            c.message,
        ),
    }
}
