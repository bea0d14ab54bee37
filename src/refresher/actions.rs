use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::ActionLatency;
use crate::config::{retrain, Config, CONFIDENCE_CEIL, CONFIDENCE_FLOOR, PRICE_EPSILON};
use crate::error::{AppError, Result};
use crate::estimator::{DemandEstimator, PriceEstimator};
use crate::rng::SharedRandom;
use crate::state::ProductStore;
use crate::types::{
    AbTest, AbTestStatus, ActionKind, ActionOutcome, ChangeSource, PriceEstimate, Product, StateChange,
};

/// Relative jitter applied to predictions on refresh.
const REFRESH_PRICE_JITTER: f64 = 0.025;
/// Absolute nudge applied to confidence on refresh.
const REFRESH_CONFIDENCE_NUDGE: f64 = 0.025;
/// Relative drift of competitor averages per sync.
const COMPETITOR_DRIFT: f64 = 0.05;
/// Sample size assigned to newly created A/B tests.
const AB_TEST_SAMPLE_SIZE: u32 = 1_000;

/// Single entry point for every mutation of the product catalog and the
/// analytics shadow.
///
/// Bulk actions go through `run_action`: Idle → Running (simulated delay) →
/// apply → Idle. A trigger that arrives while any bulk action is Running is
/// rejected with `AppError::Busy`; nothing is queued. Single-product edits
/// are rejected the same way while a bulk action is Running, and otherwise
/// apply immediately with the gate locked so no bulk action can start under them.
pub struct PeriodicRefresher {
    cfg: Config,
    store: Arc<ProductStore>,
    rng: SharedRandom,
    price_model: PriceEstimator,
    demand_model: DemandEstimator,
    change_tx: mpsc::Sender<StateChange>,
    health: Arc<HealthState>,
    latency: Arc<ActionLatency>,
    /// The bulk action currently Running, if any.
    running: Mutex<Option<ActionKind>>,
}

/// Returns the gate to Idle when dropped, including when the action future
/// is dropped mid-delay.
pub struct RunningGuard<'a> {
    slot: &'a Mutex<Option<ActionKind>>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        match self.slot.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl PeriodicRefresher {
    pub fn new(
        cfg: Config,
        store: Arc<ProductStore>,
        rng: SharedRandom,
        change_tx: mpsc::Sender<StateChange>,
        health: Arc<HealthState>,
        latency: Arc<ActionLatency>,
    ) -> Self {
        Self {
            cfg,
            store,
            rng,
            price_model: PriceEstimator::new(),
            demand_model: DemandEstimator::new(),
            change_tx,
            health,
            latency,
            running: Mutex::new(None),
        }
    }

    /// The bulk action currently Running, if any.
    pub fn running_action(&self) -> Option<ActionKind> {
        match self.running.lock() {
            Ok(slot) => *slot,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Enter Running for `kind`, or fail with `Busy` naming the action
    /// that holds the gate.
    pub fn begin(&self, kind: ActionKind) -> Result<RunningGuard<'_>> {
        let mut slot = match self.running.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(current) = *slot {
            self.health.inc_actions_rejected();
            warn!(requested = %kind, running = %current, "Action rejected: {current} still running");
            return Err(AppError::Busy(current));
        }
        *slot = Some(kind);
        Ok(RunningGuard { slot: &self.running })
    }

    /// Run a single-product edit with the gate locked. Fails with `Busy`
    /// while a bulk action is Running.
    fn while_idle<T>(&self, action: ChangeSource, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let slot = match self.running.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(current) = *slot {
            self.health.inc_actions_rejected();
            warn!(requested = %action, running = %current, "Edit rejected: {current} still running");
            return Err(AppError::Busy(current));
        }
        f()
    }

    /// Run a bulk action end to end: gate, simulated delay, mutation, notify.
    pub async fn run_action(&self, kind: ActionKind) -> Result<ActionOutcome> {
        let _guard = self.begin(kind)?;
        let started = Instant::now();
        let delay = self.cfg.action_delay(kind);
        info!(action = %kind, delay_ms = delay.as_millis() as u64, "Action started: {kind}");

        tokio::time::sleep(delay).await;
        let outcome = self.apply(kind);

        let elapsed = started.elapsed();
        self.latency.record(kind, elapsed);
        self.health.inc_actions_completed();
        info!(
            action = %kind,
            changed = outcome.changed_skus.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Action complete: {}",
            outcome.message,
        );

        self.notify(StateChange {
            source: ChangeSource::Action(kind),
            changed_skus: outcome.changed_skus.clone(),
            analytics_changed: matches!(kind, ActionKind::BulkOptimize | ActionKind::Retrain),
            history_appended: false,
            message: outcome.message.clone(),
        });
        Ok(outcome)
    }

    /// Apply the mutation for `kind` immediately, without gate or delay.
    pub fn apply(&self, kind: ActionKind) -> ActionOutcome {
        match kind {
            ActionKind::Refresh => self.refresh_predictions(),
            ActionKind::BulkOptimize => self.bulk_optimize(),
            ActionKind::Retrain => self.retrain_models(),
            ActionKind::SyncCompetitors => self.sync_competitor_prices(),
        }
    }

    // -----------------------------------------------------------------------
    // Bulk mutations
    // -----------------------------------------------------------------------

    /// Jitter every prediction by up to ±2.5% (cost floor kept) and nudge
    /// confidence by up to ±0.025 within [0.70, 0.99].
    pub fn refresh_predictions(&self) -> ActionOutcome {
        let skus = self.store.skus();
        let changed: Vec<String> = self.rng.with(|rng| {
            skus.into_iter()
                .filter(|sku| {
                    let updated = self.store.update_product(sku, |p| {
                        let predicted = self.price_model.refine(
                            p.predicted_price,
                            p.base_cost,
                            REFRESH_PRICE_JITTER,
                            rng,
                        )?;
                        let confidence = (p.confidence_score + rng.symmetric(REFRESH_CONFIDENCE_NUDGE))
                            .clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEIL);
                        p.predicted_price = predicted;
                        p.confidence_score = confidence;
                        Ok::<(), AppError>(())
                    });
                    match updated {
                        Some(Ok(())) => true,
                        Some(Err(e)) => {
                            warn!(sku = %sku, "Refresh skipped product: {e}");
                            false
                        }
                        None => false,
                    }
                })
                .collect()
        });

        ActionOutcome {
            action: ActionKind::Refresh,
            message: format!("Predictions refreshed for {} products", changed.len()),
            changed_skus: changed,
            revenue_impact: None,
        }
    }

    /// Move every unconverged current price onto its prediction.
    pub fn bulk_optimize(&self) -> ActionOutcome {
        let changed: Vec<String> = self
            .store
            .skus()
            .into_iter()
            .filter(|sku| {
                self.store
                    .update_product(sku, |p| {
                        if (p.predicted_price - p.current_price).abs() > PRICE_EPSILON {
                            p.current_price = p.predicted_price;
                            true
                        } else {
                            false
                        }
                    })
                    .unwrap_or(false)
            })
            .collect();

        let revenue_impact = if changed.is_empty() {
            0.0
        } else {
            self.rng.with(|rng| (rng.next_f64() * 5_000.0 + 2_000.0).floor())
        };
        self.store.update_analytics(|a| a.optimization_runs += 1);

        ActionOutcome {
            action: ActionKind::BulkOptimize,
            message: format!(
                "{} products optimized, estimated revenue impact +${revenue_impact:.0}",
                changed.len()
            ),
            changed_skus: changed,
            revenue_impact: Some(revenue_impact),
        }
    }

    /// Step both model accuracies toward their ceilings.
    pub fn retrain_models(&self) -> ActionOutcome {
        let (price_acc, demand_acc) = self.store.update_analytics(|a| {
            let m = &mut a.models;
            m.price_model_accuracy =
                (m.price_model_accuracy + retrain::PRICE_ACCURACY_STEP).min(retrain::PRICE_ACCURACY_CAP);
            m.demand_model_accuracy =
                (m.demand_model_accuracy + retrain::DEMAND_ACCURACY_STEP).min(retrain::DEMAND_ACCURACY_CAP);
            m.retrain_count += 1;
            (m.price_model_accuracy, m.demand_model_accuracy)
        });

        ActionOutcome {
            action: ActionKind::Retrain,
            message: format!(
                "Models retrained: price accuracy {:.1}%, demand accuracy {:.1}%",
                price_acc * 100.0,
                demand_acc * 100.0
            ),
            changed_skus: Vec::new(),
            revenue_impact: None,
        }
    }

    /// Drift every competitor average by up to ±5%, never below base cost.
    pub fn sync_competitor_prices(&self) -> ActionOutcome {
        let skus = self.store.skus();
        let changed: Vec<String> = self.rng.with(|rng| {
            skus.into_iter()
                .filter(|sku| {
                    self.store
                        .update_product(sku, |p| {
                            let previous = p.competitor_avg;
                            let drifted = previous * (1.0 + rng.symmetric(COMPETITOR_DRIFT));
                            p.competitor_avg = drifted.max(p.base_cost);
                            (p.competitor_avg - previous).abs() > PRICE_EPSILON
                        })
                        .unwrap_or(false)
                })
                .collect()
        });

        ActionOutcome {
            action: ActionKind::SyncCompetitors,
            message: format!("Competitor prices synced, {} price changes detected", changed.len()),
            changed_skus: changed,
            revenue_impact: None,
        }
    }

    // -----------------------------------------------------------------------
    // Single-product edits
    // -----------------------------------------------------------------------

    /// Set the current price to the model's recommendation.
    pub fn accept_recommendation(&self, sku: &str) -> Result<Product> {
        let product = self.while_idle(ChangeSource::AcceptRecommendation, || {
            self.store
                .update_product(sku, |p| {
                    p.current_price = p.predicted_price;
                    p.clone()
                })
                .ok_or_else(|| AppError::unknown_sku(sku))
        })?;

        info!(sku = %sku, price = product.current_price, "Recommendation applied for {}", product.name);
        self.notify_product(ChangeSource::AcceptRecommendation, &product, "ML recommendation applied");
        Ok(product)
    }

    /// Override the current price. `price` must be positive and finite.
    pub fn set_custom_price(&self, sku: &str, price: f64) -> Result<Product> {
        if !self.store.contains(sku) {
            return Err(AppError::unknown_sku(sku));
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(AppError::PreconditionViolation(format!(
                "custom price must be positive, got {price}"
            )));
        }
        let product = self.while_idle(ChangeSource::CustomPrice, || {
            self.store
                .update_product(sku, |p| {
                    p.current_price = price;
                    p.clone()
                })
                .ok_or_else(|| AppError::unknown_sku(sku))
        })?;

        info!(sku = %sku, price, "Custom price set for {}", product.name);
        self.notify_product(ChangeSource::CustomPrice, &product, "Custom price set");
        Ok(product)
    }

    /// Re-run both estimators against the product's current attributes and
    /// store demand score, prediction and confidence.
    pub fn reprice(&self, sku: &str) -> Result<PriceEstimate> {
        let now = now_ms();
        let (estimate, product) = self.while_idle(ChangeSource::Reprice, || {
            self.rng.with(|rng| {
                self.store
                    .update_product(sku, |p| {
                        let demand = self.demand_model.estimate(&p.demand_request(now), rng);
                        let mut req = p.price_request();
                        req.demand_score = demand;
                        let estimate = self.price_model.estimate(&req, rng)?;
                        p.demand_score = demand;
                        p.predicted_price = estimate.price;
                        p.confidence_score = estimate.confidence;
                        Ok::<_, AppError>((estimate, p.clone()))
                    })
                    .unwrap_or_else(|| Err(AppError::unknown_sku(sku)))
            })
        })?;

        debug!(
            sku = %sku,
            demand = product.demand_score,
            predicted = estimate.price,
            confidence = estimate.confidence,
            "Repriced {}",
            product.name,
        );
        self.notify_product(ChangeSource::Reprice, &product, "Prediction regenerated");
        Ok(estimate)
    }

    /// Register a new active A/B test.
    pub fn create_ab_test(&self, name: &str, description: Option<String>) -> Result<AbTest> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("A/B test name must not be empty".to_string()));
        }
        if self.store.has_ab_test(name) {
            return Err(AppError::InvalidInput(format!("A/B test \"{name}\" already exists")));
        }
        let test = AbTest {
            name: name.to_string(),
            description: description.unwrap_or_default(),
            status: AbTestStatus::Active,
            sample_size: AB_TEST_SAMPLE_SIZE,
            progress: 0,
            conversion_rate: 0.0,
            revenue_impact: 0.0,
            significance: 0.0,
        };
        self.store.add_ab_test(test.clone());
        info!(name = %test.name, sample_size = test.sample_size, "A/B test created");
        self.notify(StateChange {
            source: ChangeSource::AbTestCreated,
            changed_skus: Vec::new(),
            analytics_changed: false,
            history_appended: false,
            message: format!("A/B test \"{}\" created", test.name),
        });
        Ok(test)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    fn notify_product(&self, source: ChangeSource, product: &Product, what: &str) {
        self.notify(StateChange {
            source,
            changed_skus: vec![product.sku.clone()],
            analytics_changed: false,
            history_appended: false,
            message: format!("{what} for {}", product.name),
        });
    }

    fn notify(&self, change: StateChange) {
        send_change(&self.change_tx, &self.health, change);
    }
}

/// Hand a change to the render side without blocking the writer.
pub fn send_change(tx: &mpsc::Sender<StateChange>, health: &HealthState, change: StateChange) {
    match tx.try_send(change) {
        Ok(()) => {}
        Err(TrySendError::Full(change)) => {
            health.inc_notifications_dropped();
            warn!(source = %change.source, "State change channel full, notification dropped");
        }
        Err(TrySendError::Closed(_)) => {
            debug!("State change channel closed");
        }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{FixedRandom, SeededRandom};

    fn refresher_with(rng: SharedRandom) -> (PeriodicRefresher, mpsc::Receiver<StateChange>) {
        refresher_with_delay(rng, 0.0)
    }

    fn refresher_with_delay(
        rng: SharedRandom,
        delay_scale: f64,
    ) -> (PeriodicRefresher, mpsc::Receiver<StateChange>) {
        let cfg = Config { delay_scale, ..Config::default() };
        let store = ProductStore::seeded(cfg.history_capacity, 0);
        let (tx, rx) = mpsc::channel(64);
        let refresher = PeriodicRefresher::new(
            cfg,
            store,
            rng,
            tx,
            Arc::new(HealthState::new()),
            Arc::new(ActionLatency::new()),
        );
        (refresher, rx)
    }

    fn seeded_refresher() -> (PeriodicRefresher, mpsc::Receiver<StateChange>) {
        refresher_with(SharedRandom::new(SeededRandom::from_seed(11)))
    }

    #[test]
    fn bulk_optimize_converges_and_is_idempotent() {
        let (r, _rx) = seeded_refresher();
        let first = r.bulk_optimize();
        assert_eq!(first.changed_skus.len(), 3);
        let impact = first.revenue_impact.unwrap();
        assert!((2_000.0..7_000.0).contains(&impact), "impact={impact}");
        for p in r.store.products() {
            assert_eq!(p.current_price, p.predicted_price);
        }

        let second = r.bulk_optimize();
        assert!(second.changed_skus.is_empty());
        assert_eq!(second.revenue_impact, Some(0.0));
        assert_eq!(r.store.analytics().optimization_runs, 2);
    }

    #[test]
    fn retrain_steps_accuracies() {
        let (r, _rx) = seeded_refresher();
        r.retrain_models();
        let models = r.store.analytics().models;
        assert!((models.price_model_accuracy - 0.989).abs() < 1e-12);
        assert!((models.demand_model_accuracy - 0.756).abs() < 1e-12);
        assert_eq!(models.retrain_count, 1);
    }

    #[test]
    fn retrain_respects_ceilings() {
        let (r, _rx) = seeded_refresher();
        for _ in 0..50 {
            r.retrain_models();
        }
        let models = r.store.analytics().models;
        assert_eq!(models.price_model_accuracy, retrain::PRICE_ACCURACY_CAP);
        assert_eq!(models.demand_model_accuracy, retrain::DEMAND_ACCURACY_CAP);
    }

    #[test]
    fn refresh_keeps_floor_and_confidence_band() {
        let (r, _rx) = seeded_refresher();
        for _ in 0..200 {
            r.refresh_predictions();
        }
        for p in r.store.products() {
            assert!(p.predicted_price >= p.base_cost * 1.1 - 1e-12, "{} below floor", p.sku);
            assert!((CONFIDENCE_FLOOR..=CONFIDENCE_CEIL).contains(&p.confidence_score));
        }
    }

    #[test]
    fn sync_competitors_never_drops_below_cost() {
        let (r, _rx) = refresher_with(SharedRandom::new(FixedRandom(0.0)));
        for _ in 0..100 {
            r.sync_competitor_prices();
        }
        for p in r.store.products() {
            assert_eq!(p.competitor_avg, p.base_cost);
        }
        let quiet = r.sync_competitor_prices();
        assert!(quiet.changed_skus.is_empty());
    }

    #[test]
    fn accept_unknown_sku_is_invalid_and_mutates_nothing() {
        let (r, mut rx) = seeded_refresher();
        let before = r.store.products();
        let err = r.accept_recommendation("SKU999").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(r.store.products(), before);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn accept_recommendation_notifies_with_sku() {
        let (r, mut rx) = seeded_refresher();
        let product = r.accept_recommendation("SKU002").unwrap();
        assert_eq!(product.current_price, 54.99);
        let change = rx.try_recv().expect("expected state change");
        assert_eq!(change.source, ChangeSource::AcceptRecommendation);
        assert_eq!(change.changed_skus, vec!["SKU002".to_string()]);
    }

    #[test]
    fn custom_price_must_be_positive() {
        let (r, _rx) = seeded_refresher();
        for bad in [0.0, -1.0, f64::INFINITY] {
            let err = r.set_custom_price("SKU001", bad).unwrap_err();
            assert!(matches!(err, AppError::PreconditionViolation(_)));
        }
        assert_eq!(r.store.get_product("SKU001").unwrap().current_price, 89.99);

        let err = r.set_custom_price("NOPE", 10.0).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let p = r.set_custom_price("SKU001", 79.5).unwrap();
        assert_eq!(p.current_price, 79.5);
    }

    #[test]
    fn reprice_writes_estimator_outputs() {
        let (r, _rx) = refresher_with(SharedRandom::new(FixedRandom(0.5)));
        let estimate = r.reprice("SKU003").unwrap();
        let p = r.store.get_product("SKU003").unwrap();
        assert_eq!(p.predicted_price, estimate.price);
        assert_eq!(p.confidence_score, estimate.confidence);
        assert!((1.0..=10.0).contains(&p.demand_score));
        assert!(p.predicted_price >= p.base_cost * 1.1);

        assert!(matches!(r.reprice("SKU404"), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn ab_test_names_are_validated() {
        let (r, _rx) = seeded_refresher();
        assert!(matches!(r.create_ab_test("  ", None), Err(AppError::InvalidInput(_))));
        let test = r.create_ab_test("Weekend Discount", None).unwrap();
        assert_eq!(test.status, AbTestStatus::Active);
        assert_eq!(test.sample_size, 1_000);
        assert!(matches!(r.create_ab_test("weekend discount", None), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn second_action_is_rejected_while_running() {
        let (r, _rx) = seeded_refresher();
        let guard = r.begin(ActionKind::Refresh).unwrap();
        assert_eq!(r.running_action(), Some(ActionKind::Refresh));
        let err = r.begin(ActionKind::Retrain).err().unwrap();
        assert!(matches!(err, AppError::Busy(ActionKind::Refresh)));
        drop(guard);
        assert_eq!(r.running_action(), None);
        assert!(r.begin(ActionKind::Retrain).is_ok());
    }

    #[tokio::test]
    async fn run_action_completes_and_notifies() {
        let (r, mut rx) = seeded_refresher();
        let outcome = r.run_action(ActionKind::Retrain).await.unwrap();
        assert_eq!(outcome.action, ActionKind::Retrain);
        assert_eq!(r.running_action(), None);

        let change = rx.try_recv().expect("expected state change");
        assert_eq!(change.source, ChangeSource::Action(ActionKind::Retrain));
        assert!(change.analytics_changed);
    }

    #[tokio::test]
    async fn run_action_is_busy_while_gate_held() {
        let (r, _rx) = seeded_refresher();
        let _guard = r.begin(ActionKind::SyncCompetitors).unwrap();
        let err = r.run_action(ActionKind::BulkOptimize).await.unwrap_err();
        assert!(matches!(err, AppError::Busy(ActionKind::SyncCompetitors)));
    }

    #[tokio::test]
    async fn bulk_optimize_notifies_changed_skus() {
        let (r, mut rx) = seeded_refresher();
        let outcome = r.run_action(ActionKind::BulkOptimize).await.unwrap();
        assert!(!outcome.changed_skus.is_empty());

        let change = rx.try_recv().expect("expected state change");
        assert_eq!(change.source, ChangeSource::Action(ActionKind::BulkOptimize));
        assert_eq!(change.changed_skus, outcome.changed_skus);
        assert!(change.analytics_changed);
    }

    #[tokio::test]
    async fn single_product_edits_are_rejected_while_bulk_action_runs() {
        let (r, mut rx) = refresher_with_delay(SharedRandom::new(SeededRandom::from_seed(11)), 0.05);
        let r = Arc::new(r);
        let before = r.store.get_product("SKU001").unwrap();

        let worker = Arc::clone(&r);
        let handle = tokio::spawn(async move { worker.run_action(ActionKind::BulkOptimize).await });
        while r.running_action().is_none() {
            tokio::task::yield_now().await;
        }

        let err = r.set_custom_price("SKU001", 70.0).unwrap_err();
        assert!(matches!(err, AppError::Busy(ActionKind::BulkOptimize)));
        assert!(matches!(r.accept_recommendation("SKU001"), Err(AppError::Busy(_))));
        assert!(matches!(r.reprice("SKU001"), Err(AppError::Busy(_))));
        assert_eq!(r.store.get_product("SKU001").unwrap(), before);

        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.changed_skus.contains(&"SKU001".to_string()));
        assert_eq!(r.store.get_product("SKU001").unwrap().current_price, before.predicted_price);
        let change = rx.try_recv().expect("expected state change");
        assert_eq!(change.source, ChangeSource::Action(ActionKind::BulkOptimize));

        let updated = r.set_custom_price("SKU001", 70.0).unwrap();
        assert_eq!(updated.current_price, 70.0);
        assert_eq!(r.store.get_product("SKU001").unwrap().current_price, 70.0);
    }
}
