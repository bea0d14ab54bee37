use crate::rng::RandomSource;
use crate::types::DemandRequest;

/// Length of one seasonality cycle, in milliseconds (30 days).
pub const MONTH_PERIOD_MS: f64 = 30.0 * 24.0 * 60.0 * 60.0 * 1000.0;

pub const DEMAND_MIN: f64 = 1.0;
pub const DEMAND_MAX: f64 = 10.0;

/// Fixed-coefficient linear demand model with a sinusoidal monthly term.
#[derive(Debug, Clone)]
pub struct DemandEstimator {
    pub intercept: f64,
    pub price_coef: f64,
    pub competitor_coef: f64,
    pub inventory_coef: f64,
    pub seasonality_coef: f64,
    /// Half-width of the additive noise band.
    pub noise: f64,
}

impl Default for DemandEstimator {
    fn default() -> Self {
        Self {
            intercept: 5.0,
            price_coef: -0.02,
            competitor_coef: 0.015,
            inventory_coef: 0.0001,
            seasonality_coef: 0.1,
            noise: 0.25,
        }
    }
}

impl DemandEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seasonal lift in `[0, 2 * seasonality_coef]`.
    pub fn seasonality(&self, timestamp_ms: u64) -> f64 {
        ((timestamp_ms as f64 / MONTH_PERIOD_MS).sin() + 1.0) * self.seasonality_coef
    }

    /// Demand score in `[1, 10]`. One draw from `rng` for the noise term.
    pub fn estimate(&self, req: &DemandRequest, rng: &mut dyn RandomSource) -> f64 {
        let demand = self.intercept
            + req.current_price * self.price_coef
            + req.competitor_avg * self.competitor_coef
            + f64::from(req.inventory_level) * self.inventory_coef
            + self.seasonality(req.timestamp_ms);

        let noisy = demand + rng.symmetric(self.noise);
        if noisy.is_nan() {
            return DEMAND_MIN;
        }
        noisy.clamp(DEMAND_MIN, DEMAND_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{FixedRandom, SeededRandom};

    fn req(price: f64, competitor: f64, inventory: u32, ts: u64) -> DemandRequest {
        DemandRequest {
            current_price: price,
            competitor_avg: competitor,
            inventory_level: inventory,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn linear_terms_at_epoch() {
        // sin(0) = 0 → seasonality 0.1
        let est = DemandEstimator::new();
        let mut rng = FixedRandom(0.5);
        let score = est.estimate(&req(89.99, 87.99, 150, 0), &mut rng);
        let expected = 5.0 - 89.99 * 0.02 + 87.99 * 0.015 + 150.0 * 0.0001 + 0.1;
        assert!((score - expected).abs() < 1e-9, "score={score}");
    }

    #[test]
    fn seasonality_stays_in_band() {
        let est = DemandEstimator::new();
        for day in 0..120u64 {
            let s = est.seasonality(day * 24 * 3_600_000);
            assert!((0.0..=0.2 + 1e-12).contains(&s), "day={day} s={s}");
        }
    }

    #[test]
    fn output_is_clamped() {
        let est = DemandEstimator::new();
        let mut rng = SeededRandom::from_seed(99);
        let cases = [
            req(10_000.0, 0.0, 0, 0),
            req(0.0, 10_000.0, 1_000_000, 0),
            req(-500.0, 0.0, 0, u64::MAX),
            req(f64::NAN, 1.0, 1, 1),
            req(49.0, 52.0, 75, 1_700_000_000_000),
        ];
        for r in cases {
            for _ in 0..50 {
                let score = est.estimate(&r, &mut rng);
                assert!((DEMAND_MIN..=DEMAND_MAX).contains(&score), "score={score}");
            }
        }
    }
}
