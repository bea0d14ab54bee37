use crate::error::{AppError, Result};
use crate::rng::RandomSource;
use crate::types::{PriceEstimate, PriceRequest};

/// Weighted-markup price recommender ("random forest" in the product copy).
///
/// Output is always floored at `base_cost * floor_markup`, whatever the
/// inputs or the random draw.
#[derive(Debug, Clone)]
pub struct PriceEstimator {
    /// Baseline markup over cost.
    pub base_markup: f64,
    /// Share of cost added at demand_score = 10.
    pub demand_weight: f64,
    /// Share of the competitor premium over cost that is passed through.
    pub competitor_weight: f64,
    /// Inventory above this level triggers the overstock discount.
    pub overstock_threshold: u32,
    /// Share of cost removed when overstocked.
    pub overstock_discount: f64,
    /// Half-width of the multiplicative uncertainty band.
    pub uncertainty: f64,
    /// Hard floor as a multiple of cost.
    pub floor_markup: f64,
    /// Confidence is drawn from `[confidence_min, confidence_min + confidence_span)`.
    pub confidence_min: f64,
    pub confidence_span: f64,
}

impl Default for PriceEstimator {
    fn default() -> Self {
        Self {
            base_markup: 1.2,
            demand_weight: 0.3,
            competitor_weight: 0.8,
            overstock_threshold: 200,
            overstock_discount: 0.05,
            uncertainty: 0.05,
            floor_markup: 1.1,
            confidence_min: 0.85,
            confidence_span: 0.14,
        }
    }
}

impl PriceEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic part of the recommendation, before uncertainty and floor.
    pub fn point_estimate(&self, req: &PriceRequest) -> f64 {
        let cost = req.base_cost;
        let mut price = cost * self.base_markup;
        price += (req.demand_score / 10.0) * cost * self.demand_weight;
        price += (req.competitor_avg - cost).max(0.0) * self.competitor_weight;
        if req.inventory_level > self.overstock_threshold {
            price -= cost * self.overstock_discount;
        }
        price
    }

    /// Recommend a price and a confidence for `req`.
    ///
    /// Draws two samples from `rng`: uncertainty first, then confidence.
    /// Confidence is not derived from the price.
    pub fn estimate(&self, req: &PriceRequest, rng: &mut dyn RandomSource) -> Result<PriceEstimate> {
        check_cost(req.base_cost)?;

        let uncertainty = rng.symmetric(self.uncertainty);
        let price = self.point_estimate(req) * (1.0 + uncertainty);
        let confidence = self.confidence_min + rng.next_f64() * self.confidence_span;

        Ok(PriceEstimate {
            price: self.floor(req.base_cost).max(price),
            confidence,
        })
    }

    /// Jitter an existing recommendation by up to `±jitter` (relative),
    /// keeping the cost floor.
    pub fn refine(
        &self,
        predicted: f64,
        base_cost: f64,
        jitter: f64,
        rng: &mut dyn RandomSource,
    ) -> Result<f64> {
        check_cost(base_cost)?;
        let variation = rng.symmetric(jitter);
        Ok(self.floor(base_cost).max(predicted * (1.0 + variation)))
    }

    pub fn floor(&self, base_cost: f64) -> f64 {
        base_cost * self.floor_markup
    }
}

fn check_cost(cost: f64) -> Result<()> {
    if cost.is_finite() && cost > 0.0 {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("base cost must be positive, got {cost}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{FixedRandom, SeededRandom};

    fn req(cost: f64, demand: f64, competitor: f64, inventory: u32) -> PriceRequest {
        PriceRequest {
            base_cost: cost,
            demand_score: demand,
            competitor_avg: competitor,
            inventory_level: inventory,
        }
    }

    #[test]
    fn headphones_recommendation_without_uncertainty() {
        let est = PriceEstimator::new();
        // Draws map u to (u - 0.5) * 2 * width, so 0.5 is the zero-uncertainty source.
        let mut rng = FixedRandom(0.5);
        let out = est.estimate(&req(50.0, 8.5, 87.99, 150), &mut rng).unwrap();
        // 60 + 12.75 + 30.392
        assert!((out.price - 103.142).abs() < 1e-9, "price={}", out.price);
        assert!((out.confidence - 0.92).abs() < 1e-9);
    }

    #[test]
    fn overstock_discount_applies_above_threshold() {
        let est = PriceEstimator::new();
        let at = est.point_estimate(&req(10.0, 0.0, 0.0, 200));
        let over = est.point_estimate(&req(10.0, 0.0, 0.0, 201));
        assert!((at - over - 0.5).abs() < 1e-9);
    }

    #[test]
    fn price_never_drops_below_floor() {
        let est = PriceEstimator::new();
        let mut rng = SeededRandom::from_seed(7);
        for i in 0..500 {
            let cost = 0.5 + (i as f64) * 0.37;
            let r = req(cost, (i % 11) as f64, (i % 3) as f64 * cost, (i * 13 % 400) as u32);
            let out = est.estimate(&r, &mut rng).unwrap();
            assert!(out.price >= cost * 1.1 - 1e-12, "cost={cost} price={}", out.price);
            assert!((0.85..0.99).contains(&out.confidence));
        }
    }

    #[test]
    fn worst_case_uncertainty_still_hits_floor() {
        // Zero demand, no competitor premium, overstocked, maximum downward draw.
        let est = PriceEstimator::new();
        let mut rng = FixedRandom(0.0);
        let out = est.estimate(&req(100.0, 0.0, 0.0, 500), &mut rng).unwrap();
        assert!((out.price - 110.0).abs() < 1e-9, "price={}", out.price);
    }

    #[test]
    fn non_positive_cost_is_rejected() {
        let est = PriceEstimator::new();
        let mut rng = FixedRandom(0.5);
        for cost in [0.0, -3.0, f64::NAN] {
            let err = est.estimate(&req(cost, 5.0, 10.0, 10), &mut rng).unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
    }

    #[test]
    fn refine_keeps_floor() {
        let est = PriceEstimator::new();
        let mut rng = FixedRandom(0.0);
        let refined = est.refine(55.1, 50.0, 0.025, &mut rng).unwrap();
        assert!((refined - 55.0).abs() < 1e-9);

        let mut up = FixedRandom(0.75);
        let refined = est.refine(100.0, 50.0, 0.025, &mut up).unwrap();
        assert!((refined - 101.25).abs() < 1e-9);
    }
}
