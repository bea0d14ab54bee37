//! Seed data loaded at process start.

use crate::types::{
    AbTest, AbTestStatus, AnalyticsSnapshot, FeatureImportance, HistoryPoint, ModelMetrics, Product,
};

pub fn seed_products() -> Vec<Product> {
    vec![
        Product {
            sku: "SKU001".to_string(),
            name: "Wireless Headphones Pro".to_string(),
            category: "Electronics".to_string(),
            brand: "TechBrand".to_string(),
            base_cost: 50.00,
            current_price: 89.99,
            predicted_price: 92.50,
            inventory_level: 150,
            demand_score: 8.5,
            conversion_rate: 0.12,
            competitor_avg: 87.99,
            confidence_score: 0.94,
        },
        Product {
            sku: "SKU002".to_string(),
            name: "Fitness Tracker Elite".to_string(),
            category: "Wearables".to_string(),
            brand: "FitTech".to_string(),
            base_cost: 30.00,
            current_price: 59.99,
            predicted_price: 54.99,
            inventory_level: 75,
            demand_score: 7.2,
            conversion_rate: 0.08,
            competitor_avg: 52.99,
            confidence_score: 0.87,
        },
        Product {
            sku: "SKU003".to_string(),
            name: "Smart Phone Case Ultra".to_string(),
            category: "Accessories".to_string(),
            brand: "CaseMaker".to_string(),
            base_cost: 8.00,
            current_price: 24.99,
            predicted_price: 27.99,
            inventory_level: 300,
            demand_score: 9.1,
            conversion_rate: 0.18,
            competitor_avg: 26.99,
            confidence_score: 0.96,
        },
    ]
}

pub fn seed_models() -> ModelMetrics {
    let importance = [
        ("base_cost", 0.912398),
        ("competitor_avg_price", 0.075498),
        ("demand_score", 0.003813),
        ("brand_strength", 0.001656),
        ("inventory_level", 0.001298),
        ("seasonality_factor", 0.001273),
    ];
    ModelMetrics {
        price_model_accuracy: 0.988,
        demand_model_accuracy: 0.751,
        training_samples: 800,
        model_type: "Random Forest + Linear Regression".to_string(),
        feature_importance: importance
            .iter()
            .map(|&(feature, importance)| FeatureImportance {
                feature: feature.to_string(),
                importance,
            })
            .collect(),
        retrain_count: 0,
    }
}

pub fn seed_analytics() -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        total_revenue: 125_840.50,
        ml_revenue_boost: 18.7,
        avg_prediction_accuracy: 0.92,
        cost_savings: 8_450.30,
        optimization_success_rate: 0.89,
        optimization_runs: 0,
        models: seed_models(),
    }
}

/// Monthly revenue / ML-boost series the chart starts from.
pub fn seed_history(now_ms: u64) -> Vec<HistoryPoint> {
    const REVENUE: [f64; 7] = [98_000.0, 102_000.0, 115_000.0, 108_000.0, 125_000.0, 140_000.0, 155_000.0];
    const BOOST: [f64; 7] = [5_000.0, 8_000.0, 12_000.0, 15_000.0, 18_000.0, 23_000.0, 28_000.0];
    const MONTH_MS: u64 = 30 * 24 * 3_600_000;

    let n = REVENUE.len() as u64;
    REVENUE
        .iter()
        .zip(BOOST.iter())
        .enumerate()
        .map(|(i, (&revenue, &ml_boost))| HistoryPoint {
            revenue,
            ml_boost,
            recorded_at_ms: now_ms.saturating_sub((n - 1 - i as u64) * MONTH_MS),
        })
        .collect()
}

pub fn seed_ab_tests() -> Vec<AbTest> {
    vec![
        AbTest {
            name: "Premium Pricing Strategy".to_string(),
            description: "Testing 10% price increase on high-demand electronics".to_string(),
            status: AbTestStatus::Active,
            sample_size: 1_250,
            progress: 65,
            conversion_rate: 12.5,
            revenue_impact: 8.2,
            significance: 0.95,
        },
        AbTest {
            name: "Dynamic Competitor Matching".to_string(),
            description: "Real-time price matching with top 3 competitors".to_string(),
            status: AbTestStatus::Completed,
            sample_size: 1_000,
            progress: 100,
            conversion_rate: 15.8,
            revenue_impact: 3.1,
            significance: 0.98,
        },
        AbTest {
            name: "Inventory-Based Pricing".to_string(),
            description: "Price adjustment based on stock levels".to_string(),
            status: AbTestStatus::Active,
            sample_size: 1_000,
            progress: 23,
            conversion_rate: 0.0,
            revenue_impact: 0.0,
            significance: 0.45,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_products_respect_price_floor() {
        for p in seed_products() {
            assert!(p.predicted_price >= p.base_cost * 1.1, "{} below floor", p.sku);
            assert!((1.0..=10.0).contains(&p.demand_score));
        }
    }

    #[test]
    fn seed_history_is_chronological() {
        let history = seed_history(10_000_000_000_000);
        assert_eq!(history.len(), 7);
        assert!(history.windows(2).all(|w| w[0].recorded_at_ms < w[1].recorded_at_ms));
        assert_eq!(history[6].recorded_at_ms, 10_000_000_000_000);
    }
}
