use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub brand: String,
    pub base_cost: f64,
    pub current_price: f64,
    /// Estimator output. Never below `base_cost * 1.1`.
    pub predicted_price: f64,
    pub inventory_level: u32,
    /// 1.0 – 10.0
    pub demand_score: f64,
    /// 0.0 – 1.0
    pub conversion_rate: f64,
    pub competitor_avg: f64,
    /// 0.0 – 1.0
    pub confidence_score: f64,
}

impl Product {
    /// Recommended move from the current price, in percent.
    pub fn price_change_pct(&self) -> f64 {
        (self.predicted_price - self.current_price) / self.current_price * 100.0
    }

    pub fn demand_level(&self) -> DemandLevel {
        DemandLevel::from_score(self.demand_score)
    }

    pub fn price_request(&self) -> PriceRequest {
        PriceRequest {
            base_cost: self.base_cost,
            demand_score: self.demand_score,
            competitor_avg: self.competitor_avg,
            inventory_level: self.inventory_level,
        }
    }

    pub fn demand_request(&self, timestamp_ms: u64) -> DemandRequest {
        DemandRequest {
            current_price: self.current_price,
            competitor_avg: self.competitor_avg,
            inventory_level: self.inventory_level,
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandLevel {
    /// demand_score >= 8
    High,
    /// 5 <= demand_score < 8
    Medium,
    /// demand_score < 5
    Low,
}

impl DemandLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            DemandLevel::High
        } else if score >= 5.0 {
            DemandLevel::Medium
        } else {
            DemandLevel::Low
        }
    }
}

impl std::fmt::Display for DemandLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DemandLevel::High => "high",
            DemandLevel::Medium => "medium",
            DemandLevel::Low => "low",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Estimator inputs / outputs
// ---------------------------------------------------------------------------

/// Attributes the price estimator reads. Copied out of a `Product` per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRequest {
    pub base_cost: f64,
    pub demand_score: f64,
    pub competitor_avg: f64,
    pub inventory_level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceEstimate {
    pub price: f64,
    pub confidence: f64,
}

/// Attributes the demand estimator reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandRequest {
    pub current_price: f64,
    pub competitor_avg: f64,
    pub inventory_level: u32,
    /// Milliseconds since the Unix epoch; drives the seasonality term.
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub price_model_accuracy: f64,
    pub demand_model_accuracy: f64,
    pub training_samples: u32,
    pub model_type: String,
    pub feature_importance: Vec<FeatureImportance>,
    pub retrain_count: u64,
}

/// Aggregate dashboard metrics. Mutated on its own path; it is never
/// recomputed from the product set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub total_revenue: f64,
    pub ml_revenue_boost: f64,
    pub avg_prediction_accuracy: f64,
    pub cost_savings: f64,
    pub optimization_success_rate: f64,
    pub optimization_runs: u64,
    pub models: ModelMetrics,
}

/// One point on the revenue chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub revenue: f64,
    pub ml_boost: f64,
    pub recorded_at_ms: u64,
}

// ---------------------------------------------------------------------------
// A/B tests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbTestStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTest {
    pub name: String,
    pub description: String,
    pub status: AbTestStatus,
    pub sample_size: u32,
    /// 0 – 100
    pub progress: u8,
    pub conversion_rate: f64,
    pub revenue_impact: f64,
    pub significance: f64,
}

// ---------------------------------------------------------------------------
// Actions and views
// ---------------------------------------------------------------------------

/// Bulk actions that run behind the simulated-latency gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Refresh,
    BulkOptimize,
    Retrain,
    SyncCompetitors,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::Refresh => "refresh",
            ActionKind::BulkOptimize => "bulk_optimize",
            ActionKind::Retrain => "retrain",
            ActionKind::SyncCompetitors => "sync_competitors",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Dashboard,
    Products,
    MlModels,
    Analytics,
    AbTesting,
    Competitors,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            View::Dashboard => "dashboard",
            View::Products => "products",
            View::MlModels => "ml_models",
            View::Analytics => "analytics",
            View::AbTesting => "ab_testing",
            View::Competitors => "competitors",
        };
        write!(f, "{s}")
    }
}

/// Result of a completed bulk action, handed back to whoever triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub action: ActionKind,
    pub changed_skus: Vec<String>,
    /// Estimated revenue impact; only set by bulk optimization.
    pub revenue_impact: Option<f64>,
    pub message: String,
}

// ---------------------------------------------------------------------------
// State-change notifications, sent over an mpsc channel to the render side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Action(ActionKind),
    Tick,
    AcceptRecommendation,
    CustomPrice,
    Reprice,
    AbTestCreated,
}

impl std::fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeSource::Action(kind) => write!(f, "{kind}"),
            ChangeSource::Tick => write!(f, "tick"),
            ChangeSource::AcceptRecommendation => write!(f, "accept_recommendation"),
            ChangeSource::CustomPrice => write!(f, "custom_price"),
            ChangeSource::Reprice => write!(f, "reprice"),
            ChangeSource::AbTestCreated => write!(f, "ab_test_created"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub source: ChangeSource,
    pub changed_skus: Vec<String>,
    pub analytics_changed: bool,
    pub history_appended: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demand_level_boundaries() {
        assert_eq!(DemandLevel::from_score(8.0), DemandLevel::High);
        assert_eq!(DemandLevel::from_score(7.99), DemandLevel::Medium);
        assert_eq!(DemandLevel::from_score(5.0), DemandLevel::Medium);
        assert_eq!(DemandLevel::from_score(4.9), DemandLevel::Low);
    }

    #[test]
    fn price_change_pct_is_relative_to_current() {
        let product = Product {
            sku: "SKU-T".to_string(),
            name: "Test".to_string(),
            category: "Test".to_string(),
            brand: "Test".to_string(),
            base_cost: 10.0,
            current_price: 20.0,
            predicted_price: 22.0,
            inventory_level: 0,
            demand_score: 5.0,
            conversion_rate: 0.1,
            competitor_avg: 20.0,
            confidence_score: 0.9,
        };
        assert!((product.price_change_pct() - 10.0).abs() < 1e-9);
    }
}
