use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{HealthReport, HealthState};
use crate::api::latency::{ActionLatency, LatencySummary};
use crate::error::AppError;
use crate::refresher::PeriodicRefresher;
use crate::state::ProductStore;
use crate::types::{
    AbTest, ActionKind, ActionOutcome, AnalyticsSnapshot, DemandLevel, HistoryPoint, ModelMetrics,
    PriceEstimate, Product, View,
};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<ProductStore>,
    pub refresher: Arc<PeriodicRefresher>,
    pub health: Arc<HealthState>,
    pub latency: Arc<ActionLatency>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/products", get(get_products))
        .route("/products/:sku", get(get_product))
        .route("/products/:sku/accept", post(accept_recommendation))
        .route("/products/:sku/price", post(set_custom_price))
        .route("/products/:sku/reprice", post(reprice_product))
        .route("/analytics", get(get_analytics))
        .route("/models", get(get_models))
        .route("/history", get(get_history))
        .route("/ab-tests", get(get_ab_tests).post(create_ab_test))
        .route("/view", get(get_view).put(set_view))
        .route("/actions/refresh", post(action_refresh))
        .route("/actions/bulk-optimize", post(action_bulk_optimize))
        .route("/actions/retrain", post(action_retrain))
        .route("/actions/sync-competitors", post(action_sync_competitors))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProductsQuery {
    pub category: Option<String>,
    pub demand: Option<DemandLevel>,
}

#[derive(Deserialize)]
pub struct CustomPriceRequest {
    pub price: f64,
}

#[derive(Deserialize)]
pub struct CreateAbTestRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Serialize)]
pub struct ViewBody {
    pub view: View,
}

#[derive(Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub price_change_pct: f64,
    pub demand_level: DemandLevel,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            price_change_pct: product.price_change_pct(),
            demand_level: product.demand_level(),
            product,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub running_action: Option<ActionKind>,
    pub active_view: View,
    pub products: usize,
    #[serde(flatten)]
    pub counters: HealthReport,
}

// ---------------------------------------------------------------------------
// Read handlers
// ---------------------------------------------------------------------------

async fn get_products(
    State(state): State<ApiState>,
    Query(params): Query<ProductsQuery>,
) -> Json<Vec<ProductResponse>> {
    let products = state
        .store
        .products()
        .into_iter()
        .filter(|p| {
            params
                .category
                .as_ref()
                .map_or(true, |c| p.category.eq_ignore_ascii_case(c))
        })
        .filter(|p| params.demand.map_or(true, |d| p.demand_level() == d))
        .map(ProductResponse::from)
        .collect();
    Json(products)
}

async fn get_product(
    State(state): State<ApiState>,
    Path(sku): Path<String>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state
        .store
        .get_product(&sku)
        .ok_or_else(|| AppError::unknown_sku(&sku))?;
    Ok(Json(product.into()))
}

async fn get_analytics(State(state): State<ApiState>) -> Json<AnalyticsSnapshot> {
    Json(state.store.analytics())
}

async fn get_models(State(state): State<ApiState>) -> Json<ModelMetrics> {
    Json(state.store.analytics().models)
}

async fn get_history(State(state): State<ApiState>) -> Json<Vec<HistoryPoint>> {
    Json(state.store.history())
}

async fn get_ab_tests(State(state): State<ApiState>) -> Json<Vec<AbTest>> {
    Json(state.store.ab_tests())
}

async fn get_view(State(state): State<ApiState>) -> Json<ViewBody> {
    Json(ViewBody { view: state.store.active_view() })
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        running_action: state.refresher.running_action(),
        active_view: state.store.active_view(),
        products: state.store.product_count(),
        counters: state.health.report(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<Vec<LatencySummary>> {
    Json(state.latency.summaries())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn set_view(State(state): State<ApiState>, Json(body): Json<ViewBody>) -> Json<ViewBody> {
    state.store.set_active_view(body.view);
    Json(body)
}

async fn accept_recommendation(
    State(state): State<ApiState>,
    Path(sku): Path<String>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state.refresher.accept_recommendation(&sku)?;
    Ok(Json(product.into()))
}

async fn set_custom_price(
    State(state): State<ApiState>,
    Path(sku): Path<String>,
    Json(body): Json<CustomPriceRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state.refresher.set_custom_price(&sku, body.price)?;
    Ok(Json(product.into()))
}

async fn reprice_product(
    State(state): State<ApiState>,
    Path(sku): Path<String>,
) -> Result<Json<PriceEstimate>, AppError> {
    Ok(Json(state.refresher.reprice(&sku)?))
}

async fn create_ab_test(
    State(state): State<ApiState>,
    Json(body): Json<CreateAbTestRequest>,
) -> Result<Json<AbTest>, AppError> {
    Ok(Json(state.refresher.create_ab_test(&body.name, body.description)?))
}

async fn action_refresh(State(state): State<ApiState>) -> Result<Json<ActionOutcome>, AppError> {
    run(&state, ActionKind::Refresh).await
}

async fn action_bulk_optimize(State(state): State<ApiState>) -> Result<Json<ActionOutcome>, AppError> {
    run(&state, ActionKind::BulkOptimize).await
}

async fn action_retrain(State(state): State<ApiState>) -> Result<Json<ActionOutcome>, AppError> {
    run(&state, ActionKind::Retrain).await
}

async fn action_sync_competitors(
    State(state): State<ApiState>,
) -> Result<Json<ActionOutcome>, AppError> {
    run(&state, ActionKind::SyncCompetitors).await
}

/// Runs on a spawned task so a client disconnect cannot cut the simulated
/// delay short; the response waits for completion.
async fn run(state: &ApiState, kind: ActionKind) -> Result<Json<ActionOutcome>, AppError> {
    let refresher = Arc::clone(&state.refresher);
    let handle = tokio::spawn(async move { refresher.run_action(kind).await });
    match handle.await {
        Ok(result) => Ok(Json(result?)),
        Err(e) => Err(AppError::Io(std::io::Error::other(format!("{kind} task failed: {e}")))),
    }
}
