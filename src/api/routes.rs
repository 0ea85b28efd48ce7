use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::discogs::DiscogsApi;
use crate::error::AppError;
use crate::scanner::lifecycle::{MatchLifecycle, VerifyOutcome};
use crate::scanner::orchestrator::ScanOrchestrator;
use crate::sellers::SellerService;
use crate::types::{
    MatchStatus, MatchesWithCacheInfo, MonitoredSeller, MonitoringSettings, ScanStatus,
    SellerMatch,
};

pub struct ApiState<A> {
    pub sellers: Arc<SellerService<A>>,
    pub lifecycle: Arc<MatchLifecycle<A>>,
    pub orchestrator: Arc<ScanOrchestrator<A>>,
    pub started_at: Instant,
}

impl<A> Clone for ApiState<A> {
    fn clone(&self) -> Self {
        Self {
            sellers: Arc::clone(&self.sellers),
            lifecycle: Arc::clone(&self.lifecycle),
            orchestrator: Arc::clone(&self.orchestrator),
            started_at: self.started_at,
        }
    }
}

pub fn router<A: DiscogsApi>(state: ApiState<A>) -> Router {
    Router::new()
        .route("/health", get(health::<A>))
        .route("/sellers", get(get_sellers::<A>).post(add_seller::<A>))
        .route("/sellers/:username", delete(remove_seller::<A>))
        .route("/sellers/:username/matches", get(matches_by_seller::<A>))
        .route("/matches", get(get_matches::<A>))
        .route("/matches/cache-info", get(matches_with_cache_info::<A>))
        .route("/matches/stale", delete(remove_stale::<A>))
        .route("/matches/:id/seen", post(mark_seen::<A>))
        .route("/matches/:id/notified", post(mark_notified::<A>))
        .route("/matches/:id/verify", post(verify_match::<A>))
        .route("/scan", post(start_scan::<A>))
        .route("/scan/status", get(scan_status::<A>))
        .route("/settings", get(get_settings::<A>).put(save_settings::<A>))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSellerBody {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub uptime_secs: u64,
    pub monitored_sellers: usize,
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: bool,
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub removed: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub status: MatchStatus,
    pub reactivated: bool,
}

// ---------------------------------------------------------------------------
// Handlers — thin: validate, forward to the service, serialize
// ---------------------------------------------------------------------------

async fn health<A: DiscogsApi>(State(state): State<ApiState<A>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        monitored_sellers: state.sellers.get_sellers().await.len(),
    })
}

async fn get_sellers<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
) -> Json<Vec<MonitoredSeller>> {
    Json(state.sellers.get_sellers().await)
}

async fn add_seller<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
    Json(body): Json<AddSellerBody>,
) -> Result<Json<MonitoredSeller>, AppError> {
    let seller = state.sellers.add_seller(&body.username, body.display_name).await?;
    Ok(Json(seller))
}

async fn remove_seller<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.sellers.remove_seller(&username).await?;
    Ok(Json(serde_json::json!({"removed": username})))
}

async fn matches_by_seller<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
    Path(username): Path<String>,
) -> Json<Vec<SellerMatch>> {
    Json(state.sellers.get_matches_by_seller(&username).await)
}

async fn get_matches<A: DiscogsApi>(State(state): State<ApiState<A>>) -> Json<Vec<SellerMatch>> {
    Json(state.sellers.get_all_matches().await)
}

async fn matches_with_cache_info<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
) -> Json<MatchesWithCacheInfo> {
    Json(state.sellers.matches_with_cache_info().await)
}

async fn mark_seen<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
    Path(id): Path<String>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated = state.lifecycle.mark_seen(&id).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn mark_notified<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
    Path(id): Path<String>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let updated = state.lifecycle.mark_notified(&id).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn remove_stale<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
) -> Result<Json<RemovedResponse>, AppError> {
    let removed = state.lifecycle.remove_stale().await?;
    Ok(Json(RemovedResponse { removed }))
}

async fn verify_match<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
    Path(id): Path<String>,
) -> Result<Json<VerifyResponse>, AppError> {
    match state.lifecycle.verify_and_update(&id).await? {
        VerifyOutcome::UnknownMatch => Err(AppError::NotFound(format!("match {id}"))),
        VerifyOutcome::Verified { status, reactivated } => {
            Ok(Json(VerifyResponse { status, reactivated }))
        }
    }
}

async fn start_scan<A: DiscogsApi>(State(state): State<ApiState<A>>) -> Json<ScanStatus> {
    Json(state.orchestrator.start_scan().await)
}

async fn scan_status<A: DiscogsApi>(State(state): State<ApiState<A>>) -> Json<ScanStatus> {
    Json(state.orchestrator.get_status().await)
}

async fn get_settings<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
) -> Json<MonitoringSettings> {
    Json(state.sellers.get_settings().await)
}

async fn save_settings<A: DiscogsApi>(
    State(state): State<ApiState<A>>,
    Json(settings): Json<MonitoringSettings>,
) -> Result<Json<MonitoringSettings>, AppError> {
    Ok(Json(state.sellers.save_settings(settings).await?))
}
