use axum::Json;
use axum::extract::State;

use crate::server::AppState;
use crate::server::error::ApiError;
use crate::server::extract::ActivityPayload;
use crate::server::responses::{
    AnalyzeResponse, HEURISTIC_ENGINE, HealthResponse, QuickInsightsResponse, RootResponse, UploadResponse,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Google Pay Smart Analyzer",
        version: VERSION,
        ai_engine: state.service.engine_name().to_string(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ai_enabled: state.service.ai_enabled(),
        ai_engine: state.service.engine_name().to_string(),
        version: VERSION,
    })
}

pub async fn upload(
    State(state): State<AppState>,
    ActivityPayload(input): ActivityPayload,
) -> Result<Json<UploadResponse>, ApiError> {
    let outcome = state.service.upload(input).await?;
    Ok(Json(UploadResponse::new(outcome.transactions)))
}

pub async fn quick_insights(
    State(state): State<AppState>,
    ActivityPayload(input): ActivityPayload,
) -> Result<Json<QuickInsightsResponse>, ApiError> {
    let outcome = state.service.quick_insights(input).await?;
    Ok(Json(QuickInsightsResponse {
        status: "success",
        query: outcome.query,
        timeframe: outcome.timeframe,
        insights: outcome.summary,
        ai_engine: HEURISTIC_ENGINE,
    }))
}

pub async fn analyze(
    State(state): State<AppState>,
    ActivityPayload(input): ActivityPayload,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let outcome = state.service.analyze(input).await?;
    Ok(Json(AnalyzeResponse::new(
        outcome.query,
        outcome.total_transactions_parsed,
        outcome.insights,
    )))
}
