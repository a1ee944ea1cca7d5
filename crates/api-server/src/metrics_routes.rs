//! Normalized Metrics API Routes
//!
//! Exposes the scoring-ready snapshot for the fundamentals panel.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use assessment_core::FinancialSnapshot;

use crate::{assessment_routes::validated_symbol, ApiResponse, AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/metrics/:symbol", get(get_metrics))
}

async fn get_metrics(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<FinancialSnapshot>>, AppError> {
    let symbol = validated_symbol(&symbol)?;
    let snapshot = state.orchestrator.snapshot(&symbol).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}
