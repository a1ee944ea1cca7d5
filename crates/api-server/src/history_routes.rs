//! Price History API Routes

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use assessment_core::PriceHistory;

use crate::{assessment_routes::validated_symbol, ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub months: Option<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/history/:symbol", get(get_history))
}

async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<PriceHistory>>, AppError> {
    let symbol = validated_symbol(&symbol)?;
    let months = query.months.unwrap_or(12).clamp(1, 120);

    let history = state.orchestrator.history(&symbol, months).await?;
    Ok(Json(ApiResponse::success(history)))
}
