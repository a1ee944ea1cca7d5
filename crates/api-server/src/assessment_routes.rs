//! Assessment API Routes
//!
//! Endpoints for scoring a ticker and exporting the result as a download.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use scoring_engine::ScoringProfile;
use serde::Deserialize;

use assessment_orchestrator::TickerReport;

use crate::{ApiResponse, AppError, AppState};

const DEFAULT_HOLD_MONTHS: u32 = 3;
const DEFAULT_HISTORY_MONTHS: u32 = 12;

#[derive(Deserialize)]
pub struct AssessmentQuery {
    pub target_price: Option<f64>,
    pub hold_months: Option<u32>,
    pub profile: Option<String>,
    pub history: Option<bool>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/assessments/:symbol", get(get_assessment))
        .route("/api/assessments/:symbol/export", get(export_assessment))
}

pub(crate) fn validated_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = raw.trim().to_uppercase();
    let well_formed = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !well_formed {
        return Err(AppError::BadRequest(format!(
            "invalid ticker symbol: {}",
            raw
        )));
    }
    Ok(symbol)
}

/// The scoring engine assumes a positive target; enforce it at the edge.
fn validated_target(target: Option<f64>) -> Result<Option<f64>, AppError> {
    match target {
        Some(t) if !t.is_finite() || t <= 0.0 => Err(AppError::BadRequest(
            "target_price must be a positive number".to_string(),
        )),
        other => Ok(other),
    }
}

fn resolve_profile(name: Option<&str>) -> Result<ScoringProfile, AppError> {
    let name = name.unwrap_or("default");
    ScoringProfile::by_name(name).ok_or_else(|| {
        AppError::BadRequest(format!(
            "unknown scoring profile: {} (expected default, conservative, or aggressive)",
            name
        ))
    })
}

async fn build_report(
    state: &AppState,
    symbol: &str,
    query: &AssessmentQuery,
    include_history: bool,
) -> Result<TickerReport, AppError> {
    let symbol = validated_symbol(symbol)?;
    let target_price = validated_target(query.target_price)?;
    let profile = resolve_profile(query.profile.as_deref())?;
    let hold_months = query.hold_months.unwrap_or(DEFAULT_HOLD_MONTHS).clamp(1, 24);
    let history_months = include_history.then_some(DEFAULT_HISTORY_MONTHS);

    let report = state
        .orchestrator
        .report(&symbol, target_price, hold_months, profile, history_months)
        .await?;

    Ok(report)
}

async fn get_assessment(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<AssessmentQuery>,
) -> Result<Json<ApiResponse<TickerReport>>, AppError> {
    let include_history = query.history.unwrap_or(true);
    let report = build_report(&state, &symbol, &query, include_history).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Same report, served as a file download (the UI's "save analysis"
/// button). History is omitted to keep the artifact small.
async fn export_assessment(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<AssessmentQuery>,
) -> Result<Response, AppError> {
    let report = build_report(&state, &symbol, &query, false).await?;

    let body = serde_json::to_vec_pretty(&report)
        .map_err(|e| AppError::Upstream(anyhow::anyhow!("serialize report: {}", e)))?;
    let disposition = format!("attachment; filename=\"{}_analysis.json\"", report.symbol);

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
