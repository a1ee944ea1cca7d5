use anyhow::Context;
use assessment_orchestrator::AssessmentOrchestrator;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use finnhub_client::FinnhubClient;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod assessment_routes;
pub mod history_routes;
pub mod metrics_routes;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AssessmentOrchestrator<FinnhubClient>>,
}

/// Uniform response envelope for every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler-level error: caller mistakes map to 400, vendor failures to 502.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Upstream(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(err) => {
                tracing::error!("Upstream failure: {:#}", err);
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl From<assessment_core::AssessmentError> for AppError {
    fn from(err: assessment_core::AssessmentError) -> Self {
        match err {
            assessment_core::AssessmentError::InvalidData(msg) => AppError::BadRequest(msg),
            other => AppError::Upstream(anyhow::anyhow!(other)),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Upstream(err)
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let api_key = std::env::var("FINNHUB_API_KEY").context("FINNHUB_API_KEY must be set")?;
    let orchestrator = Arc::new(AssessmentOrchestrator::new(FinnhubClient::new(api_key)));
    let state = AppState { orchestrator };

    let app = Router::new()
        .route("/health", get(health))
        .merge(assessment_routes::routes())
        .merge(history_routes::routes())
        .merge(metrics_routes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .context("BIND_ADDR must be a socket address")?;

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_error() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 42);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn error_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()>::error("nope")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "nope");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn bad_request_maps_to_400() {
        let response = AppError::BadRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_maps_to_502() {
        let response = AppError::Upstream(anyhow::anyhow!("vendor down")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
