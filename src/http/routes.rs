//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::simulation::{MatchSnapshot, SimulationError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::MatchId;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/matches", get(list_matches_handler))
        .route("/matches/:id", get(get_match_handler))
        .route("/matches/:id/stop", post(stop_match_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    connected_clients: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.simulations.active_count(),
        connected_clients: state.broadcaster.connected_clients(),
    })
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Serialize)]
struct MatchListResponse {
    matches: Vec<MatchSnapshot>,
}

async fn list_matches_handler(State(state): State<AppState>) -> Json<MatchListResponse> {
    Json(MatchListResponse {
        matches: state.simulations.snapshots(),
    })
}

async fn get_match_handler(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> Result<Json<MatchSnapshot>, AppError> {
    state
        .simulations
        .snapshot(match_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Match {} is not running", match_id)))
}

#[derive(Serialize)]
struct StopResponse {
    success: bool,
    message: String,
}

async fn stop_match_handler(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> Result<Json<StopResponse>, AppError> {
    state.simulations.stop(match_id).await?;

    Ok(Json(StopResponse {
        success: true,
        message: format!("Match {} stopped", match_id),
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SimulationError> for AppError {
    fn from(e: SimulationError) -> Self {
        match e {
            SimulationError::NotRunning(_) => AppError::NotFound(e.to_string()),
            SimulationError::AlreadyRunning(_) => AppError::Conflict(e.to_string()),
            SimulationError::Roster { .. } => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn health_reports_ok() {
        let router = build_router(AppState::new(Config::for_tests()));

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let router = build_router(AppState::new(Config::for_tests()));

        let get = router
            .clone()
            .oneshot(Request::builder().uri("/matches/99").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(get.status(), StatusCode::NOT_FOUND);

        let stop = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/matches/99/stop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(stop.status(), StatusCode::NOT_FOUND);
    }
}
