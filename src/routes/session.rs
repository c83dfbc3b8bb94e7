use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::session::{ActiveSessionResponse, AckResponse, NextSetRequest, NextSetResponse},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Coordinator endpoints polled by every scoring client.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/active-match", get(active_match))
        .route("/api/report-activity", post(report_activity))
        .route("/api/active-match/next-set", post(next_set))
        .route("/api/active-match/reset", post(reset))
}

/// Current session code, allocated on demand.
#[utoipa::path(
    get,
    path = "/api/active-match",
    tag = "session",
    responses(
        (status = 200, description = "Active session code", body = ActiveSessionResponse),
        (status = 503, description = "Storage unavailable; no backing record could be created")
    )
)]
pub async fn active_match(
    State(state): State<SharedState>,
) -> Result<Json<ActiveSessionResponse>, AppError> {
    Ok(Json(session_service::active_session(&state).await?))
}

/// Keep the active session from expiring.
#[utoipa::path(
    post,
    path = "/api/report-activity",
    tag = "session",
    responses((status = 200, description = "Activity recorded", body = AckResponse))
)]
pub async fn report_activity(State(state): State<SharedState>) -> Json<AckResponse> {
    Json(session_service::report_activity(&state))
}

/// Replace the given session with a fresh set.
#[utoipa::path(
    post,
    path = "/api/active-match/next-set",
    tag = "session",
    request_body = NextSetRequest,
    responses(
        (status = 200, description = "Code of the next set", body = NextSetResponse),
        (status = 400, description = "Malformed session code")
    )
)]
pub async fn next_set(
    State(state): State<SharedState>,
    Json(payload): Json<NextSetRequest>,
) -> Result<Json<NextSetResponse>, AppError> {
    payload.validate()?;
    Ok(Json(session_service::next_set(&state, payload).await?))
}

/// Forget the active session.
#[utoipa::path(
    post,
    path = "/api/active-match/reset",
    tag = "session",
    responses((status = 200, description = "Session cleared", body = AckResponse))
)]
pub async fn reset(State(state): State<SharedState>) -> Json<AckResponse> {
    Json(session_service::reset(&state))
}
