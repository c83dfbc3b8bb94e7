use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        matches::{
            AppendLineupRequest, CreateMatchRequest, CreateMatchResponse, GradeIncrementRequest,
            GradeTallyRecord, LineupRecord, MatchRecord, MatchSummaryResponse,
            PlayerReasonIncrementRequest, PlayerReasonTallyRecord, ReasonIncrementRequest,
            ReasonTallyRecord, RotationTallyRecord, RotationUpsertRequest, UpdateMatchRequest,
        },
        session::AckResponse,
    },
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Match records, lineups and tally endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/matches", post(create_match))
        .route(
            "/api/matches/{id}",
            get(get_match).put(update_match).delete(delete_match),
        )
        .route("/api/matches-history", get(history))
        .route("/api/match-summary/{id}", get(summary))
        .route("/api/match-lineups", post(append_lineup))
        .route("/api/match-lineups/{id}", get(lineup))
        .route("/api/match-lineups/{id}/{entry}", delete(remove_lineup))
        .route("/api/match-stats", post(increment_grade))
        .route("/api/match-stats/{id}", get(grade_stats))
        .route("/api/reason-stats", post(increment_reason))
        .route("/api/reason-stats/{id}", get(reason_stats))
        .route("/api/player-reason-stats", post(increment_player_reason))
        .route("/api/player-reason-stats/{id}", get(player_reason_stats))
        .route(
            "/api/rotation-stats/{id}",
            get(rotation_stats).put(upsert_rotation),
        )
}

/// Create a match row; an existing id is reported with `created: false`.
#[utoipa::path(
    post,
    path = "/api/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    responses(
        (status = 201, description = "Match created", body = CreateMatchResponse),
        (status = 200, description = "Match already existed", body = CreateMatchResponse)
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Json(payload): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<CreateMatchResponse>), AppError> {
    payload.validate()?;
    let response = match_service::create_match(&state, payload).await?;
    let status = if response.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Match row", body = MatchRecord),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MatchRecord>, AppError> {
    Ok(Json(match_service::get_match(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Session code")),
    request_body = UpdateMatchRequest,
    responses(
        (status = 200, description = "Updated match row", body = MatchRecord),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn update_match(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateMatchRequest>,
) -> Result<Json<MatchRecord>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::update_match(&state, id, payload).await?))
}

/// Delete a match with its lineup and tallies.
#[utoipa::path(
    delete,
    path = "/api/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Match deleted", body = AckResponse),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn delete_match(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, AppError> {
    Ok(Json(match_service::delete_match(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/matches-history",
    tag = "matches",
    responses((status = 200, description = "Every match, newest first", body = [MatchRecord]))
)]
pub async fn history(State(state): State<SharedState>) -> Result<Json<Vec<MatchRecord>>, AppError> {
    Ok(Json(match_service::history(&state).await?))
}

/// Score, rotation and displayed tallies rebuilt from the stored rows.
#[utoipa::path(
    get,
    path = "/api/match-summary/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Match summary", body = MatchSummaryResponse),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn summary(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MatchSummaryResponse>, AppError> {
    Ok(Json(match_service::summary(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/match-lineups/{id}",
    tag = "lineups",
    params(("id" = String, Path, description = "Session code")),
    responses((status = 200, description = "Lineup in insertion order", body = [LineupRecord]))
)]
pub async fn lineup(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LineupRecord>>, AppError> {
    Ok(Json(match_service::lineup(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/match-lineups",
    tag = "lineups",
    request_body = AppendLineupRequest,
    responses(
        (status = 201, description = "Lineup entry added", body = LineupRecord),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn append_lineup(
    State(state): State<SharedState>,
    Json(payload): Json<AppendLineupRequest>,
) -> Result<(StatusCode, Json<LineupRecord>), AppError> {
    payload.validate()?;
    let entry = match_service::append_lineup(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    delete,
    path = "/api/match-lineups/{id}/{entry}",
    tag = "lineups",
    params(
        ("id" = String, Path, description = "Session code"),
        ("entry" = Uuid, Path, description = "Lineup entry id")
    ),
    responses(
        (status = 200, description = "Lineup entry removed", body = AckResponse),
        (status = 404, description = "Unknown entry")
    )
)]
pub async fn remove_lineup(
    State(state): State<SharedState>,
    Path((id, entry)): Path<(String, Uuid)>,
) -> Result<Json<AckResponse>, AppError> {
    Ok(Json(match_service::remove_lineup(&state, id, entry).await?))
}

#[utoipa::path(
    get,
    path = "/api/match-stats/{id}",
    tag = "tallies",
    params(("id" = String, Path, description = "Session code")),
    responses((status = 200, description = "Grade counts", body = [GradeTallyRecord]))
)]
pub async fn grade_stats(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<GradeTallyRecord>>, AppError> {
    Ok(Json(match_service::grade_stats(&state, id).await?))
}

/// Add one to a player's grade count.
#[utoipa::path(
    post,
    path = "/api/match-stats",
    tag = "tallies",
    request_body = GradeIncrementRequest,
    responses((status = 200, description = "Updated grade count", body = GradeTallyRecord))
)]
pub async fn increment_grade(
    State(state): State<SharedState>,
    Json(payload): Json<GradeIncrementRequest>,
) -> Result<Json<GradeTallyRecord>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::increment_grade(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/reason-stats/{id}",
    tag = "tallies",
    params(("id" = String, Path, description = "Session code")),
    responses((status = 200, description = "Global reason counts", body = [ReasonTallyRecord]))
)]
pub async fn reason_stats(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReasonTallyRecord>>, AppError> {
    Ok(Json(match_service::reason_stats(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/reason-stats",
    tag = "tallies",
    request_body = ReasonIncrementRequest,
    responses(
        (status = 200, description = "Updated reason count", body = ReasonTallyRecord),
        (status = 400, description = "Reason type does not match the reason")
    )
)]
pub async fn increment_reason(
    State(state): State<SharedState>,
    Json(payload): Json<ReasonIncrementRequest>,
) -> Result<Json<ReasonTallyRecord>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::increment_reason(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/player-reason-stats/{id}",
    tag = "tallies",
    params(("id" = String, Path, description = "Session code")),
    responses((status = 200, description = "Per-player reason counts", body = [PlayerReasonTallyRecord]))
)]
pub async fn player_reason_stats(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PlayerReasonTallyRecord>>, AppError> {
    Ok(Json(match_service::player_reason_stats(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/player-reason-stats",
    tag = "tallies",
    request_body = PlayerReasonIncrementRequest,
    responses(
        (status = 200, description = "Updated per-player reason count", body = PlayerReasonTallyRecord),
        (status = 400, description = "Reason is not credited to players")
    )
)]
pub async fn increment_player_reason(
    State(state): State<SharedState>,
    Json(payload): Json<PlayerReasonIncrementRequest>,
) -> Result<Json<PlayerReasonTallyRecord>, AppError> {
    payload.validate()?;
    Ok(Json(
        match_service::increment_player_reason(&state, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/rotation-stats/{id}",
    tag = "tallies",
    params(("id" = String, Path, description = "Session code")),
    responses((status = 200, description = "Serve and receive counts per slot", body = [RotationTallyRecord]))
)]
pub async fn rotation_stats(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RotationTallyRecord>>, AppError> {
    Ok(Json(match_service::rotation_stats(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/rotation-stats/{id}",
    tag = "tallies",
    params(("id" = String, Path, description = "Session code")),
    request_body = RotationUpsertRequest,
    responses((status = 200, description = "Stored slot counts", body = RotationTallyRecord))
)]
pub async fn upsert_rotation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<RotationUpsertRequest>,
) -> Result<Json<RotationTallyRecord>, AppError> {
    payload.validate()?;
    Ok(Json(match_service::upsert_rotation(&state, id, payload).await?))
}
