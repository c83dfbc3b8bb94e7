use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        roster::{CreatePlayerRequest, PlayerRecord, RenamePlayerRequest},
        session::AckResponse,
    },
    error::AppError,
    services::roster_service,
    state::SharedState,
};

/// Own-team roster endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/our-players", get(list_players).post(create_player))
        .route("/api/our-players/{id}", put(rename_player).delete(delete_player))
}

#[utoipa::path(
    get,
    path = "/api/our-players",
    tag = "roster",
    responses((status = 200, description = "Roster sorted by name", body = [PlayerRecord]))
)]
pub async fn list_players(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PlayerRecord>>, AppError> {
    Ok(Json(roster_service::list_players(&state).await?))
}

#[utoipa::path(
    post,
    path = "/api/our-players",
    tag = "roster",
    request_body = CreatePlayerRequest,
    responses((status = 201, description = "Player added", body = PlayerRecord))
)]
pub async fn create_player(
    State(state): State<SharedState>,
    Json(payload): Json<CreatePlayerRequest>,
) -> Result<(StatusCode, Json<PlayerRecord>), AppError> {
    payload.validate()?;
    let player = roster_service::create_player(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

#[utoipa::path(
    put,
    path = "/api/our-players/{id}",
    tag = "roster",
    params(("id" = Uuid, Path, description = "Roster id")),
    request_body = RenamePlayerRequest,
    responses(
        (status = 200, description = "Player renamed", body = PlayerRecord),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn rename_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenamePlayerRequest>,
) -> Result<Json<PlayerRecord>, AppError> {
    payload.validate()?;
    Ok(Json(roster_service::rename_player(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/our-players/{id}",
    tag = "roster",
    params(("id" = Uuid, Path, description = "Roster id")),
    responses(
        (status = 200, description = "Player removed", body = AckResponse),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn delete_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AckResponse>, AppError> {
    Ok(Json(roster_service::delete_player(&state, id).await?))
}
