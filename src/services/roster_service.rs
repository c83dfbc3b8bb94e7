//! Own-team roster management.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::PlayerEntity,
    dto::{
        roster::{CreatePlayerRequest, PlayerRecord, RenamePlayerRequest},
        session::AckResponse,
    },
    error::ServiceError,
    state::SharedState,
};

/// Roster sorted by name.
pub async fn list_players(state: &SharedState) -> Result<Vec<PlayerRecord>, ServiceError> {
    let store = state.require_match_store().await?;
    let players = store.list_players().await?;
    Ok(players.into_iter().map(PlayerRecord::from).collect())
}

pub async fn create_player(
    state: &SharedState,
    request: CreatePlayerRequest,
) -> Result<PlayerRecord, ServiceError> {
    let store = state.require_match_store().await?;
    let player = PlayerEntity {
        id: request.id.unwrap_or_else(Uuid::new_v4),
        name: request.name.trim().to_string(),
        created_at: SystemTime::now(),
    };
    store.create_player(player.clone()).await?;
    info!(player_id = %player.id, name = %player.name, "player added to roster");
    Ok(player.into())
}

pub async fn rename_player(
    state: &SharedState,
    id: Uuid,
    request: RenamePlayerRequest,
) -> Result<PlayerRecord, ServiceError> {
    let store = state.require_match_store().await?;
    let Some(player) = store
        .rename_player(id, request.name.trim().to_string())
        .await?
    else {
        return Err(ServiceError::NotFound(format!("player `{id}` not found")));
    };
    Ok(player.into())
}

pub async fn delete_player(state: &SharedState, id: Uuid) -> Result<AckResponse, ServiceError> {
    let store = state.require_match_store().await?;
    if !store.delete_player(id).await? {
        return Err(ServiceError::NotFound(format!("player `{id}` not found")));
    }
    info!(player_id = %id, "player removed from roster");
    Ok(AckResponse::ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::match_store::memory::MemoryMatchStore, state::AppState};

    #[tokio::test]
    async fn roster_lifecycle() {
        let state = AppState::new(AppConfig::default());
        state
            .set_match_store(Arc::new(MemoryMatchStore::new()))
            .await;

        let zoe = create_player(
            &state,
            CreatePlayerRequest {
                id: None,
                name: "  Zoe ".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(zoe.name, "Zoe");
        create_player(
            &state,
            CreatePlayerRequest {
                id: None,
                name: "Ana".into(),
            },
        )
        .await
        .unwrap();

        let names: Vec<_> = list_players(&state)
            .await
            .unwrap()
            .into_iter()
            .map(|player| player.name)
            .collect();
        assert_eq!(names, ["Ana", "Zoe"]);

        let renamed = rename_player(
            &state,
            zoe.id,
            RenamePlayerRequest {
                name: "Zoey".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "Zoey");

        delete_player(&state, zoe.id).await.unwrap();
        assert!(matches!(
            delete_player(&state, zoe.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn degraded_mode_is_reported() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            list_players(&state).await,
            Err(ServiceError::Degraded)
        ));
    }
}
