//! Session coordinator operations exposed to polling clients.

use tracing::{debug, info, warn};

use crate::{
    dao::models::{CreateOutcome, MatchEntity},
    dto::session::{ActiveSessionResponse, AckResponse, NextSetRequest, NextSetResponse},
    error::ServiceError,
    state::{SharedState, session::PointCap},
};

/// Return the shared session code, allocating one when none is active or the previous one went
/// idle. The backing match row is created if absent on every call, so a row removed behind the
/// coordinator's back comes back empty instead of leaving the code dangling.
pub async fn active_session(state: &SharedState) -> Result<ActiveSessionResponse, ServiceError> {
    let active = state.coordinator().get_or_create_active();
    let mut record = MatchEntity::empty(active.id.clone());
    record.point_cap = state.config().default_point_cap.value();
    if let Err(err) = ensure_backing_record(state, record).await {
        if active.created {
            state.coordinator().retire(&active.id);
        }
        return Err(err);
    }
    if active.created {
        info!(session_id = %active.id, "allocated new session");
    }
    Ok(ActiveSessionResponse {
        session_id: active.id,
    })
}

/// Keep the active session alive.
pub fn report_activity(state: &SharedState) -> AckResponse {
    state.coordinator().touch();
    AckResponse::ok()
}

/// Start the next set: retire `request.session_id` in favour of a fresh code whose row keeps the
/// team name and date. Concurrent callers converge on the same new code.
pub async fn next_set(
    state: &SharedState,
    request: NextSetRequest,
) -> Result<NextSetResponse, ServiceError> {
    let coordinator = state.coordinator();
    let Some(next_id) = coordinator.supersede(&request.session_id) else {
        let current = coordinator.get_or_create_active();
        debug!(
            stale = %request.session_id,
            session_id = %current.id,
            "next set already started by another client"
        );
        return Ok(NextSetResponse {
            session_id: current.id,
            superseded: false,
        });
    };

    let created = async {
        let store = state.require_match_store().await?;
        let previous = store.find_match(request.session_id.clone()).await?;
        let mut record = MatchEntity::empty(next_id.clone());
        record.point_cap = PointCap::default().value();
        if let Some(previous) = previous {
            record.team_name = previous.team_name;
            record.date = previous.date;
        }
        ensure_backing_record(state, record).await
    };

    if let Err(err) = created.await {
        coordinator.retire(&next_id);
        return Err(err);
    }
    info!(previous = %request.session_id, session_id = %next_id, "started next set");

    Ok(NextSetResponse {
        session_id: next_id,
        superseded: true,
    })
}

/// Drop the active session; the next poll allocates a new one.
pub fn reset(state: &SharedState) -> AckResponse {
    if let Some(previous) = state.coordinator().active() {
        info!(session_id = %previous, "active session reset");
    }
    state.coordinator().reset();
    AckResponse::ok()
}

pub(crate) async fn ensure_backing_record(state: &SharedState, record: MatchEntity) -> Result<(), ServiceError> {
    let store = state.require_match_store().await?;
    let match_id = record.match_id.clone();
    match store.create_match(record).await {
        Ok(CreateOutcome::Created) => Ok(()),
        Ok(CreateOutcome::AlreadyExists) => {
            debug!(session_id = %match_id, "backing record already present");
            Ok(())
        }
        Err(err) => {
            warn!(session_id = %match_id, error = %err, "failed to create backing record");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::{MatchStore, memory::MemoryMatchStore},
        state::AppState,
    };

    async fn state_with_store() -> (SharedState, MemoryMatchStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryMatchStore::new();
        state.set_match_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn first_poll_creates_backing_record_once() {
        let (state, store) = state_with_store().await;
        let first = active_session(&state).await.unwrap();
        let second = active_session(&state).await.unwrap();
        assert_eq!(first, second);

        let matches = store.list_matches().await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_id, first.session_id);
        assert_eq!(matches[0].point_cap, 25);
    }

    #[tokio::test]
    async fn failed_backing_record_retires_the_code() {
        let (state, store) = state_with_store().await;
        store.set_offline(true);
        assert!(active_session(&state).await.is_err());
        assert_eq!(state.coordinator().active(), None);

        store.set_offline(false);
        let session = active_session(&state).await.unwrap();
        assert!(store.find_match(session.session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleted_backing_record_is_recreated_on_next_poll() {
        let (state, store) = state_with_store().await;
        let first = active_session(&state).await.unwrap().session_id;
        store.delete_match(first.clone()).await.unwrap();
        assert!(store.find_match(first.clone()).await.unwrap().is_none());

        let second = active_session(&state).await.unwrap().session_id;
        assert_eq!(first, second);
        let record = store.find_match(second).await.unwrap().unwrap();
        assert_eq!(record.our_score, 0);
        assert_eq!(record.point_cap, 25);
    }

    #[tokio::test]
    async fn outage_on_an_existing_code_keeps_it_active() {
        let (state, store) = state_with_store().await;
        let first = active_session(&state).await.unwrap().session_id;
        store.set_offline(true);
        assert!(active_session(&state).await.is_err());
        assert_eq!(state.coordinator().active(), Some(first.clone()));

        store.set_offline(false);
        assert_eq!(active_session(&state).await.unwrap().session_id, first);
    }

    #[tokio::test]
    async fn next_set_keeps_metadata_and_converges() {
        let (state, store) = state_with_store().await;
        let first = active_session(&state).await.unwrap().session_id;
        let mut record = store.find_match(first.clone()).await.unwrap().unwrap();
        record.team_name = Some("Northside".into());
        record.point_cap = 15;
        store.update_match(record).await.unwrap();

        let request = NextSetRequest {
            session_id: first.clone(),
        };
        let winner = next_set(&state, request.clone()).await.unwrap();
        let loser = next_set(&state, request).await.unwrap();
        assert!(winner.superseded);
        assert!(!loser.superseded);
        assert_eq!(winner.session_id, loser.session_id);
        assert_ne!(winner.session_id, first);

        let next = store.find_match(winner.session_id).await.unwrap().unwrap();
        assert_eq!(next.team_name.as_deref(), Some("Northside"));
        assert_eq!(next.point_cap, 25);
        assert_eq!(next.our_score, 0);
    }

    #[tokio::test]
    async fn reset_forces_a_new_code() {
        let (state, _store) = state_with_store().await;
        let first = active_session(&state).await.unwrap().session_id;
        reset(&state);
        let second = active_session(&state).await.unwrap().session_id;
        assert_ne!(first, second);
    }
}
