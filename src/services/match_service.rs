use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::{MatchStore, load_bundle},
        models::{
            CreateOutcome, GradeIncrement, LineupEntity, MatchEntity, PlayerReasonIncrement,
            ReasonIncrement, RotationTallyEntity,
        },
    },
    dto::{
        matches::{
            AppendLineupRequest, CreateMatchRequest, CreateMatchResponse, GradeIncrementRequest,
            GradeTallyRecord, LineupRecord, MatchRecord, MatchSummaryResponse,
            PlayerReasonIncrementRequest, PlayerReasonTallyRecord, ReasonIncrementRequest,
            ReasonTallyRecord, RotationTallyRecord, RotationUpsertRequest, UpdateMatchRequest,
        },
        session::AckResponse,
    },
    error::ServiceError,
    state::{
        SharedState,
        reasons::{ReasonId, ReasonType, Side},
        rotation::RotationCounter,
        scoring::match_result,
        session::{MatchSession, PointCap},
    },
};

/// Create a match row. Creating an existing match is a success that leaves it untouched.
pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
) -> Result<CreateMatchResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let point_cap = match request.point_cap {
        Some(value) => parse_cap(value)?,
        None => state.config().default_point_cap,
    };
    let mut record = MatchEntity::empty(request.match_id);
    record.team_name = request.team_name;
    record.date = request.date;
    record.point_cap = point_cap.value();
    record.our_score = request.our_score;
    record.opponent_score = request.opponent_score;
    record.status = request.status;

    let match_id = record.match_id.clone();
    let outcome = store.create_match(record).await?;
    let created = outcome == CreateOutcome::Created;
    if created {
        info!(match_id = %match_id, "match created");
    } else {
        debug!(match_id = %match_id, "match already exists");
    }
    Ok(CreateMatchResponse { match_id, created })
}

pub async fn get_match(state: &SharedState, match_id: String) -> Result<MatchRecord, ServiceError> {
    let store = state.require_match_store().await?;
    Ok(existing(store.as_ref(), &match_id).await?.into())
}

/// Overwrite the mutable columns of a match row.
pub async fn update_match(
    state: &SharedState,
    match_id: String,
    request: UpdateMatchRequest,
) -> Result<MatchRecord, ServiceError> {
    let store = state.require_match_store().await?;
    let point_cap = parse_cap(request.point_cap)?;
    let mut record = existing(store.as_ref(), &match_id).await?;
    record.team_name = request.team_name;
    record.date = request.date;
    record.our_score = request.our_score;
    record.opponent_score = request.opponent_score;
    record.point_cap = point_cap.value();
    record.status = request.status;
    if let Some(rotation) = request.rotation {
        record.rotation = rotation;
    }
    record.updated_at = std::time::SystemTime::now();

    if !store.update_match(record.clone()).await? {
        return Err(not_found(&match_id));
    }
    Ok(record.into())
}

/// Delete a match and every row that hangs off it.
pub async fn delete_match(state: &SharedState, match_id: String) -> Result<AckResponse, ServiceError> {
    let store = state.require_match_store().await?;
    if !store.delete_match(match_id.clone()).await? {
        return Err(not_found(&match_id));
    }
    info!(match_id = %match_id, "match deleted");
    Ok(AckResponse::ok())
}

/// Every match, newest first.
pub async fn history(state: &SharedState) -> Result<Vec<MatchRecord>, ServiceError> {
    let store = state.require_match_store().await?;
    let matches = store.list_matches().await?;
    Ok(matches.into_iter().map(MatchRecord::from).collect())
}

pub async fn lineup(state: &SharedState, match_id: String) -> Result<Vec<LineupRecord>, ServiceError> {
    let store = state.require_match_store().await?;
    let rows = store.list_lineup(match_id).await?;
    Ok(rows.into_iter().map(LineupRecord::from).collect())
}

pub async fn append_lineup(
    state: &SharedState,
    request: AppendLineupRequest,
) -> Result<LineupRecord, ServiceError> {
    let store = state.require_match_store().await?;
    existing(store.as_ref(), &request.match_id).await?;
    let entry = LineupEntity::from(request);
    store.append_lineup(entry.clone()).await?;
    Ok(entry.into())
}

pub async fn remove_lineup(
    state: &SharedState,
    match_id: String,
    entry_id: Uuid,
) -> Result<AckResponse, ServiceError> {
    let store = state.require_match_store().await?;
    if !store.remove_lineup(match_id.clone(), entry_id).await? {
        return Err(ServiceError::NotFound(format!(
            "lineup entry `{entry_id}` not found in match `{match_id}`"
        )));
    }
    Ok(AckResponse::ok())
}

pub async fn grade_stats(
    state: &SharedState,
    match_id: String,
) -> Result<Vec<GradeTallyRecord>, ServiceError> {
    let store = state.require_match_store().await?;
    let rows = store.list_grades(match_id).await?;
    Ok(rows.into_iter().map(GradeTallyRecord::from).collect())
}

pub async fn increment_grade(
    state: &SharedState,
    request: GradeIncrementRequest,
) -> Result<GradeTallyRecord, ServiceError> {
    let store = state.require_match_store().await?;
    let row = store.increment_grade(GradeIncrement::from(request)).await?;
    Ok(row.into())
}

pub async fn reason_stats(
    state: &SharedState,
    match_id: String,
) -> Result<Vec<ReasonTallyRecord>, ServiceError> {
    let store = state.require_match_store().await?;
    let rows = store.list_reasons(match_id).await?;
    Ok(rows.into_iter().map(ReasonTallyRecord::from).collect())
}

pub async fn increment_reason(
    state: &SharedState,
    request: ReasonIncrementRequest,
) -> Result<ReasonTallyRecord, ServiceError> {
    ensure_reason_type(request.reason_id, request.reason_type)?;
    let store = state.require_match_store().await?;
    let row = store.increment_reason(ReasonIncrement::from(request)).await?;
    Ok(row.into())
}

pub async fn player_reason_stats(
    state: &SharedState,
    match_id: String,
) -> Result<Vec<PlayerReasonTallyRecord>, ServiceError> {
    let store = state.require_match_store().await?;
    let rows = store.list_player_reasons(match_id).await?;
    Ok(rows.into_iter().map(PlayerReasonTallyRecord::from).collect())
}

/// Credit a reason to a player. Only reasons the catalog attributes to players are accepted.
pub async fn increment_player_reason(
    state: &SharedState,
    request: PlayerReasonIncrementRequest,
) -> Result<PlayerReasonTallyRecord, ServiceError> {
    ensure_reason_type(request.reason_id, request.reason_type)?;
    if !state.catalog().requires_player(request.reason_id) {
        return Err(ServiceError::InvalidInput(format!(
            "reason `{}` is not credited to players",
            request.reason_id
        )));
    }
    let store = state.require_match_store().await?;
    let row = store
        .increment_player_reason(PlayerReasonIncrement::from(request))
        .await?;
    Ok(row.into())
}

pub async fn rotation_stats(
    state: &SharedState,
    match_id: String,
) -> Result<Vec<RotationTallyRecord>, ServiceError> {
    let store = state.require_match_store().await?;
    let rows = store.list_rotations(match_id).await?;
    Ok(rows.into_iter().map(RotationTallyRecord::from).collect())
}

pub async fn upsert_rotation(
    state: &SharedState,
    match_id: String,
    request: RotationUpsertRequest,
) -> Result<RotationTallyRecord, ServiceError> {
    let store = state.require_match_store().await?;
    let tally = RotationTallyEntity {
        match_id,
        slot: request.slot,
        counter: RotationCounter {
            serve: request.serve,
            receive: request.receive,
        },
    };
    store.upsert_rotation(tally.clone()).await?;
    Ok(tally.into())
}

/// Rebuild the in-memory view of a match from its rows.
pub async fn summary(
    state: &SharedState,
    match_id: String,
) -> Result<MatchSummaryResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let Some(bundle) = load_bundle(store.as_ref(), &match_id).await? else {
        return Err(not_found(&match_id));
    };
    let session = MatchSession::from(bundle);
    let result = match_result(
        session.score(Side::Own),
        session.score(Side::Opposing),
        session.point_cap,
    )
    .map(|result| result.to_string());
    Ok(MatchSummaryResponse::from_session(&session, result))
}

async fn existing(store: &dyn MatchStore, match_id: &str) -> Result<MatchEntity, ServiceError> {
    store
        .find_match(match_id.to_string())
        .await?
        .ok_or_else(|| not_found(match_id))
}

fn not_found(match_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("match `{match_id}` not found"))
}

fn parse_cap(value: u32) -> Result<PointCap, ServiceError> {
    PointCap::try_from(value).map_err(|err| ServiceError::InvalidInput(err.to_string()))
}

fn ensure_reason_type(reason: ReasonId, declared: ReasonType) -> Result<(), ServiceError> {
    if reason.reason_type() != declared {
        return Err(ServiceError::InvalidInput(format!(
            "reason `{reason}` is a {} reason, not {}",
            reason.reason_type().as_str(),
            declared.as_str()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::memory::MemoryMatchStore,
        state::{
            AppState,
            rotation::RotationPosition,
            session::{Grade, MatchStatus},
        },
    };

    const MATCH: &str = "AB12CD";

    async fn state_with_match() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .set_match_store(Arc::new(MemoryMatchStore::new()))
            .await;
        create_match(
            &state,
            CreateMatchRequest {
                match_id: MATCH.into(),
                team_name: Some("Northside".into()),
                date: Some("2026-10-18".into()),
                point_cap: None,
                our_score: 0,
                opponent_score: 0,
                status: MatchStatus::Ongoing,
            },
        )
        .await
        .unwrap();
        state
    }

    fn grade(side: Side, player: &str, grade: Grade) -> GradeIncrementRequest {
        GradeIncrementRequest {
            match_id: MATCH.into(),
            side,
            player_id: Some(player.into()),
            player_name: player.into(),
            grade,
        }
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let state = state_with_match().await;
        let again = create_match(
            &state,
            CreateMatchRequest {
                match_id: MATCH.into(),
                team_name: None,
                date: None,
                point_cap: Some(15),
                our_score: 0,
                opponent_score: 0,
                status: MatchStatus::Ongoing,
            },
        )
        .await
        .unwrap();
        assert!(!again.created);
        let record = get_match(&state, MATCH.into()).await.unwrap();
        assert_eq!(record.team_name.as_deref(), Some("Northside"));
        assert_eq!(record.point_cap, 25);
    }

    #[tokio::test]
    async fn update_rejects_unsupported_caps_and_missing_matches() {
        let state = state_with_match().await;
        let request = UpdateMatchRequest {
            team_name: Some("Northside".into()),
            date: None,
            our_score: 3,
            opponent_score: 1,
            point_cap: 21,
            status: MatchStatus::Ongoing,
            rotation: None,
        };
        assert!(matches!(
            update_match(&state, MATCH.into(), request.clone()).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let request = UpdateMatchRequest {
            point_cap: 15,
            ..request
        };
        let updated = update_match(&state, MATCH.into(), request.clone()).await.unwrap();
        assert_eq!(updated.our_score, 3);
        assert_eq!(updated.point_cap, 15);
        assert!(matches!(
            update_match(&state, "ZZZZZZ".into(), request).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn player_reasons_must_be_attributable_and_typed() {
        let state = state_with_match().await;
        let request = PlayerReasonIncrementRequest {
            match_id: MATCH.into(),
            player_id: "p1".into(),
            player_name: "Mika".into(),
            reason_id: ReasonId::OppServeError,
            reason_type: ReasonType::Score,
        };
        assert!(matches!(
            increment_player_reason(&state, request.clone()).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let mistyped = PlayerReasonIncrementRequest {
            reason_id: ReasonId::Attack,
            reason_type: ReasonType::Loss,
            ..request.clone()
        };
        assert!(matches!(
            increment_player_reason(&state, mistyped).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let good = PlayerReasonIncrementRequest {
            reason_id: ReasonId::Attack,
            ..request
        };
        increment_player_reason(&state, good.clone()).await.unwrap();
        let row = increment_player_reason(&state, good).await.unwrap();
        assert_eq!(row.count, 2);
    }

    #[tokio::test]
    async fn summary_sorts_opponents_and_reports_result() {
        let state = state_with_match().await;
        for _ in 0..2 {
            increment_grade(&state, grade(Side::Opposing, "Northside_7", Grade::C))
                .await
                .unwrap();
        }
        increment_grade(&state, grade(Side::Opposing, "Northside_9", Grade::D))
            .await
            .unwrap();
        increment_grade(&state, grade(Side::Own, "p1", Grade::F))
            .await
            .unwrap();
        increment_reason(
            &state,
            ReasonIncrementRequest {
                match_id: MATCH.into(),
                reason_id: ReasonId::Block,
                reason_type: ReasonType::Score,
            },
        )
        .await
        .unwrap();
        update_match(
            &state,
            MATCH.into(),
            UpdateMatchRequest {
                team_name: Some("Northside".into()),
                date: None,
                our_score: 25,
                opponent_score: 23,
                point_cap: 25,
                status: MatchStatus::Completed,
                rotation: Some(RotationPosition {
                    current_slot: 3,
                    serving: true,
                    ..RotationPosition::default()
                }),
            },
        )
        .await
        .unwrap();

        let summary = summary(&state, MATCH.into()).await.unwrap();
        assert_eq!(summary.result.as_deref(), Some("Our team wins 25:23"));
        let order: Vec<_> = summary
            .opponent_grades
            .iter()
            .map(|line| line.player_name.as_str())
            .collect();
        assert_eq!(order, ["Northside_9", "Northside_7"]);
        assert!(summary.own_grades.is_empty());
        assert_eq!(summary.reasons.len(), 1);
        assert_eq!(summary.current_slot, 3);
        assert!(summary.serving);
    }

    #[tokio::test]
    async fn delete_cascades_and_reports_missing() {
        let state = state_with_match().await;
        append_lineup(
            &state,
            AppendLineupRequest {
                id: None,
                match_id: MATCH.into(),
                side: Side::Own,
                player_id: Some("p1".into()),
                player_name: "Mika".into(),
            },
        )
        .await
        .unwrap();
        delete_match(&state, MATCH.into()).await.unwrap();
        assert!(lineup(&state, MATCH.into()).await.unwrap().is_empty());
        assert!(matches!(
            delete_match(&state, MATCH.into()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
