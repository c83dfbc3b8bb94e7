//! DTO definitions for match records, lineups and the tally endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        GradeIncrement, GradeTallyEntity, LineupEntity, MatchEntity, PlayerReasonIncrement,
        PlayerReasonTallyEntity, ReasonIncrement, ReasonTallyEntity, RotationTallyEntity,
    },
    dto::{
        format_system_time, parse_system_time,
        validation::{validate_not_blank, validate_session_code},
    },
    state::{
        reasons::{ReasonId, ReasonType, Side},
        rotation::{RotationCounter, RotationPosition},
        session::{Grade, GradeCounts, GradeTally, MatchSession, MatchStatus},
    },
};

/// Persisted match row as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchRecord {
    pub match_id: String,
    pub team_name: Option<String>,
    pub date: Option<String>,
    pub our_score: u32,
    pub opponent_score: u32,
    pub point_cap: u32,
    pub status: MatchStatus,
    #[serde(default)]
    pub rotation: RotationPosition,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

impl From<MatchEntity> for MatchRecord {
    fn from(value: MatchEntity) -> Self {
        Self {
            match_id: value.match_id,
            team_name: value.team_name,
            date: value.date,
            our_score: value.our_score,
            opponent_score: value.opponent_score,
            point_cap: value.point_cap,
            status: value.status,
            rotation: value.rotation,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MatchRecord> for MatchEntity {
    type Error = time::error::Parse;

    fn try_from(value: MatchRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            match_id: value.match_id,
            team_name: value.team_name,
            date: value.date,
            our_score: value.our_score,
            opponent_score: value.opponent_score,
            point_cap: value.point_cap,
            status: value.status,
            rotation: value.rotation,
            created_at: parse_system_time(&value.created_at)?,
            updated_at: parse_system_time(&value.updated_at)?,
        })
    }
}

/// Body of `POST /api/matches`. Creating an existing match succeeds without changes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    #[validate(custom(function = "validate_session_code"))]
    pub match_id: String,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// 15 or 25; defaults to the configured cap.
    #[serde(default)]
    #[validate(range(min = 15, max = 25))]
    pub point_cap: Option<u32>,
    #[serde(default)]
    pub our_score: u32,
    #[serde(default)]
    pub opponent_score: u32,
    #[serde(default)]
    pub status: MatchStatus,
}

impl From<&MatchEntity> for CreateMatchRequest {
    fn from(value: &MatchEntity) -> Self {
        Self {
            match_id: value.match_id.clone(),
            team_name: value.team_name.clone(),
            date: value.date.clone(),
            point_cap: Some(value.point_cap),
            our_score: value.our_score,
            opponent_score: value.opponent_score,
            status: value.status,
        }
    }
}

/// Result of `POST /api/matches`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateMatchResponse {
    pub match_id: String,
    /// False when the match already existed.
    pub created: bool,
}

/// Body of `PUT /api/matches/{id}`: every mutable column of the row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateMatchRequest {
    pub team_name: Option<String>,
    pub date: Option<String>,
    pub our_score: u32,
    pub opponent_score: u32,
    #[validate(range(min = 15, max = 25))]
    pub point_cap: u32,
    pub status: MatchStatus,
    /// Omitted keeps the stored rotation position.
    #[serde(default)]
    pub rotation: Option<RotationPosition>,
}

impl From<&MatchEntity> for UpdateMatchRequest {
    fn from(value: &MatchEntity) -> Self {
        Self {
            team_name: value.team_name.clone(),
            date: value.date.clone(),
            our_score: value.our_score,
            opponent_score: value.opponent_score,
            point_cap: value.point_cap,
            status: value.status,
            rotation: Some(value.rotation),
        }
    }
}

/// Lineup row as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineupRecord {
    pub id: Uuid,
    pub match_id: String,
    pub side: Side,
    pub player_id: Option<String>,
    pub player_name: String,
}

impl From<LineupEntity> for LineupRecord {
    fn from(value: LineupEntity) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
        }
    }
}

impl From<LineupRecord> for LineupEntity {
    fn from(value: LineupRecord) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
        }
    }
}

/// Body of `POST /api/match-lineups`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct AppendLineupRequest {
    /// Generated when omitted.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(custom(function = "validate_session_code"))]
    pub match_id: String,
    pub side: Side,
    #[serde(default)]
    pub player_id: Option<String>,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub player_name: String,
}

impl From<LineupEntity> for AppendLineupRequest {
    fn from(value: LineupEntity) -> Self {
        Self {
            id: Some(value.id),
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
        }
    }
}

impl From<AppendLineupRequest> for LineupEntity {
    fn from(value: AppendLineupRequest) -> Self {
        Self {
            id: value.id.unwrap_or_else(Uuid::new_v4),
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
        }
    }
}

/// One grade count for one player.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GradeTallyRecord {
    pub match_id: String,
    pub side: Side,
    pub player_id: Option<String>,
    pub player_name: String,
    pub grade: Grade,
    pub count: u32,
}

impl From<GradeTallyEntity> for GradeTallyRecord {
    fn from(value: GradeTallyEntity) -> Self {
        Self {
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
            grade: value.grade,
            count: value.count,
        }
    }
}

impl From<GradeTallyRecord> for GradeTallyEntity {
    fn from(value: GradeTallyRecord) -> Self {
        Self {
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
            grade: value.grade,
            count: value.count,
        }
    }
}

/// Body of `POST /api/match-stats`: add one to a player's grade count.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct GradeIncrementRequest {
    #[validate(custom(function = "validate_session_code"))]
    pub match_id: String,
    pub side: Side,
    #[serde(default)]
    pub player_id: Option<String>,
    #[validate(length(min = 1), custom(function = "validate_not_blank"))]
    pub player_name: String,
    pub grade: Grade,
}

impl From<GradeIncrement> for GradeIncrementRequest {
    fn from(value: GradeIncrement) -> Self {
        Self {
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
            grade: value.grade,
        }
    }
}

impl From<GradeIncrementRequest> for GradeIncrement {
    fn from(value: GradeIncrementRequest) -> Self {
        Self {
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
            grade: value.grade,
        }
    }
}

/// Global count of one reason.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReasonTallyRecord {
    pub match_id: String,
    pub reason_id: ReasonId,
    pub reason_type: ReasonType,
    pub count: u32,
}

impl From<ReasonTallyEntity> for ReasonTallyRecord {
    fn from(value: ReasonTallyEntity) -> Self {
        Self {
            match_id: value.match_id,
            reason_id: value.reason_id,
            reason_type: value.reason_type,
            count: value.count,
        }
    }
}

impl From<ReasonTallyRecord> for ReasonTallyEntity {
    fn from(value: ReasonTallyRecord) -> Self {
        Self {
            match_id: value.match_id,
            reason_id: value.reason_id,
            reason_type: value.reason_type,
            count: value.count,
        }
    }
}

/// Body of `POST /api/reason-stats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ReasonIncrementRequest {
    #[validate(custom(function = "validate_session_code"))]
    pub match_id: String,
    pub reason_id: ReasonId,
    pub reason_type: ReasonType,
}

impl From<ReasonIncrement> for ReasonIncrementRequest {
    fn from(value: ReasonIncrement) -> Self {
        Self {
            match_id: value.match_id,
            reason_id: value.reason_id,
            reason_type: value.reason_type,
        }
    }
}

impl From<ReasonIncrementRequest> for ReasonIncrement {
    fn from(value: ReasonIncrementRequest) -> Self {
        Self {
            match_id: value.match_id,
            reason_id: value.reason_id,
            reason_type: value.reason_type,
        }
    }
}

/// Count of one reason credited to one player.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerReasonTallyRecord {
    pub match_id: String,
    pub player_id: String,
    pub player_name: String,
    pub reason_id: ReasonId,
    pub reason_type: ReasonType,
    pub count: u32,
}

impl From<PlayerReasonTallyEntity> for PlayerReasonTallyRecord {
    fn from(value: PlayerReasonTallyEntity) -> Self {
        Self {
            match_id: value.match_id,
            player_id: value.player_id,
            player_name: value.player_name,
            reason_id: value.reason_id,
            reason_type: value.reason_type,
            count: value.count,
        }
    }
}

impl From<PlayerReasonTallyRecord> for PlayerReasonTallyEntity {
    fn from(value: PlayerReasonTallyRecord) -> Self {
        Self {
            match_id: value.match_id,
            player_id: value.player_id,
            player_name: value.player_name,
            reason_id: value.reason_id,
            reason_type: value.reason_type,
            count: value.count,
        }
    }
}

/// Body of `POST /api/player-reason-stats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct PlayerReasonIncrementRequest {
    #[validate(custom(function = "validate_session_code"))]
    pub match_id: String,
    #[validate(length(min = 1))]
    pub player_id: String,
    #[validate(length(min = 1), custom(function = "validate_not_blank"))]
    pub player_name: String,
    pub reason_id: ReasonId,
    pub reason_type: ReasonType,
}

impl From<PlayerReasonIncrement> for PlayerReasonIncrementRequest {
    fn from(value: PlayerReasonIncrement) -> Self {
        Self {
            match_id: value.match_id,
            player_id: value.player_id,
            player_name: value.player_name,
            reason_id: value.reason_id,
            reason_type: value.reason_type,
        }
    }
}

impl From<PlayerReasonIncrementRequest> for PlayerReasonIncrement {
    fn from(value: PlayerReasonIncrementRequest) -> Self {
        Self {
            match_id: value.match_id,
            player_id: value.player_id,
            player_name: value.player_name,
            reason_id: value.reason_id,
            reason_type: value.reason_type,
        }
    }
}

/// Serve and receive counts of one rotation slot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RotationTallyRecord {
    pub match_id: String,
    pub slot: u8,
    pub serve: u32,
    pub receive: u32,
}

impl From<RotationTallyEntity> for RotationTallyRecord {
    fn from(value: RotationTallyEntity) -> Self {
        Self {
            match_id: value.match_id,
            slot: value.slot,
            serve: value.counter.serve,
            receive: value.counter.receive,
        }
    }
}

impl From<RotationTallyRecord> for RotationTallyEntity {
    fn from(value: RotationTallyRecord) -> Self {
        Self {
            match_id: value.match_id,
            slot: value.slot,
            counter: RotationCounter {
                serve: value.serve,
                receive: value.receive,
            },
        }
    }
}

/// Body of `PUT /api/rotation-stats/{id}`: overwrite one slot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RotationUpsertRequest {
    #[validate(range(min = 1, max = 6))]
    pub slot: u8,
    pub serve: u32,
    pub receive: u32,
}

/// Displayed grade line of one player.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GradeLine {
    pub player_id: String,
    pub player_name: String,
    pub counts: GradeCounts,
}

impl From<&GradeTally> for GradeLine {
    fn from(value: &GradeTally) -> Self {
        Self {
            player_id: value.player_id.clone(),
            player_name: value.player_name.clone(),
            counts: value.counts,
        }
    }
}

/// Global reason count in a summary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReasonCount {
    pub reason_id: ReasonId,
    pub label: String,
    pub count: u32,
}

/// Rebuilt view of a match, as a scoring client would display it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchSummaryResponse {
    #[serde(rename = "match")]
    pub record: MatchRecord,
    /// "Our team wins 25:23" once the set is over.
    pub result: Option<String>,
    pub current_slot: u8,
    pub serving: bool,
    pub rotations: Vec<RotationCounter>,
    pub own_grades: Vec<GradeLine>,
    /// Sorted by D then C count, highest first.
    pub opponent_grades: Vec<GradeLine>,
    pub reasons: Vec<ReasonCount>,
}

impl MatchSummaryResponse {
    pub fn from_session(session: &MatchSession, result: Option<String>) -> Self {
        let rotation = session.rotation();
        Self {
            record: session.to_entity().into(),
            result,
            current_slot: rotation.current_slot(),
            serving: rotation.serving(),
            rotations: rotation.counters().map(|(_, counter)| counter).collect(),
            own_grades: session
                .displayed_grades(Side::Own)
                .into_iter()
                .map(GradeLine::from)
                .collect(),
            opponent_grades: session
                .displayed_grades(Side::Opposing)
                .into_iter()
                .map(GradeLine::from)
                .collect(),
            reasons: session
                .reason_tallies()
                .map(|(reason_id, count)| ReasonCount {
                    reason_id,
                    label: reason_id.entry().label.to_string(),
                    count,
                })
                .collect(),
        }
    }
}
