use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    reasons::{ReasonId, ReasonType, Side},
    rotation::{RotationCounter, RotationPosition},
    session::{Grade, MatchStatus},
};

/// Persisted row of one scored set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Six character session code.
    pub match_id: String,
    /// Opposing team (school) name.
    pub team_name: Option<String>,
    /// Free-form match date as entered by the operator.
    pub date: Option<String>,
    pub our_score: u32,
    pub opponent_score: u32,
    /// 15 or 25.
    pub point_cap: u32,
    pub status: MatchStatus,
    /// Where the rotation stood after the last rally.
    #[serde(default)]
    pub rotation: RotationPosition,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl MatchEntity {
    /// Empty ongoing match row, as created by the coordinator on first poll.
    pub fn empty(match_id: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            match_id: match_id.into(),
            team_name: None,
            date: None,
            our_score: 0,
            opponent_score: 0,
            point_cap: 25,
            status: MatchStatus::Ongoing,
            rotation: RotationPosition::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Player registered for a match on one side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineupEntity {
    pub id: Uuid,
    pub match_id: String,
    pub side: Side,
    /// Roster id (own side) or jersey number (opposing side).
    pub player_id: Option<String>,
    pub player_name: String,
}

/// Count of one grade for one player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradeTallyEntity {
    pub match_id: String,
    pub side: Side,
    pub player_id: Option<String>,
    pub player_name: String,
    pub grade: Grade,
    pub count: u32,
}

/// Match-wide count of one reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasonTallyEntity {
    pub match_id: String,
    pub reason_id: ReasonId,
    pub reason_type: ReasonType,
    pub count: u32,
}

/// Count of one reason credited to one own player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerReasonTallyEntity {
    pub match_id: String,
    pub player_id: String,
    pub player_name: String,
    pub reason_id: ReasonId,
    pub reason_type: ReasonType,
    pub count: u32,
}

/// Serve/receive counters of one rotation slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RotationTallyEntity {
    pub match_id: String,
    /// 1-based slot number.
    pub slot: u8,
    #[serde(flatten)]
    pub counter: RotationCounter,
}

/// Own-side roster member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    pub id: Uuid,
    pub name: String,
    pub created_at: SystemTime,
}

/// Create-or-increment request for a grade tally row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradeIncrement {
    pub match_id: String,
    pub side: Side,
    pub player_id: Option<String>,
    pub player_name: String,
    pub grade: Grade,
}

/// Create-or-increment request for a match-wide reason tally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasonIncrement {
    pub match_id: String,
    pub reason_id: ReasonId,
    pub reason_type: ReasonType,
}

/// Create-or-increment request for a per-player reason tally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerReasonIncrement {
    pub match_id: String,
    pub player_id: String,
    pub player_name: String,
    pub reason_id: ReasonId,
    pub reason_type: ReasonType,
}

/// Everything persisted for one match, as loaded for a full reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchBundle {
    pub record: MatchEntity,
    pub lineup: Vec<LineupEntity>,
    pub grades: Vec<GradeTallyEntity>,
    pub reasons: Vec<ReasonTallyEntity>,
    pub player_reasons: Vec<PlayerReasonTallyEntity>,
    pub rotations: Vec<RotationTallyEntity>,
}

/// Result of an idempotent create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}
