use std::{fmt, str::FromStr, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{LineupEntity, MatchBundle, MatchEntity},
    state::{
        reasons::{ReasonId, Side},
        rotation::RotationTracker,
    },
};

/// Roster id for own players, jersey number for opposing players.
pub type PlayerId = String;

/// Performance grade an operator attaches to the player involved in a rally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    A,
    B,
    C,
    D,
    /// Persisted, but left out of the displayed tally.
    F,
}

impl Grade {
    /// Grades shown in the per-player tally.
    pub const DISPLAYED: [Grade; 4] = [Grade::A, Grade::B, Grade::C, Grade::D];

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string is not one of `A`..`F`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown grade `{0}`")]
pub struct UnknownGrade(pub String);

impl FromStr for Grade {
    type Err = UnknownGrade;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            other => Err(UnknownGrade(other.to_string())),
        }
    }
}

/// Score a side must reach (with a two point lead) to win a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointCap {
    Fifteen,
    #[default]
    TwentyFive,
}

impl PointCap {
    pub fn value(self) -> u32 {
        match self {
            PointCap::Fifteen => 15,
            PointCap::TwentyFive => 25,
        }
    }
}

/// Raised when a cap other than 15 or 25 is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("point cap must be 15 or 25, got {0}")]
pub struct InvalidPointCap(pub u32);

impl TryFrom<u32> for PointCap {
    type Error = InvalidPointCap;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            15 => Ok(PointCap::Fifteen),
            25 => Ok(PointCap::TwentyFive),
            other => Err(InvalidPointCap(other)),
        }
    }
}

/// Lifecycle flag persisted with each match row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Ongoing,
    Completed,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Ongoing => "ongoing",
            MatchStatus::Completed => "completed",
        }
    }
}

/// A player taking part in the current set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineupEntry {
    pub player_id: PlayerId,
    pub name: String,
    /// Pending grade, never persisted as such.
    pub grade: Option<Grade>,
    /// Identifier of the persisted lineup row, once known.
    pub record_id: Option<Uuid>,
}

/// Grade counts for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GradeCounts {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
    pub f: u32,
}

impl GradeCounts {
    pub fn get(&self, grade: Grade) -> u32 {
        match grade {
            Grade::A => self.a,
            Grade::B => self.b,
            Grade::C => self.c,
            Grade::D => self.d,
            Grade::F => self.f,
        }
    }

    pub(crate) fn add(&mut self, grade: Grade, amount: u32) {
        let slot = match grade {
            Grade::A => &mut self.a,
            Grade::B => &mut self.b,
            Grade::C => &mut self.c,
            Grade::D => &mut self.d,
            Grade::F => &mut self.f,
        };
        *slot += amount;
    }

    /// Sum of the displayed grades (A-D).
    pub fn displayed_total(&self) -> u32 {
        Grade::DISPLAYED.iter().map(|grade| self.get(*grade)).sum()
    }
}

/// Grade tally row for one player of one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeTally {
    pub side: Side,
    pub player_id: PlayerId,
    pub player_name: String,
    pub counts: GradeCounts,
}

/// In-memory state of one scored set, discarded as a unit on reset or next set.
#[derive(Debug, Clone)]
pub struct MatchSession {
    pub id: String,
    pub team_name: Option<String>,
    pub date: Option<String>,
    pub point_cap: PointCap,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub(crate) status: MatchStatus,
    pub(crate) our_score: u32,
    pub(crate) opponent_score: u32,
    pub(crate) ours: Vec<LineupEntry>,
    pub(crate) opponents: Vec<LineupEntry>,
    pub(crate) grade_tallies: IndexMap<(Side, PlayerId), GradeTally>,
    pub(crate) reason_tallies: IndexMap<ReasonId, u32>,
    pub(crate) player_reason_tallies: IndexMap<(PlayerId, ReasonId), u32>,
    pub(crate) rotation: RotationTracker,
}

impl MatchSession {
    /// Empty set with default metadata.
    pub fn new(id: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            id: id.into(),
            team_name: None,
            date: None,
            point_cap: PointCap::default(),
            created_at: now,
            updated_at: now,
            status: MatchStatus::Ongoing,
            our_score: 0,
            opponent_score: 0,
            ours: Vec::new(),
            opponents: Vec::new(),
            grade_tallies: IndexMap::new(),
            reason_tallies: IndexMap::new(),
            player_reason_tallies: IndexMap::new(),
            rotation: RotationTracker::new(),
        }
    }

    pub fn with_metadata(mut self, team_name: Option<String>, date: Option<String>) -> Self {
        self.team_name = team_name;
        self.date = date;
        self
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::Own => self.our_score,
            Side::Opposing => self.opponent_score,
        }
    }

    pub(crate) fn score_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::Own => &mut self.our_score,
            Side::Opposing => &mut self.opponent_score,
        }
    }

    pub fn lineup(&self, side: Side) -> &[LineupEntry] {
        match side {
            Side::Own => &self.ours,
            Side::Opposing => &self.opponents,
        }
    }

    pub(crate) fn lineup_mut(&mut self, side: Side) -> &mut Vec<LineupEntry> {
        match side {
            Side::Own => &mut self.ours,
            Side::Opposing => &mut self.opponents,
        }
    }

    pub fn find_player(&self, side: Side, player_id: &str) -> Option<&LineupEntry> {
        self.lineup(side)
            .iter()
            .find(|entry| entry.player_id == player_id)
    }

    /// Players currently holding a pending grade, with their side.
    pub fn graded_players(&self) -> impl Iterator<Item = (Side, &LineupEntry)> {
        Side::ALL.into_iter().flat_map(move |side| {
            self.lineup(side)
                .iter()
                .filter(|entry| entry.grade.is_some())
                .map(move |entry| (side, entry))
        })
    }

    pub fn reason_tally(&self, reason: ReasonId) -> u32 {
        self.reason_tallies.get(&reason).copied().unwrap_or(0)
    }

    /// Global reason tallies in first-recorded order.
    pub fn reason_tallies(&self) -> impl Iterator<Item = (ReasonId, u32)> + '_ {
        self.reason_tallies.iter().map(|(id, count)| (*id, *count))
    }

    pub fn player_reason_tally(&self, player_id: &str, reason: ReasonId) -> u32 {
        self.player_reason_tallies
            .get(&(player_id.to_string(), reason))
            .copied()
            .unwrap_or(0)
    }

    pub fn grade_tally(&self, side: Side, player_id: &str) -> Option<&GradeTally> {
        self.grade_tallies.get(&(side, player_id.to_string()))
    }

    /// Grade tallies as displayed: own players in lineup order, opponents by D then C count.
    pub fn displayed_grades(&self, side: Side) -> Vec<&GradeTally> {
        let mut rows: Vec<&GradeTally> = self
            .grade_tallies
            .values()
            .filter(|tally| tally.side == side && tally.counts.displayed_total() > 0)
            .collect();
        if side == Side::Opposing {
            rows.sort_by(|left, right| {
                right
                    .counts
                    .d
                    .cmp(&left.counts.d)
                    .then(right.counts.c.cmp(&left.counts.c))
            });
        }
        rows
    }

    pub fn rotation(&self) -> &RotationTracker {
        &self.rotation
    }

    /// Name under which a player's rows are persisted. Opposing players are archived per team.
    pub fn persisted_name(&self, side: Side, entry: &LineupEntry) -> String {
        match (side, self.team_name.as_deref()) {
            (Side::Opposing, Some(team)) if !team.is_empty() => {
                format!("{team}_{}", entry.player_id)
            }
            _ => entry.name.clone(),
        }
    }

    /// Persistable view of the match row.
    pub fn to_entity(&self) -> MatchEntity {
        MatchEntity {
            match_id: self.id.clone(),
            team_name: self.team_name.clone(),
            date: self.date.clone(),
            our_score: self.our_score,
            opponent_score: self.opponent_score,
            point_cap: self.point_cap.value(),
            status: self.status,
            rotation: self.rotation.position(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Lineup row to persist for `entry`.
    pub fn lineup_entity(&self, side: Side, entry: &LineupEntry) -> LineupEntity {
        LineupEntity {
            id: entry.record_id.unwrap_or_else(Uuid::new_v4),
            match_id: self.id.clone(),
            side,
            player_id: Some(entry.player_id.clone()),
            player_name: entry.name.clone(),
        }
    }

    /// Fresh set under `new_id` keeping metadata and roster. Scores, tallies and rotation restart.
    pub fn carry_forward(&self, new_id: impl Into<String>) -> Self {
        let mut next = Self::new(new_id).with_metadata(self.team_name.clone(), self.date.clone());
        for side in Side::ALL {
            *next.lineup_mut(side) = self
                .lineup(side)
                .iter()
                .map(|entry| LineupEntry {
                    player_id: entry.player_id.clone(),
                    name: entry.name.clone(),
                    grade: None,
                    record_id: None,
                })
                .collect();
        }
        next
    }
}

impl From<MatchBundle> for MatchSession {
    fn from(bundle: MatchBundle) -> Self {
        let MatchBundle {
            record,
            lineup,
            grades,
            reasons,
            player_reasons,
            rotations,
        } = bundle;

        let mut session = MatchSession::new(record.match_id)
            .with_metadata(record.team_name, record.date);
        session.point_cap = PointCap::try_from(record.point_cap).unwrap_or_default();
        session.status = record.status;
        session.our_score = record.our_score;
        session.opponent_score = record.opponent_score;
        session.created_at = record.created_at;
        session.updated_at = record.updated_at;

        for row in lineup {
            let player_id = row.player_id.unwrap_or_else(|| row.player_name.clone());
            session.lineup_mut(row.side).push(LineupEntry {
                player_id,
                name: row.player_name,
                grade: None,
                record_id: Some(row.id),
            });
        }

        for row in grades {
            let player_id = row.player_id.unwrap_or_else(|| row.player_name.clone());
            let player_name = session
                .find_player(row.side, &player_id)
                .map(|entry| entry.name.clone())
                .unwrap_or(row.player_name);
            session
                .grade_tallies
                .entry((row.side, player_id.clone()))
                .or_insert_with(|| GradeTally {
                    side: row.side,
                    player_id,
                    player_name,
                    counts: GradeCounts::default(),
                })
                .counts
                .add(row.grade, row.count);
        }

        for row in reasons {
            *session.reason_tallies.entry(row.reason_id).or_insert(0) += row.count;
        }
        for row in player_reasons {
            *session
                .player_reason_tallies
                .entry((row.player_id, row.reason_id))
                .or_insert(0) += row.count;
        }

        session.rotation = RotationTracker::from_counters(
            rotations.into_iter().map(|row| (row.slot, row.counter)),
        )
        .with_position(record.rotation);
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{GradeTallyEntity, ReasonTallyEntity, RotationTallyEntity},
        state::{
            reasons::ReasonType,
            rotation::{RotationCounter, RotationPosition},
        },
    };

    fn entry(id: &str, name: &str) -> LineupEntry {
        LineupEntry {
            player_id: id.into(),
            name: name.into(),
            grade: None,
            record_id: None,
        }
    }

    #[test]
    fn point_cap_only_accepts_fifteen_or_twenty_five() {
        assert_eq!(PointCap::try_from(15), Ok(PointCap::Fifteen));
        assert_eq!(PointCap::try_from(25), Ok(PointCap::TwentyFive));
        assert_eq!(PointCap::try_from(21), Err(InvalidPointCap(21)));
        assert_eq!(PointCap::default().value(), 25);
    }

    #[test]
    fn opposing_players_are_archived_under_team_name() {
        let session = MatchSession::new("ABC123").with_metadata(Some("Riverside".into()), None);
        assert_eq!(
            session.persisted_name(Side::Opposing, &entry("7", "7")),
            "Riverside_7"
        );
        assert_eq!(session.persisted_name(Side::Own, &entry("p1", "Lin")), "Lin");

        let anonymous = MatchSession::new("ABC124");
        assert_eq!(anonymous.persisted_name(Side::Opposing, &entry("7", "7")), "7");
    }

    #[test]
    fn opponent_grades_sort_by_d_then_c() {
        let mut session = MatchSession::new("ABC123");
        for (id, d, c) in [("4", 1, 5), ("9", 3, 0), ("12", 1, 7)] {
            let mut counts = GradeCounts::default();
            counts.add(Grade::D, d);
            counts.add(Grade::C, c);
            session.grade_tallies.insert(
                (Side::Opposing, id.to_string()),
                GradeTally {
                    side: Side::Opposing,
                    player_id: id.into(),
                    player_name: id.into(),
                    counts,
                },
            );
        }
        let order: Vec<&str> = session
            .displayed_grades(Side::Opposing)
            .iter()
            .map(|tally| tally.player_id.as_str())
            .collect();
        assert_eq!(order, vec!["9", "12", "4"]);
    }

    #[test]
    fn f_grades_are_hidden_from_the_display() {
        let mut counts = GradeCounts::default();
        counts.add(Grade::F, 2);
        assert_eq!(counts.displayed_total(), 0);
        assert_eq!(counts.get(Grade::F), 2);
    }

    #[test]
    fn carry_forward_keeps_roster_and_resets_everything_else() {
        let mut session = MatchSession::new("OLD001").with_metadata(Some("Riverside".into()), None);
        session.point_cap = PointCap::Fifteen;
        session.our_score = 14;
        session.ours.push(LineupEntry {
            grade: Some(Grade::A),
            record_id: Some(Uuid::new_v4()),
            ..entry("p1", "Lin")
        });
        session.reason_tallies.insert(ReasonId::Attack, 3);
        session.rotation.record_rally(Side::Own);

        let next = session.carry_forward("NEW001");
        assert_eq!(next.id, "NEW001");
        assert_eq!(next.team_name.as_deref(), Some("Riverside"));
        assert_eq!(next.point_cap, PointCap::TwentyFive);
        assert_eq!(next.score(Side::Own), 0);
        assert_eq!(next.lineup(Side::Own).len(), 1);
        assert_eq!(next.lineup(Side::Own)[0].grade, None);
        assert_eq!(next.lineup(Side::Own)[0].record_id, None);
        assert_eq!(next.reason_tally(ReasonId::Attack), 0);
        assert_eq!(next.rotation(), &RotationTracker::new());
    }

    #[test]
    fn hydrates_from_persisted_rows() {
        let now = SystemTime::now();
        let bundle = MatchBundle {
            record: MatchEntity {
                match_id: "ABC123".into(),
                team_name: Some("Riverside".into()),
                date: Some("2026-10-18".into()),
                our_score: 3,
                opponent_score: 1,
                point_cap: 15,
                status: MatchStatus::Ongoing,
                rotation: RotationPosition {
                    current_slot: 2,
                    serving: true,
                    ..RotationPosition::default()
                },
                created_at: now,
                updated_at: now,
            },
            lineup: vec![LineupEntity {
                id: Uuid::new_v4(),
                match_id: "ABC123".into(),
                side: Side::Own,
                player_id: Some("p1".into()),
                player_name: "Lin".into(),
            }],
            grades: vec![GradeTallyEntity {
                match_id: "ABC123".into(),
                side: Side::Own,
                player_id: Some("p1".into()),
                player_name: "Lin".into(),
                grade: Grade::B,
                count: 2,
            }],
            reasons: vec![ReasonTallyEntity {
                match_id: "ABC123".into(),
                reason_id: ReasonId::Attack,
                reason_type: ReasonType::Score,
                count: 3,
            }],
            player_reasons: vec![],
            rotations: vec![RotationTallyEntity {
                match_id: "ABC123".into(),
                slot: 1,
                counter: RotationCounter { serve: 2, receive: 1 },
            }],
        };

        let session = MatchSession::from(bundle);
        assert_eq!(session.point_cap, PointCap::Fifteen);
        assert_eq!(session.score(Side::Own), 3);
        assert_eq!(session.lineup(Side::Own)[0].name, "Lin");
        assert_eq!(
            session.grade_tally(Side::Own, "p1").map(|tally| tally.counts.b),
            Some(2)
        );
        assert_eq!(session.reason_tally(ReasonId::Attack), 3);
        assert_eq!(
            session.rotation().counter(1),
            Some(RotationCounter { serve: 2, receive: 1 })
        );
        assert_eq!(session.rotation().current_slot(), 2);
        assert!(session.rotation().serving());
        assert_eq!(session.to_entity().rotation.current_slot, 2);
    }
}
