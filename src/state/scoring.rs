//! Per-point state machine: pending grade, reason, player attribution, score, rotation, set end.
//!
//! Every accepted mutation queues [`MirrorWrite`]s describing the persistence calls that mirror
//! it. Callers drain them with [`ScoringEngine::take_writes`] and dispatch them best-effort.

use std::{fmt, mem, time::SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{
        GradeIncrement, LineupEntity, MatchEntity, PlayerReasonIncrement, ReasonIncrement,
        RotationTallyEntity,
    },
    state::{
        reasons::{ReasonCatalog, ReasonId, Side},
        rotation::RotationStep,
        session::{
            Grade, GradeCounts, GradeTally, LineupEntry, MatchSession, MatchStatus, PlayerId,
            PointCap,
        },
    },
};

/// Interaction that was refused. No state changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreRejection {
    #[error("grade a player before recording the rally")]
    NoGradedPlayer,
    #[error("the set is over")]
    MatchOver,
    #[error("reason `{reason}` cannot be recorded for {side}")]
    ReasonNotInCatalog { side: Side, reason: ReasonId },
    #[error("player `{0}` is not in the lineup")]
    UnknownPlayer(PlayerId),
    #[error("player `{0}` is already in the lineup")]
    DuplicatePlayer(PlayerId),
    #[error("player name must not be empty")]
    EmptyName,
    #[error("no reason was chosen")]
    Cancelled,
    #[error("no session is loaded")]
    NoSession,
}

/// Persistence call mirroring one in-memory mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorWrite {
    CreateMatch(MatchEntity),
    UpdateMatch(MatchEntity),
    AppendLineup(LineupEntity),
    RemoveLineup { match_id: String, entry_id: Uuid },
    IncrementGrade(GradeIncrement),
    IncrementReason(ReasonIncrement),
    IncrementPlayerReason(PlayerReasonIncrement),
    UpsertRotation(RotationTallyEntity),
}

/// Final line of a finished set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub winner: Side,
    pub our_score: u32,
    pub opponent_score: u32,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} wins {}:{}",
            self.winner, self.our_score, self.opponent_score
        )
    }
}

/// Whether a set at `our`:`opponent` is over under `cap`, and who won.
pub fn match_result(our: u32, opponent: u32, cap: PointCap) -> Option<MatchResult> {
    let reached = our.max(opponent) >= cap.value();
    if !reached || our.abs_diff(opponent) < 2 {
        return None;
    }
    let winner = if our > opponent {
        Side::Own
    } else {
        Side::Opposing
    };
    Some(MatchResult {
        winner,
        our_score: our,
        opponent_score: opponent,
    })
}

/// What an accepted point changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointOutcome {
    pub side: Side,
    pub reason: ReasonId,
    /// Player whose per-reason tally was credited.
    pub credited: Option<PlayerId>,
    pub rotation: RotationStep,
    /// Set when this point ended the set.
    pub result: Option<MatchResult>,
}

/// Operator choices needed to record a point, asked in order.
pub trait PointPrompt {
    /// Reason from `side`'s catalog, or `None` to cancel.
    fn choose_reason(&mut self, side: Side) -> Option<ReasonId>;
    /// Own player to credit for an attributable reason, or `None` to skip attribution.
    fn choose_player(&mut self, side: Side, reason: ReasonId) -> Option<PlayerId>;
}

/// Scoring state machine over one [`MatchSession`].
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    session: MatchSession,
    catalog: ReasonCatalog,
    writes: Vec<MirrorWrite>,
}

impl ScoringEngine {
    pub fn new(session: MatchSession, catalog: ReasonCatalog) -> Self {
        Self {
            session,
            catalog,
            writes: Vec::new(),
        }
    }

    pub fn session(&self) -> &MatchSession {
        &self.session
    }

    pub fn catalog(&self) -> &ReasonCatalog {
        &self.catalog
    }

    /// Swap in another session (full reload), dropping queued writes of the old one.
    pub fn replace_session(&mut self, session: MatchSession) {
        self.session = session;
        self.writes.clear();
    }

    /// Drain the writes queued since the last call.
    pub fn take_writes(&mut self) -> Vec<MirrorWrite> {
        mem::take(&mut self.writes)
    }

    pub fn result(&self) -> Option<MatchResult> {
        match_result(
            self.session.our_score,
            self.session.opponent_score,
            self.session.point_cap,
        )
    }

    pub fn is_over(&self) -> bool {
        self.session.status == MatchStatus::Completed
    }

    pub fn has_pending_grade(&self) -> bool {
        self.session.graded_players().next().is_some()
    }

    /// Register a player. Opposing players use their jersey number as both id and name.
    pub fn add_player(
        &mut self,
        side: Side,
        player_id: impl Into<PlayerId>,
        name: Option<String>,
    ) -> Result<(), ScoreRejection> {
        let player_id = player_id.into();
        let name = match side {
            Side::Own => name.unwrap_or_default(),
            Side::Opposing => player_id.clone(),
        };
        if player_id.trim().is_empty() || name.trim().is_empty() {
            return Err(ScoreRejection::EmptyName);
        }
        if self.session.find_player(side, &player_id).is_some() {
            return Err(ScoreRejection::DuplicatePlayer(player_id));
        }

        let entry = LineupEntry {
            player_id,
            name,
            grade: None,
            record_id: Some(Uuid::new_v4()),
        };
        let row = self.session.lineup_entity(side, &entry);
        self.session.lineup_mut(side).push(entry);
        self.writes.push(MirrorWrite::AppendLineup(row));
        Ok(())
    }

    pub fn remove_player(&mut self, side: Side, player_id: &str) -> Result<(), ScoreRejection> {
        let lineup = self.session.lineup_mut(side);
        let index = lineup
            .iter()
            .position(|entry| entry.player_id == player_id)
            .ok_or_else(|| ScoreRejection::UnknownPlayer(player_id.to_string()))?;
        let removed = lineup.remove(index);
        if let Some(entry_id) = removed.record_id {
            self.writes.push(MirrorWrite::RemoveLineup {
                match_id: self.session.id.clone(),
                entry_id,
            });
        }
        Ok(())
    }

    /// Give `player_id` the pending grade. Any other pending grade, on either side, is cleared.
    pub fn grade_player(
        &mut self,
        side: Side,
        player_id: &str,
        grade: Grade,
    ) -> Result<(), ScoreRejection> {
        if self.is_over() {
            return Err(ScoreRejection::MatchOver);
        }
        if self.session.find_player(side, player_id).is_none() {
            return Err(ScoreRejection::UnknownPlayer(player_id.to_string()));
        }
        self.clear_grades();
        if let Some(entry) = self
            .session
            .lineup_mut(side)
            .iter_mut()
            .find(|entry| entry.player_id == player_id)
        {
            entry.grade = Some(grade);
        }
        Ok(())
    }

    pub fn clear_grades(&mut self) {
        for side in Side::ALL {
            for entry in self.session.lineup_mut(side) {
                entry.grade = None;
            }
        }
    }

    /// Record a point won by `side` for `reason`, optionally crediting an own player.
    pub fn record_point(
        &mut self,
        side: Side,
        reason: ReasonId,
        player: Option<PlayerId>,
    ) -> Result<PointOutcome, ScoreRejection> {
        self.check_can_score()?;
        if !self.catalog.allows(side, reason) {
            return Err(ScoreRejection::ReasonNotInCatalog { side, reason });
        }
        let credited = match player {
            Some(player_id) if self.catalog.requires_player(reason) => {
                let entry = self
                    .session
                    .find_player(Side::Own, &player_id)
                    .ok_or_else(|| ScoreRejection::UnknownPlayer(player_id.clone()))?;
                Some((player_id, entry.name.clone()))
            }
            _ => None,
        };

        let match_id = self.session.id.clone();
        let reason_type = side.reason_type();

        *self.session.reason_tallies.entry(reason).or_insert(0) += 1;
        self.writes.push(MirrorWrite::IncrementReason(ReasonIncrement {
            match_id: match_id.clone(),
            reason_id: reason,
            reason_type,
        }));

        if let Some((player_id, player_name)) = &credited {
            *self
                .session
                .player_reason_tallies
                .entry((player_id.clone(), reason))
                .or_insert(0) += 1;
            self.writes
                .push(MirrorWrite::IncrementPlayerReason(PlayerReasonIncrement {
                    match_id: match_id.clone(),
                    player_id: player_id.clone(),
                    player_name: player_name.clone(),
                    reason_id: reason,
                    reason_type,
                }));
        }

        self.commit_grades();

        let rotation = self.session.rotation.record_rally(side);
        self.writes
            .push(MirrorWrite::UpsertRotation(RotationTallyEntity {
                match_id,
                slot: rotation.slot,
                counter: rotation.counter,
            }));

        *self.session.score_mut(side) += 1;
        let result = self.refresh_status();
        self.push_match_update();

        Ok(PointOutcome {
            side,
            reason,
            credited: credited.map(|(player_id, _)| player_id),
            rotation,
            result,
        })
    }

    /// Ask `prompt` for the reason and player, then record the point.
    pub fn record_with<P: PointPrompt>(
        &mut self,
        side: Side,
        prompt: &mut P,
    ) -> Result<PointOutcome, ScoreRejection> {
        self.check_can_score()?;
        let reason = prompt
            .choose_reason(side)
            .ok_or(ScoreRejection::Cancelled)?;
        let player = if self.catalog.requires_player(reason) {
            prompt.choose_player(side, reason)
        } else {
            None
        };
        self.record_point(side, reason, player)
    }

    /// Commit pending grades for a rally that scores nothing.
    pub fn record_neutral(&mut self) -> Result<(), ScoreRejection> {
        self.check_can_score()?;
        self.commit_grades();
        Ok(())
    }

    /// Change the cap. Re-evaluates whether the set is over.
    pub fn set_point_cap(&mut self, cap: PointCap) -> Option<MatchResult> {
        self.session.point_cap = cap;
        let result = self.refresh_status();
        self.push_match_update();
        result
    }

    pub fn set_metadata(&mut self, team_name: Option<String>, date: Option<String>) {
        self.session.team_name = team_name;
        self.session.date = date;
        self.push_match_update();
    }

    /// Start the next set under `new_id`, carrying the roster forward. Writes still queued for
    /// the finished set stay ahead of the new set's rows.
    pub fn next_set(&mut self, new_id: impl Into<String>) {
        let mut next = self.session.carry_forward(new_id);
        self.writes.push(MirrorWrite::CreateMatch(next.to_entity()));
        for side in Side::ALL {
            for entry in next.lineup_mut(side) {
                entry.record_id = Some(Uuid::new_v4());
            }
            for entry in next.lineup(side) {
                self.writes
                    .push(MirrorWrite::AppendLineup(next.lineup_entity(side, entry)));
            }
        }
        self.session = next;
    }

    fn check_can_score(&self) -> Result<(), ScoreRejection> {
        if self.is_over() {
            return Err(ScoreRejection::MatchOver);
        }
        if !self.has_pending_grade() {
            return Err(ScoreRejection::NoGradedPlayer);
        }
        Ok(())
    }

    fn commit_grades(&mut self) {
        let graded: Vec<(Side, LineupEntry)> = self
            .session
            .graded_players()
            .map(|(side, entry)| (side, entry.clone()))
            .collect();

        for (side, entry) in graded {
            let Some(grade) = entry.grade else { continue };
            let player_name = self.session.persisted_name(side, &entry);
            self.session
                .grade_tallies
                .entry((side, entry.player_id.clone()))
                .or_insert_with(|| GradeTally {
                    side,
                    player_id: entry.player_id.clone(),
                    player_name: entry.name.clone(),
                    counts: GradeCounts::default(),
                })
                .counts
                .add(grade, 1);
            self.writes.push(MirrorWrite::IncrementGrade(GradeIncrement {
                match_id: self.session.id.clone(),
                side,
                player_id: Some(entry.player_id),
                player_name,
                grade,
            }));
        }
        self.clear_grades();
    }

    fn refresh_status(&mut self) -> Option<MatchResult> {
        let result = self.result();
        self.session.status = if result.is_some() {
            MatchStatus::Completed
        } else {
            MatchStatus::Ongoing
        };
        result
    }

    fn push_match_update(&mut self) {
        self.session.updated_at = SystemTime::now();
        self.writes
            .push(MirrorWrite::UpdateMatch(self.session.to_entity()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::rotation::RotationCounter;

    fn engine() -> ScoringEngine {
        let mut engine = ScoringEngine::new(MatchSession::new("ABC123"), ReasonCatalog::default());
        engine.add_player(Side::Own, "p1", Some("Lin".into())).unwrap();
        engine.add_player(Side::Own, "p2", Some("Chen".into())).unwrap();
        engine.add_player(Side::Opposing, "7", None).unwrap();
        engine.take_writes();
        engine
    }

    fn score(engine: &mut ScoringEngine, side: Side, reason: ReasonId, player: Option<&str>) {
        engine.grade_player(Side::Own, "p1", Grade::C).unwrap();
        engine
            .record_point(side, reason, player.map(str::to_string))
            .unwrap();
    }

    struct Scripted {
        reason: Option<ReasonId>,
        player: Option<PlayerId>,
        asked_player: bool,
    }

    impl PointPrompt for Scripted {
        fn choose_reason(&mut self, _side: Side) -> Option<ReasonId> {
            self.reason
        }

        fn choose_player(&mut self, _side: Side, _reason: ReasonId) -> Option<PlayerId> {
            self.asked_player = true;
            self.player.clone()
        }
    }

    #[test]
    fn end_to_end_first_point() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p1", Grade::B).unwrap();

        let outcome = engine
            .record_point(Side::Own, ReasonId::Attack, Some("p1".into()))
            .unwrap();

        let session = engine.session();
        assert_eq!(session.score(Side::Own), 1);
        assert_eq!(session.reason_tally(ReasonId::Attack), 1);
        assert_eq!(session.player_reason_tally("p1", ReasonId::Attack), 1);
        assert_eq!(session.grade_tally(Side::Own, "p1").unwrap().counts.b, 1);
        assert_eq!(outcome.rotation.slot, 1);
        assert_eq!(
            session.rotation().counter(1),
            Some(RotationCounter { serve: 0, receive: 1 })
        );
        assert!(!engine.has_pending_grade());
        assert_eq!(outcome.credited.as_deref(), Some("p1"));
        assert_eq!(outcome.result, None);
    }

    #[test]
    fn point_without_grade_is_rejected_without_mutation() {
        let mut engine = engine();
        let err = engine
            .record_point(Side::Own, ReasonId::Attack, None)
            .unwrap_err();
        assert_eq!(err, ScoreRejection::NoGradedPlayer);
        assert_eq!(engine.session().score(Side::Own), 0);
        assert_eq!(engine.session().reason_tally(ReasonId::Attack), 0);
        assert!(engine.take_writes().is_empty());
    }

    #[test]
    fn scores_track_recorded_points() {
        let mut engine = engine();
        let sequence = [
            Side::Own,
            Side::Opposing,
            Side::Opposing,
            Side::Own,
            Side::Own,
            Side::Opposing,
            Side::Own,
        ];
        let mut own = 0;
        let mut opposing = 0;
        for side in sequence {
            let reason = match side {
                Side::Own => ReasonId::OppServeError,
                Side::Opposing => ReasonId::OppAttack,
            };
            score(&mut engine, side, reason, None);
            match side {
                Side::Own => own += 1,
                Side::Opposing => opposing += 1,
            }
            assert_eq!(engine.session().score(Side::Own), own);
            assert_eq!(engine.session().score(Side::Opposing), opposing);
        }
    }

    #[test]
    fn global_tally_ignores_attribution() {
        let mut engine = engine();
        score(&mut engine, Side::Own, ReasonId::Block, Some("p1"));
        score(&mut engine, Side::Own, ReasonId::Block, None);
        score(&mut engine, Side::Own, ReasonId::Block, Some("p2"));
        score(&mut engine, Side::Own, ReasonId::Block, Some("p1"));

        let session = engine.session();
        assert_eq!(session.reason_tally(ReasonId::Block), 4);
        assert_eq!(session.player_reason_tally("p1", ReasonId::Block), 2);
        assert_eq!(session.player_reason_tally("p2", ReasonId::Block), 1);
    }

    #[test]
    fn attribution_is_ignored_for_opponent_reasons() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p1", Grade::A).unwrap();
        let outcome = engine
            .record_point(Side::Own, ReasonId::OppServeError, Some("p1".into()))
            .unwrap();
        assert_eq!(outcome.credited, None);
        assert_eq!(engine.session().reason_tally(ReasonId::OppServeError), 1);
        assert_eq!(
            engine
                .session()
                .player_reason_tally("p1", ReasonId::OppServeError),
            0
        );
    }

    #[test]
    fn foul_attribution_follows_catalog_setting() {
        let mut strict = engine();
        strict.grade_player(Side::Own, "p1", Grade::D).unwrap();
        let outcome = strict
            .record_point(Side::Opposing, ReasonId::Foul, Some("p1".into()))
            .unwrap();
        assert_eq!(outcome.credited.as_deref(), Some("p1"));

        let mut lenient = ScoringEngine::new(MatchSession::new("XYZ789"), ReasonCatalog::new(false));
        lenient.add_player(Side::Own, "p1", Some("Lin".into())).unwrap();
        lenient.grade_player(Side::Own, "p1", Grade::D).unwrap();
        let outcome = lenient
            .record_point(Side::Opposing, ReasonId::Foul, Some("p1".into()))
            .unwrap();
        assert_eq!(outcome.credited, None);
    }

    #[test]
    fn reason_must_come_from_the_scoring_side_catalog() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p1", Grade::A).unwrap();
        let err = engine
            .record_point(Side::Own, ReasonId::ServeError, None)
            .unwrap_err();
        assert_eq!(
            err,
            ScoreRejection::ReasonNotInCatalog {
                side: Side::Own,
                reason: ReasonId::ServeError
            }
        );
        assert!(engine.has_pending_grade());
    }

    #[test]
    fn only_one_pending_grade_across_sides() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p1", Grade::A).unwrap();
        engine.grade_player(Side::Opposing, "7", Grade::D).unwrap();

        let graded: Vec<_> = engine
            .session()
            .graded_players()
            .map(|(side, entry)| (side, entry.player_id.clone()))
            .collect();
        assert_eq!(graded, vec![(Side::Opposing, "7".to_string())]);
    }

    #[test]
    fn opponent_grade_rows_use_archive_name() {
        let mut engine = engine();
        engine.set_metadata(Some("Riverside".into()), None);
        engine.take_writes();
        engine.grade_player(Side::Opposing, "7", Grade::D).unwrap();
        engine
            .record_point(Side::Opposing, ReasonId::OppAttack, None)
            .unwrap();

        let writes = engine.take_writes();
        let grade_row = writes.iter().find_map(|write| match write {
            MirrorWrite::IncrementGrade(row) => Some(row),
            _ => None,
        });
        assert_eq!(grade_row.map(|row| row.player_name.as_str()), Some("Riverside_7"));
        assert_eq!(
            engine.session().grade_tally(Side::Opposing, "7").unwrap().counts.d,
            1
        );
    }

    #[test]
    fn f_grade_is_persisted() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p2", Grade::F).unwrap();
        engine
            .record_point(Side::Opposing, ReasonId::DefenseError, Some("p2".into()))
            .unwrap();
        let tally = engine.session().grade_tally(Side::Own, "p2").unwrap();
        assert_eq!(tally.counts.f, 1);
        assert!(engine.session().displayed_grades(Side::Own).is_empty());
    }

    #[test]
    fn point_emits_mirror_writes() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p1", Grade::B).unwrap();
        engine
            .record_point(Side::Own, ReasonId::Attack, Some("p1".into()))
            .unwrap();

        let writes = engine.take_writes();
        assert!(matches!(writes[0], MirrorWrite::IncrementReason(_)));
        assert!(matches!(writes[1], MirrorWrite::IncrementPlayerReason(_)));
        assert!(matches!(writes[2], MirrorWrite::IncrementGrade(_)));
        assert!(matches!(writes[3], MirrorWrite::UpsertRotation(_)));
        match &writes[4] {
            MirrorWrite::UpdateMatch(row) => assert_eq!(row.our_score, 1),
            other => panic!("unexpected write {other:?}"),
        }
        assert!(engine.take_writes().is_empty());
    }

    #[test]
    fn match_end_table() {
        let cap = PointCap::TwentyFive;
        let ended = match_result(25, 23, cap).unwrap();
        assert_eq!(ended.winner, Side::Own);
        assert_eq!(match_result(24, 23, cap), None);
        assert_eq!(match_result(25, 24, cap), None);
        let extended = match_result(24, 26, cap).unwrap();
        assert_eq!(extended.winner, Side::Opposing);
        assert_eq!(extended.to_string(), "Opponent wins 24:26");
        assert!(match_result(15, 13, PointCap::Fifteen).is_some());
        assert_eq!(match_result(15, 13, cap), None);
    }

    #[test]
    fn scoring_freezes_after_the_set_ends() {
        let mut engine = engine();
        engine.set_point_cap(PointCap::Fifteen);
        for _ in 0..15 {
            score(&mut engine, Side::Own, ReasonId::Attack, Some("p1"));
        }
        assert!(engine.is_over());
        assert_eq!(engine.result().unwrap().to_string(), "Our team wins 15:0");
        assert_eq!(engine.session().status(), MatchStatus::Completed);

        assert_eq!(
            engine.grade_player(Side::Own, "p1", Grade::A),
            Err(ScoreRejection::MatchOver)
        );
        assert_eq!(engine.session().score(Side::Own), 15);
    }

    #[test]
    fn next_set_resets_and_recreates_rows() {
        let mut engine = engine();
        engine.set_point_cap(PointCap::Fifteen);
        score(&mut engine, Side::Own, ReasonId::Attack, Some("p1"));
        engine.next_set("NEXT01");

        let session = engine.session();
        assert_eq!(session.id, "NEXT01");
        assert_eq!(session.score(Side::Own), 0);
        assert_eq!(session.point_cap, PointCap::TwentyFive);
        assert_eq!(session.reason_tally(ReasonId::Attack), 0);
        assert_eq!(session.rotation().current_slot(), 1);
        assert_eq!(session.lineup(Side::Own).len(), 2);

        let writes = engine.take_writes();
        let created = writes
            .iter()
            .position(|write| matches!(write, MirrorWrite::CreateMatch(row) if row.match_id == "NEXT01"))
            .unwrap();
        assert!(matches!(
            &writes[created - 1],
            MirrorWrite::UpdateMatch(row) if row.match_id == "ABC123" && row.our_score == 1
        ));
        let appended = writes[created..]
            .iter()
            .filter(|write| matches!(write, MirrorWrite::AppendLineup(row) if row.match_id == "NEXT01"))
            .count();
        assert_eq!(appended, 3);
    }

    #[test]
    fn next_set_after_drain_only_queues_new_rows() {
        let mut engine = engine();
        score(&mut engine, Side::Own, ReasonId::Attack, Some("p1"));
        engine.take_writes();
        engine.next_set("NEXT01");

        let writes = engine.take_writes();
        assert!(matches!(&writes[0], MirrorWrite::CreateMatch(row) if row.match_id == "NEXT01"));
        assert_eq!(writes.len(), 4);
    }

    #[test]
    fn prompt_is_asked_for_player_only_when_attributable() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p1", Grade::A).unwrap();
        let mut prompt = Scripted {
            reason: Some(ReasonId::OppBlock),
            player: Some("p1".into()),
            asked_player: false,
        };
        let outcome = engine.record_with(Side::Opposing, &mut prompt).unwrap();
        assert!(!prompt.asked_player);
        assert_eq!(outcome.credited, None);

        engine.grade_player(Side::Own, "p1", Grade::A).unwrap();
        let mut prompt = Scripted {
            reason: Some(ReasonId::Serve),
            player: Some("p2".into()),
            asked_player: false,
        };
        let outcome = engine.record_with(Side::Own, &mut prompt).unwrap();
        assert!(prompt.asked_player);
        assert_eq!(outcome.credited.as_deref(), Some("p2"));
    }

    #[test]
    fn cancelled_prompt_keeps_the_grade() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p1", Grade::A).unwrap();
        let mut prompt = Scripted {
            reason: None,
            player: None,
            asked_player: false,
        };
        assert_eq!(
            engine.record_with(Side::Own, &mut prompt),
            Err(ScoreRejection::Cancelled)
        );
        assert!(engine.has_pending_grade());
    }

    #[test]
    fn neutral_rally_commits_grades_only() {
        let mut engine = engine();
        engine.grade_player(Side::Own, "p2", Grade::A).unwrap();
        engine.record_neutral().unwrap();
        assert_eq!(engine.session().grade_tally(Side::Own, "p2").unwrap().counts.a, 1);
        assert_eq!(engine.session().score(Side::Own), 0);
        assert_eq!(engine.session().rotation().counter(1), Some(RotationCounter::default()));
    }

    #[test]
    fn lineup_rejects_duplicates_and_unknown_removals() {
        let mut engine = engine();
        assert_eq!(
            engine.add_player(Side::Opposing, "7", None),
            Err(ScoreRejection::DuplicatePlayer("7".into()))
        );
        assert_eq!(
            engine.remove_player(Side::Own, "ghost"),
            Err(ScoreRejection::UnknownPlayer("ghost".into()))
        );
        engine.remove_player(Side::Opposing, "7").unwrap();
        assert!(matches!(
            engine.take_writes().as_slice(),
            [MirrorWrite::RemoveLineup { .. }]
        ));
    }
}
