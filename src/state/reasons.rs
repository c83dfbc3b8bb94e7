//! Static catalogs of scoring and losing reasons, and which of them credit a specific player.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// One of the two competing sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Side {
    /// The team operating this scoreboard.
    #[serde(rename = "ours")]
    Own,
    /// The visiting/opposing team.
    #[serde(rename = "opponent")]
    Opposing,
}

impl Side {
    /// Both sides in display order.
    pub const ALL: [Side; 2] = [Side::Own, Side::Opposing];

    /// Reasons a point can be recorded for when this side wins the rally.
    pub fn catalog(self) -> &'static [ReasonEntry] {
        match self {
            Side::Own => &SCORE_REASONS,
            Side::Opposing => &LOSS_REASONS,
        }
    }

    /// Tally bucket reasons for this side are counted under.
    pub fn reason_type(self) -> ReasonType {
        match self {
            Side::Own => ReasonType::Score,
            Side::Opposing => ReasonType::Loss,
        }
    }

    /// The other side.
    pub fn opponent(self) -> Side {
        match self {
            Side::Own => Side::Opposing,
            Side::Opposing => Side::Own,
        }
    }

    /// Wire name used by the persistence layer (`ours` / `opponent`).
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Own => "ours",
            Side::Opposing => "opponent",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Own => f.write_str("Our team"),
            Side::Opposing => f.write_str("Opponent"),
        }
    }
}

/// Which tally a reason is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReasonType {
    /// The own side gained the point.
    Score,
    /// The opposing side gained the point.
    Loss,
}

impl ReasonType {
    /// Side that gains the point for reasons of this type.
    pub fn scoring_side(self) -> Side {
        match self {
            ReasonType::Score => Side::Own,
            ReasonType::Loss => Side::Opposing,
        }
    }

    /// Wire name (`score` / `loss`).
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonType::Score => "score",
            ReasonType::Loss => "loss",
        }
    }
}

/// Identifier of a scoring or losing reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReasonId {
    Attack,
    Serve,
    Tip,
    Block,
    OppAttackError,
    OppServeError,
    OppDefenseError,
    OppFoul,
    OppAttack,
    OppServe,
    OppTip,
    OppBlock,
    AttackNoIn,
    AttackOut,
    ServeError,
    DefenseError,
    RaiseError,
    OtherError,
    Foul,
}

impl ReasonId {
    /// Tally bucket this reason belongs to.
    pub fn reason_type(self) -> ReasonType {
        if SCORE_REASONS.iter().any(|entry| entry.id == self) {
            ReasonType::Score
        } else {
            ReasonType::Loss
        }
    }

    /// Catalog entry describing this reason.
    pub fn entry(self) -> &'static ReasonEntry {
        match self {
            ReasonId::Attack => &SCORE_REASONS[0],
            ReasonId::Serve => &SCORE_REASONS[1],
            ReasonId::Tip => &SCORE_REASONS[2],
            ReasonId::Block => &SCORE_REASONS[3],
            ReasonId::OppAttackError => &SCORE_REASONS[4],
            ReasonId::OppServeError => &SCORE_REASONS[5],
            ReasonId::OppDefenseError => &SCORE_REASONS[6],
            ReasonId::OppFoul => &SCORE_REASONS[7],
            ReasonId::OppAttack => &LOSS_REASONS[0],
            ReasonId::OppServe => &LOSS_REASONS[1],
            ReasonId::OppTip => &LOSS_REASONS[2],
            ReasonId::OppBlock => &LOSS_REASONS[3],
            ReasonId::AttackNoIn => &LOSS_REASONS[4],
            ReasonId::AttackOut => &LOSS_REASONS[5],
            ReasonId::ServeError => &LOSS_REASONS[6],
            ReasonId::DefenseError => &LOSS_REASONS[7],
            ReasonId::RaiseError => &LOSS_REASONS[8],
            ReasonId::OtherError => &LOSS_REASONS[9],
            ReasonId::Foul => &LOSS_REASONS[10],
        }
    }

    /// Stable wire identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonId::Attack => "attack",
            ReasonId::Serve => "serve",
            ReasonId::Tip => "tip",
            ReasonId::Block => "block",
            ReasonId::OppAttackError => "opp_attack_error",
            ReasonId::OppServeError => "opp_serve_error",
            ReasonId::OppDefenseError => "opp_defense_error",
            ReasonId::OppFoul => "opp_foul",
            ReasonId::OppAttack => "opp_attack",
            ReasonId::OppServe => "opp_serve",
            ReasonId::OppTip => "opp_tip",
            ReasonId::OppBlock => "opp_block",
            ReasonId::AttackNoIn => "attack_no_in",
            ReasonId::AttackOut => "attack_out",
            ReasonId::ServeError => "serve_error",
            ReasonId::DefenseError => "defense_error",
            ReasonId::RaiseError => "raise_error",
            ReasonId::OtherError => "other_error",
            ReasonId::Foul => "foul",
        }
    }
}

impl fmt::Display for ReasonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string does not name a known reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reason `{0}`")]
pub struct UnknownReason(pub String);

impl FromStr for ReasonId {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SCORE_REASONS
            .iter()
            .chain(LOSS_REASONS.iter())
            .map(|entry| entry.id)
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownReason(s.to_string()))
    }
}

/// Whether recording a reason may credit a specific own-side player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    /// The reason is about the opponent; no own player is credited.
    None,
    /// The reason is credited to the own player who made the play.
    Player,
    /// Attribution depends on [`ReasonCatalog::foul_requires_player`].
    Configurable,
}

/// Static description of a reason shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasonEntry {
    pub id: ReasonId,
    pub label: &'static str,
    pub attribution: Attribution,
}

const fn entry(id: ReasonId, label: &'static str, attribution: Attribution) -> ReasonEntry {
    ReasonEntry {
        id,
        label,
        attribution,
    }
}

/// Reasons for a point won by the own side, in display order.
pub static SCORE_REASONS: [ReasonEntry; 8] = [
    entry(ReasonId::Attack, "Attack kill", Attribution::Player),
    entry(ReasonId::Serve, "Service ace", Attribution::Player),
    entry(ReasonId::Tip, "Tip", Attribution::Player),
    entry(ReasonId::Block, "Block", Attribution::Player),
    entry(ReasonId::OppAttackError, "Opponent attack error", Attribution::None),
    entry(ReasonId::OppServeError, "Opponent serve error", Attribution::None),
    entry(ReasonId::OppDefenseError, "Opponent defense error", Attribution::None),
    entry(ReasonId::OppFoul, "Opponent foul", Attribution::None),
];

/// Reasons for a point won by the opposing side, in display order.
pub static LOSS_REASONS: [ReasonEntry; 11] = [
    entry(ReasonId::OppAttack, "Opponent attack kill", Attribution::None),
    entry(ReasonId::OppServe, "Opponent service ace", Attribution::None),
    entry(ReasonId::OppTip, "Opponent tip", Attribution::None),
    entry(ReasonId::OppBlock, "Opponent block", Attribution::None),
    entry(ReasonId::AttackNoIn, "Attack error (not in)", Attribution::Player),
    entry(ReasonId::AttackOut, "Attack error (out)", Attribution::Player),
    entry(ReasonId::ServeError, "Serve error", Attribution::Player),
    entry(ReasonId::DefenseError, "Defense error", Attribution::Player),
    entry(ReasonId::RaiseError, "Setting error", Attribution::Player),
    entry(ReasonId::OtherError, "Other error", Attribution::Player),
    entry(ReasonId::Foul, "Foul", Attribution::Configurable),
];

/// Runtime view over the static catalogs, carrying the configurable attribution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasonCatalog {
    /// Whether an own-side `foul` is credited to a player.
    pub foul_requires_player: bool,
}

impl Default for ReasonCatalog {
    fn default() -> Self {
        Self {
            foul_requires_player: true,
        }
    }
}

impl ReasonCatalog {
    /// Build a catalog with an explicit foul attribution rule.
    pub fn new(foul_requires_player: bool) -> Self {
        Self {
            foul_requires_player,
        }
    }

    /// Whether `reason` can be recorded when `side` wins the rally.
    pub fn allows(&self, side: Side, reason: ReasonId) -> bool {
        side.catalog().iter().any(|entry| entry.id == reason)
    }

    /// Whether recording `reason` should credit a specific own-side player.
    pub fn requires_player(&self, reason: ReasonId) -> bool {
        match reason.entry().attribution {
            Attribution::None => false,
            Attribution::Player => true,
            Attribution::Configurable => self.foul_requires_player,
        }
    }

    /// Reasons of `side` that credit a player, in display order (per-player stats columns).
    pub fn attributable(&self, side: Side) -> impl Iterator<Item = ReasonId> + '_ {
        side.catalog()
            .iter()
            .map(|entry| entry.id)
            .filter(|id| self.requires_player(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_are_disjoint_and_typed() {
        for entry in SCORE_REASONS.iter() {
            assert_eq!(entry.id.reason_type(), ReasonType::Score);
            assert!(!LOSS_REASONS.iter().any(|loss| loss.id == entry.id));
        }
        for entry in LOSS_REASONS.iter() {
            assert_eq!(entry.id.reason_type(), ReasonType::Loss);
        }
    }

    #[test]
    fn every_catalog_entry_is_found_by_its_id() {
        for entry in SCORE_REASONS.iter().chain(LOSS_REASONS.iter()) {
            assert!(std::ptr::eq(entry.id.entry(), entry), "{} misplaced", entry.id.as_str());
        }
    }

    #[test]
    fn wire_ids_round_trip_through_from_str() {
        assert_eq!("attack_no_in".parse::<ReasonId>(), Ok(ReasonId::AttackNoIn));
        assert_eq!("opp_foul".parse::<ReasonId>(), Ok(ReasonId::OppFoul));
        assert_eq!(ReasonId::RaiseError.as_str(), "raise_error");
        assert!("smash".parse::<ReasonId>().is_err());
    }

    #[test]
    fn serde_uses_snake_case_ids() {
        let json = serde_json::to_string(&ReasonId::OppDefenseError).unwrap();
        assert_eq!(json, "\"opp_defense_error\"");
        let side: Side = serde_json::from_str("\"opponent\"").unwrap();
        assert_eq!(side, Side::Opposing);
    }

    #[test]
    fn attribution_follows_catalog() {
        let catalog = ReasonCatalog::default();
        assert!(catalog.requires_player(ReasonId::Attack));
        assert!(catalog.requires_player(ReasonId::RaiseError));
        assert!(!catalog.requires_player(ReasonId::OppAttackError));
        assert!(!catalog.requires_player(ReasonId::OppBlock));
    }

    #[test]
    fn foul_attribution_is_configurable() {
        assert!(ReasonCatalog::new(true).requires_player(ReasonId::Foul));
        assert!(!ReasonCatalog::new(false).requires_player(ReasonId::Foul));
        assert!(!ReasonCatalog::new(true).requires_player(ReasonId::OppFoul));
    }

    #[test]
    fn side_catalogs_gate_reasons() {
        let catalog = ReasonCatalog::default();
        assert!(catalog.allows(Side::Own, ReasonId::Block));
        assert!(!catalog.allows(Side::Own, ReasonId::Foul));
        assert!(catalog.allows(Side::Opposing, ReasonId::Foul));
        assert_eq!(catalog.attributable(Side::Own).count(), 4);
    }
}
