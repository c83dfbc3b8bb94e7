use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::{
    dao::models::{LineupEntity, MatchEntity, PlayerEntity, RotationTallyEntity},
    state::{
        reasons::Side,
        rotation::{RotationCounter, RotationPosition},
        session::MatchStatus,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    pub match_id: String,
    pub team_name: Option<String>,
    pub date: Option<String>,
    pub our_score: u32,
    pub opponent_score: u32,
    #[serde(default = "default_point_cap")]
    pub point_cap: u32,
    pub status: MatchStatus,
    #[serde(default)]
    pub rotation: RotationPosition,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

fn default_point_cap() -> u32 {
    25
}

impl From<MatchEntity> for MongoMatchDocument {
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
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            match_id: value.match_id,
            team_name: value.team_name,
            date: value.date,
            our_score: value.our_score,
            opponent_score: value.opponent_score,
            point_cap: value.point_cap,
            status: value.status,
            rotation: value.rotation,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Lineup rows keep their uuid as a string `_id` so deletes can match on it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLineupDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub match_id: String,
    pub side: Side,
    pub player_id: Option<String>,
    pub player_name: String,
}

impl From<LineupEntity> for MongoLineupDocument {
    fn from(value: LineupEntity) -> Self {
        Self {
            id: value.id.to_string(),
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
        }
    }
}

impl TryFrom<MongoLineupDocument> for LineupEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoLineupDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|source| MongoDaoError::InvalidPlayerId {
            id: value.id.clone(),
            source,
        })?;
        Ok(Self {
            id,
            match_id: value.match_id,
            side: value.side,
            player_id: value.player_id,
            player_name: value.player_name,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRotationDocument {
    pub match_id: String,
    pub slot: u8,
    pub serve: u32,
    pub receive: u32,
}

impl From<MongoRotationDocument> for RotationTallyEntity {
    fn from(value: MongoRotationDocument) -> Self {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub created_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoPlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPlayerDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|source| MongoDaoError::InvalidPlayerId {
            id: value.id.clone(),
            source,
        })?;
        Ok(Self {
            id,
            name: value.name,
            created_at: value.created_at.to_system_time(),
        })
    }
}
