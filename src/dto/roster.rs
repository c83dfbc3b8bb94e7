use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerEntity,
    dto::{format_system_time, parse_system_time, validation::validate_not_blank},
};

/// Roster player as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerRecord {
    pub id: Uuid,
    pub name: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<PlayerEntity> for PlayerRecord {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: format_system_time(value.created_at),
        }
    }
}

impl TryFrom<PlayerRecord> for PlayerEntity {
    type Error = time::error::Parse;

    fn try_from(value: PlayerRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            name: value.name,
            created_at: parse_system_time(&value.created_at)?,
        })
    }
}

/// Body of `POST /api/our-players`. The id is generated when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreatePlayerRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
}

/// Body of `PUT /api/our-players/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RenamePlayerRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
}
