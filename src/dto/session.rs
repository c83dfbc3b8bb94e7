//! Payloads exchanged with the session coordinator endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::validation::validate_session_code;

/// Current shared session code.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ActiveSessionResponse {
    #[serde(alias = "match_id")]
    pub session_id: String,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AckResponse {
    pub success: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Supersede the session the caller is looking at with a fresh set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NextSetRequest {
    #[validate(custom(function = "validate_session_code"))]
    pub session_id: String,
}

/// Outcome of a next-set request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NextSetResponse {
    /// Code every client should switch to.
    pub session_id: String,
    /// False when another operator already started the next set.
    pub superseded: bool,
}
