use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::facts::FactHash;
use crate::dto::validation::{validate_gap_id, validate_player_name};

/// Exchange an external identity for a player and a bearer token.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AuthenticateRequest {
    #[validate(custom(function = "validate_gap_id"))]
    pub gap_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthenticateResponse {
    pub player_id: FactHash,
    pub name: String,
    /// Send as `Authorization: Bearer <token>` on player routes.
    pub token: String,
}

/// The authenticated player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerProfile {
    pub player_id: FactHash,
    pub public_key: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RenamePlayerRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}
