use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::{
    facts::{FactHash, Playground},
    repository::Stored,
};

/// Playground as listed for a tenant.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlaygroundSummary {
    pub id: FactHash,
    pub code: String,
    pub created_at: String,
}

impl From<Stored<Playground>> for PlaygroundSummary {
    fn from(playground: Stored<Playground>) -> Self {
        Self {
            id: playground.hash,
            code: playground.fact.code,
            created_at: playground.fact.created_at,
        }
    }
}

/// A player currently joined to a playground.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlaygroundMember {
    pub player_id: FactHash,
    pub name: Option<String>,
    pub join_id: FactHash,
    pub joined_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaygroundDetail {
    #[serde(flatten)]
    pub playground: PlaygroundSummary,
    pub players: Vec<PlaygroundMember>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub join_id: FactHash,
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveResponse {
    pub leave_id: FactHash,
    pub code: String,
}
