use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::facts::FactHash,
    state::tic_tac_toe::{PlayerRole, TicTacToeState},
};

/// Challenge another player joined to the same playground.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChallengeRequest {
    pub opponent_player_id: FactHash,
    /// When true the challenger plays `X` and moves first.
    #[serde(default = "default_challenger_starts")]
    pub challenger_starts: bool,
}

fn default_challenger_starts() -> bool {
    true
}

/// Player reference with the current display name.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerRef {
    pub player_id: FactHash,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeSummary {
    pub id: FactHash,
    pub challenger: PlayerRef,
    pub opponent: PlayerRef,
    pub challenger_starts: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GameStarted {
    pub game_id: FactHash,
    pub challenge_id: FactHash,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeRejected {
    pub challenge_id: FactHash,
    pub reject_id: FactHash,
}

/// Game as seen by the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameView {
    pub game_id: FactHash,
    pub challenger: PlayerRef,
    pub opponent: PlayerRef,
    pub challenger_starts: bool,
    pub state: TicTacToeState,
    pub role: PlayerRole,
    pub is_your_turn: bool,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct MakeMoveRequest {
    /// Board cell, row major.
    #[validate(range(max = 8))]
    pub position: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MoveAccepted {
    pub move_id: FactHash,
    pub index: u32,
    pub state: TicTacToeState,
}
