use serde::Serialize;
use utoipa::ToSchema;

use crate::{dao::facts::FactHash, state::tic_tac_toe::TicTacToeState};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Pushed on connect and after every move of the watched game.
pub struct GameStateEvent {
    pub game_id: FactHash,
    pub moves: usize,
    pub state: TicTacToeState,
}
