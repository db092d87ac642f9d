use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle phases of a simulated player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedPlayerState {
    /// Not in any playground; eligible to join one.
    Idle,
    /// A join has been requested and is being written.
    Joining,
    /// Member of a playground.
    Playing,
    /// A leave has been requested and is being written.
    Leaving,
}

/// Events that move a simulated player between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Behaviour decided to join a playground.
    JoinStarted,
    /// The join fact was written.
    JoinSucceeded,
    /// Writing the join fact failed.
    JoinFailed,
    /// Behaviour decided to leave the current playground.
    LeaveStarted,
    /// The leave fact was written.
    LeaveSucceeded,
    /// Writing the leave fact failed; the player stays in the playground.
    LeaveFailed,
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the player was in when the invalid event was received.
    pub from: SimulatedPlayerState,
    /// The event that cannot be applied from this phase.
    pub event: PlayerEvent,
}

impl SimulatedPlayerState {
    /// Compute the phase reached by applying `event`, if the transition is valid.
    pub fn apply(self, event: PlayerEvent) -> Result<Self, InvalidTransition> {
        use PlayerEvent::*;
        use SimulatedPlayerState::*;

        let next = match (self, event) {
            (Idle, JoinStarted) => Joining,
            (Joining, JoinSucceeded) => Playing,
            (Joining, JoinFailed) => Idle,
            (Playing, LeaveStarted) => Leaving,
            (Leaving, LeaveSucceeded) => Idle,
            (Leaving, LeaveFailed) => Playing,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
