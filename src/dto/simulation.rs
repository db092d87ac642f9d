use serde::Serialize;
use utoipa::ToSchema;

use crate::simulation::{
    coordinator::JoinAttempt, pool::PoolStats, simulated_player::SimulatedPlayerSnapshot,
};

/// Snapshot of the background player simulation.
#[derive(Debug, Serialize, ToSchema)]
pub struct SimulationStatus {
    pub enabled: bool,
    pub running: bool,
    pub pool: PoolStats,
    /// Playground codes currently receiving auto-joins.
    pub coordinating: Vec<String>,
    pub players: Vec<SimulatedPlayerSnapshot>,
    pub join_history: Vec<JoinAttempt>,
}
