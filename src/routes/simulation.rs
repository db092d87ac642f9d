use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::simulation::SimulationStatus, services::simulation_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/simulation",
    tag = "simulation",
    responses((status = 200, description = "Simulation snapshot", body = SimulationStatus))
)]
/// Pool usage, simulated players and recent auto-join attempts.
pub async fn simulation_status(State(state): State<SharedState>) -> Json<SimulationStatus> {
    Json(simulation_service::status(&state).await)
}

pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/simulation", get(simulation_status))
}
