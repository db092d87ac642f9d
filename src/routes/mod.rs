use axum::Router;

use crate::state::SharedState;

pub mod auth;
pub mod docs;
pub mod games;
pub mod health;
pub mod identity;
pub mod playgrounds;
pub mod simulation;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(identity::router(state.clone()))
        .merge(playgrounds::router(state.clone()))
        .merge(games::router(state.clone()))
        .merge(sse::router())
        .merge(simulation::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
