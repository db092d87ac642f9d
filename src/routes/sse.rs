use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dao::facts::FactHash, error::AppError, services::sse_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/games/{id}",
    tag = "sse",
    params(("id" = String, Path, description = "Game hash")),
    responses(
        (status = 200, description = "Game state stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown game")
    )
)]
/// Stream the board of a game to observers and players alike.
pub async fn game_stream(
    State(state): State<SharedState>,
    Path(id): Path<FactHash>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    info!(game = %id, "New game SSE connection");
    Ok(sse_service::game_stream(state, id).await?)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/games/{id}", get(game_stream))
}
