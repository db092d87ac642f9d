use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::facts::FactHash,
    dto::game::{ChallengeRejected, GameStarted, GameView, MakeMoveRequest, MoveAccepted},
    error::AppError,
    routes::auth::{AuthenticatedPlayer, require_player},
    services::game_service,
    state::SharedState,
};

/// Challenge answers and game play. All require a player session.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/challenges/{id}/accept", post(accept_challenge))
        .route("/challenges/{id}/reject", post(reject_challenge))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/moves", post(make_move))
        .route_layer(middleware::from_fn_with_state(state, require_player))
}

#[utoipa::path(
    post,
    path = "/challenges/{id}/accept",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Challenge hash")),
    responses(
        (status = 200, description = "Game started", body = GameStarted),
        (status = 401, description = "Caller is not the challenged player"),
        (status = 409, description = "Challenge already answered")
    )
)]
pub async fn accept_challenge(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Path(id): Path<FactHash>,
) -> Result<Json<GameStarted>, AppError> {
    Ok(Json(game_service::accept(&state, &player, &id).await?))
}

#[utoipa::path(
    post,
    path = "/challenges/{id}/reject",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Challenge hash")),
    responses((status = 200, description = "Challenge rejected", body = ChallengeRejected))
)]
pub async fn reject_challenge(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Path(id): Path<FactHash>,
) -> Result<Json<ChallengeRejected>, AppError> {
    Ok(Json(game_service::reject(&state, &player, &id).await?))
}

/// Game state from the caller's point of view.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Game hash")),
    responses((status = 200, description = "Game view", body = GameView))
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Path(id): Path<FactHash>,
) -> Result<Json<GameView>, AppError> {
    Ok(Json(game_service::get_game(&state, &id, Some(&player)).await?))
}

/// Play a move. Refused moves answer `422` with the reason as message.
#[utoipa::path(
    post,
    path = "/games/{id}/moves",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Game hash")),
    request_body = MakeMoveRequest,
    responses(
        (status = 200, description = "Move recorded", body = MoveAccepted),
        (status = 422, description = "Move refused")
    )
)]
pub async fn make_move(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Path(id): Path<FactHash>,
    Valid(Json(payload)): Valid<Json<MakeMoveRequest>>,
) -> Result<Json<MoveAccepted>, AppError> {
    Ok(Json(
        game_service::make_move(&state, &player, &id, payload.position).await?,
    ))
}
