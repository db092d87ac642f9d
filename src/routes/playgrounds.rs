use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};

use crate::{
    dto::{
        game::{ChallengeSummary, CreateChallengeRequest},
        playground::{JoinResponse, LeaveResponse, PlaygroundDetail, PlaygroundSummary},
    },
    error::AppError,
    routes::auth::{AuthenticatedPlayer, require_player},
    services::{game_service, playground_service},
    state::SharedState,
};

/// Playground lifecycle, membership and challenge routes. All require a player session.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/playgrounds", get(list_playgrounds).post(create_playground))
        .route("/playgrounds/{code}", get(get_playground))
        .route("/playgrounds/{code}/join", post(join_playground))
        .route("/playgrounds/{code}/leave", post(leave_playground))
        .route(
            "/playgrounds/{code}/challenges",
            get(list_challenges).post(create_challenge),
        )
        .route_layer(middleware::from_fn_with_state(state, require_player))
}

/// Open a playground with a fresh code; the caller joins it.
#[utoipa::path(
    post,
    path = "/playgrounds",
    tag = "playgrounds",
    security(("bearer" = [])),
    responses((status = 200, description = "Playground created", body = PlaygroundDetail))
)]
pub async fn create_playground(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
) -> Result<Json<PlaygroundDetail>, AppError> {
    Ok(Json(
        playground_service::create_playground(&state, &player).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/playgrounds",
    tag = "playgrounds",
    security(("bearer" = [])),
    responses((status = 200, description = "Playgrounds of the tenant", body = [PlaygroundSummary]))
)]
pub async fn list_playgrounds(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PlaygroundSummary>>, AppError> {
    Ok(Json(playground_service::list_playgrounds(&state).await?))
}

#[utoipa::path(
    get,
    path = "/playgrounds/{code}",
    tag = "playgrounds",
    security(("bearer" = [])),
    params(("code" = String, Path, description = "Six letter playground code")),
    responses(
        (status = 200, description = "Playground with its active players", body = PlaygroundDetail),
        (status = 404, description = "Unknown code")
    )
)]
pub async fn get_playground(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<PlaygroundDetail>, AppError> {
    Ok(Json(playground_service::get_playground(&state, &code).await?))
}

#[utoipa::path(
    post,
    path = "/playgrounds/{code}/join",
    tag = "playgrounds",
    security(("bearer" = [])),
    params(("code" = String, Path, description = "Six letter playground code")),
    responses((status = 200, description = "Joined (or already joined)", body = JoinResponse))
)]
pub async fn join_playground(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Path(code): Path<String>,
) -> Result<Json<JoinResponse>, AppError> {
    Ok(Json(playground_service::join(&state, &player, &code).await?))
}

#[utoipa::path(
    post,
    path = "/playgrounds/{code}/leave",
    tag = "playgrounds",
    security(("bearer" = [])),
    params(("code" = String, Path, description = "Six letter playground code")),
    responses(
        (status = 200, description = "Left the playground", body = LeaveResponse),
        (status = 409, description = "Caller is not joined")
    )
)]
pub async fn leave_playground(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Path(code): Path<String>,
) -> Result<Json<LeaveResponse>, AppError> {
    Ok(Json(playground_service::leave(&state, &player, &code).await?))
}

/// Challenge another member of the playground.
#[utoipa::path(
    post,
    path = "/playgrounds/{code}/challenges",
    tag = "games",
    security(("bearer" = [])),
    params(("code" = String, Path, description = "Six letter playground code")),
    request_body = CreateChallengeRequest,
    responses((status = 200, description = "Challenge issued", body = ChallengeSummary))
)]
pub async fn create_challenge(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Path(code): Path<String>,
    Json(payload): Json<CreateChallengeRequest>,
) -> Result<Json<ChallengeSummary>, AppError> {
    Ok(Json(
        game_service::challenge(
            &state,
            &player,
            &code,
            &payload.opponent_player_id,
            payload.challenger_starts,
        )
        .await?,
    ))
}

/// Challenges addressed to the caller that are still unanswered.
#[utoipa::path(
    get,
    path = "/playgrounds/{code}/challenges",
    tag = "games",
    security(("bearer" = [])),
    params(("code" = String, Path, description = "Six letter playground code")),
    responses((status = 200, description = "Pending challenges", body = [ChallengeSummary]))
)]
pub async fn list_challenges(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Path(code): Path<String>,
) -> Result<Json<Vec<ChallengeSummary>>, AppError> {
    Ok(Json(
        game_service::pending_challenges(&state, &player, &code).await?,
    ))
}
