use axum::{
    Extension, Json, Router,
    extract::State,
    middleware,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::identity::{AuthenticateRequest, AuthenticateResponse, PlayerProfile, RenamePlayerRequest},
    error::AppError,
    routes::auth::{AuthenticatedPlayer, require_player},
    services::identity_service,
    state::SharedState,
};

/// `/authenticate` plus the bearer-protected `/players/me` routes.
pub fn router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/players/me", get(me))
        .route("/players/me/name", put(rename))
        .route_layer(middleware::from_fn_with_state(state, require_player));

    Router::new()
        .route("/authenticate", post(authenticate))
        .merge(protected)
}

/// Exchange an external identity for a player session.
#[utoipa::path(
    post,
    path = "/authenticate",
    tag = "identity",
    request_body = AuthenticateRequest,
    responses(
        (status = 200, description = "Session opened", body = AuthenticateResponse),
        (status = 400, description = "Malformed gap_id")
    )
)]
pub async fn authenticate(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AuthenticateRequest>>,
) -> Result<Json<AuthenticateResponse>, AppError> {
    Ok(Json(
        identity_service::authenticate(&state, &payload.gap_id).await?,
    ))
}

/// Profile of the authenticated player.
#[utoipa::path(
    get,
    path = "/players/me",
    tag = "identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current player", body = PlayerProfile),
        (status = 401, description = "Missing or unknown token")
    )
)]
pub async fn me(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
) -> Result<Json<PlayerProfile>, AppError> {
    Ok(Json(identity_service::current_player(&state, &player).await?))
}

/// Change the display name of the authenticated player.
#[utoipa::path(
    put,
    path = "/players/me/name",
    tag = "identity",
    security(("bearer" = [])),
    request_body = RenamePlayerRequest,
    responses((status = 200, description = "Renamed", body = PlayerProfile))
)]
pub async fn rename(
    State(state): State<SharedState>,
    Extension(AuthenticatedPlayer(player)): Extension<AuthenticatedPlayer>,
    Valid(Json(payload)): Valid<Json<RenamePlayerRequest>>,
) -> Result<Json<PlayerProfile>, AppError> {
    Ok(Json(
        identity_service::rename(&state, &player, &payload.name).await?,
    ))
}
