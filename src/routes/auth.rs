use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::{dao::facts::FactHash, error::AppError, services::identity_service, state::SharedState};

/// Player resolved from the bearer token, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedPlayer(pub FactHash);

/// Reject requests without a valid `Authorization: Bearer <token>` header.
pub async fn require_player(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.trim().to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing `Authorization: Bearer <token>` header".into())
        })?;

    let player = identity_service::resolve_token(&state, &token)?;
    req.extensions_mut().insert(AuthenticatedPlayer(player));
    Ok(next.run(req).await)
}
