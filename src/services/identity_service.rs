use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::facts::FactHash,
    dto::identity::{AuthenticateResponse, PlayerProfile},
    error::ServiceError,
    state::{Session, SharedState},
};

const GAP_KEY_PREFIX: &str = "gap:";

/// Resolve the player behind an external identity and open a session for it.
///
/// The same `gap_id` always maps to the same player. A gaming name is assigned the first
/// time the player is seen.
pub async fn authenticate(
    state: &SharedState,
    gap_id: &str,
) -> Result<AuthenticateResponse, ServiceError> {
    let repository = state.repository();
    let public_key = format!("{GAP_KEY_PREFIX}{gap_id}");
    let player = repository
        .create_player(state.tenant(), &public_key)
        .await?;

    let name = match repository.player_name(&player).await? {
        Some(current) => current.fact.value,
        None => {
            let generated = state.names().lock().await.generate_gaming_name();
            repository.set_player_name(&player, &generated).await?;
            info!(%player, name = %generated, "assigned name to new player");
            generated
        }
    };

    let ttl = state.session_ttl();
    let before = state.sessions().len();
    state
        .sessions()
        .retain(|_, session| session.issued_at.elapsed() < ttl);
    let swept = before.saturating_sub(state.sessions().len());
    if swept > 0 {
        debug!(swept, "expired sessions removed");
    }

    let token = Uuid::new_v4().simple().to_string();
    state.sessions().insert(
        token.clone(),
        Session {
            player: player.clone(),
            issued_at: Instant::now(),
        },
    );

    Ok(AuthenticateResponse {
        player_id: player,
        name,
        token,
    })
}

/// Player owning a live bearer token. Expired tokens are dropped on sight.
pub fn resolve_token(state: &SharedState, token: &str) -> Result<FactHash, ServiceError> {
    let session = state
        .sessions()
        .get(token)
        .map(|entry| entry.value().clone());
    match session {
        Some(session) if session.issued_at.elapsed() < state.session_ttl() => Ok(session.player),
        Some(_) => {
            state.sessions().remove(token);
            Err(ServiceError::Unauthorized("token expired".into()))
        }
        None => Err(ServiceError::Unauthorized("unknown token".into())),
    }
}

pub async fn current_player(
    state: &SharedState,
    player: &FactHash,
) -> Result<PlayerProfile, ServiceError> {
    let repository = state.repository();
    let stored = repository
        .load_player(player)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player}` not found")))?;
    let name = repository
        .player_name(player)
        .await?
        .map(|name| name.fact.value);

    Ok(PlayerProfile {
        player_id: stored.hash,
        public_key: stored.fact.public_key,
        name,
    })
}

/// Record a new display name superseding the current one.
pub async fn rename(
    state: &SharedState,
    player: &FactHash,
    name: &str,
) -> Result<PlayerProfile, ServiceError> {
    let name = name.trim();
    state.repository().set_player_name(player, name).await?;
    info!(%player, name, "player renamed");
    current_player(state, player).await
}
