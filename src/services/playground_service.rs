use rand::Rng;
use tracing::info;

use crate::{
    dao::{
        facts::{FactHash, Playground},
        repository::Stored,
    },
    dto::{
        playground::{
            JoinResponse, LeaveResponse, PlaygroundDetail, PlaygroundMember, PlaygroundSummary,
        },
        validation::{PLAYGROUND_CODE_LEN, is_playground_code},
    },
    error::ServiceError,
    state::SharedState,
};

const MAX_CODE_ATTEMPTS: usize = 16;

/// Random code of six uppercase letters.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..PLAYGROUND_CODE_LEN)
        .map(|_| char::from(rng.random_range(b'A'..=b'Z')))
        .collect()
}

/// Open a playground with a fresh code and join its creator to it.
pub async fn create_playground(
    state: &SharedState,
    creator: &FactHash,
) -> Result<PlaygroundDetail, ServiceError> {
    let repository = state.repository();
    let mut code = None;
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = generate_code(&mut rand::rng());
        if repository
            .find_playground(state.tenant(), &candidate)
            .await?
            .is_none()
        {
            code = Some(candidate);
            break;
        }
    }
    let code = code.ok_or_else(|| {
        ServiceError::InvalidState("could not allocate a unique playground code".into())
    })?;

    let playground = repository.create_playground(state.tenant(), &code).await?;
    repository.join(creator, &playground.hash).await?;
    info!(code = %code, creator = %creator, "playground created");

    playground_detail(state, playground).await
}

pub async fn list_playgrounds(state: &SharedState) -> Result<Vec<PlaygroundSummary>, ServiceError> {
    Ok(state
        .repository()
        .playgrounds(state.tenant())
        .await?
        .into_iter()
        .map(PlaygroundSummary::from)
        .collect())
}

/// Look up a playground of the tenant by code.
pub async fn require_playground(
    state: &SharedState,
    code: &str,
) -> Result<Stored<Playground>, ServiceError> {
    if !is_playground_code(code) {
        return Err(ServiceError::InvalidInput(format!(
            "playground code `{code}` must be {PLAYGROUND_CODE_LEN} uppercase letters"
        )));
    }
    state
        .repository()
        .find_playground(state.tenant(), code)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("playground `{code}` not found")))
}

pub async fn get_playground(
    state: &SharedState,
    code: &str,
) -> Result<PlaygroundDetail, ServiceError> {
    let playground = require_playground(state, code).await?;
    playground_detail(state, playground).await
}

async fn playground_detail(
    state: &SharedState,
    playground: Stored<Playground>,
) -> Result<PlaygroundDetail, ServiceError> {
    let repository = state.repository();
    let mut players = Vec::new();
    for join in repository.active_joins(&playground.hash).await? {
        let name = repository
            .player_name(&join.fact.player)
            .await?
            .map(|name| name.fact.value);
        players.push(PlaygroundMember {
            player_id: join.fact.player,
            name,
            join_id: join.hash,
            joined_at: join.fact.joined_at,
        });
    }

    Ok(PlaygroundDetail {
        playground: playground.into(),
        players,
    })
}

/// Join a playground. Joining twice returns the existing membership.
pub async fn join(
    state: &SharedState,
    player: &FactHash,
    code: &str,
) -> Result<JoinResponse, ServiceError> {
    let playground = require_playground(state, code).await?;
    let repository = state.repository();

    let join_id = match repository.active_join_of(player, &playground.hash).await? {
        Some(existing) => existing.hash,
        None => {
            let join = repository.join(player, &playground.hash).await?;
            info!(%player, code, "player joined playground");
            join.hash
        }
    };

    Ok(JoinResponse {
        join_id,
        code: playground.fact.code,
    })
}

pub async fn leave(
    state: &SharedState,
    player: &FactHash,
    code: &str,
) -> Result<LeaveResponse, ServiceError> {
    let playground = require_playground(state, code).await?;
    let repository = state.repository();
    let join = repository
        .active_join_of(player, &playground.hash)
        .await?
        .ok_or_else(|| ServiceError::InvalidState(format!("not joined to playground `{code}`")))?;

    let leave_id = repository.leave(&join.hash).await?;
    info!(%player, code, "player left playground");
    Ok(LeaveResponse {
        leave_id,
        code: playground.fact.code,
    })
}
