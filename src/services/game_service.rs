use tracing::info;

use crate::{
    dao::{
        facts::{Challenge, FactHash, Game, Join, Move},
        repository::Stored,
    },
    dto::{
        game::{
            ChallengeRejected, ChallengeSummary, GameStarted, GameView, MoveAccepted, PlayerRef,
        },
        sse::GameStateEvent,
    },
    error::ServiceError,
    services::playground_service::require_playground,
    state::{
        SharedState,
        tic_tac_toe::{
            PlayerRole, compute_is_current_player_turn, compute_player_role,
            compute_tic_tac_toe_state, validate_move,
        },
    },
};

/// A game together with the two players it was started for.
struct GameContext {
    game: Stored<Game>,
    challenge: Stored<Challenge>,
    challenger: FactHash,
    opponent: FactHash,
}

impl GameContext {
    fn role_of(&self, player: Option<&FactHash>) -> PlayerRole {
        match player {
            Some(player) => compute_player_role(
                player,
                &self.challenger,
                &self.opponent,
                self.challenge.fact.challenger_starts,
            ),
            None => PlayerRole::Observer,
        }
    }
}

async fn require_join(state: &SharedState, join: &FactHash) -> Result<Stored<Join>, ServiceError> {
    state
        .repository()
        .load_join(join)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("join `{join}` not found")))
}

async fn require_challenge(
    state: &SharedState,
    challenge: &FactHash,
) -> Result<Stored<Challenge>, ServiceError> {
    state
        .repository()
        .load_challenge(challenge)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("challenge `{challenge}` not found")))
}

async fn load_context(state: &SharedState, game_id: &FactHash) -> Result<GameContext, ServiceError> {
    let game = state
        .repository()
        .load_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;
    let challenge = require_challenge(state, &game.fact.challenge).await?;
    let challenger = require_join(state, &challenge.fact.challenger_join).await?;
    let opponent = require_join(state, &challenge.fact.opponent_join).await?;

    Ok(GameContext {
        game,
        challenge,
        challenger: challenger.fact.player,
        opponent: opponent.fact.player,
    })
}

async fn player_ref(state: &SharedState, player: FactHash) -> Result<PlayerRef, ServiceError> {
    let name = state
        .repository()
        .player_name(&player)
        .await?
        .map(|name| name.fact.value);
    Ok(PlayerRef {
        player_id: player,
        name,
    })
}

async fn challenge_summary(
    state: &SharedState,
    challenge: Stored<Challenge>,
) -> Result<ChallengeSummary, ServiceError> {
    let challenger = require_join(state, &challenge.fact.challenger_join).await?;
    let opponent = require_join(state, &challenge.fact.opponent_join).await?;
    Ok(ChallengeSummary {
        id: challenge.hash,
        challenger: player_ref(state, challenger.fact.player).await?,
        opponent: player_ref(state, opponent.fact.player).await?,
        challenger_starts: challenge.fact.challenger_starts,
        created_at: challenge.fact.created_at,
    })
}

/// Challenge another member of the playground to a game.
pub async fn challenge(
    state: &SharedState,
    challenger: &FactHash,
    code: &str,
    opponent: &FactHash,
    challenger_starts: bool,
) -> Result<ChallengeSummary, ServiceError> {
    if challenger == opponent {
        return Err(ServiceError::InvalidInput(
            "a player cannot challenge themselves".into(),
        ));
    }
    let playground = require_playground(state, code).await?;
    let repository = state.repository();

    let challenger_join = repository
        .active_join_of(challenger, &playground.hash)
        .await?
        .ok_or_else(|| ServiceError::InvalidState(format!("not joined to playground `{code}`")))?;
    let opponent_join = repository
        .active_join_of(opponent, &playground.hash)
        .await?
        .ok_or_else(|| {
            ServiceError::InvalidState(format!("opponent is not joined to playground `{code}`"))
        })?;

    let created = repository
        .challenge(&challenger_join.hash, &opponent_join.hash, challenger_starts)
        .await?;
    info!(%challenger, %opponent, code, challenge = %created.hash, "challenge issued");
    challenge_summary(state, created).await
}

/// Unresolved challenges addressed to `player` in the playground.
pub async fn pending_challenges(
    state: &SharedState,
    player: &FactHash,
    code: &str,
) -> Result<Vec<ChallengeSummary>, ServiceError> {
    let playground = require_playground(state, code).await?;
    let repository = state.repository();
    let Some(join) = repository.active_join_of(player, &playground.hash).await? else {
        return Ok(Vec::new());
    };

    let mut summaries = Vec::new();
    for challenge in repository.pending_challenges_for(&join.hash).await? {
        summaries.push(challenge_summary(state, challenge).await?);
    }
    Ok(summaries)
}

/// Load a challenge that `player` may answer.
async fn answerable_challenge(
    state: &SharedState,
    player: &FactHash,
    challenge_id: &FactHash,
) -> Result<Stored<Challenge>, ServiceError> {
    let challenge = require_challenge(state, challenge_id).await?;
    let opponent = require_join(state, &challenge.fact.opponent_join).await?;
    if &opponent.fact.player != player {
        return Err(ServiceError::Unauthorized(
            "only the challenged player can answer a challenge".into(),
        ));
    }
    if state.repository().is_resolved(&challenge.hash).await? {
        return Err(ServiceError::InvalidState(format!(
            "challenge `{challenge_id}` was already answered"
        )));
    }
    Ok(challenge)
}

pub async fn accept(
    state: &SharedState,
    player: &FactHash,
    challenge_id: &FactHash,
) -> Result<GameStarted, ServiceError> {
    let game = state
        .run_answer(|| async {
            let challenge = answerable_challenge(state, player, challenge_id).await?;
            Ok(state.repository().start_game(&challenge.hash).await?)
        })
        .await?;
    info!(%player, challenge = %challenge_id, game = %game.hash, "challenge accepted");
    Ok(GameStarted {
        game_id: game.hash,
        challenge_id: challenge_id.clone(),
    })
}

pub async fn reject(
    state: &SharedState,
    player: &FactHash,
    challenge_id: &FactHash,
) -> Result<ChallengeRejected, ServiceError> {
    let reject_id = state
        .run_answer(|| async {
            let challenge = answerable_challenge(state, player, challenge_id).await?;
            Ok(state.repository().reject(&challenge.hash).await?)
        })
        .await?;
    info!(%player, challenge = %challenge_id, "challenge rejected");
    Ok(ChallengeRejected {
        challenge_id: challenge_id.clone(),
        reject_id,
    })
}

/// Game state as seen by `viewer` (an observer when `None` or not a participant).
pub async fn get_game(
    state: &SharedState,
    game_id: &FactHash,
    viewer: Option<&FactHash>,
) -> Result<GameView, ServiceError> {
    let context = load_context(state, game_id).await?;
    let moves = state.repository().moves(&context.game.hash).await?;
    let board = compute_tic_tac_toe_state(&moves);
    let role = context.role_of(viewer);

    Ok(GameView {
        game_id: context.game.hash.clone(),
        is_your_turn: compute_is_current_player_turn(&board, role),
        challenger: player_ref(state, context.challenger.clone()).await?,
        opponent: player_ref(state, context.opponent.clone()).await?,
        challenger_starts: context.challenge.fact.challenger_starts,
        state: board,
        role,
    })
}

/// Validate and record a move by `player`.
///
/// Moves are serialised through the state's move gate so the index of the new move is
/// always the number of moves recorded before it. Only reading and validating is bounded
/// by the move timeout; once the move is written it is reported as accepted.
pub async fn make_move(
    state: &SharedState,
    player: &FactHash,
    game_id: &FactHash,
    position: u32,
) -> Result<MoveAccepted, ServiceError> {
    let context = load_context(state, game_id).await?;
    let role = context.role_of(Some(player));
    let repository = state.repository();
    let game = &context.game.hash;

    state
        .run_move(move || async move {
            let (mut moves, index) = state
                .bounded(async {
                    let moves = repository.moves(game).await?;
                    let board = compute_tic_tac_toe_state(&moves);
                    validate_move(&board, role, position)?;
                    let index = u32::try_from(moves.len())
                        .map_err(|_| ServiceError::InvalidState("move log is full".into()))?;
                    Ok((moves, index))
                })
                .await?;
            let move_id = repository.play_move(game, index, position).await?;
            info!(%player, %game, index, position, "move played");

            moves.push(Move {
                game: game.clone(),
                index,
                position,
            });
            Ok(MoveAccepted {
                move_id,
                index,
                state: compute_tic_tac_toe_state(&moves),
            })
        })
        .await
}

/// Current board of a game, for the event stream.
pub async fn game_state_event(
    state: &SharedState,
    game_id: &FactHash,
) -> Result<GameStateEvent, ServiceError> {
    let moves = state.repository().moves(game_id).await?;
    Ok(GameStateEvent {
        game_id: game_id.clone(),
        moves: moves.len(),
        state: compute_tic_tac_toe_state(&moves),
    })
}

/// Fail with `NotFound` unless the game exists.
pub async fn ensure_game(state: &SharedState, game_id: &FactHash) -> Result<(), ServiceError> {
    state
        .repository()
        .load_game(game_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            fact_store::{FactQuery, FactStore, FactSubscription, MemoryFactStore},
            facts::{Fact, FactRecord},
            storage::StorageResult,
        },
        services::playground_service::{create_playground, join},
        state::{
            test_state,
            AppState,
            tic_tac_toe::{Mark, MoveError, Winner},
        },
    };

    /// Memory store that suspends before every read and write, like a remote replicator.
    struct YieldingStore(MemoryFactStore);

    impl FactStore for YieldingStore {
        fn fact(&self, fact: Fact) -> BoxFuture<'static, StorageResult<FactRecord>> {
            let inner = self.0.fact(fact);
            Box::pin(async move {
                tokio::task::yield_now().await;
                inner.await
            })
        }

        fn load(&self, hash: FactHash) -> BoxFuture<'static, StorageResult<Option<FactRecord>>> {
            let inner = self.0.load(hash);
            Box::pin(async move {
                tokio::task::yield_now().await;
                inner.await
            })
        }

        fn query(&self, query: FactQuery) -> BoxFuture<'static, StorageResult<Vec<FactRecord>>> {
            let inner = self.0.query(query);
            Box::pin(async move {
                tokio::task::yield_now().await;
                inner.await
            })
        }

        fn watch(&self, query: FactQuery) -> FactSubscription {
            self.0.watch(query)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.0.health_check()
        }
    }

    struct Table {
        state: SharedState,
        alice: FactHash,
        bob: FactHash,
        code: String,
    }

    async fn table() -> Table {
        table_on(test_state().await).await
    }

    async fn table_on(state: SharedState) -> Table {
        let repository = state.repository();
        let alice = repository.create_player(state.tenant(), "alice").await.unwrap();
        let bob = repository.create_player(state.tenant(), "bob").await.unwrap();
        let code = create_playground(&state, &alice)
            .await
            .unwrap()
            .playground
            .code;
        join(&state, &bob, &code).await.unwrap();
        Table {
            state,
            alice,
            bob,
            code,
        }
    }

    async fn started_game(table: &Table, challenger_starts: bool) -> FactHash {
        let summary = challenge(
            &table.state,
            &table.alice,
            &table.code,
            &table.bob,
            challenger_starts,
        )
        .await
        .unwrap();
        accept(&table.state, &table.bob, &summary.id)
            .await
            .unwrap()
            .game_id
    }

    #[tokio::test]
    async fn challenge_is_pending_until_answered() {
        let table = table().await;
        let summary = challenge(&table.state, &table.alice, &table.code, &table.bob, true)
            .await
            .unwrap();

        let pending = pending_challenges(&table.state, &table.bob, &table.code)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, summary.id);
        assert!(
            pending_challenges(&table.state, &table.alice, &table.code)
                .await
                .unwrap()
                .is_empty()
        );

        assert!(matches!(
            accept(&table.state, &table.alice, &summary.id).await,
            Err(ServiceError::Unauthorized(_))
        ));
        reject(&table.state, &table.bob, &summary.id).await.unwrap();
        assert!(matches!(
            accept(&table.state, &table.bob, &summary.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn players_cannot_challenge_themselves_or_outsiders() {
        let table = table().await;
        assert!(matches!(
            challenge(&table.state, &table.alice, &table.code, &table.alice, true).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let carol = table
            .state
            .repository()
            .create_player(table.state.tenant(), "carol")
            .await
            .unwrap();
        assert!(matches!(
            challenge(&table.state, &table.alice, &table.code, &carol, true).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn roles_follow_who_starts() {
        let table = table().await;
        let game = started_game(&table, false).await;

        let alice_view = get_game(&table.state, &game, Some(&table.alice)).await.unwrap();
        assert_eq!(alice_view.role, PlayerRole::O);
        assert!(!alice_view.is_your_turn);

        let bob_view = get_game(&table.state, &game, Some(&table.bob)).await.unwrap();
        assert_eq!(bob_view.role, PlayerRole::X);
        assert!(bob_view.is_your_turn);

        let observer = get_game(&table.state, &game, None).await.unwrap();
        assert_eq!(observer.role, PlayerRole::Observer);
        assert!(!observer.is_your_turn);
    }

    #[tokio::test]
    async fn moves_are_validated_and_indexed() {
        let table = table().await;
        let game = started_game(&table, true).await;
        let state = &table.state;

        let first = make_move(state, &table.alice, &game, 0).await.unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.state.board[0], Some(Mark::X));

        assert!(matches!(
            make_move(state, &table.alice, &game, 1).await,
            Err(ServiceError::Move(MoveError::NotYourTurn))
        ));
        assert!(matches!(
            make_move(state, &table.bob, &game, 0).await,
            Err(ServiceError::Move(MoveError::PositionOccupied))
        ));

        let second = make_move(state, &table.bob, &game, 4).await.unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.state.current_player, Mark::X);
    }

    #[tokio::test]
    async fn finished_games_refuse_moves() {
        let table = table().await;
        let game = started_game(&table, true).await;
        let state = &table.state;

        for (player, position) in [
            (&table.alice, 0),
            (&table.bob, 3),
            (&table.alice, 1),
            (&table.bob, 4),
            (&table.alice, 2),
        ] {
            make_move(state, player, &game, position).await.unwrap();
        }

        let view = get_game(state, &game, None).await.unwrap();
        assert_eq!(view.state.winner, Some(Winner::X));
        assert!(matches!(
            make_move(state, &table.bob, &game, 8).await,
            Err(ServiceError::Move(MoveError::GameOver))
        ));
    }

    #[tokio::test]
    async fn concurrent_moves_never_share_an_index() {
        let table = table().await;
        let game = started_game(&table, true).await;
        let state = &table.state;

        let (a, b) = tokio::join!(
            make_move(state, &table.alice, &game, 0),
            make_move(state, &table.alice, &game, 1),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(state.repository().moves(&game).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_answers_resolve_a_challenge_once() {
        let state = AppState::bootstrap(
            Arc::new(YieldingStore(MemoryFactStore::new())),
            "tenant-key",
            AppConfig::default(),
        )
        .await
        .unwrap();
        let table = table_on(state).await;
        let state = &table.state;
        let summary = challenge(state, &table.alice, &table.code, &table.bob, true)
            .await
            .unwrap();

        let (accepted, rejected) = tokio::join!(
            accept(state, &table.bob, &summary.id),
            reject(state, &table.bob, &summary.id),
        );
        assert!(accepted.is_ok() != rejected.is_ok());

        let (first, second) = tokio::join!(
            accept(state, &table.bob, &summary.id),
            accept(state, &table.bob, &summary.id),
        );
        assert!(matches!(first, Err(ServiceError::InvalidState(_))));
        assert!(matches!(second, Err(ServiceError::InvalidState(_))));

        let games = state.repository().games_of(&summary.id).await.unwrap();
        assert_eq!(games.len(), usize::from(accepted.is_ok()));
    }

    #[tokio::test]
    async fn concurrent_accepts_start_one_game() {
        let state = AppState::bootstrap(
            Arc::new(YieldingStore(MemoryFactStore::new())),
            "tenant-key",
            AppConfig::default(),
        )
        .await
        .unwrap();
        let table = table_on(state).await;
        let state = &table.state;
        let summary = challenge(state, &table.alice, &table.code, &table.bob, true)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            accept(state, &table.bob, &summary.id),
            accept(state, &table.bob, &summary.id),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(state.repository().games_of(&summary.id).await.unwrap().len(), 1);
    }
}
