//! Tick driven simulated players that wander between playgrounds.
//!
//! Every tick each player is shown the current playgrounds and asked, through its
//! [`PlayerBehavior`], what to do next. The outcome of the chosen action is fed through
//! the [`SimulatedPlayerState`] transitions so a player is never in two playgrounds at
//! once.

use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::{
        facts::{FactHash, Playground},
        repository::{FleetRepository, Stored},
        storage::StorageError,
    },
    simulation::names::NameGenerator,
    state::player_state::{InvalidTransition, PlayerEvent, SimulatedPlayerState},
};

/// A synthetic player driven by the tick loop.
#[derive(Debug, Clone)]
pub struct SimulatedPlayer {
    pub id: Uuid,
    pub player: FactHash,
    pub name: String,
    pub state: SimulatedPlayerState,
    pub current_playground: Option<Stored<Playground>>,
    pub current_join: Option<FactHash>,
    pub join_attempts: u32,
    pub created_at: Instant,
    pub last_action_at: Instant,
    pub joined_at: Option<Instant>,
}

/// Serializable view of a [`SimulatedPlayer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SimulatedPlayerSnapshot {
    pub id: Uuid,
    pub player: FactHash,
    pub name: String,
    pub state: SimulatedPlayerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playground: Option<String>,
    pub join_attempts: u32,
}

impl From<&SimulatedPlayer> for SimulatedPlayerSnapshot {
    fn from(player: &SimulatedPlayer) -> Self {
        Self {
            id: player.id,
            player: player.player.clone(),
            name: player.name.clone(),
            state: player.state,
            playground: player
                .current_playground
                .as_ref()
                .map(|playground| playground.fact.code.clone()),
            join_attempts: player.join_attempts,
        }
    }
}

/// What a behavior sees when deciding.
#[derive(Debug, Clone)]
pub struct BehaviorContext {
    pub available_playgrounds: Vec<Stored<Playground>>,
    pub tenant: FactHash,
    pub now: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehaviorAction {
    Wait,
    /// Join the playground with this hash.
    Join(FactHash),
    /// Leave the current playground.
    Leave,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("behavior failed: {0}")]
pub struct BehaviorError(pub String);

/// Decision policy of simulated players.
pub trait PlayerBehavior: Send + Sync {
    fn decide(
        &self,
        player: &SimulatedPlayer,
        context: &BehaviorContext,
    ) -> Result<BehaviorAction, BehaviorError>;
}

/// Joins a random playground when idle and leaves after `max_play_time`.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBehavior {
    pub max_play_time: Duration,
}

impl PlayerBehavior for DefaultBehavior {
    fn decide(
        &self,
        player: &SimulatedPlayer,
        context: &BehaviorContext,
    ) -> Result<BehaviorAction, BehaviorError> {
        match player.state {
            SimulatedPlayerState::Idle => Ok(context
                .available_playgrounds
                .choose(&mut rand::rng())
                .map(|playground| BehaviorAction::Join(playground.hash.clone()))
                .unwrap_or(BehaviorAction::Wait)),
            SimulatedPlayerState::Playing => {
                let played = player
                    .joined_at
                    .map(|joined| context.now.saturating_duration_since(joined))
                    .unwrap_or_default();
                if played >= self.max_play_time {
                    Ok(BehaviorAction::Leave)
                } else {
                    Ok(BehaviorAction::Wait)
                }
            }
            SimulatedPlayerState::Joining | SimulatedPlayerState::Leaving => {
                Ok(BehaviorAction::Wait)
            }
        }
    }
}

/// Failure while advancing a single simulated player.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Behavior(#[from] BehaviorError),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("playground `{0}` is not available")]
    UnknownPlayground(FactHash),
    #[error("player is not in a playground")]
    NotJoined,
}

struct Runner {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the simulated players and the tick loop advancing them.
pub struct SimulatedPlayerService {
    repository: FleetRepository,
    tenant: FactHash,
    behavior: Arc<dyn PlayerBehavior>,
    tick_interval: Duration,
    players: RwLock<IndexMap<Uuid, SimulatedPlayer>>,
    names: Mutex<NameGenerator>,
    runner: Mutex<Option<Runner>>,
}

impl SimulatedPlayerService {
    pub fn new(
        repository: FleetRepository,
        tenant: FactHash,
        behavior: Arc<dyn PlayerBehavior>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            repository,
            tenant,
            behavior,
            tick_interval,
            players: RwLock::new(IndexMap::new()),
            names: Mutex::new(NameGenerator::default()),
            runner: Mutex::new(None),
        }
    }

    /// Create `count` players with generated gaming names.
    pub async fn add_players(&self, count: usize) -> Result<Vec<Uuid>, StorageError> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let name = self.names.lock().await.generate_gaming_name();
            ids.push(self.add_named_player(&name).await?);
        }
        Ok(ids)
    }

    /// Create one player with a fixed name.
    pub async fn add_named_player(&self, name: &str) -> Result<Uuid, StorageError> {
        let id = Uuid::new_v4();
        let player = self
            .repository
            .create_player(&self.tenant, &format!("simulated:{}", id.simple()))
            .await?;
        self.repository.set_player_name(&player, name).await?;

        let now = Instant::now();
        self.players.write().await.insert(
            id,
            SimulatedPlayer {
                id,
                player,
                name: name.to_owned(),
                state: SimulatedPlayerState::Idle,
                current_playground: None,
                current_join: None,
                join_attempts: 0,
                created_at: now,
                last_action_at: now,
                joined_at: None,
            },
        );
        debug!(%id, name, "simulated player added");
        Ok(id)
    }

    /// Spawn the tick loop. Returns `false` when it is already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut runner = self.runner.lock().await;
        if runner.as_ref().is_some_and(|runner| !runner.task.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let service = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(service.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => service.tick().await,
                }
            }
        });

        *runner = Some(Runner { cancel, task });
        info!(interval_ms = self.tick_interval.as_millis() as u64, "simulated players started");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.runner
            .lock()
            .await
            .as_ref()
            .is_some_and(|runner| !runner.task.is_finished())
    }

    /// Advance every player by one step. A failing player is logged and skipped.
    pub async fn tick(&self) {
        let available_playgrounds = match self.repository.playgrounds(&self.tenant).await {
            Ok(playgrounds) => playgrounds,
            Err(err) => {
                warn!(error = %err, "could not list playgrounds; skipping tick");
                return;
            }
        };
        let context = BehaviorContext {
            available_playgrounds,
            tenant: self.tenant.clone(),
            now: Instant::now(),
        };

        let ids: Vec<Uuid> = self.players.read().await.keys().copied().collect();
        for id in ids {
            let Some(mut player) = self.players.read().await.get(&id).cloned() else {
                continue;
            };
            if let Err(err) = self.advance(&mut player, &context).await {
                warn!(%id, name = %player.name, error = %err, "simulated player step failed");
            }
            if let Some(slot) = self.players.write().await.get_mut(&id) {
                *slot = player;
            }
        }
    }

    async fn advance(
        &self,
        player: &mut SimulatedPlayer,
        context: &BehaviorContext,
    ) -> Result<(), SimulationError> {
        match self.behavior.decide(player, context)? {
            BehaviorAction::Wait => Ok(()),
            BehaviorAction::Join(target) => self.join(player, context, target).await,
            BehaviorAction::Leave => self.leave(player).await,
        }
    }

    async fn join(
        &self,
        player: &mut SimulatedPlayer,
        context: &BehaviorContext,
        target: FactHash,
    ) -> Result<(), SimulationError> {
        let playground = context
            .available_playgrounds
            .iter()
            .find(|playground| playground.hash == target)
            .cloned()
            .ok_or_else(|| SimulationError::UnknownPlayground(target.clone()))?;

        player.state = player.state.apply(PlayerEvent::JoinStarted)?;
        player.join_attempts += 1;
        player.last_action_at = Instant::now();

        match self.repository.join(&player.player, &playground.hash).await {
            Ok(join) => {
                player.state = player.state.apply(PlayerEvent::JoinSucceeded)?;
                player.current_join = Some(join.hash);
                player.joined_at = Some(Instant::now());
                info!(name = %player.name, code = %playground.fact.code, "simulated player joined");
                player.current_playground = Some(playground);
                Ok(())
            }
            Err(err) => {
                player.state = player.state.apply(PlayerEvent::JoinFailed)?;
                Err(err.into())
            }
        }
    }

    async fn leave(&self, player: &mut SimulatedPlayer) -> Result<(), SimulationError> {
        let join = player.current_join.clone().ok_or(SimulationError::NotJoined)?;
        player.state = player.state.apply(PlayerEvent::LeaveStarted)?;
        player.last_action_at = Instant::now();

        match self.repository.leave(&join).await {
            Ok(_) => {
                player.state = player.state.apply(PlayerEvent::LeaveSucceeded)?;
                if let Some(playground) = player.current_playground.take() {
                    info!(name = %player.name, code = %playground.fact.code, "simulated player left");
                }
                player.current_join = None;
                player.joined_at = None;
                Ok(())
            }
            Err(err) => {
                player.state = player.state.apply(PlayerEvent::LeaveFailed)?;
                Err(err.into())
            }
        }
    }

    /// Stop the tick loop, leave every playground on a best-effort basis and drop all players.
    pub async fn stop(&self) {
        if let Some(runner) = self.runner.lock().await.take() {
            runner.cancel.cancel();
            if let Err(err) = runner.task.await {
                warn!(error = %err, "simulated player loop ended abnormally");
            }
        }

        let players: Vec<SimulatedPlayer> = self
            .players
            .write()
            .await
            .drain(..)
            .map(|(_, player)| player)
            .collect();
        for player in players {
            let Some(join) = &player.current_join else {
                continue;
            };
            if let Err(err) = self.repository.leave(join).await {
                warn!(name = %player.name, error = %err, "could not leave playground on shutdown");
            }
        }
        info!("simulated players stopped");
    }

    pub async fn players(&self) -> Vec<SimulatedPlayerSnapshot> {
        self.players
            .read()
            .await
            .values()
            .map(SimulatedPlayerSnapshot::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{advance, sleep};

    use super::*;
    use crate::dao::{
        fact_store::{FactStore, MemoryFactStore},
        facts::{Fact, Tenant},
    };

    async fn fixture(
        behavior: Arc<dyn PlayerBehavior>,
    ) -> (Arc<SimulatedPlayerService>, FleetRepository, FactHash) {
        let store = Arc::new(MemoryFactStore::new());
        let tenant = store
            .fact(Fact::Tenant(Tenant {
                public_key: "tenant".into(),
            }))
            .await
            .unwrap()
            .hash;
        let repository = FleetRepository::new(store);
        let service = Arc::new(SimulatedPlayerService::new(
            repository.clone(),
            tenant.clone(),
            behavior,
            Duration::from_secs(1),
        ));
        (service, repository, tenant)
    }

    fn default_behavior() -> Arc<dyn PlayerBehavior> {
        Arc::new(DefaultBehavior {
            max_play_time: Duration::from_secs(5),
        })
    }

    /// Fails for one named player, defers to the default behavior otherwise.
    struct FailFor(&'static str);

    impl PlayerBehavior for FailFor {
        fn decide(
            &self,
            player: &SimulatedPlayer,
            context: &BehaviorContext,
        ) -> Result<BehaviorAction, BehaviorError> {
            if player.name == self.0 {
                return Err(BehaviorError("boom".into()));
            }
            DefaultBehavior {
                max_play_time: Duration::from_secs(5),
            }
            .decide(player, context)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn players_join_then_leave_after_max_play_time() {
        let (service, repository, tenant) = fixture(default_behavior()).await;
        let playground = repository.create_playground(&tenant, "ABCDEF").await.unwrap();
        service.add_players(2).await.unwrap();

        service.tick().await;
        let players = service.players().await;
        assert!(
            players
                .iter()
                .all(|p| p.state == SimulatedPlayerState::Playing
                    && p.playground.as_deref() == Some("ABCDEF"))
        );
        assert_eq!(repository.active_joins(&playground.hash).await.unwrap().len(), 2);

        advance(Duration::from_secs(3)).await;
        service.tick().await;
        assert_eq!(repository.active_joins(&playground.hash).await.unwrap().len(), 2);

        advance(Duration::from_secs(3)).await;
        service.tick().await;
        assert!(
            service
                .players()
                .await
                .iter()
                .all(|p| p.state == SimulatedPlayerState::Idle && p.playground.is_none())
        );
        assert!(repository.active_joins(&playground.hash).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_players_wait_without_playgrounds() {
        let (service, _, _) = fixture(default_behavior()).await;
        service.add_players(1).await.unwrap();
        service.tick().await;
        let players = service.players().await;
        assert_eq!(players[0].state, SimulatedPlayerState::Idle);
        assert_eq!(players[0].join_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_player_does_not_block_others() {
        let (service, repository, tenant) = fixture(Arc::new(FailFor("Broken"))).await;
        let playground = repository.create_playground(&tenant, "ABCDEF").await.unwrap();
        service.add_named_player("Broken").await.unwrap();
        service.add_named_player("Healthy").await.unwrap();

        service.tick().await;

        let players = service.players().await;
        assert_eq!(players[0].state, SimulatedPlayerState::Idle);
        assert_eq!(players[1].state, SimulatedPlayerState::Playing);
        assert_eq!(repository.active_joins(&playground.hash).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_leaves_playgrounds_and_clears_players() {
        let (service, repository, tenant) = fixture(default_behavior()).await;
        let playground = repository.create_playground(&tenant, "ABCDEF").await.unwrap();
        service.add_players(3).await.unwrap();

        assert!(service.start().await);
        assert!(!service.start().await);
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(repository.active_joins(&playground.hash).await.unwrap().len(), 3);

        service.stop().await;
        assert!(!service.is_running().await);
        assert!(service.players().await.is_empty());
        assert!(repository.active_joins(&playground.hash).await.unwrap().is_empty());
    }
}
