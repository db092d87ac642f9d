pub mod player_state;
pub mod tic_tac_toe;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, timeout};
use tracing::info;

use crate::{
    config::AppConfig,
    dao::{
        fact_store::FactStore,
        facts::{Fact, FactHash, Tenant},
        repository::FleetRepository,
        storage::StorageResult,
    },
    error::ServiceError,
    services::simulation_service::SimulationSupervisor,
    simulation::NameGenerator,
};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// A bearer token issued to a player.
#[derive(Debug, Clone)]
pub struct Session {
    pub player: FactHash,
    pub issued_at: Instant,
}

/// Central application state: the fact repository, player sessions and the simulation.
pub struct AppState {
    repository: FleetRepository,
    tenant: FactHash,
    config: AppConfig,
    sessions: DashMap<String, Session>,
    session_ttl: Duration,
    names: Mutex<NameGenerator>,
    move_gate: Mutex<()>,
    answer_gate: Mutex<()>,
    move_timeout: Option<Duration>,
    simulation: RwLock<Option<Arc<SimulationSupervisor>>>,
}

impl AppState {
    /// Register the tenant root fact and build the shared state around `store`.
    pub async fn bootstrap(
        store: Arc<dyn FactStore>,
        tenant_public_key: &str,
        config: AppConfig,
    ) -> StorageResult<SharedState> {
        let tenant = store
            .fact(Fact::Tenant(Tenant {
                public_key: tenant_public_key.to_owned(),
            }))
            .await?
            .hash;
        info!(%tenant, "tenant ready");

        Ok(Arc::new(Self {
            repository: FleetRepository::new(store),
            tenant,
            config,
            sessions: DashMap::new(),
            session_ttl: DEFAULT_SESSION_TTL,
            names: Mutex::new(NameGenerator::default()),
            move_gate: Mutex::new(()),
            answer_gate: Mutex::new(()),
            move_timeout: Some(DEFAULT_MOVE_TIMEOUT),
            simulation: RwLock::new(None),
        }))
    }

    pub fn repository(&self) -> &FleetRepository {
        &self.repository
    }

    pub fn store(&self) -> &Arc<dyn FactStore> {
        self.repository.store()
    }

    /// Root fact every player and playground hangs off.
    pub fn tenant(&self) -> &FactHash {
        &self.tenant
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Bearer token to session mapping.
    pub fn sessions(&self) -> &DashMap<String, Session> {
        &self.sessions
    }

    /// How long a bearer token stays valid after it is issued.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Generator for names of players who authenticate for the first time.
    pub fn names(&self) -> &Mutex<NameGenerator> {
        &self.names
    }

    pub async fn simulation(&self) -> Option<Arc<SimulationSupervisor>> {
        self.simulation.read().await.clone()
    }

    /// Install (or clear) the running simulation.
    pub async fn set_simulation(&self, supervisor: Option<Arc<SimulationSupervisor>>) {
        *self.simulation.write().await = supervisor;
    }

    /// Run `work` while holding the move gate so two moves cannot claim the same index.
    pub async fn run_move<F, Fut, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let _gate = self.move_gate.lock().await;
        work().await
    }

    /// Run `work` while holding the answer gate so a challenge is accepted or rejected once.
    pub async fn run_answer<F, Fut, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let _gate = self.answer_gate.lock().await;
        work().await
    }

    /// Bound the read and validate half of a gated operation by the move timeout.
    ///
    /// Writes are kept outside of it: a write that already reached the store must not be
    /// reported to the caller as a failure.
    pub async fn bounded<Fut, T>(&self, work: Fut) -> Result<T, ServiceError>
    where
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        match self.move_timeout {
            Some(limit) => timeout(limit, work)
                .await
                .map_err(|_| ServiceError::Timeout)?,
            None => work.await,
        }
    }
}

/// Fresh state over an empty in-memory store.
#[cfg(test)]
pub(crate) async fn test_state() -> SharedState {
    AppState::bootstrap(
        Arc::new(crate::dao::fact_store::MemoryFactStore::new()),
        "tenant-key",
        AppConfig::default(),
    )
    .await
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::fact_store::MemoryFactStore;

    #[tokio::test]
    async fn bootstrap_is_idempotent_per_tenant_key() {
        let store: Arc<dyn FactStore> = Arc::new(MemoryFactStore::new());
        let first = AppState::bootstrap(store.clone(), "tenant-key", AppConfig::default())
            .await
            .unwrap();
        let second = AppState::bootstrap(store, "tenant-key", AppConfig::default())
            .await
            .unwrap();
        assert_eq!(first.tenant(), second.tenant());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reads_time_out_and_release_the_gate() {
        let state = test_state().await;
        let slow = state
            .run_move(|| async {
                state
                    .bounded(async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(())
                    })
                    .await
            })
            .await;
        assert!(matches!(slow, Err(ServiceError::Timeout)));

        let fast = state.run_move(|| async { Ok(7) }).await.unwrap();
        assert_eq!(fast, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_writes_after_the_bounded_step_still_succeed() {
        let state = test_state().await;
        let written = state
            .run_move(|| async {
                let index = state.bounded(async { Ok(3) }).await?;
                tokio::time::sleep(DEFAULT_MOVE_TIMEOUT * 2).await;
                Ok(index)
            })
            .await;
        assert_eq!(written.unwrap(), 3);
    }
}
