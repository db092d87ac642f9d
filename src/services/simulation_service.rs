//! Wires the simulation components together for the running server.
//!
//! With `simulation.enabled` a [`PlaygroundMonitor`] hands every new playground to the
//! [`AutoJoinCoordinator`], which joins players drawn from the [`PlayerPoolManager`].
//! Independently, `simulation.simulated_players > 0` runs the tick driven
//! [`SimulatedPlayerService`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    config::SimulationConfig,
    dao::{
        facts::{FactHash, Playground},
        repository::{FleetRepository, Stored},
        storage::StorageError,
    },
    dto::simulation::SimulationStatus,
    simulation::{
        AutoJoinCoordinator, CoordinationOutcome, DefaultBehavior, PlayerPoolManager,
        PlaygroundMonitor, SimulatedPlayerService, coordinator::JoinFailure,
    },
    state::SharedState,
};

/// Running simulation owned by the application state.
pub struct SimulationSupervisor {
    config: SimulationConfig,
    pool: Arc<PlayerPoolManager>,
    coordinator: Arc<AutoJoinCoordinator>,
    monitor: Mutex<Option<PlaygroundMonitor>>,
    players: Option<Arc<SimulatedPlayerService>>,
}

impl SimulationSupervisor {
    /// Start whatever parts of the simulation the configuration enables.
    pub async fn start(
        repository: FleetRepository,
        tenant: FactHash,
        config: SimulationConfig,
    ) -> Result<Arc<Self>, StorageError> {
        let pool = Arc::new(PlayerPoolManager::new(repository.clone(), tenant.clone()));
        let coordinator = Arc::new(
            AutoJoinCoordinator::new(Arc::new(repository.clone()), (&config).into())
                .with_failure_callback(Arc::new(|failure: &JoinFailure| {
                    warn!(
                        player = %failure.player,
                        code = %failure.playground,
                        attempts = failure.attempts,
                        "pooled player could not be auto-joined"
                    );
                })),
        );

        let monitor = if config.enabled {
            pool.initialize(config.pool_size).await?;
            Some(PlaygroundMonitor::start(
                repository.store().clone(),
                tenant.clone(),
                {
                    let pool = pool.clone();
                    let coordinator = coordinator.clone();
                    let per_playground = config.players_per_playground;
                    move |playground| {
                        let pool = pool.clone();
                        let coordinator = coordinator.clone();
                        async move {
                            auto_join(&pool, &coordinator, per_playground, playground).await;
                        }
                    }
                },
            ))
        } else {
            None
        };

        let players = if config.simulated_players > 0 {
            let service = Arc::new(SimulatedPlayerService::new(
                repository,
                tenant,
                Arc::new(DefaultBehavior {
                    max_play_time: config.max_play_time,
                }),
                config.tick_interval,
            ));
            service.add_players(config.simulated_players).await?;
            service.start().await;
            Some(service)
        } else {
            None
        };

        info!(
            auto_join = config.enabled,
            simulated_players = config.simulated_players,
            "simulation started"
        );
        Ok(Arc::new(Self {
            config,
            pool,
            coordinator,
            monitor: Mutex::new(monitor),
            players,
        }))
    }

    pub async fn status(&self) -> SimulationStatus {
        let running = match self.monitor.lock().await.as_ref() {
            Some(monitor) => monitor.is_running(),
            None => false,
        };
        let players_running = match &self.players {
            Some(players) => players.is_running().await,
            None => false,
        };
        let players = match &self.players {
            Some(players) => players.players().await,
            None => Vec::new(),
        };

        SimulationStatus {
            enabled: self.config.enabled,
            running: running || players_running,
            pool: self.pool.stats().await,
            coordinating: self.coordinator.active_playgrounds(),
            players,
            join_history: self.coordinator.history().await,
        }
    }

    /// Stop watching, cancel pending joins, retire simulated players and empty the pool.
    pub async fn stop(&self) {
        if let Some(monitor) = self.monitor.lock().await.take() {
            monitor.stop().await;
        }
        self.coordinator.shutdown();
        if let Some(players) = &self.players {
            players.stop().await;
        }
        self.pool.clear().await;
        info!("simulation stopped");
    }
}

/// Assign pooled players to a new playground and join them.
async fn auto_join(
    pool: &PlayerPoolManager,
    coordinator: &AutoJoinCoordinator,
    per_playground: usize,
    playground: Stored<Playground>,
) {
    let code = playground.fact.code.clone();
    match pool.reclaim().await {
        Ok(0) => {}
        Ok(released) => info!(released, "pooled players returned after leaving"),
        Err(err) => warn!(error = %err, "could not reclaim pooled players"),
    }
    let mut assigned = Vec::new();
    for candidate in pool.available_players(per_playground).await {
        if pool.mark_active(&candidate.player, &code).await {
            assigned.push(candidate.player);
        }
    }
    if assigned.is_empty() {
        info!(code = %code, "no pooled players available for playground");
        return;
    }

    match coordinator.coordinate_joins(assigned.clone(), &playground).await {
        CoordinationOutcome::Completed(report) => {
            for (player, _) in &report.joined {
                pool.mark_seated(player).await;
            }
            for failure in report.failed {
                pool.release(&failure.player).await;
            }
        }
        CoordinationOutcome::AlreadyCoordinating => {
            for player in &assigned {
                pool.release(player).await;
            }
        }
    }
}

/// Start the simulation configured for `state` if any part of it is enabled.
pub async fn start_configured(state: &SharedState) -> Result<(), StorageError> {
    let config = state.config().simulation.clone();
    if !config.enabled && config.simulated_players == 0 {
        info!("simulation disabled");
        return Ok(());
    }
    let supervisor =
        SimulationSupervisor::start(state.repository().clone(), state.tenant().clone(), config)
            .await?;
    state.set_simulation(Some(supervisor)).await;
    Ok(())
}

/// Stop the running simulation, if any.
pub async fn stop(state: &SharedState) {
    if let Some(supervisor) = state.simulation().await {
        supervisor.stop().await;
        state.set_simulation(None).await;
    }
}

/// Report the simulation, or an idle snapshot when none is running.
pub async fn status(state: &SharedState) -> SimulationStatus {
    match state.simulation().await {
        Some(supervisor) => supervisor.status().await,
        None => SimulationStatus {
            enabled: false,
            running: false,
            pool: Default::default(),
            coordinating: Vec::new(),
            players: Vec::new(),
            join_history: Vec::new(),
        },
    }
}
