//! Staggered, retrying joins of pooled players into a playground.
//!
//! Each playground code is coordinated by at most one call at a time. Joins are spread
//! out by `index * join_delay` to avoid bursts of concurrent writes, and a failed join is
//! retried a fixed number of times with a fixed delay before it is reported.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use tokio::{sync::Mutex, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    config::SimulationConfig,
    dao::{
        facts::{FactHash, Playground, now_timestamp},
        repository::{FleetRepository, Stored},
    },
    error::ServiceError,
};

/// Maximum number of join attempts kept for diagnostics.
pub const JOIN_HISTORY_LIMIT: usize = 100;

/// Writes the membership of a player in a playground.
pub trait PlaygroundJoiner: Send + Sync {
    /// Join `player` into `playground`, returning the join hash.
    fn join(
        &self,
        player: FactHash,
        playground: FactHash,
    ) -> BoxFuture<'static, Result<FactHash, ServiceError>>;
}

impl PlaygroundJoiner for FleetRepository {
    fn join(
        &self,
        player: FactHash,
        playground: FactHash,
    ) -> BoxFuture<'static, Result<FactHash, ServiceError>> {
        let repository = self.clone();
        Box::pin(async move {
            if let Some(existing) = repository.active_join_of(&player, &playground).await? {
                return Ok(existing.hash);
            }
            Ok(repository.join(&player, &playground).await?.hash)
        })
    }
}

/// Timing knobs for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub join_delay: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&SimulationConfig> for CoordinatorConfig {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            join_delay: config.join_delay,
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    Pending,
    Success,
    Failed,
}

/// One attempt at joining a player, kept in the diagnostic history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct JoinAttempt {
    pub player: FactHash,
    pub playground: String,
    pub attempt_time: String,
    pub status: JoinStatus,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A player that could not be joined after all retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct JoinFailure {
    pub player: FactHash,
    pub playground: String,
    pub attempts: u32,
    pub error: String,
}

/// Result of a completed coordination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// `(player, join)` pairs that succeeded.
    pub joined: Vec<(FactHash, FactHash)>,
    pub failed: Vec<JoinFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinationOutcome {
    Completed(JoinReport),
    /// Another call is already coordinating this playground; nothing was done.
    AlreadyCoordinating,
}

/// Callback invoked once per terminal join failure.
pub type FailureCallback = Arc<dyn Fn(&JoinFailure) + Send + Sync>;

struct History {
    next_id: u64,
    entries: VecDeque<(u64, JoinAttempt)>,
}

/// Removes the playground from the active set when coordination ends, even on cancel.
struct ActiveGuard<'a> {
    active: &'a DashMap<String, String>,
    code: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.code);
    }
}

pub struct AutoJoinCoordinator {
    joiner: Arc<dyn PlaygroundJoiner>,
    config: CoordinatorConfig,
    active: DashMap<String, String>,
    history: Mutex<History>,
    on_failure: Option<FailureCallback>,
    cancel: CancellationToken,
}

impl AutoJoinCoordinator {
    pub fn new(joiner: Arc<dyn PlaygroundJoiner>, config: CoordinatorConfig) -> Self {
        Self {
            joiner,
            config,
            active: DashMap::new(),
            history: Mutex::new(History {
                next_id: 0,
                entries: VecDeque::with_capacity(JOIN_HISTORY_LIMIT),
            }),
            on_failure: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Register a callback for joins that failed after every retry.
    pub fn with_failure_callback(mut self, callback: FailureCallback) -> Self {
        self.on_failure = Some(callback);
        self
    }

    /// Join `players` into `playground`, staggering and retrying as configured.
    pub async fn coordinate_joins(
        &self,
        players: Vec<FactHash>,
        playground: &Stored<Playground>,
    ) -> CoordinationOutcome {
        let code = playground.fact.code.clone();
        match self.active.entry(code.clone()) {
            Entry::Occupied(_) => {
                debug!(code = %code, "playground already being coordinated; skipping");
                return CoordinationOutcome::AlreadyCoordinating;
            }
            Entry::Vacant(slot) => {
                slot.insert(now_timestamp());
            }
        }
        let _guard = ActiveGuard {
            active: &self.active,
            code: code.clone(),
        };

        info!(code = %code, players = players.len(), "coordinating joins");
        let attempts = players.into_iter().enumerate().map(|(index, player)| {
            let playground = playground.hash.clone();
            let code = code.clone();
            async move {
                let result = self
                    .join_with_retry(index, player.clone(), playground, code)
                    .await;
                (player, result)
            }
        });

        let mut report = JoinReport::default();
        for (player, result) in join_all(attempts).await {
            match result {
                Ok(join) => report.joined.push((player, join)),
                Err(failure) => report.failed.push(failure),
            }
        }

        info!(
            code = %code,
            joined = report.joined.len(),
            failed = report.failed.len(),
            "join coordination finished"
        );
        CoordinationOutcome::Completed(report)
    }

    async fn join_with_retry(
        &self,
        index: usize,
        player: FactHash,
        playground: FactHash,
        code: String,
    ) -> Result<FactHash, JoinFailure> {
        let stagger = self
            .config
            .join_delay
            .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
        if !self.pause(stagger).await {
            return Err(self.fail(player, code, 0, "coordination cancelled".into()));
        }

        let mut retry_count = 0;
        loop {
            let attempt = self.record_attempt(&player, &code, retry_count).await;
            match self.joiner.join(player.clone(), playground.clone()).await {
                Ok(join) => {
                    self.finish_attempt(attempt, JoinStatus::Success, None).await;
                    debug!(%player, code = %code, retry_count, "player joined");
                    return Ok(join);
                }
                Err(err) => {
                    let message = err.to_string();
                    self.finish_attempt(attempt, JoinStatus::Failed, Some(message.clone()))
                        .await;

                    if retry_count >= self.config.retry_attempts {
                        return Err(self.fail(player, code, retry_count + 1, message));
                    }
                    retry_count += 1;
                    warn!(%player, code = %code, retry_count, error = %message, "join failed; retrying");
                    if !self.pause(self.config.retry_delay).await {
                        return Err(self.fail(
                            player,
                            code,
                            retry_count,
                            "coordination cancelled".into(),
                        ));
                    }
                }
            }
        }
    }

    fn fail(&self, player: FactHash, code: String, attempts: u32, error: String) -> JoinFailure {
        let failure = JoinFailure {
            player,
            playground: code,
            attempts,
            error,
        };
        warn!(
            player = %failure.player,
            code = %failure.playground,
            attempts,
            error = %failure.error,
            "giving up on join"
        );
        if let Some(callback) = &self.on_failure {
            callback(&failure);
        }
        failure
    }

    /// Sleep unless the coordinator is shut down first. Returns `false` when cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }

    async fn record_attempt(&self, player: &FactHash, code: &str, retry_count: u32) -> u64 {
        let mut history = self.history.lock().await;
        let id = history.next_id;
        history.next_id += 1;
        if history.entries.len() == JOIN_HISTORY_LIMIT {
            history.entries.pop_front();
        }
        history.entries.push_back((
            id,
            JoinAttempt {
                player: player.clone(),
                playground: code.to_owned(),
                attempt_time: now_timestamp(),
                status: JoinStatus::Pending,
                retry_count,
                error: None,
            },
        ));
        id
    }

    async fn finish_attempt(&self, id: u64, status: JoinStatus, error: Option<String>) {
        let mut history = self.history.lock().await;
        if let Some((_, attempt)) = history.entries.iter_mut().find(|(entry, _)| *entry == id) {
            attempt.status = status;
            attempt.error = error;
        }
    }

    /// Most recent join attempts, oldest first.
    pub async fn history(&self) -> Vec<JoinAttempt> {
        self.history
            .lock()
            .await
            .entries
            .iter()
            .map(|(_, attempt)| attempt.clone())
            .collect()
    }

    /// Whether a coordination for `code` is in flight.
    pub fn is_coordinating(&self, code: &str) -> bool {
        self.active.contains_key(code)
    }

    /// Codes of playgrounds currently being coordinated.
    pub fn active_playgrounds(&self) -> Vec<String> {
        self.active.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Cancel every pending delayed join and retry.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
