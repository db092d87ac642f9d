//! Abstraction over the fact synchronization backend.
//!
//! The store only knows how to append facts, read them back and notify watchers. All
//! traversals the services need are spelled out as [`FactQuery`] variants.

pub mod memory;

use futures::future::BoxFuture;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::dao::{
    facts::{Fact, FactHash, FactRecord},
    storage::StorageResult,
};

pub use self::memory::MemoryFactStore;

/// Append-only fact log with one-shot reads and push subscriptions.
pub trait FactStore: Send + Sync {
    /// Append a fact, returning the stored record. Writing an existing fact is a no-op.
    fn fact(&self, fact: Fact) -> BoxFuture<'static, StorageResult<FactRecord>>;
    /// Fetch a single fact by hash.
    fn load(&self, hash: FactHash) -> BoxFuture<'static, StorageResult<Option<FactRecord>>>;
    /// Return every stored fact matching `query`, in insertion order.
    fn query(&self, query: FactQuery) -> BoxFuture<'static, StorageResult<Vec<FactRecord>>>;
    /// Subscribe to facts matching `query` that are appended from now on.
    fn watch(&self, query: FactQuery) -> FactSubscription;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Relationship traversals supported by the store, each anchored on a root fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactQuery {
    /// Players registered under a tenant.
    Players { tenant: FactHash },
    /// Names recorded for a player.
    PlayerNames { player: FactHash },
    /// Playgrounds opened under a tenant.
    Playgrounds { tenant: FactHash },
    /// Joins into a playground.
    Joins { playground: FactHash },
    /// Joins made by a player, across playgrounds.
    JoinsOfPlayer { player: FactHash },
    /// Leaves ending a join.
    Leaves { join: FactHash },
    /// Challenges where the join is either side.
    ChallengesFor { join: FactHash },
    /// Rejections of a challenge.
    Rejects { challenge: FactHash },
    /// Games started from a challenge.
    Games { challenge: FactHash },
    /// Moves played in a game.
    Moves { game: FactHash },
}

impl FactQuery {
    /// Whether `record` is part of this query's result set.
    pub fn matches(&self, record: &FactRecord) -> bool {
        match (self, &record.fact) {
            (FactQuery::Players { tenant }, Fact::Player(player)) => &player.tenant == tenant,
            (FactQuery::PlayerNames { player }, Fact::PlayerName(name)) => &name.player == player,
            (FactQuery::Playgrounds { tenant }, Fact::Playground(playground)) => {
                &playground.tenant == tenant
            }
            (FactQuery::Joins { playground }, Fact::Join(join)) => &join.playground == playground,
            (FactQuery::JoinsOfPlayer { player }, Fact::Join(join)) => &join.player == player,
            (FactQuery::Leaves { join }, Fact::Leave(leave)) => &leave.join == join,
            (FactQuery::ChallengesFor { join }, Fact::Challenge(challenge)) => {
                &challenge.challenger_join == join || &challenge.opponent_join == join
            }
            (FactQuery::Rejects { challenge }, Fact::Reject(reject)) => {
                &reject.challenge == challenge
            }
            (FactQuery::Games { challenge }, Fact::Game(game)) => &game.challenge == challenge,
            (FactQuery::Moves { game }, Fact::Move(mv)) => &mv.game == game,
            _ => false,
        }
    }
}

/// Live subscription returned by [`FactStore::watch`].
///
/// Dropping the subscription or calling [`FactSubscription::stop`] ends it.
pub struct FactSubscription {
    query: FactQuery,
    receiver: broadcast::Receiver<FactRecord>,
    cancel: CancellationToken,
}

impl FactSubscription {
    /// Build a subscription filtering `receiver` through `query`.
    pub fn new(query: FactQuery, receiver: broadcast::Receiver<FactRecord>) -> Self {
        Self {
            query,
            receiver,
            cancel: CancellationToken::new(),
        }
    }

    /// Wait for the next matching fact. Returns `None` once stopped or when the store
    /// goes away.
    pub async fn next(&mut self) -> Option<FactRecord> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                received = self.receiver.recv() => match received {
                    Ok(record) if self.query.matches(&record) => return Some(record),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, query = ?self.query, "fact subscription lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    }

    /// Stop delivering facts.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this subscription when cancelled, for use from another task.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
