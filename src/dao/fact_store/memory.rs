use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::dao::{
    fact_store::{FactQuery, FactStore, FactSubscription},
    facts::{self, Fact, FactHash, FactRecord},
    storage::{StorageError, StorageResult},
};

const WATCH_CAPACITY: usize = 1024;

/// In-process fact store. Cloning shares the same underlying log.
#[derive(Clone)]
pub struct MemoryFactStore {
    inner: Arc<Inner>,
}

struct Inner {
    facts: DashMap<FactHash, Fact>,
    log: RwLock<Vec<FactHash>>,
    notifier: broadcast::Sender<FactRecord>,
}

impl MemoryFactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (notifier, _rx) = broadcast::channel(WATCH_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                facts: DashMap::new(),
                log: RwLock::new(Vec::new()),
                notifier,
            }),
        }
    }

    /// Number of distinct facts stored.
    pub fn len(&self) -> usize {
        self.inner.facts.len()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.inner.facts.is_empty()
    }
}

impl Default for MemoryFactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    async fn append(&self, fact: Fact) -> StorageResult<FactRecord> {
        let hash = facts::hash(&fact)?;

        for predecessor in fact.predecessors() {
            if !self.facts.contains_key(predecessor) {
                return Err(StorageError::MissingPredecessor(predecessor.clone()));
            }
        }

        let mut log = self.log.write().await;
        if self.facts.contains_key(&hash) {
            return Ok(FactRecord { hash, fact });
        }

        self.facts.insert(hash.clone(), fact.clone());
        log.push(hash.clone());
        drop(log);

        debug!(fact_type = fact.type_name(), %hash, "fact stored");
        let record = FactRecord { hash, fact };
        let _ = self.notifier.send(record.clone());
        Ok(record)
    }

    async fn select(&self, query: &FactQuery) -> Vec<FactRecord> {
        let log = self.log.read().await;
        log.iter()
            .filter_map(|hash| {
                self.facts.get(hash).map(|entry| FactRecord {
                    hash: hash.clone(),
                    fact: entry.value().clone(),
                })
            })
            .filter(|record| query.matches(record))
            .collect()
    }
}

impl FactStore for MemoryFactStore {
    fn fact(&self, fact: Fact) -> BoxFuture<'static, StorageResult<FactRecord>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.append(fact).await })
    }

    fn load(&self, hash: FactHash) -> BoxFuture<'static, StorageResult<Option<FactRecord>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner.facts.get(&hash).map(|entry| FactRecord {
                hash: hash.clone(),
                fact: entry.value().clone(),
            }))
        })
    }

    fn query(&self, query: FactQuery) -> BoxFuture<'static, StorageResult<Vec<FactRecord>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.select(&query).await) })
    }

    fn watch(&self, query: FactQuery) -> FactSubscription {
        FactSubscription::new(query, self.inner.notifier.subscribe())
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::facts::{Move, Player, Playground, Tenant, now_timestamp};

    async fn seed_tenant(store: &MemoryFactStore) -> FactHash {
        store
            .fact(Fact::Tenant(Tenant {
                public_key: "tenant".into(),
            }))
            .await
            .unwrap()
            .hash
    }

    #[tokio::test]
    async fn writing_the_same_fact_twice_stores_it_once() {
        let store = MemoryFactStore::new();
        let tenant = seed_tenant(&store).await;
        let again = seed_tenant(&store).await;
        assert_eq!(tenant, again);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn rejects_facts_with_unknown_predecessors() {
        let store = MemoryFactStore::new();
        let err = store
            .fact(Fact::Move(Move {
                game: FactHash::new("missing"),
                index: 0,
                position: 0,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingPredecessor(hash) if hash.as_str() == "missing"));
    }

    #[tokio::test]
    async fn query_filters_by_relationship_in_insertion_order() {
        let store = MemoryFactStore::new();
        let tenant = seed_tenant(&store).await;
        for key in ["b", "a"] {
            store
                .fact(Fact::Player(Player {
                    tenant: tenant.clone(),
                    public_key: key.into(),
                }))
                .await
                .unwrap();
        }

        let players = store.query(FactQuery::Players { tenant }).await.unwrap();
        let keys: Vec<&str> = players
            .iter()
            .filter_map(|record| record.as_player())
            .map(|player| player.public_key.as_str())
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn watch_delivers_only_new_matching_facts() {
        let store = MemoryFactStore::new();
        let tenant = seed_tenant(&store).await;
        let mut subscription = store.watch(FactQuery::Playgrounds {
            tenant: tenant.clone(),
        });

        store
            .fact(Fact::Player(Player {
                tenant: tenant.clone(),
                public_key: "ignored".into(),
            }))
            .await
            .unwrap();
        let playground = store
            .fact(Fact::Playground(Playground {
                tenant,
                code: "ABCDEF".into(),
                created_at: now_timestamp(),
            }))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.hash, playground.hash);
    }

    #[tokio::test]
    async fn stopped_subscription_yields_none() {
        let store = MemoryFactStore::new();
        let tenant = seed_tenant(&store).await;
        let mut subscription = store.watch(FactQuery::Playgrounds { tenant });
        subscription.stop();
        assert!(subscription.next().await.is_none());
    }
}
