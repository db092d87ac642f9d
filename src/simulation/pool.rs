use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::{facts::FactHash, repository::FleetRepository, storage::StorageResult},
    simulation::names::NameGenerator,
};

/// A synthetic player owned by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PooledPlayer {
    pub player: FactHash,
    pub name: String,
}

#[derive(Debug, Clone)]
struct PoolEntry {
    player: PooledPlayer,
    active_in: Option<String>,
    /// Set once the join into `active_in` was recorded.
    seated: bool,
}

/// Counters describing pool usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub available: usize,
}

/// Creates synthetic players up front and tracks which ones are assigned to a playground.
pub struct PlayerPoolManager {
    repository: FleetRepository,
    tenant: FactHash,
    players: RwLock<IndexMap<FactHash, PoolEntry>>,
    names: Mutex<NameGenerator>,
}

impl PlayerPoolManager {
    pub fn new(repository: FleetRepository, tenant: FactHash) -> Self {
        Self {
            repository,
            tenant,
            players: RwLock::new(IndexMap::new()),
            names: Mutex::new(NameGenerator::default()),
        }
    }

    /// Create `count` player facts with generated names and add them to the pool.
    pub async fn initialize(&self, count: usize) -> StorageResult<Vec<PooledPlayer>> {
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let public_key = format!("simulated:{}", Uuid::new_v4().simple());
            let player = self
                .repository
                .create_player(&self.tenant, &public_key)
                .await?;
            let name = self.names.lock().await.generate_gaming_name();
            self.repository.set_player_name(&player, &name).await?;

            let pooled = PooledPlayer { player, name };
            self.players.write().await.insert(
                pooled.player.clone(),
                PoolEntry {
                    player: pooled.clone(),
                    active_in: None,
                    seated: false,
                },
            );
            created.push(pooled);
        }

        info!(count = created.len(), "player pool initialized");
        Ok(created)
    }

    /// Up to `limit` players not currently assigned, oldest first.
    pub async fn available_players(&self, limit: usize) -> Vec<PooledPlayer> {
        self.players
            .read()
            .await
            .values()
            .filter(|entry| entry.active_in.is_none())
            .take(limit)
            .map(|entry| entry.player.clone())
            .collect()
    }

    /// Assign a player to a playground. Returns `false` when the player is unknown or
    /// already assigned.
    pub async fn mark_active(&self, player: &FactHash, playground_code: &str) -> bool {
        let mut players = self.players.write().await;
        match players.get_mut(player) {
            Some(entry) if entry.active_in.is_none() => {
                entry.active_in = Some(playground_code.to_owned());
                debug!(%player, code = playground_code, "pooled player marked active");
                true
            }
            _ => false,
        }
    }

    /// Record that an assigned player's join went through.
    pub async fn mark_seated(&self, player: &FactHash) {
        match self.players.write().await.get_mut(player) {
            Some(entry) if entry.active_in.is_some() => entry.seated = true,
            _ => {}
        }
    }

    /// Make a player available again.
    pub async fn release(&self, player: &FactHash) {
        if let Some(entry) = self.players.write().await.get_mut(player) {
            entry.active_in = None;
            entry.seated = false;
        }
    }

    /// Release seated players whose join has since been ended by a leave.
    ///
    /// Players still waiting for their join are left alone.
    pub async fn reclaim(&self) -> StorageResult<usize> {
        let seated: Vec<(FactHash, String)> = self
            .players
            .read()
            .await
            .values()
            .filter(|entry| entry.seated)
            .filter_map(|entry| {
                entry
                    .active_in
                    .clone()
                    .map(|code| (entry.player.player.clone(), code))
            })
            .collect();

        let mut released = 0;
        for (player, code) in seated {
            if !self.repository.active_joins_of_player(&player).await?.is_empty() {
                continue;
            }
            let mut players = self.players.write().await;
            match players.get_mut(&player) {
                Some(entry) if entry.seated && entry.active_in.as_deref() == Some(code.as_str()) => {
                    entry.active_in = None;
                    entry.seated = false;
                    released += 1;
                    debug!(%player, code = %code, "pooled player left; back in the pool");
                }
                _ => {}
            }
        }
        Ok(released)
    }

    pub async fn stats(&self) -> PoolStats {
        let players = self.players.read().await;
        let active = players
            .values()
            .filter(|entry| entry.active_in.is_some())
            .count();
        PoolStats {
            total: players.len(),
            active,
            available: players.len() - active,
        }
    }

    /// Forget every pooled player. Their facts remain in the store.
    pub async fn clear(&self) {
        self.players.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::{
        fact_store::{FactStore, MemoryFactStore},
        facts::{Fact, Tenant},
    };

    async fn pool() -> (PlayerPoolManager, FleetRepository) {
        let store = Arc::new(MemoryFactStore::new());
        let tenant = store
            .fact(Fact::Tenant(Tenant {
                public_key: "tenant".into(),
            }))
            .await
            .unwrap()
            .hash;
        let repository = FleetRepository::new(store);
        (PlayerPoolManager::new(repository.clone(), tenant), repository)
    }

    #[tokio::test]
    async fn initialize_creates_named_players() {
        let (pool, repository) = pool().await;
        let created = pool.initialize(3).await.unwrap();
        assert_eq!(created.len(), 3);

        for pooled in &created {
            let name = repository.player_name(&pooled.player).await.unwrap().unwrap();
            assert_eq!(name.fact.value, pooled.name);
        }
        assert_eq!(
            pool.stats().await,
            PoolStats {
                total: 3,
                active: 0,
                available: 3
            }
        );
    }

    #[tokio::test]
    async fn active_players_are_not_available() {
        let (pool, _) = pool().await;
        let created = pool.initialize(3).await.unwrap();

        assert!(pool.mark_active(&created[0].player, "ABCDEF").await);
        assert!(!pool.mark_active(&created[0].player, "GHIJKL").await);

        let available = pool.available_players(10).await;
        assert_eq!(available.len(), 2);
        assert!(available.iter().all(|p| p.player != created[0].player));
        assert_eq!(pool.available_players(1).await.len(), 1);

        pool.release(&created[0].player).await;
        assert_eq!(pool.stats().await.available, 3);
    }

    #[tokio::test]
    async fn reclaim_returns_players_whose_join_ended() {
        let (pool, repository) = pool().await;
        let created = pool.initialize(3).await.unwrap();
        let playground = repository
            .create_playground(&pool.tenant, "ABCDEF")
            .await
            .unwrap();

        let mut joins = Vec::new();
        for pooled in &created[..2] {
            pool.mark_active(&pooled.player, "ABCDEF").await;
            joins.push(repository.join(&pooled.player, &playground.hash).await.unwrap());
            pool.mark_seated(&pooled.player).await;
        }
        // Assigned but not yet joined.
        pool.mark_active(&created[2].player, "ABCDEF").await;

        assert_eq!(pool.reclaim().await.unwrap(), 0);

        repository.leave(&joins[0].hash).await.unwrap();
        assert_eq!(pool.reclaim().await.unwrap(), 1);
        assert_eq!(
            pool.stats().await,
            PoolStats {
                total: 3,
                active: 2,
                available: 1
            }
        );
        let available = pool.available_players(10).await;
        assert_eq!(available[0].player, created[0].player);
    }
}
