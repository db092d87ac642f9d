use std::{collections::HashSet, sync::Arc};

use crate::dao::{
    fact_store::{FactQuery, FactStore},
    facts::{
        Challenge, Fact, FactHash, FactRecord, Game, Join, Leave, Move, Player, PlayerName,
        Playground, Reject, now_timestamp,
    },
    storage::StorageResult,
};

/// A typed fact paired with its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored<T> {
    pub hash: FactHash,
    pub fact: T,
}

fn typed<T: Clone>(
    records: Vec<FactRecord>,
    extract: fn(&FactRecord) -> Option<&T>,
) -> Vec<Stored<T>> {
    records
        .iter()
        .filter_map(|record| {
            extract(record).map(|fact| Stored {
                hash: record.hash.clone(),
                fact: fact.clone(),
            })
        })
        .collect()
}

/// Typed reads and writes over the fact store. Each read is an explicit traversal
/// from a root fact.
#[derive(Clone)]
pub struct FleetRepository {
    store: Arc<dyn FactStore>,
}

impl FleetRepository {
    pub fn new(store: Arc<dyn FactStore>) -> Self {
        Self { store }
    }

    /// Underlying fact store, for watches.
    pub fn store(&self) -> &Arc<dyn FactStore> {
        &self.store
    }

    async fn load_as<T: Clone>(
        &self,
        hash: &FactHash,
        extract: fn(&FactRecord) -> Option<&T>,
    ) -> StorageResult<Option<Stored<T>>> {
        let record = self.store.load(hash.clone()).await?;
        Ok(record.and_then(|record| {
            extract(&record).cloned().map(|fact| Stored {
                hash: record.hash.clone(),
                fact,
            })
        }))
    }

    async fn query_as<T: Clone>(
        &self,
        query: FactQuery,
        extract: fn(&FactRecord) -> Option<&T>,
    ) -> StorageResult<Vec<Stored<T>>> {
        Ok(typed(self.store.query(query).await?, extract))
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Register (or resolve) the player with `public_key` under `tenant`.
    pub async fn create_player(&self, tenant: &FactHash, public_key: &str) -> StorageResult<FactHash> {
        let record = self
            .store
            .fact(Fact::Player(Player {
                tenant: tenant.clone(),
                public_key: public_key.to_owned(),
            }))
            .await?;
        Ok(record.hash)
    }

    pub async fn load_player(&self, hash: &FactHash) -> StorageResult<Option<Stored<Player>>> {
        self.load_as(hash, FactRecord::as_player).await
    }

    /// Current name of a player: the latest name not superseded by another.
    pub async fn player_name(&self, player: &FactHash) -> StorageResult<Option<Stored<PlayerName>>> {
        let names = self
            .query_as(
                FactQuery::PlayerNames {
                    player: player.clone(),
                },
                FactRecord::as_player_name,
            )
            .await?;
        let superseded: HashSet<&FactHash> =
            names.iter().flat_map(|name| name.fact.prior.iter()).collect();
        Ok(names
            .iter()
            .rev()
            .find(|name| !superseded.contains(&name.hash))
            .cloned())
    }

    /// Record a new name superseding every current one.
    pub async fn set_player_name(&self, player: &FactHash, value: &str) -> StorageResult<FactHash> {
        let names = self
            .query_as(
                FactQuery::PlayerNames {
                    player: player.clone(),
                },
                FactRecord::as_player_name,
            )
            .await?;
        let superseded: HashSet<&FactHash> =
            names.iter().flat_map(|name| name.fact.prior.iter()).collect();
        let prior = names
            .iter()
            .filter(|name| !superseded.contains(&name.hash))
            .map(|name| name.hash.clone())
            .collect();

        let record = self
            .store
            .fact(Fact::PlayerName(PlayerName {
                player: player.clone(),
                value: value.to_owned(),
                prior,
            }))
            .await?;
        Ok(record.hash)
    }

    // -----------------------------------------------------------------------
    // Playgrounds
    // -----------------------------------------------------------------------

    pub async fn create_playground(
        &self,
        tenant: &FactHash,
        code: &str,
    ) -> StorageResult<Stored<Playground>> {
        let playground = Playground {
            tenant: tenant.clone(),
            code: code.to_owned(),
            created_at: now_timestamp(),
        };
        let record = self.store.fact(Fact::Playground(playground.clone())).await?;
        Ok(Stored {
            hash: record.hash,
            fact: playground,
        })
    }

    pub async fn playgrounds(&self, tenant: &FactHash) -> StorageResult<Vec<Stored<Playground>>> {
        self.query_as(
            FactQuery::Playgrounds {
                tenant: tenant.clone(),
            },
            FactRecord::as_playground,
        )
        .await
    }

    /// Oldest playground of the tenant carrying `code`.
    pub async fn find_playground(
        &self,
        tenant: &FactHash,
        code: &str,
    ) -> StorageResult<Option<Stored<Playground>>> {
        Ok(self
            .playgrounds(tenant)
            .await?
            .into_iter()
            .find(|playground| playground.fact.code == code))
    }

    pub async fn load_playground(
        &self,
        hash: &FactHash,
    ) -> StorageResult<Option<Stored<Playground>>> {
        self.load_as(hash, FactRecord::as_playground).await
    }

    // -----------------------------------------------------------------------
    // Joins
    // -----------------------------------------------------------------------

    pub async fn join(&self, player: &FactHash, playground: &FactHash) -> StorageResult<Stored<Join>> {
        let join = Join {
            player: player.clone(),
            playground: playground.clone(),
            joined_at: now_timestamp(),
        };
        let record = self.store.fact(Fact::Join(join.clone())).await?;
        Ok(Stored {
            hash: record.hash,
            fact: join,
        })
    }

    pub async fn leave(&self, join: &FactHash) -> StorageResult<FactHash> {
        let record = self
            .store
            .fact(Fact::Leave(Leave {
                join: join.clone(),
                left_at: now_timestamp(),
            }))
            .await?;
        Ok(record.hash)
    }

    pub async fn load_join(&self, hash: &FactHash) -> StorageResult<Option<Stored<Join>>> {
        self.load_as(hash, FactRecord::as_join).await
    }

    async fn has_left(&self, join: &FactHash) -> StorageResult<bool> {
        let leaves = self
            .store
            .query(FactQuery::Leaves { join: join.clone() })
            .await?;
        Ok(!leaves.is_empty())
    }

    async fn without_leaves(&self, joins: Vec<Stored<Join>>) -> StorageResult<Vec<Stored<Join>>> {
        let mut active = Vec::with_capacity(joins.len());
        for join in joins {
            if !self.has_left(&join.hash).await? {
                active.push(join);
            }
        }
        Ok(active)
    }

    /// Joins into `playground` that have not been ended by a leave.
    pub async fn active_joins(&self, playground: &FactHash) -> StorageResult<Vec<Stored<Join>>> {
        let joins = self
            .query_as(
                FactQuery::Joins {
                    playground: playground.clone(),
                },
                FactRecord::as_join,
            )
            .await?;
        self.without_leaves(joins).await
    }

    /// Active joins of `player`, across playgrounds.
    pub async fn active_joins_of_player(
        &self,
        player: &FactHash,
    ) -> StorageResult<Vec<Stored<Join>>> {
        let joins = self
            .query_as(
                FactQuery::JoinsOfPlayer {
                    player: player.clone(),
                },
                FactRecord::as_join,
            )
            .await?;
        self.without_leaves(joins).await
    }

    pub async fn active_join_of(
        &self,
        player: &FactHash,
        playground: &FactHash,
    ) -> StorageResult<Option<Stored<Join>>> {
        Ok(self
            .active_joins_of_player(player)
            .await?
            .into_iter()
            .find(|join| &join.fact.playground == playground))
    }

    // -----------------------------------------------------------------------
    // Challenges and games
    // -----------------------------------------------------------------------

    pub async fn challenge(
        &self,
        challenger_join: &FactHash,
        opponent_join: &FactHash,
        challenger_starts: bool,
    ) -> StorageResult<Stored<Challenge>> {
        let challenge = Challenge {
            challenger_join: challenger_join.clone(),
            opponent_join: opponent_join.clone(),
            challenger_starts,
            created_at: now_timestamp(),
        };
        let record = self.store.fact(Fact::Challenge(challenge.clone())).await?;
        Ok(Stored {
            hash: record.hash,
            fact: challenge,
        })
    }

    pub async fn load_challenge(
        &self,
        hash: &FactHash,
    ) -> StorageResult<Option<Stored<Challenge>>> {
        self.load_as(hash, FactRecord::as_challenge).await
    }

    /// Challenges addressed to `join` that were neither rejected nor accepted.
    pub async fn pending_challenges_for(
        &self,
        join: &FactHash,
    ) -> StorageResult<Vec<Stored<Challenge>>> {
        let challenges = self
            .query_as(
                FactQuery::ChallengesFor { join: join.clone() },
                FactRecord::as_challenge,
            )
            .await?;

        let mut pending = Vec::new();
        for challenge in challenges {
            if &challenge.fact.opponent_join != join {
                continue;
            }
            if self.is_resolved(&challenge.hash).await? {
                continue;
            }
            pending.push(challenge);
        }
        Ok(pending)
    }

    /// Whether a challenge has been rejected or turned into a game.
    pub async fn is_resolved(&self, challenge: &FactHash) -> StorageResult<bool> {
        let rejects = self
            .store
            .query(FactQuery::Rejects {
                challenge: challenge.clone(),
            })
            .await?;
        if !rejects.is_empty() {
            return Ok(true);
        }
        Ok(!self.games_of(challenge).await?.is_empty())
    }

    pub async fn reject(&self, challenge: &FactHash) -> StorageResult<FactHash> {
        let record = self
            .store
            .fact(Fact::Reject(Reject {
                challenge: challenge.clone(),
                rejected_at: now_timestamp(),
            }))
            .await?;
        Ok(record.hash)
    }

    pub async fn start_game(&self, challenge: &FactHash) -> StorageResult<Stored<Game>> {
        let game = Game {
            challenge: challenge.clone(),
            created_at: now_timestamp(),
        };
        let record = self.store.fact(Fact::Game(game.clone())).await?;
        Ok(Stored {
            hash: record.hash,
            fact: game,
        })
    }

    pub async fn games_of(&self, challenge: &FactHash) -> StorageResult<Vec<Stored<Game>>> {
        self.query_as(
            FactQuery::Games {
                challenge: challenge.clone(),
            },
            FactRecord::as_game,
        )
        .await
    }

    pub async fn load_game(&self, hash: &FactHash) -> StorageResult<Option<Stored<Game>>> {
        self.load_as(hash, FactRecord::as_game).await
    }

    /// Every move recorded for `game`, in delivery order.
    pub async fn moves(&self, game: &FactHash) -> StorageResult<Vec<Move>> {
        Ok(self
            .query_as(FactQuery::Moves { game: game.clone() }, FactRecord::as_move)
            .await?
            .into_iter()
            .map(|stored| stored.fact)
            .collect())
    }

    pub async fn play_move(
        &self,
        game: &FactHash,
        index: u32,
        position: u32,
    ) -> StorageResult<FactHash> {
        let record = self
            .store
            .fact(Fact::Move(Move {
                game: game.clone(),
                index,
                position,
            }))
            .await?;
        Ok(record.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{fact_store::MemoryFactStore, facts::Tenant};

    async fn repository() -> (FleetRepository, FactHash) {
        let store = Arc::new(MemoryFactStore::new());
        let tenant = store
            .fact(Fact::Tenant(Tenant {
                public_key: "tenant".into(),
            }))
            .await
            .unwrap()
            .hash;
        (FleetRepository::new(store), tenant)
    }

    #[tokio::test]
    async fn latest_name_supersedes_prior_ones() {
        let (repo, tenant) = repository().await;
        let player = repo.create_player(&tenant, "p1").await.unwrap();
        assert!(repo.player_name(&player).await.unwrap().is_none());

        let first = repo.set_player_name(&player, "First").await.unwrap();
        repo.set_player_name(&player, "Second").await.unwrap();

        let current = repo.player_name(&player).await.unwrap().unwrap();
        assert_eq!(current.fact.value, "Second");
        assert_eq!(current.fact.prior, vec![first]);
    }

    #[tokio::test]
    async fn leaving_removes_join_from_active_set() {
        let (repo, tenant) = repository().await;
        let player = repo.create_player(&tenant, "p1").await.unwrap();
        let playground = repo.create_playground(&tenant, "ABCDEF").await.unwrap();

        let join = repo.join(&player, &playground.hash).await.unwrap();
        assert_eq!(repo.active_joins(&playground.hash).await.unwrap().len(), 1);

        repo.leave(&join.hash).await.unwrap();
        assert!(repo.active_joins(&playground.hash).await.unwrap().is_empty());
        assert!(
            repo.active_join_of(&player, &playground.hash)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn accepted_or_rejected_challenges_are_not_pending() {
        let (repo, tenant) = repository().await;
        let playground = repo.create_playground(&tenant, "ABCDEF").await.unwrap();
        let alice = repo.create_player(&tenant, "alice").await.unwrap();
        let bob = repo.create_player(&tenant, "bob").await.unwrap();
        let alice_join = repo.join(&alice, &playground.hash).await.unwrap();
        let bob_join = repo.join(&bob, &playground.hash).await.unwrap();

        let first = repo
            .challenge(&alice_join.hash, &bob_join.hash, true)
            .await
            .unwrap();
        let second = repo
            .challenge(&alice_join.hash, &bob_join.hash, false)
            .await
            .unwrap();
        assert_eq!(
            repo.pending_challenges_for(&bob_join.hash).await.unwrap().len(),
            2
        );
        assert!(
            repo.pending_challenges_for(&alice_join.hash)
                .await
                .unwrap()
                .is_empty()
        );

        repo.reject(&first.hash).await.unwrap();
        repo.start_game(&second.hash).await.unwrap();
        assert!(
            repo.pending_challenges_for(&bob_join.hash)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
