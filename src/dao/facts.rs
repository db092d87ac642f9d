//! Immutable fact types shared by the player-facing and administrative surfaces.
//!
//! Every fact is content addressed: its [`FactHash`] is derived from the canonical JSON
//! encoding, so writing the same fact twice always resolves to the same record.

use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use utoipa::ToSchema;

use crate::dao::storage::StorageResult;

/// Stable identifier of a fact (hex encoded blake3 digest of its canonical form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FactHash(String);

impl FactHash {
    /// Wrap an already computed digest, e.g. one received from a client.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tenant namespace all other facts hang off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub public_key: String,
}

/// A player identity inside a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub tenant: FactHash,
    pub public_key: String,
}

/// Display name of a player; `prior` lists the names this one supersedes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerName {
    pub player: FactHash,
    pub value: String,
    pub prior: Vec<FactHash>,
}

/// Multiplayer lobby identified by a six letter code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playground {
    pub tenant: FactHash,
    pub code: String,
    pub created_at: String,
}

/// Membership of a player in a playground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub player: FactHash,
    pub playground: FactHash,
    pub joined_at: String,
}

/// Ends a [`Join`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    pub join: FactHash,
    pub left_at: String,
}

/// Proposal of a game between two joined players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenger_join: FactHash,
    pub opponent_join: FactHash,
    pub challenger_starts: bool,
    pub created_at: String,
}

/// Declines a [`Challenge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub challenge: FactHash,
    pub rejected_at: String,
}

/// A game started from an accepted challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub challenge: FactHash,
    pub created_at: String,
}

/// A single tic-tac-toe move. `index` is the zero-based turn number and
/// `position` the board cell (0-8, row major).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub game: FactHash,
    pub index: u32,
    pub position: u32,
}

/// Every fact type known to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Fact {
    Tenant(Tenant),
    Player(Player),
    PlayerName(PlayerName),
    Playground(Playground),
    Join(Join),
    Leave(Leave),
    Challenge(Challenge),
    Reject(Reject),
    Game(Game),
    Move(Move),
}

impl Fact {
    /// Short type name used in logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Fact::Tenant(_) => "Tenant",
            Fact::Player(_) => "Player",
            Fact::PlayerName(_) => "PlayerName",
            Fact::Playground(_) => "Playground",
            Fact::Join(_) => "Join",
            Fact::Leave(_) => "Leave",
            Fact::Challenge(_) => "Challenge",
            Fact::Reject(_) => "Reject",
            Fact::Game(_) => "Game",
            Fact::Move(_) => "Move",
        }
    }

    /// Hashes of the facts this one points at.
    pub fn predecessors(&self) -> Vec<&FactHash> {
        match self {
            Fact::Tenant(_) => Vec::new(),
            Fact::Player(player) => vec![&player.tenant],
            Fact::PlayerName(name) => {
                let mut refs = vec![&name.player];
                refs.extend(name.prior.iter());
                refs
            }
            Fact::Playground(playground) => vec![&playground.tenant],
            Fact::Join(join) => vec![&join.player, &join.playground],
            Fact::Leave(leave) => vec![&leave.join],
            Fact::Challenge(challenge) => {
                vec![&challenge.challenger_join, &challenge.opponent_join]
            }
            Fact::Reject(reject) => vec![&reject.challenge],
            Fact::Game(game) => vec![&game.challenge],
            Fact::Move(mv) => vec![&mv.game],
        }
    }
}

/// Compute the content hash of a fact from its canonical JSON form.
pub fn hash(fact: &Fact) -> StorageResult<FactHash> {
    let bytes = serde_json::to_vec(fact)?;
    Ok(FactHash(blake3::hash(&bytes).to_hex().to_string()))
}

/// A fact together with its hash, as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRecord {
    pub hash: FactHash,
    pub fact: Fact,
}

macro_rules! record_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        /// Borrow the payload when the record holds this fact type.
        pub fn $name(&self) -> Option<&$ty> {
            match &self.fact {
                Fact::$variant(inner) => Some(inner),
                _ => None,
            }
        }
    };
}

impl FactRecord {
    record_accessor!(as_player, Player, Player);
    record_accessor!(as_player_name, PlayerName, PlayerName);
    record_accessor!(as_playground, Playground, Playground);
    record_accessor!(as_join, Join, Join);
    record_accessor!(as_challenge, Challenge, Challenge);
    record_accessor!(as_game, Game, Game);
    record_accessor!(as_move, Move, Move);
}

/// Current wall clock formatted as RFC 3339, used for fact timestamps.
pub fn now_timestamp() -> String {
    format_system_time(SystemTime::now())
}

/// Format a [`SystemTime`] as RFC 3339.
pub fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
