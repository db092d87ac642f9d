use std::collections::HashSet;

use rand::{Rng, rng, seq::IndexedRandom};

/// Names handed out to players who have not picked one.
pub const GAMING_NAMES: &[&str] = &[
    "ShadowStrike",
    "PixelPirate",
    "NeonNinja",
    "CosmicCaptain",
    "ThunderBolt",
    "FrostByte",
    "BlazeRunner",
    "IronFleet",
    "StormChaser",
    "LunarLancer",
    "QuantumQuill",
    "RogueRanger",
    "VortexViper",
    "CrimsonComet",
    "SilentSonar",
    "TidalTitan",
    "EchoAdmiral",
    "NovaNavigator",
    "GhostGunner",
    "ApexArcher",
    "DriftDragon",
    "ZenithZephyr",
    "MysticMariner",
    "OrbitOutlaw",
];

/// Hands out gaming names without repeating one until every name has been used.
///
/// Once the pool is exhausted the generator starts over and names may repeat.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    pool: &'static [&'static str],
    used: HashSet<&'static str>,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new(GAMING_NAMES)
    }
}

impl NameGenerator {
    /// Build a generator drawing from `pool`.
    pub fn new(pool: &'static [&'static str]) -> Self {
        Self {
            pool,
            used: HashSet::new(),
        }
    }

    /// Pick a random name not handed out since the last reset.
    pub fn generate_gaming_name(&mut self) -> String {
        self.generate_with(&mut rng())
    }

    /// Same as [`Self::generate_gaming_name`] with a caller supplied RNG.
    pub fn generate_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        if self.remaining() == 0 {
            self.reset();
        }

        let available: Vec<&'static str> = self
            .pool
            .iter()
            .copied()
            .filter(|name| !self.used.contains(name))
            .collect();

        match available.choose(rng) {
            Some(&name) => {
                self.used.insert(name);
                name.to_owned()
            }
            None => format!("Player{}", rng.random_range(1000..10000)),
        }
    }

    /// Forget every name handed out so far.
    pub fn reset(&mut self) {
        self.used.clear();
    }

    /// Names still available before the pool resets.
    pub fn remaining(&self) -> usize {
        self.pool.len() - self.used.len()
    }
}
