//! Synthetic players used to populate playgrounds during demos and load tests.

pub mod coordinator;
pub mod monitor;
pub mod names;
pub mod pool;
pub mod simulated_player;

pub use self::coordinator::{AutoJoinCoordinator, CoordinationOutcome, CoordinatorConfig};
pub use self::monitor::PlaygroundMonitor;
pub use self::names::NameGenerator;
pub use self::pool::PlayerPoolManager;
pub use self::simulated_player::{DefaultBehavior, PlayerBehavior, SimulatedPlayerService};
