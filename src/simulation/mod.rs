//! Live match simulation modules

pub mod config;
pub mod generator;
pub mod manager;
pub mod state;
pub mod stats;
pub mod supervisor;

pub use config::SimulationConfig;
pub use manager::{SimulationError, SimulationManager, StartRequest};
pub use state::MatchSnapshot;
pub use stats::StatisticsAggregator;

use crate::ws::protocol::{MatchId, ServerMsg};

/// Fan-out used by supervisors. Delivery failures are absorbed by the implementation.
pub trait MatchBroadcast: Send + Sync {
    fn broadcast(&self, match_id: MatchId, msg: ServerMsg);
}
