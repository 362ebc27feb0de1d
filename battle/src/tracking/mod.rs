//! Battle state tracking from server messages

mod state;
mod tracker;
mod updater;

pub use state::{BattleState, Effectiveness, Matchup, player_to_index, position_to_slot};
pub use tracker::{BattleTracker, TrackerError, TrackerSnapshot, Update};
pub use updater::parse_timer_seconds;
