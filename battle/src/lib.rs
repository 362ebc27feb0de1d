//! Battle state tracking for Pokemon Showdown.
//!
//! # Overview
//!
//! `pokellm-battle` sits between `pokellm-protocol` (wire format) and the
//! agent that plays:
//!
//! ```text
//! pokellm-protocol (wire format)
//!        │
//!        ▼
//! pokellm-battle (domain types + tracking) ← THIS CRATE
//!        │
//!        ├─> pokellm-client (sequences battle-log lines into Updates)
//!        └─> pokellm-agent (decides from BattleState snapshots)
//! ```
//!
//! # Main Types
//!
//! - [`BattleTracker`] - applies sequenced [`Update`]s and requests, rejecting
//!   gaps and inconsistent messages without touching the state
//! - [`BattleState`] - immutable snapshot handed out as `Arc<BattleState>`
//! - [`LegalActionSet`] - what we may do for the current request
//! - [`PokemonState`], [`SideState`], [`FieldState`] - per-Pokemon, per-side
//!   and global conditions
//!
//! # Example Usage
//!
//! ```ignore
//! use pokellm_battle::{BattleTracker, Update};
//!
//! let mut tracker = BattleTracker::new();
//! match tracker.apply(&update) {
//!     Ok(state) => println!("turn {}", state.turn),
//!     Err(e) => println!("resync needed: {}", e),
//! }
//! ```

pub mod actions;
pub mod tracking;
pub mod types;

pub use actions::{LegalAction, LegalActionSet, normalize_label};
pub use tracking::{
    BattleState, BattleTracker, Effectiveness, Matchup, TrackerError, TrackerSnapshot, Update,
    parse_timer_seconds, player_to_index, position_to_slot,
};
pub use types::{
    FieldState, PokemonState, SideCondition, SideState, StatStages, Status, Terrain, Volatile,
    Weather,
};

pub use pokellm_protocol::{GameType, Player, Stat};
