//! LLM-driven Pokemon Showdown battle agent.
//!
//! Each battle runs as its own [`BattleTask`]: the task folds the battle's
//! event stream into a [`pokellm_battle::BattleTracker`], asks the
//! [`DecisionEngine`] for an action whenever the server wants one, and
//! hands the answer to an [`ActionSubmitter`] that guarantees a single,
//! legal, on-time choice per request. The [`Bot`] handler finds battles
//! and spawns the tasks.

pub mod battle_task;
pub mod bot;
pub mod config;
pub mod engine;
pub mod filter;
pub mod inference;
pub mod ollama;
pub mod parse;
pub mod prompt;
pub mod submitter;

#[cfg(test)]
mod testing;

pub use battle_task::{BattleConfig, BattleOutcome, BattleTask, Phase};
pub use bot::{Bot, Lobby, Mode};
pub use config::AgentConfig;
pub use engine::{
    DecisionEngine, DecisionFailure, DecisionRequest, DecisionResult, DecisionSource,
    EngineConfig, HistoryEntry,
};
pub use inference::{InferenceBackend, InferenceError, InferencePool, InferenceRequest};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use submitter::{ActionSubmitter, BattleSink, SubmitError, Submission};
