//! Decision engine: one legal action per request, or a reason there is none
//!
//! The engine never trusts the model. Every answer is parsed against the
//! candidate labels, bad answers get one corrective re-prompt, and the whole
//! exchange runs under the decision deadline.

use std::sync::Arc;

use pokellm_battle::{BattleState, LegalAction, LegalActionSet};
use pokellm_client::RoomId;
use thiserror::Error;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::filter::prune;
use crate::inference::{InferencePool, InferenceRequest};
use crate::parse::parse_answer;
use crate::prompt::{
    SYSTEM_PROMPT, action_schema, build_switch_prompt, build_turn_prompt, corrective_prompt,
};

/// A past decision in this battle, newest last
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub turn: u32,
    pub label: String,
    /// A switch picked while a move was available
    pub voluntary_switch: bool,
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Model,
    /// Only one legal action; no inference was made
    Forced,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionFailure {
    #[error("inference timed out")]
    InferenceTimeout,

    #[error("unparseable answer: {0}")]
    InferenceUnparseable(String),

    #[error("illegal action chosen: {0}")]
    IllegalActionChosen(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionResult {
    Chosen {
        action: LegalAction,
        source: DecisionSource,
        attempts: u32,
    },
    Failed {
        failure: DecisionFailure,
        attempts: u32,
    },
}

impl DecisionResult {
    pub fn attempts(&self) -> u32 {
        match self {
            DecisionResult::Chosen { attempts, .. } | DecisionResult::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Everything needed to decide one request, detached from the tracker
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub room: RoomId,
    pub state: Arc<BattleState>,
    pub actions: LegalActionSet,
    pub history: Vec<HistoryEntry>,
    pub deadline: Instant,
}

impl DecisionRequest {
    pub fn new(
        room: RoomId,
        state: Arc<BattleState>,
        history: Vec<HistoryEntry>,
        deadline: Instant,
    ) -> Self {
        let actions = state.legal_actions.clone();
        Self {
            room,
            state,
            actions,
            history,
            deadline,
        }
    }

    pub fn rqid(&self) -> Option<u64> {
        self.actions.rqid
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model calls per decision, corrective re-prompts included
    pub max_attempts: u32,
    /// Keep the model from switching out on the turn after a voluntary switch
    pub hold_after_switch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            hold_after_switch: true,
        }
    }
}

#[derive(Clone)]
pub struct DecisionEngine {
    pool: InferencePool,
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(pool: InferencePool, config: EngineConfig) -> Self {
        Self { pool, config }
    }

    pub async fn decide(&self, request: &DecisionRequest) -> DecisionResult {
        let room = request.room.as_str();
        let turn = request.actions.turn;

        if request.actions.is_empty() {
            return DecisionResult::Failed {
                failure: DecisionFailure::Backend("no legal actions".to_string()),
                attempts: 0,
            };
        }
        if request.actions.len() == 1
            && let Some(action) = request.actions.iter().next()
        {
            debug!(room, turn, action = %action.label(), "Single legal action");
            return DecisionResult::Chosen {
                action: action.clone(),
                source: DecisionSource::Forced,
                attempts: 0,
            };
        }

        let mut attempts = 0;
        let outcome = timeout_at(request.deadline, self.consult(request, &mut attempts)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(room, turn, attempts, "Decision deadline passed during inference");
                DecisionResult::Failed {
                    failure: DecisionFailure::InferenceTimeout,
                    attempts,
                }
            }
        }
    }

    async fn consult(&self, request: &DecisionRequest, attempts: &mut u32) -> DecisionResult {
        let room = request.room.as_str();
        let turn = request.actions.turn;

        let candidates = prune(
            &request.state,
            &request.actions,
            &request.history,
            self.config.hold_after_switch,
        );
        let base = if candidates.iter().all(LegalAction::is_switch) {
            build_switch_prompt(&request.state, &candidates)
        } else {
            build_turn_prompt(&request.state, &candidates, &request.history)
        };
        let schema = action_schema(&candidates.labels());

        let mut prompt = base.clone();
        let mut last_failure = DecisionFailure::Backend("no attempts made".to_string());

        while *attempts < self.config.max_attempts.max(1) {
            *attempts += 1;
            let inference = InferenceRequest {
                system: SYSTEM_PROMPT.to_string(),
                prompt: prompt.clone(),
                schema: schema.clone(),
            };

            let failure = match self.pool.generate(&inference).await {
                Ok(raw) => match parse_answer(&raw, &candidates, &request.actions) {
                    Ok(action) => {
                        info!(
                            room,
                            turn,
                            attempt = *attempts,
                            action = %action.label(),
                            "Model chose action"
                        );
                        return DecisionResult::Chosen {
                            action,
                            source: DecisionSource::Model,
                            attempts: *attempts,
                        };
                    }
                    Err(failure) => {
                        prompt = corrective_prompt(&base, &raw, &failure, &candidates);
                        failure
                    }
                },
                Err(e) => DecisionFailure::Backend(e.to_string()),
            };

            warn!(room, turn, attempt = *attempts, error = %failure, "Model answer rejected");
            last_failure = failure;
        }

        DecisionResult::Failed {
            failure: last_failure,
            attempts: *attempts,
        }
    }
}
