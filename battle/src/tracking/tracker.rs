//! BattleTracker - sequenced, all-or-nothing updates to a BattleState

use std::sync::Arc;

use pokellm_protocol::{BattleRequest, ServerMessage};
use thiserror::Error;
use tracing::{debug, warn};

use super::state::BattleState;
use crate::actions::LegalActionSet;

/// One battle-log message with its position in the room's log
///
/// Sequence numbers start at 0 when the battle room is (re)initialized and
/// increase by one per battle-log line.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub seq: u64,
    pub message: ServerMessage,
}

impl Update {
    pub fn new(seq: u64, message: ServerMessage) -> Self {
        Self { seq, message }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("sequence gap: expected update {expected}, received {received}")]
    SequenceGap { expected: u64, received: u64 },

    #[error("update {seq} is inconsistent with tracked state: {reason}")]
    MalformedUpdate { seq: u64, reason: String },
}

/// A saved copy of the tracker, for restoring after a failed resync
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    state: Arc<BattleState>,
    last_seq: Option<u64>,
}

/// Owns the authoritative state of one battle.
///
/// Every applied update produces a new `Arc<BattleState>`; readers holding
/// an earlier snapshot keep seeing it unchanged. A rejected update leaves
/// the state exactly as it was.
#[derive(Debug, Clone, Default)]
pub struct BattleTracker {
    state: Arc<BattleState>,
    last_seq: Option<u64>,
}

impl BattleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state snapshot
    pub fn state(&self) -> Arc<BattleState> {
        Arc::clone(&self.state)
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Sequence number the next update must carry
    pub fn expected_seq(&self) -> u64 {
        self.last_seq.map_or(0, |seq| seq + 1)
    }

    /// Apply one update.
    ///
    /// Re-delivery of an already applied sequence number is a no-op that
    /// returns the current state.
    pub fn apply(&mut self, update: &Update) -> Result<Arc<BattleState>, TrackerError> {
        if self.last_seq.is_some_and(|last| update.seq <= last) {
            debug!(seq = update.seq, "Ignoring duplicate update");
            return Ok(self.state());
        }

        let expected = self.expected_seq();
        if update.seq != expected {
            return Err(TrackerError::SequenceGap {
                expected,
                received: update.seq,
            });
        }

        let mut next = (*self.state).clone();
        next.apply_message(&update.message)
            .map_err(|reason| TrackerError::MalformedUpdate {
                seq: update.seq,
                reason,
            })?;
        refresh_legal_actions(&mut next);

        self.state = Arc::new(next);
        self.last_seq = Some(update.seq);
        Ok(self.state())
    }

    /// Apply a decision request. Requests are not part of the numbered log.
    pub fn apply_request(&mut self, request: BattleRequest) -> Arc<BattleState> {
        let state = Arc::make_mut(&mut self.state);
        state.apply_request(request);
        refresh_legal_actions(state);
        self.state()
    }

    /// Apply an `|inactive|` (timer on) or `|inactiveoff|` notice
    pub fn apply_timer(&mut self, message: &str, on: bool) -> Arc<BattleState> {
        let state = Arc::make_mut(&mut self.state);
        if on {
            state.apply_timer(message);
        } else {
            state.clear_timer();
        }
        self.state()
    }

    /// Give up on the update at `seq` and continue from the one after it
    pub fn skip(&mut self, seq: u64) {
        warn!(seq, "Skipping battle update");
        self.last_seq = Some(seq);
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            state: self.state(),
            last_seq: self.last_seq,
        }
    }

    pub fn restore(&mut self, snapshot: TrackerSnapshot) {
        self.state = snapshot.state;
        self.last_seq = snapshot.last_seq;
    }

    /// Start over before a full replay of the battle log.
    ///
    /// The latest request is kept: the server does not resend it on rejoin
    /// unless a decision is still pending.
    pub fn reset(&mut self) {
        let request = self.state.request.clone();
        let mut fresh = BattleState::new();
        if let Some(player) = self.state.perspective() {
            fresh.set_perspective(player);
        }
        self.state = Arc::new(fresh);
        self.last_seq = None;
        if let Some(request) = request {
            self.apply_request(request);
        }
    }
}

fn refresh_legal_actions(state: &mut BattleState) {
    state.legal_actions = LegalActionSet::from_state(state);
}
