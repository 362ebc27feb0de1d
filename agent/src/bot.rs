//! Lobby behaviour: find battles and hand each one to its own task

use std::sync::Arc;

use async_trait::async_trait;
use pokellm_client::{BattleEvent, ClientHandle, Handler, RoomId, TransportError};
use pokellm_protocol::{ChallengeState, to_id};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::battle_task::{BattleConfig, BattleOutcome, BattleTask};
use crate::engine::DecisionEngine;
use crate::submitter::BattleSink;

/// Lobby commands the bot needs
pub trait Lobby: Send + Sync {
    fn search(&self, format: &str) -> Result<(), TransportError>;
    fn accept_challenge(&self, username: &str) -> Result<(), TransportError>;
    fn leave_room(&self, room: &RoomId) -> Result<(), TransportError>;
    fn close(&self) -> Result<(), TransportError>;
}

impl Lobby for ClientHandle {
    fn search(&self, format: &str) -> Result<(), TransportError> {
        ClientHandle::search(self, format)
    }

    fn accept_challenge(&self, username: &str) -> Result<(), TransportError> {
        ClientHandle::accept_challenge(self, username)
    }

    fn leave_room(&self, room: &RoomId) -> Result<(), TransportError> {
        ClientHandle::leave_room(self, room)
    }

    fn close(&self) -> Result<(), TransportError> {
        ClientHandle::close(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Search the ladder in `format`
    Ladder { format: String },
    /// Accept challenges from one user
    Accept { from: String },
}

pub struct Bot<L> {
    lobby: Arc<L>,
    engine: DecisionEngine,
    battle_config: BattleConfig,
    mode: Mode,
    /// Battles to play before closing the client
    battles: u32,
    started: u32,
    finished: u32,
    searching: bool,
    tasks: JoinSet<BattleOutcome>,
}

impl<L> Bot<L>
where
    L: Lobby + BattleSink + 'static,
{
    pub fn new(
        lobby: Arc<L>,
        engine: DecisionEngine,
        battle_config: BattleConfig,
        mode: Mode,
        battles: u32,
    ) -> Self {
        Self {
            lobby,
            engine,
            battle_config,
            mode,
            battles,
            started: 0,
            finished: 0,
            searching: false,
            tasks: JoinSet::new(),
        }
    }

    /// Wait for running battles and collect their outcomes
    pub async fn finish(mut self) -> Vec<BattleOutcome> {
        let mut outcomes = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "Battle task failed"),
            }
        }
        outcomes
    }

    fn wants_more(&self) -> bool {
        self.started < self.battles
    }

    fn search_if_needed(&mut self) {
        let Mode::Ladder { format } = &self.mode else {
            return;
        };
        if self.searching || !self.wants_more() {
            return;
        }
        match self.lobby.search(format) {
            Ok(()) => {
                info!(format = %format, "Searching for a battle");
                self.searching = true;
            }
            Err(e) => warn!(error = %e, "Could not search"),
        }
    }
}

#[async_trait]
impl<L> Handler for Bot<L>
where
    L: Lobby + BattleSink + 'static,
{
    async fn on_logged_in(&mut self, username: &str) {
        info!(username, "Logged in");
        match &self.mode {
            Mode::Ladder { .. } => self.search_if_needed(),
            Mode::Accept { from } => info!(from = %from, "Waiting for challenges"),
        }
    }

    async fn on_name_taken(&mut self, username: &str, message: &str) {
        error!(username, message, "Login rejected");
    }

    async fn on_battle_start(&mut self, room: RoomId, events: mpsc::Receiver<BattleEvent>) {
        self.started += 1;
        self.searching = false;
        info!(room = %room, number = self.started, "Joined battle");

        let task = BattleTask::new(
            room,
            events,
            self.engine.clone(),
            Arc::clone(&self.lobby),
            self.battle_config.clone(),
        );
        self.tasks.spawn(task.run());
    }

    async fn on_battle_end(&mut self, room: &RoomId) {
        self.finished += 1;
        if let Err(e) = self.lobby.leave_room(room) {
            warn!(room = %room, error = %e, "Could not leave battle room");
        }

        if self.wants_more() {
            self.search_if_needed();
        } else if self.finished >= self.battles {
            info!(battles = self.finished, "Played every battle, closing");
            if let Err(e) = self.lobby.close() {
                warn!(error = %e, "Could not close client");
            }
        }
    }

    async fn on_challenges(&mut self, challenges: &ChallengeState) {
        let Mode::Accept { from } = &self.mode else {
            return;
        };
        if !self.wants_more() {
            return;
        }
        for (challenger, format) in &challenges.challenges_from {
            if to_id(challenger) != to_id(from) {
                continue;
            }
            info!(challenger = %challenger, format = %format, "Accepting challenge");
            if let Err(e) = self.lobby.accept_challenge(challenger) {
                warn!(error = %e, "Could not accept challenge");
            }
        }
    }

    async fn on_popup(&mut self, message: &str) {
        info!(message, "Server popup");
    }

    async fn on_reconnected(&mut self) {
        // searches do not survive a dropped connection
        self.searching = false;
    }
}
