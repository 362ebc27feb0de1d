use std::sync::Arc;

use pokellm_protocol::{ClientCommand, ClientMessage};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{Result, TransportError};
use crate::room::RoomId;
use crate::state::{ClientState, UserInfo};

/// What the client loop writes to the socket
#[derive(Debug)]
pub(crate) enum Outgoing {
    Message(ClientMessage),
    Close,
}

/// Cloneable handle for sending commands through a running [`crate::Client`].
///
/// Sends are fire-and-forget: commands queue until the socket is up.
#[derive(Clone)]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<Outgoing>,
    state: Arc<ClientState>,
}

impl ClientHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Outgoing>, state: Arc<ClientState>) -> Self {
        Self { tx, state }
    }

    pub fn send(&self, msg: ClientMessage) -> Result<()> {
        self.tx
            .send(Outgoing::Message(msg))
            .map_err(|_| TransportError::Closed)
    }

    fn send_global(&self, command: ClientCommand) -> Result<()> {
        self.send(ClientMessage::global(command))
    }

    fn send_in(&self, room: &RoomId, command: ClientCommand) -> Result<()> {
        self.send(ClientMessage::in_room(room.as_str(), command))
    }

    pub(crate) fn login(&self, username: &str, assertion: String) -> Result<()> {
        self.send_global(ClientCommand::TrustedLogin {
            username: username.to_string(),
            assertion,
        })
    }

    pub fn join_room(&self, room: &RoomId) -> Result<()> {
        self.send_global(ClientCommand::JoinRoom(room.to_string()))
    }

    pub fn leave_room(&self, room: &RoomId) -> Result<()> {
        self.send_global(ClientCommand::LeaveRoom(room.to_string()))
    }

    /// Search for a ladder battle. Random formats need no team.
    pub fn search(&self, format: &str) -> Result<()> {
        self.send_global(ClientCommand::UpdateTeam(None))?;
        self.send_global(ClientCommand::Search(format.to_string()))
    }

    pub fn accept_challenge(&self, username: &str) -> Result<()> {
        self.send_global(ClientCommand::UpdateTeam(None))?;
        self.send_global(ClientCommand::AcceptChallenge(username.to_string()))
    }

    pub fn choose(&self, room: &RoomId, choice: &str, rqid: Option<u64>) -> Result<()> {
        self.send_in(
            room,
            ClientCommand::Choose {
                choice: choice.to_string(),
                rqid,
            },
        )
    }

    /// Leave and rejoin a battle so the server replays its whole log.
    ///
    /// The battle stays registered; its log counter restarts when the
    /// server re-sends `|init|battle`.
    pub fn resync(&self, room: &RoomId) -> Result<()> {
        if !self.state.battles.mark_resyncing(room) {
            return Ok(());
        }
        info!(room = %room, "Resyncing battle");
        self.leave_room(room)?;
        self.join_room(room)
    }

    /// Stop the client loop
    pub fn close(&self) -> Result<()> {
        self.tx.send(Outgoing::Close).map_err(|_| TransportError::Closed)
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.is_logged_in()
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.state.user()
    }

    pub fn battles(&self) -> Vec<RoomId> {
        self.state.battles.rooms()
    }

    pub fn in_battle(&self, room: &RoomId) -> bool {
        self.state.battles.contains(room)
    }
}
