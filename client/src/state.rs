use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use pokellm_battle::Update;
use pokellm_protocol::{BattleRequest, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::room::RoomId;

/// Information about the currently logged-in user
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub username: String,
    pub logged_in: bool,
    pub avatar: String,
}

/// What a battle task receives for its room
#[derive(Debug, Clone)]
pub enum BattleEvent {
    /// A battle-log line with its sequence number
    Update(Update),
    /// A decision request; not part of the numbered log
    Request(Box<BattleRequest>),
    /// `|inactive|` (`on`) or `|inactiveoff|` notice
    Timer { message: String, on: bool },
    /// `|error|` in the battle room, usually a rejected choice
    Error(String),
}

struct BattleEntry {
    events: mpsc::Sender<BattleEvent>,
    next_seq: u64,
    resyncing: bool,
}

/// Open battles by room, each with its event channel and log counter
#[derive(Default)]
pub struct BattleRegistry {
    battles: RwLock<HashMap<RoomId, BattleEntry>>,
}

impl BattleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a battle on `|init|battle`.
    ///
    /// Returns the event receiver for a new battle. For a battle already
    /// registered (a rejoin) the log counter restarts at 0, since the server
    /// replays the whole log, and `None` is returned.
    pub(crate) fn open(
        &self,
        room: &RoomId,
        capacity: usize,
    ) -> Option<mpsc::Receiver<BattleEvent>> {
        let Ok(mut battles) = self.battles.write() else {
            return None;
        };
        if let Some(entry) = battles.get_mut(room) {
            debug!(room = %room, "Battle re-initialized, restarting log sequence");
            entry.next_seq = 0;
            entry.resyncing = false;
            return None;
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));
        battles.insert(
            room.clone(),
            BattleEntry {
                events: tx,
                next_seq: 0,
                resyncing: false,
            },
        );
        Some(rx)
    }

    /// Number and forward a battle-log message. Returns `false` when the
    /// room is not a registered battle.
    pub(crate) fn push_update(&self, room: &RoomId, message: ServerMessage) -> bool {
        let Ok(mut battles) = self.battles.write() else {
            return false;
        };
        let Some(entry) = battles.get_mut(room) else {
            return false;
        };
        let seq = entry.next_seq;
        entry.next_seq += 1;
        deliver(room, &entry.events, BattleEvent::Update(Update::new(seq, message)));
        true
    }

    /// Forward a side-channel event. Returns `false` when the room is not a
    /// registered battle.
    pub(crate) fn push_event(&self, room: &RoomId, event: BattleEvent) -> bool {
        let Ok(battles) = self.battles.read() else {
            return false;
        };
        match battles.get(room) {
            Some(entry) => {
                deliver(room, &entry.events, event);
                true
            }
            None => false,
        }
    }

    /// Flag a battle as leaving and rejoining, so its `|deinit|` does not end it
    pub(crate) fn mark_resyncing(&self, room: &RoomId) -> bool {
        let Ok(mut battles) = self.battles.write() else {
            return false;
        };
        match battles.get_mut(room) {
            Some(entry) => {
                entry.resyncing = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_resyncing(&self, room: &RoomId) -> bool {
        self.battles
            .read()
            .map(|b| b.get(room).is_some_and(|e| e.resyncing))
            .unwrap_or(false)
    }

    /// Drop a battle; its event channel closes once buffered events drain
    pub(crate) fn remove(&self, room: &RoomId) -> bool {
        self.battles
            .write()
            .map(|mut b| b.remove(room).is_some())
            .unwrap_or(false)
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.battles
            .read()
            .map(|b| b.contains_key(room))
            .unwrap_or(false)
    }

    pub fn rooms(&self) -> Vec<RoomId> {
        self.battles
            .read()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.battles.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A full channel drops the event; the battle task sees the resulting
/// sequence gap and resyncs.
fn deliver(room: &RoomId, events: &mpsc::Sender<BattleEvent>, event: BattleEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(room = %room, "Battle event channel full, dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(room = %room, "Battle task gone, dropping event");
        }
    }
}

/// State shared between the client loop and its handles
pub(crate) struct ClientState {
    pub battles: BattleRegistry,
    pub logged_in: AtomicBool,
    pub user: RwLock<Option<UserInfo>>,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            battles: BattleRegistry::new(),
            logged_in: AtomicBool::new(false),
            user: RwLock::new(None),
        }
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::Relaxed);
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Relaxed)
    }

    pub fn set_user(&self, user: UserInfo) {
        if let Ok(mut current) = self.user.write() {
            *current = Some(user);
        }
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.user.read().ok()?.clone()
    }
}
