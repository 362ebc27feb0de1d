use async_trait::async_trait;
use pokellm_protocol::ChallengeState;
use tokio::sync::mpsc;

use crate::room::RoomId;
use crate::state::BattleEvent;

/// Trait for reacting to client-level events.
///
/// All methods have default no-op implementations, so you only need to
/// implement the events you care about. Per-battle traffic does not pass
/// through here: each battle gets its own event channel in
/// [`Handler::on_battle_start`].
///
/// # Example
///
/// ```ignore
/// struct MyBot {
///     handle: ClientHandle,
/// }
///
/// #[async_trait]
/// impl Handler for MyBot {
///     async fn on_logged_in(&mut self, _username: &str) {
///         self.handle.search("gen9randombattle").ok();
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send {
    /// Called when the server sends a challenge string, after the client
    /// has started its own login if it holds credentials.
    async fn on_challstr(&mut self, challstr: &str) {
        let _ = challstr;
    }

    /// Called once the server confirms we are logged in
    async fn on_logged_in(&mut self, username: &str) {
        let _ = username;
    }

    async fn on_name_taken(&mut self, username: &str, message: &str) {
        let _ = (username, message);
    }

    /// Called when a new battle room is initialized. The receiver yields
    /// the battle's numbered log, requests and notices until it ends.
    async fn on_battle_start(&mut self, room: RoomId, events: mpsc::Receiver<BattleEvent>) {
        let _ = (room, events);
    }

    /// Called after the final event of a battle has been forwarded
    async fn on_battle_end(&mut self, room: &RoomId) {
        let _ = room;
    }

    async fn on_challenges(&mut self, challenges: &ChallengeState) {
        let _ = challenges;
    }

    async fn on_popup(&mut self, message: &str) {
        let _ = message;
    }

    /// Called when a dropped connection has been re-established, before
    /// logging in again
    async fn on_reconnected(&mut self) {}
}
