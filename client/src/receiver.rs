use std::sync::Arc;
use std::time::Duration;

use pokellm_protocol::{RoomType, ServerFrame, ServerMessage, to_id};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::{self, Credentials};
use crate::error::{Result, TransportError};
use crate::handle::ClientHandle;
use crate::handler::Handler;
use crate::room::RoomId;
use crate::state::{BattleEvent, ClientState, UserInfo};

const LOGIN_RETRY_DELAY: Duration = Duration::from_secs(10);
const MAX_LOGIN_RETRY_DELAY: Duration = Duration::from_secs(120);

/// A challstr whose login failed because the login server was unreachable
#[derive(Debug)]
struct PendingLogin {
    challstr: String,
    failures: u32,
    retry_at: Instant,
}

/// Routes server frames: global messages to the handler, battle traffic to
/// the registered battle's channel.
pub(crate) struct Receiver {
    state: Arc<ClientState>,
    handle: ClientHandle,
    credentials: Option<Credentials>,
    login_url: String,
    channel_capacity: usize,
    rejoin_pending: bool,
    pending_login: Option<PendingLogin>,
}

impl Receiver {
    pub(crate) fn new(
        state: Arc<ClientState>,
        handle: ClientHandle,
        credentials: Option<Credentials>,
        login_url: String,
        channel_capacity: usize,
    ) -> Self {
        Self {
            state,
            handle,
            credentials,
            login_url,
            channel_capacity,
            rejoin_pending: false,
            pending_login: None,
        }
    }

    /// A new socket has no login and no rooms: log in again on the next
    /// challstr and rejoin every open battle once logged in.
    pub(crate) async fn on_reconnected<H: Handler>(&mut self, handler: &mut H) {
        self.state.set_logged_in(false);
        self.rejoin_pending = true;
        // the new socket sends its own challstr
        self.pending_login = None;
        handler.on_reconnected().await;
    }

    /// When to try the last failed login again, if one is waiting
    pub(crate) fn login_retry_at(&self) -> Option<Instant> {
        self.pending_login.as_ref().map(|p| p.retry_at)
    }

    pub(crate) async fn retry_login(&mut self) -> Result<()> {
        let Some(challstr) = self.pending_login.as_ref().map(|p| p.challstr.clone()) else {
            return Ok(());
        };
        self.login(challstr).await
    }

    /// Log in with `challstr`. An unreachable login server is not fatal: the
    /// attempt is rescheduled with a growing delay.
    async fn login(&mut self, challstr: String) -> Result<()> {
        let Some(credentials) = &self.credentials else {
            return Ok(());
        };
        info!(username = %credentials.username, "Logging in");

        match auth::get_assertion(&self.login_url, credentials, &challstr).await {
            Ok(assertion) => {
                self.pending_login = None;
                self.handle.login(&credentials.username, assertion)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let failures = self.pending_login.as_ref().map_or(0, |p| p.failures) + 1;
                let delay = LOGIN_RETRY_DELAY
                    .saturating_mul(failures)
                    .min(MAX_LOGIN_RETRY_DELAY);
                warn!(error = %e, failures, retry_in = ?delay, "Login failed, will retry");
                self.pending_login = Some(PendingLogin {
                    challstr,
                    failures,
                    retry_at: Instant::now() + delay,
                });
                Ok(())
            }
        }
    }

    pub(crate) async fn dispatch_frame<H: Handler>(
        &mut self,
        handler: &mut H,
        frame: ServerFrame,
    ) -> Result<()> {
        let room = frame
            .room_id
            .filter(|r| !r.is_empty())
            .map(RoomId::from);

        for msg in frame.messages {
            self.dispatch_message(handler, room.as_ref(), msg).await?;
        }
        Ok(())
    }

    async fn dispatch_message<H: Handler>(
        &mut self,
        handler: &mut H,
        room: Option<&RoomId>,
        msg: ServerMessage,
    ) -> Result<()> {
        match msg {
            ServerMessage::Challstr(challstr) => {
                self.pending_login = None;
                self.login(challstr.clone()).await?;
                handler.on_challstr(&challstr).await;
            }

            ServerMessage::UpdateUser {
                user,
                named,
                avatar,
            } => {
                self.state.set_user(UserInfo {
                    username: user.username.clone(),
                    logged_in: named,
                    avatar,
                });
                let ours = self
                    .credentials
                    .as_ref()
                    .is_none_or(|c| to_id(&c.username) == user.id());
                if named && ours && !self.state.is_logged_in() {
                    self.state.set_logged_in(true);
                    info!(username = %user.username, "Logged in");
                    if self.rejoin_pending {
                        self.rejoin_battles()?;
                    }
                    handler.on_logged_in(&user.username).await;
                }
            }

            ServerMessage::NameTaken { username, message } => {
                handler.on_name_taken(&username, &message).await;
                if self.credentials.is_some() {
                    return Err(TransportError::AuthenticationRejected(message));
                }
            }

            ServerMessage::Popup(message) => handler.on_popup(&message).await,
            ServerMessage::UpdateChallenges(challenges) => {
                handler.on_challenges(&challenges).await
            }

            other => {
                if let Some(room) = room {
                    self.dispatch_room(handler, room, other).await;
                }
            }
        }
        Ok(())
    }

    async fn dispatch_room<H: Handler>(&mut self, handler: &mut H, room: &RoomId, msg: ServerMessage) {
        let battles = &self.state.battles;

        match msg {
            ServerMessage::Init(RoomType::Battle) => {
                if let Some(events) = battles.open(room, self.channel_capacity) {
                    info!(room = %room, "Battle started");
                    handler.on_battle_start(room.clone(), events).await;
                }
            }

            ServerMessage::DeInit => {
                if battles.is_resyncing(room) {
                    debug!(room = %room, "Left battle for resync");
                } else if battles.remove(room) {
                    info!(room = %room, "Battle room closed");
                    handler.on_battle_end(room).await;
                }
            }

            ServerMessage::NoInit { reason, message } => {
                warn!(room = %room, reason = %reason, message = %message, "Could not join room");
                if battles.remove(room) {
                    handler.on_battle_end(room).await;
                }
            }

            ServerMessage::Request(request) => {
                battles.push_event(room, BattleEvent::Request(request));
            }

            ServerMessage::Error(message) => {
                battles.push_event(room, BattleEvent::Error(message));
            }

            ServerMessage::Inactive(message) => {
                battles.push_event(room, BattleEvent::Timer { message, on: true });
            }

            ServerMessage::InactiveOff(message) => {
                battles.push_event(room, BattleEvent::Timer { message, on: false });
            }

            msg if msg.is_battle_log() => {
                let terminal = msg.is_terminal();
                if battles.push_update(room, msg) && terminal {
                    battles.remove(room);
                    info!(room = %room, "Battle finished");
                    handler.on_battle_end(room).await;
                }
            }

            _ => {}
        }
    }

    fn rejoin_battles(&mut self) -> Result<()> {
        self.rejoin_pending = false;
        for room in self.state.battles.rooms() {
            info!(room = %room, "Rejoining battle after reconnect");
            self.state.battles.mark_resyncing(&room);
            self.handle.join_room(&room)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Outgoing;
    use async_trait::async_trait;
    use pokellm_protocol::parse_server_frame;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        started: Vec<(RoomId, mpsc::Receiver<BattleEvent>)>,
        ended: Vec<RoomId>,
        logged_in: Vec<String>,
        reconnects: usize,
    }

    #[async_trait]
    impl Handler for Recorder {
        async fn on_logged_in(&mut self, username: &str) {
            self.logged_in.push(username.to_string());
        }

        async fn on_battle_start(&mut self, room: RoomId, events: mpsc::Receiver<BattleEvent>) {
            self.started.push((room, events));
        }

        async fn on_battle_end(&mut self, room: &RoomId) {
            self.ended.push(room.clone());
        }

        async fn on_reconnected(&mut self) {
            self.reconnects += 1;
        }
    }

    fn receiver(
        credentials: Option<Credentials>,
    ) -> (Receiver, mpsc::UnboundedReceiver<Outgoing>, Arc<ClientState>) {
        receiver_at(credentials, auth::DEFAULT_LOGIN_URL)
    }

    fn receiver_at(
        credentials: Option<Credentials>,
        login_url: &str,
    ) -> (Receiver, mpsc::UnboundedReceiver<Outgoing>, Arc<ClientState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(ClientState::new());
        let handle = ClientHandle::new(tx, Arc::clone(&state));
        let receiver = Receiver::new(
            Arc::clone(&state),
            handle,
            credentials,
            login_url.to_string(),
            16,
        );
        (receiver, rx, state)
    }

    async fn feed(receiver: &mut Receiver, handler: &mut Recorder, text: &str) -> Result<()> {
        let frame = parse_server_frame(text).unwrap();
        receiver.dispatch_frame(handler, frame).await
    }

    const ROOM: &str = "battle-gen9randombattle-42";

    const START: &str = ">battle-gen9randombattle-42
|init|battle
|title|bot vs. alice
|j|☆bot
|player|p1|bot|1|
|player|p2|alice|2|
|gametype|singles
|start
|switch|p1a: Pikachu|Pikachu, L88, M|201/201
|switch|p2a: Gyarados|Gyarados, L80, F|100/100
|turn|1";

    fn drain(rx: &mut mpsc::Receiver<BattleEvent>) -> Vec<BattleEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn seqs(events: &[BattleEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                BattleEvent::Update(u) => Some(u.seq),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_battle_log_is_numbered() {
        let (mut receiver, _out, _state) = receiver(None);
        let mut handler = Recorder::default();

        feed(&mut receiver, &mut handler, START).await.unwrap();
        assert_eq!(handler.started.len(), 1);
        assert_eq!(handler.started[0].0, RoomId::from(ROOM));

        let events = drain(&mut handler.started[0].1);
        // player x2, gametype, start, switch x2, turn
        assert_eq!(seqs(&events), (0..7).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_side_channel_events() {
        let (mut receiver, _out, _state) = receiver(None);
        let mut handler = Recorder::default();
        feed(&mut receiver, &mut handler, START).await.unwrap();
        drain(&mut handler.started[0].1);

        let frame = format!(
            ">{}\n|request|{{\"wait\":true,\"side\":{{\"name\":\"bot\",\"id\":\"p1\",\"pokemon\":[]}},\"rqid\":3}}\n|inactive|Time left: 120 sec this turn\n|error|[Invalid choice] There's nothing to choose",
            ROOM
        );
        feed(&mut receiver, &mut handler, &frame).await.unwrap();

        let events = drain(&mut handler.started[0].1);
        assert!(matches!(&events[0], BattleEvent::Request(r) if r.rqid == Some(3)));
        assert!(matches!(&events[1], BattleEvent::Timer { on: true, .. }));
        assert!(matches!(&events[2], BattleEvent::Error(_)));
        assert!(seqs(&events).is_empty());
    }

    #[tokio::test]
    async fn test_win_ends_battle_after_forwarding() {
        let (mut receiver, _out, state) = receiver(None);
        let mut handler = Recorder::default();
        feed(&mut receiver, &mut handler, START).await.unwrap();

        feed(&mut receiver, &mut handler, &format!(">{}\n|win|bot", ROOM))
            .await
            .unwrap();

        assert_eq!(handler.ended, vec![RoomId::from(ROOM)]);
        assert!(!state.battles.contains(&RoomId::from(ROOM)));

        let rx = &mut handler.started[0].1;
        let events = drain(rx);
        assert_eq!(seqs(&events).last(), Some(&7));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_resync_replays_from_zero() {
        let (mut receiver, _out, state) = receiver(None);
        let mut handler = Recorder::default();
        let room = RoomId::from(ROOM);
        feed(&mut receiver, &mut handler, START).await.unwrap();
        drain(&mut handler.started[0].1);

        state.battles.mark_resyncing(&room);
        feed(&mut receiver, &mut handler, &format!(">{}\n|deinit", ROOM))
            .await
            .unwrap();
        assert!(handler.ended.is_empty());

        feed(&mut receiver, &mut handler, START).await.unwrap();
        assert_eq!(handler.started.len(), 1);
        let events = drain(&mut handler.started[0].1);
        assert_eq!(seqs(&events), (0..7).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_deinit_outside_resync_ends_battle() {
        let (mut receiver, _out, _state) = receiver(None);
        let mut handler = Recorder::default();
        feed(&mut receiver, &mut handler, START).await.unwrap();
        feed(&mut receiver, &mut handler, &format!(">{}\n|deinit", ROOM))
            .await
            .unwrap();
        assert_eq!(handler.ended, vec![RoomId::from(ROOM)]);
    }

    #[tokio::test]
    async fn test_rejoin_after_reconnect() {
        let (mut receiver, mut out, state) = receiver(None);
        let mut handler = Recorder::default();
        feed(&mut receiver, &mut handler, START).await.unwrap();
        feed(&mut receiver, &mut handler, "|updateuser| bot|1|1|{}")
            .await
            .unwrap();
        assert_eq!(handler.logged_in, vec!["bot"]);

        receiver.on_reconnected(&mut handler).await;
        assert_eq!(handler.reconnects, 1);
        assert!(!state.is_logged_in());

        feed(&mut receiver, &mut handler, "|updateuser| bot|1|1|{}")
            .await
            .unwrap();
        let sent: Vec<String> = std::iter::from_fn(|| out.try_recv().ok())
            .filter_map(|o| match o {
                Outgoing::Message(m) => Some(m.to_wire_format()),
                Outgoing::Close => None,
            })
            .collect();
        assert_eq!(sent, vec![format!("|/join {}", ROOM)]);
        assert_eq!(handler.logged_in.len(), 2);
    }

    #[tokio::test]
    async fn test_name_taken_with_credentials_is_fatal() {
        let credentials = Credentials {
            username: "bot".to_string(),
            password: "secret".to_string(),
        };
        let (mut receiver, _out, _state) = receiver(Some(credentials));
        let mut handler = Recorder::default();
        let err = feed(
            &mut receiver,
            &mut handler,
            "|nametaken|bot|Your password was incorrect.",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::AuthenticationRejected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_login_server_is_retried() {
        let credentials = Credentials {
            username: "bot".to_string(),
            password: "secret".to_string(),
        };
        let (mut receiver, mut out, _state) =
            receiver_at(Some(credentials), "http://127.0.0.1:1/api/login");
        let mut handler = Recorder::default();

        feed(&mut receiver, &mut handler, "|challstr|4|abc")
            .await
            .unwrap();
        let first = receiver.login_retry_at().unwrap();
        assert!(out.try_recv().is_err());

        // battles keep flowing while the login waits
        feed(&mut receiver, &mut handler, START).await.unwrap();
        assert_eq!(handler.started.len(), 1);

        receiver.retry_login().await.unwrap();
        let second = receiver.login_retry_at().unwrap();
        assert!(second > first);

        // a reconnect brings a fresh challstr
        receiver.on_reconnected(&mut handler).await;
        assert!(receiver.login_retry_at().is_none());
    }

    #[tokio::test]
    async fn test_guest_updateuser_is_not_login() {
        let (mut receiver, _out, state) = receiver(None);
        let mut handler = Recorder::default();
        feed(&mut receiver, &mut handler, "|updateuser| Guest 123|0|1|{}")
            .await
            .unwrap();
        assert!(!state.is_logged_in());
        assert_eq!(state.user().map(|u| u.username), Some("Guest 123".to_string()));
    }
}
