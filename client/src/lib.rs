//! Pokemon Showdown client that multiplexes battles over one websocket.
//!
//! The [`Client`] owns the connection and runs the receive loop. Global
//! events go to a [`Handler`]; every battle room gets its own bounded
//! channel of [`BattleEvent`]s, with battle-log lines numbered so the
//! consumer can detect gaps and ask for a [`ClientHandle::resync`].

mod auth;
mod connection;
mod error;
mod handle;
mod handler;
mod receiver;
pub mod room;
mod state;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{info, warn};

pub use pokellm_protocol::{ClientCommand, ClientMessage, ServerFrame, ServerMessage};

pub use auth::{Credentials, DEFAULT_LOGIN_URL};
pub use connection::ReconnectPolicy;
pub use error::{Result, TransportError};
pub use handle::ClientHandle;
pub use handler::Handler;
pub use room::RoomId;
pub use state::{BattleEvent, BattleRegistry, UserInfo};

use connection::{Connection, Incoming};
use handle::Outgoing;
use receiver::Receiver;
use state::ClientState;

pub const DEFAULT_SERVER_URL: &str = "wss://sim3.psim.us/showdown/websocket";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub login_url: String,
    /// Logged in automatically on every challstr when present
    pub credentials: Option<Credentials>,
    pub reconnect: ReconnectPolicy,
    /// Buffered events per battle before new ones are dropped
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            credentials: None,
            reconnect: ReconnectPolicy::default(),
            channel_capacity: 256,
        }
    }
}

/// Main Pokemon Showdown client
pub struct Client {
    connection: Connection,
    outgoing: mpsc::UnboundedReceiver<Outgoing>,
    handle: ClientHandle,
    receiver: Receiver,
}

impl Client {
    /// Connect to a Pokemon Showdown server
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let connection = Connection::connect(config.server_url, config.reconnect).await?;

        let (tx, outgoing) = mpsc::unbounded_channel();
        let state = Arc::new(ClientState::new());
        let handle = ClientHandle::new(tx, Arc::clone(&state));
        let receiver = Receiver::new(
            state,
            handle.clone(),
            config.credentials,
            config.login_url,
            config.channel_capacity,
        );

        Ok(Self {
            connection,
            outgoing,
            handle,
            receiver,
        })
    }

    /// A handle for sending commands; valid for the life of the client
    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// Run the message loop until [`ClientHandle::close`] or a fatal error.
    ///
    /// Dropped connections are re-established according to the reconnect
    /// policy; commands sent meanwhile wait in the queue. Errors that are
    /// not [fatal](TransportError::is_fatal) are logged and the loop goes on.
    pub async fn run<H: Handler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            let login_retry = self.receiver.login_retry_at();
            tokio::select! {
                incoming = self.connection.recv() => {
                    let handled = match incoming? {
                        Incoming::Frame(frame) => self.receiver.dispatch_frame(handler, frame).await,
                        Incoming::Reconnected => {
                            self.receiver.on_reconnected(handler).await;
                            Ok(())
                        }
                    };
                    recover(handled)?;
                }
                _ = sleep_until(login_retry.unwrap_or_else(Instant::now)), if login_retry.is_some() => {
                    recover(self.receiver.retry_login().await)?;
                }
                Some(outgoing) = self.outgoing.recv(), if self.connection.is_connected() => {
                    match outgoing {
                        Outgoing::Message(message) => {
                            if let Err(e) = self.connection.send(&message).await {
                                warn!(error = %e, "Failed to send, message dropped");
                            }
                        }
                        Outgoing::Close => {
                            info!("Closing connection");
                            self.connection.close().await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Pass fatal errors through; log the rest
fn recover(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(error = %e, "Client error, continuing");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
