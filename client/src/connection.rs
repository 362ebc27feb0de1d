use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pokellm_protocol::{ClientMessage, ServerFrame, parse_server_frame};
use rand::Rng;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{error, info, trace, warn};

use crate::error::{Result, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// `None` retries forever
    pub max_attempts: Option<usize>,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Random spread applied to each delay, as a fraction of it (0.2 = ±20%)
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the 1-based `attempt`, without jitter
    pub fn base_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        // f64::max drops NaN, so a bad multiplier lands on zero
        Duration::from_secs_f64(secs.max(0.0).min(self.max_delay.as_secs_f64()))
    }

    pub fn delay(&self, attempt: usize) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if jitter == 0.0 {
            return Duration::from_secs_f64(base);
        }
        let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
        Duration::from_secs_f64(base * factor)
    }

    fn exhausted(&self, attempt: usize) -> bool {
        self.max_attempts.is_some_and(|max| attempt > max)
    }
}

/// What the connection yields besides frames
#[derive(Debug)]
pub enum Incoming {
    Frame(ServerFrame),
    /// The socket dropped and a new one is up. Login and room membership
    /// are gone with the old socket.
    Reconnected,
}

pub struct Connection {
    ws_stream: Option<WsStream>,
    url: String,
    reconnect_policy: ReconnectPolicy,
    attempt: usize,
}

impl Connection {
    pub async fn connect(url: String, policy: ReconnectPolicy) -> Result<Self> {
        let ws_stream = Self::establish_connection(&url).await?;
        info!(url = %url, "Connected");

        Ok(Self {
            ws_stream: Some(ws_stream),
            url,
            reconnect_policy: policy,
            attempt: 0,
        })
    }

    async fn establish_connection(url: &str) -> Result<WsStream> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionLost(format!("handshake with {}: {}", url, e)))?;
        Ok(ws_stream)
    }

    pub fn is_connected(&self) -> bool {
        self.ws_stream.is_some()
    }

    /// Retry until connected or the policy gives up. Safe to cancel: the
    /// attempt count is kept, so the next call resumes the backoff.
    async fn reconnect(&mut self) -> Result<()> {
        loop {
            self.attempt += 1;
            if self.reconnect_policy.exhausted(self.attempt) {
                return Err(TransportError::ReconnectExhausted {
                    url: self.url.clone(),
                    attempts: self.attempt - 1,
                });
            }

            tokio::time::sleep(self.reconnect_policy.delay(self.attempt)).await;

            match Self::establish_connection(&self.url).await {
                Ok(ws_stream) => {
                    info!(attempt = self.attempt, "Reconnected");
                    self.ws_stream = Some(ws_stream);
                    self.attempt = 0;
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt = self.attempt,
                        max_attempts = ?self.reconnect_policy.max_attempts,
                        error = %e,
                        "Reconnection attempt failed"
                    );
                }
            }
        }
    }

    /// Next frame from the server, reconnecting as needed.
    ///
    /// Frames that fail to parse are logged and skipped.
    pub async fn recv(&mut self) -> Result<Incoming> {
        loop {
            let Some(ws_stream) = self.ws_stream.as_mut() else {
                self.reconnect().await?;
                return Ok(Incoming::Reconnected);
            };

            match ws_stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(frame = %text, "Received");
                    match parse_server_frame(&text) {
                        Ok(frame) => return Ok(Incoming::Frame(frame)),
                        Err(e) => warn!(error = %e, "Skipping unparseable frame"),
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = ws_stream.send(Message::Pong(data)).await {
                        warn!(error = %e, "Failed to send pong");
                        self.ws_stream = None;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    warn!("Connection closed by server, reconnecting");
                    self.ws_stream = None;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    error!(error = %e, "WebSocket error, reconnecting");
                    self.ws_stream = None;
                }
            }
        }
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let ws_stream = self
            .ws_stream
            .as_mut()
            .ok_or_else(|| TransportError::ConnectionLost("not connected".to_string()))?;

        let wire = message.to_wire_format();
        trace!(message = %wire, "Sending");
        if let Err(e) = ws_stream.send(Message::Text(wire)).await {
            self.ws_stream = None;
            return Err(TransportError::ConnectionLost(e.to_string()));
        }
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut ws_stream) = self.ws_stream.take() {
            let _ = ws_stream.close(None).await;
        }
    }
}
