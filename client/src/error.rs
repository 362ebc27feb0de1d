use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("gave up reconnecting to {url} after {attempts} attempts")]
    ReconnectExhausted { url: String, attempts: usize },

    #[error("login rejected: {0}")]
    AuthenticationRejected(String),

    #[error("client closed")]
    Closed,
}

impl TransportError {
    /// Errors after which the client cannot continue
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::ConnectionLost(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
