//! Error types for the client side of the protocol.

use docent_core::error::DocentError;

/// Errors from the client connection and transport layers.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("an exchange is already in flight")]
    ExchangeInFlight,
    #[error("no open connection")]
    NotConnected,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ClientError> for DocentError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport(msg) => DocentError::Transport(msg),
            ClientError::Connection(msg) => DocentError::Connection(msg),
            ClientError::NotConnected => {
                DocentError::Connection("no open connection".to_string())
            }
            ClientError::Protocol(msg) => DocentError::Protocol(msg),
            ClientError::ExchangeInFlight => {
                DocentError::Session("an exchange is already in flight".to_string())
            }
        }
    }
}
