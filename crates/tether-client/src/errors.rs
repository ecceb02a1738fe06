//! Client error types.

use tether_auth::AuthError;

use crate::hub::HubState;

/// Errors raised by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket protocol or I/O failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The endpoint URL cannot be used for this transport.
    #[error("invalid transport URL {0:?}")]
    InvalidUrl(String),

    /// The server sent something the transport cannot decode.
    #[error("malformed transport payload: {0}")]
    Malformed(String),

    /// The connection was lost.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

/// Errors raised while framing MessagePack messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serializing a message failed.
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// A frame body is not a MessagePack value.
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmpv::decode::Error),

    /// Compression or decompression failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The length prefix is malformed or exceeds the frame limit.
    #[error("invalid frame length")]
    InvalidLength,
}

/// Errors surfaced to callers of the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Obtaining a bearer token failed.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Framing failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The negotiate endpoint refused the connection.
    #[error("negotiation failed: {0}")]
    Negotiate(String),

    /// The server offers no transport we are willing to use.
    #[error("no mutually supported transport")]
    NoSupportedTransport,

    /// The server rejected or never answered the protocol handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The operation needs a different connection state.
    #[error("connection is {0:?}")]
    InvalidState(HubState),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_converts_into_client_error() {
        let err = ClientError::from(TransportError::Status(503));
        assert_eq!(err.to_string(), "transport error: unexpected status 503");
    }

    #[test]
    fn auth_error_converts_into_client_error() {
        let err = ClientError::from(AuthError::Cancelled);
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn invalid_state_display() {
        let err = ClientError::InvalidState(HubState::Disconnected);
        assert_eq!(err.to_string(), "connection is Disconnected");
    }
}
