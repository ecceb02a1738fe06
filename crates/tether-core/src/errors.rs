//! Core error types.

use thiserror::Error;

/// Errors raised while parsing core vocabulary types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A transport name did not match any known transport.
    #[error("unknown transport: {0}")]
    UnknownTransport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_transport_display() {
        let err = CoreError::UnknownTransport("carrier-pigeon".into());
        assert_eq!(err.to_string(), "unknown transport: carrier-pigeon");
    }
}
