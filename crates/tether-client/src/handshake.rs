//! Protocol handshake.
//!
//! Once a transport is up the client sends a JSON handshake request naming
//! the protocol, terminated by the record separator `0x1E`. The server replies
//! with a JSON object terminated the same way: `{}` on success or
//! `{"error": "..."}` on rejection. Bytes after the separator already belong to
//! the binary message stream.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::{PROTOCOL_NAME, PROTOCOL_VERSION};
use crate::errors::ClientError;

/// Record separator terminating handshake messages.
pub const RECORD_SEPARATOR: u8 = 0x1e;

#[derive(Serialize)]
struct HandshakeRequest<'a> {
    protocol: &'a str,
    version: u32,
}

#[derive(Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// The handshake request frame for the MessagePack protocol.
pub fn handshake_request() -> Bytes {
    let request = HandshakeRequest {
        protocol: PROTOCOL_NAME,
        version: PROTOCOL_VERSION,
    };
    // Serializing two plain fields cannot fail.
    let mut frame = serde_json::to_vec(&request).unwrap_or_default();
    frame.push(RECORD_SEPARATOR);
    Bytes::from(frame)
}

/// Consume a handshake response from the front of `buf`.
///
/// Returns `Ok(false)` until a full response is buffered, `Ok(true)` once it is
/// accepted. Any bytes after the separator stay in `buf`.
pub fn parse_handshake_response(buf: &mut BytesMut) -> Result<bool, ClientError> {
    let Some(end) = buf.iter().position(|b| *b == RECORD_SEPARATOR) else {
        return Ok(false);
    };
    let record = buf.split_to(end + 1);
    let response: HandshakeResponse = serde_json::from_slice(&record[..end])
        .map_err(|e| ClientError::Handshake(format!("malformed handshake response: {e}")))?;
    match response.error {
        Some(error) => Err(ClientError::Handshake(error)),
        None => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn request_format() {
        assert_eq!(
            &handshake_request()[..],
            b"{\"protocol\":\"messagepack\",\"version\":1}\x1e"
        );
    }

    #[test]
    fn accepts_empty_object_and_keeps_trailing_bytes() {
        let mut buf = BytesMut::from(&b"{}\x1e\x01\x02"[..]);
        assert!(parse_handshake_response(&mut buf).unwrap());
        assert_eq!(&buf[..], &[0x01, 0x02]);
    }

    #[test]
    fn waits_for_separator() {
        let mut buf = BytesMut::from(&b"{\"err"[..]);
        assert!(!parse_handshake_response(&mut buf).unwrap());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn server_rejection() {
        let mut buf = BytesMut::from(&b"{\"error\":\"unsupported protocol\"}\x1e"[..]);
        assert_matches!(
            parse_handshake_response(&mut buf),
            Err(ClientError::Handshake(msg)) if msg == "unsupported protocol"
        );
    }

    #[test]
    fn malformed_response() {
        let mut buf = BytesMut::from(&b"nope\x1e"[..]);
        assert_matches!(parse_handshake_response(&mut buf), Err(ClientError::Handshake(_)));
    }
}
