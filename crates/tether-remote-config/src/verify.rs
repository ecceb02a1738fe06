//! Ed25519 verification of timestamped configuration payloads.
//!
//! The signed payload is the timestamp as 8 little-endian bytes followed by
//! the message bytes. Signature and public key travel as standard base64.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, VerifyingKey};

/// Build the byte string a signer signs for `message` at `timestamp`.
pub fn signed_payload(message: &[u8], timestamp: u64) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8 + message.len());
    payload.extend_from_slice(&timestamp.to_le_bytes());
    payload.extend_from_slice(message);
    payload
}

/// Verify a detached Ed25519 signature over `timestamp ‖ message`.
///
/// Malformed base64, wrong lengths and invalid key points all yield `false`.
pub fn verify(message: &[u8], timestamp: u64, signature_b64: &str, public_key_b64: &str) -> bool {
    let Some(key_bytes) = decode_fixed::<32>(public_key_b64) else {
        return false;
    };
    let Some(sig_bytes) = decode_fixed::<64>(signature_b64) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    key.verify_strict(&signed_payload(message, timestamp), &signature)
        .is_ok()
}

fn decode_fixed<const N: usize>(b64: &str) -> Option<[u8; N]> {
    let bytes = STANDARD.decode(b64.trim()).ok()?;
    bytes.try_into().ok()
}
