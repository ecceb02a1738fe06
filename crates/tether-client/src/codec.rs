//! MessagePack message framing.
//!
//! Each message is a varint length prefix (7 bits per byte, least
//! significant group first, at most 5 bytes) followed by the body. The body is
//! a MessagePack value, optionally deflate-compressed.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use serde::Serialize;
use tokio_util::codec::Decoder;

use crate::errors::CodecError;

/// Wire name of the protocol announced in the handshake.
pub const PROTOCOL_NAME: &str = "messagepack";

/// Protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const MAX_VARINT_BYTES: usize = 5;

/// Binary message codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessagePackCodec {
    compress: bool,
}

impl MessagePackCodec {
    /// Codec with or without deflate compression of frame bodies.
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    /// Whether frame bodies are compressed.
    pub fn compresses(&self) -> bool {
        self.compress
    }

    /// Encode one message into a length-prefixed frame.
    pub fn encode<T: Serialize + ?Sized>(&self, message: &T) -> Result<Bytes, CodecError> {
        let mut body = rmp_serde::to_vec_named(message)?;
        if self.compress {
            let mut encoder = DeflateEncoder::new(Vec::with_capacity(body.len()), Compression::default());
            encoder.write_all(&body)?;
            body = encoder.finish()?;
        }
        if body.len() > MAX_FRAME_LEN {
            return Err(CodecError::InvalidLength);
        }
        let mut frame = BytesMut::with_capacity(body.len() + MAX_VARINT_BYTES);
        write_varint(body.len(), &mut frame);
        frame.extend_from_slice(&body);
        Ok(frame.freeze())
    }

    fn decode_body(&self, body: &[u8]) -> Result<rmpv::Value, CodecError> {
        if self.compress {
            let mut inflated = Vec::with_capacity(body.len() * 2);
            let _ = DeflateDecoder::new(body)
                .take(MAX_FRAME_LEN as u64 + 1)
                .read_to_end(&mut inflated)?;
            if inflated.len() > MAX_FRAME_LEN {
                return Err(CodecError::InvalidLength);
            }
            Ok(rmpv::decode::read_value(&mut inflated.as_slice())?)
        } else {
            Ok(rmpv::decode::read_value(&mut &body[..])?)
        }
    }
}

impl Decoder for MessagePackCodec {
    type Item = rmpv::Value;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((len, prefix)) = read_varint(src)? else {
            return Ok(None);
        };
        if src.len() < prefix + len {
            src.reserve(prefix + len - src.len());
            return Ok(None);
        }
        src.advance(prefix);
        let body = src.split_to(len);
        self.decode_body(&body).map(Some)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn write_varint(mut value: usize, out: &mut BytesMut) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Read a length prefix: `Ok(None)` until enough bytes are buffered.
fn read_varint(src: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
    let mut value = 0usize;
    for (i, byte) in src.iter().take(MAX_VARINT_BYTES).enumerate() {
        value |= usize::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            if value > MAX_FRAME_LEN {
                return Err(CodecError::InvalidLength);
            }
            return Ok(Some((value, i + 1)));
        }
    }
    if src.len() >= MAX_VARINT_BYTES {
        return Err(CodecError::InvalidLength);
    }
    Ok(None)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
