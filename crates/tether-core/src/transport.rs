//! Transport kinds and ordered transport sets.
//!
//! Transports are ranked by capability, most capable first:
//! [`TransportKind::WebSockets`] → [`TransportKind::ServerSentEvents`] →
//! [`TransportKind::LongPolling`]. A [`TransportSet`] always iterates in that order,
//! so "first" means "most capable".
//!
//! On the wire a set is written as an array of names. Reading also accepts the
//! integer bit-flag form (`WebSockets = 1`, `ServerSentEvents = 2`,
//! `LongPolling = 4`) used by older discovery documents. Unknown names and bits are
//! ignored rather than rejected.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::CoreError;

// ─────────────────────────────────────────────────────────────────────────────
// TransportKind
// ─────────────────────────────────────────────────────────────────────────────

/// A network transport, ordered from most to least capable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportKind {
    /// Full-duplex WebSocket.
    WebSockets,
    /// Server-Sent Events downstream with HTTP POST upstream.
    ServerSentEvents,
    /// HTTP long polling downstream with HTTP POST upstream.
    LongPolling,
}

impl TransportKind {
    /// All transports, most capable first.
    pub const ALL: [TransportKind; 3] = [
        TransportKind::WebSockets,
        TransportKind::ServerSentEvents,
        TransportKind::LongPolling,
    ];

    /// Bit used for this transport in the flag encoding.
    pub const fn bit(self) -> u8 {
        match self {
            Self::WebSockets => 1,
            Self::ServerSentEvents => 2,
            Self::LongPolling => 4,
        }
    }

    /// Canonical wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebSockets => "WebSockets",
            Self::ServerSentEvents => "ServerSentEvents",
            Self::LongPolling => "LongPolling",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = CoreError;

    /// Case-insensitive; accepts the canonical names plus common short forms
    /// (`ws`, `websocket`, `sse`, `long-polling`, `lp`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "websockets" | "websocket" | "ws" => Ok(Self::WebSockets),
            "serversentevents" | "sse" => Ok(Self::ServerSentEvents),
            "longpolling" | "lp" => Ok(Self::LongPolling),
            _ => Err(CoreError::UnknownTransport(s.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TransportSet
// ─────────────────────────────────────────────────────────────────────────────

/// An ordered set of [`TransportKind`]s.
///
/// The empty set means "unspecified", never "no transport".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TransportSet(u8);

impl TransportSet {
    const MASK: u8 = 0b111;

    /// The empty (unspecified) set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every transport.
    pub const fn all() -> Self {
        Self(Self::MASK)
    }

    /// A set holding exactly one transport.
    pub const fn only(kind: TransportKind) -> Self {
        Self(kind.bit())
    }

    /// Build a set from flag bits, ignoring unknown bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    /// Flag-bit representation.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether the set is empty (unspecified).
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of transports in the set.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether `kind` is in the set.
    pub const fn contains(self, kind: TransportKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Return a copy with `kind` added.
    #[must_use]
    pub const fn with(self, kind: TransportKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Return a copy with `kind` removed.
    #[must_use]
    pub const fn without(self, kind: TransportKind) -> Self {
        Self(self.0 & !kind.bit())
    }

    /// The most capable transport in the set.
    pub fn most_capable(self) -> Option<TransportKind> {
        self.iter().next()
    }

    /// Whether the set is exactly `{kind}`.
    pub const fn is_only(self, kind: TransportKind) -> bool {
        self.0 == kind.bit()
    }

    /// Iterate most capable first.
    pub fn iter(self) -> impl Iterator<Item = TransportKind> {
        TransportKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<TransportKind> for TransportSet {
    fn from_iter<I: IntoIterator<Item = TransportKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl From<TransportKind> for TransportSet {
    fn from(kind: TransportKind) -> Self {
        Self::only(kind)
    }
}

impl fmt::Debug for TransportSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for TransportSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("unspecified");
        }
        let names: Vec<&str> = self.iter().map(TransportKind::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for TransportSet {
    type Err = CoreError;

    /// Parse a comma-separated list of transport names. An empty string is the
    /// empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(TransportKind::from_str)
            .collect()
    }
}

impl Serialize for TransportSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for TransportSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TransportSetVisitor)
    }
}

struct TransportSetVisitor;

impl<'de> Visitor<'de> for TransportSetVisitor {
    type Value = TransportSet;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of transport names or an integer of transport flags")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(TransportSet::from_bits(u8::try_from(v & 0xff).unwrap_or(0)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map_err(|_| E::custom("transport flags must not be negative"))
            .and_then(|v| self.visit_u64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(v.split(',')
            .filter_map(|part| part.parse::<TransportKind>().ok())
            .collect())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(TransportSet::empty())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(TransportSet::empty())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut set = TransportSet::empty();
        while let Some(name) = seq.next_element::<serde_json::Value>()? {
            let kind = match name {
                serde_json::Value::String(s) => s.parse::<TransportKind>().ok(),
                _ => None,
            };
            if let Some(kind) = kind {
                set = set.with(kind);
            }
        }
        Ok(set)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
