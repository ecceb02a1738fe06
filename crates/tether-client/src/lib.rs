//! # tether-client
//!
//! The duplex connection layer.
//!
//! - [`negotiator`]: which transports to offer
//! - [`codec`] and [`handshake`]: MessagePack framing and the protocol handshake
//! - [`transport`]: WebSockets, Server-Sent Events and long polling behind
//!   [`TransportConnector`]
//! - [`HubConnection`]: one session with reconnect supervision
//! - [`ConnectionManager`]: the single-instance factory that resolves
//!   configuration, builds the connection and republishes its lifecycle
//!   signals to the event bus

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod handshake;
pub mod hub;
pub mod manager;
pub mod negotiator;
pub mod signals;
pub mod transport;

#[cfg(test)]
mod testing;

pub use codec::MessagePackCodec;
pub use errors::{ClientError, CodecError, TransportError};
pub use hub::{HubConnection, HubOptions, HubState};
pub use manager::{ClientOptions, ConnectionHandle, ConnectionManager};
pub use negotiator::{TransportPlan, TransportPreferences, negotiate, pin, plan};
pub use signals::{Signal, Subscription};
pub use transport::{HttpTransportConnector, TransportChannels, TransportConnector};
