//! # tether-events
//!
//! Lifecycle events published by the connection manager and the
//! [`EventBus`] they are published to.

#![deny(unsafe_code)]

pub mod bus;
pub mod types;

pub use bus::{BroadcastEventBus, EventBus, RecordingEventBus};
pub use types::LifecycleEvent;
