//! Supervision events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the status registry, fault
//! tracker and expiry scanner.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `StatusRegistry` (Update/StatusChange), `FaultTracker`
//!   (FaultAccepted), `ExpiryScanner` (AliveExpired, MassOutage*).
//! - **Consumers**: `CascadeRouter::spawn_listener()` (drives the state
//!   machine and child propagation), and the `SubscriberSet` fan-out wired
//!   by `SupervisionManager` for external consumers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
