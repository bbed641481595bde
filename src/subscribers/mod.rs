//! # Event subscribers for external consumers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used by the [`SupervisionManager`](crate::SupervisionManager) to
//! deliver supervision events to registered consumers (cache writers,
//! client gateways, alarm bridges).
//!
//! ## Architecture
//! ```text
//! Bus ──► manager fan-out listener ──► SubscriberSet::emit_arc()
//!                                          ├──► LogWriter
//!                                          ├──► cache writer
//!                                          └──► custom subscribers
//! ```

mod log;
mod set;
mod subscribe;

pub use self::log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
