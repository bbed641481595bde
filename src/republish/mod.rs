//! Reliable redelivery of events that failed to publish.
//!
//! ## Contents
//! - [`Publish`] delivery-transport callback with retryable/permanent
//!   failure classification
//! - [`Republisher`] the generic fixed-delay retry engine

mod republisher;

pub use republisher::{Publish, Republisher};
