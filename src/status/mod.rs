//! Authoritative supervision state.
//!
//! ## Contents
//! - [`SupervisionStatus`] the Startup/Running/Down lifecycle
//! - [`StatusRecord`], [`Transition`], [`StatusRegistry`] per-entity state
//!   machine with monotonic-timestamp acceptance
//!
//! ## Quick wiring
//! ```text
//! CascadeRouter / SupervisionManager
//!      └─► StatusRegistry::{apply, start, stop, resume, suspend}
//!            └─► Bus: Update on every accept, StatusChange on availability flips
//! ```

mod registry;
mod status;

pub use registry::{StatusRecord, StatusRegistry, Transition};
pub use status::SupervisionStatus;
