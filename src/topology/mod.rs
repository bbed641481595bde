//! Supervised-entity identity and topology.
//!
//! This module groups the types that describe *what* is being supervised:
//! - [`EntityKind`], [`EntityRef`] closed set of node kinds and identity
//! - [`EntitySpec`] commissioning bundle for one entity
//! - [`Topology`], [`TopologyMap`] parent/child lookups for cascades

mod entity;
mod map;
mod spec;

pub use entity::{EntityKind, EntityRef};
pub use map::{Topology, TopologyMap};
pub use spec::EntitySpec;
