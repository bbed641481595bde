//! # Entity specification for registration.
//!
//! [`EntitySpec`] bundles everything the
//! [`SupervisionManager`](crate::SupervisionManager) needs to commission one
//! supervised entity: identity, optional parent, optional heartbeat channel,
//! and whether a fault channel is wired.
//!
//! ## Rules
//! - `Equipment` and `SubEquipment` specs require a parent; `Process` specs
//!   must not carry one.
//! - An entity without an alive interval has no heartbeat channel and is
//!   never scanned for expiry.

use crate::topology::entity::{EntityKind, EntityRef};

/// Specification for commissioning one supervised entity.
///
/// ## Example
/// ```rust
/// use vigil::EntitySpec;
///
/// let process = EntitySpec::process(1, "P_DAQ_01").with_alive_interval(10_000);
/// let equipment = EntitySpec::equipment(100, "E_PUMP", process.entity().clone())
///     .with_alive_interval(10_000)
///     .with_fault_channel();
/// ```
#[derive(Debug, Clone)]
pub struct EntitySpec {
    entity: EntityRef,
    parent: Option<EntityRef>,
    alive_interval_ms: Option<u64>,
    fault_channel: bool,
}

impl EntitySpec {
    /// Spec for a top-level process (no parent).
    pub fn process(id: u64, name: impl Into<std::sync::Arc<str>>) -> Self {
        Self {
            entity: EntityRef::new(EntityKind::Process, id, name),
            parent: None,
            alive_interval_ms: None,
            fault_channel: false,
        }
    }

    /// Spec for an equipment attached to `parent` (a process).
    pub fn equipment(id: u64, name: impl Into<std::sync::Arc<str>>, parent: EntityRef) -> Self {
        Self {
            entity: EntityRef::new(EntityKind::Equipment, id, name),
            parent: Some(parent),
            alive_interval_ms: None,
            fault_channel: false,
        }
    }

    /// Spec for a subequipment attached to `parent` (an equipment).
    pub fn subequipment(id: u64, name: impl Into<std::sync::Arc<str>>, parent: EntityRef) -> Self {
        Self {
            entity: EntityRef::new(EntityKind::SubEquipment, id, name),
            parent: Some(parent),
            alive_interval_ms: None,
            fault_channel: false,
        }
    }

    /// Wires a heartbeat channel with the expected max gap between beats.
    pub fn with_alive_interval(mut self, interval_ms: u64) -> Self {
        self.alive_interval_ms = Some(interval_ms);
        self
    }

    /// Wires a communication-fault channel.
    pub fn with_fault_channel(mut self) -> Self {
        self.fault_channel = true;
        self
    }

    /// Returns the entity reference.
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Returns the parent, if any.
    pub fn parent(&self) -> Option<&EntityRef> {
        self.parent.as_ref()
    }

    /// Returns the heartbeat interval, if a heartbeat channel is wired.
    pub fn alive_interval_ms(&self) -> Option<u64> {
        self.alive_interval_ms
    }

    /// Returns true if a fault channel is wired.
    pub fn has_fault_channel(&self) -> bool {
        self.fault_channel
    }
}
