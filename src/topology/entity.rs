//! # Supervised entity identity.
//!
//! [`EntityRef`] identifies one node of the Process → Equipment → SubEquipment
//! hierarchy. It is immutable once created (at topology configuration time)
//! and is used as the key for every per-entity record in the crate.
//!
//! ## Rules
//! - Identity is `(kind, id)`: ids are unique within their kind-space.
//! - `name` is carried for messages/logs only and does not participate in
//!   equality or hashing.
//! - Parent/child edges live in the [`Topology`](crate::Topology)
//!   collaborator, not on the ref itself.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Kind of a supervised node in the acquisition hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A remote data-acquisition process.
    Process,
    /// A piece of equipment attached to a process.
    Equipment,
    /// A sub-unit of an equipment, supervised through its parent.
    SubEquipment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Process => write!(f, "Process"),
            EntityKind::Equipment => write!(f, "Equipment"),
            EntityKind::SubEquipment => write!(f, "SubEquipment"),
        }
    }
}

/// Reference to one supervised entity.
///
/// Cheap to clone (`Arc<str>` name). Equality and hashing use `(kind, id)`
/// only, so two refs with different display names still address the same
/// records.
#[derive(Debug, Clone)]
pub struct EntityRef {
    /// Position of the entity in the hierarchy.
    pub kind: EntityKind,
    /// Unique id within the kind-space.
    pub id: u64,
    /// Human-readable name, used in generated descriptions and logs.
    pub name: Arc<str>,
}

impl EntityRef {
    /// Creates a new entity reference.
    pub fn new(kind: EntityKind, id: u64, name: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            id,
            name: name.into(),
        }
    }

    /// Shorthand for a `Process` ref.
    pub fn process(id: u64, name: impl Into<Arc<str>>) -> Self {
        Self::new(EntityKind::Process, id, name)
    }

    /// Shorthand for an `Equipment` ref.
    pub fn equipment(id: u64, name: impl Into<Arc<str>>) -> Self {
        Self::new(EntityKind::Equipment, id, name)
    }

    /// Shorthand for a `SubEquipment` ref.
    pub fn subequipment(id: u64, name: impl Into<Arc<str>>) -> Self {
        Self::new(EntityKind::SubEquipment, id, name)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (#{})", self.kind, self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_name() {
        let a = EntityRef::equipment(7, "E_PUMP_01");
        let b = EntityRef::equipment(7, "E_PUMP_01_RENAMED");
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_identity_separates_kind_spaces() {
        let p = EntityRef::process(3, "P_X");
        let e = EntityRef::equipment(3, "P_X");
        assert_ne!(p, e);
    }

    #[test]
    fn test_display() {
        let s = EntityRef::subequipment(12, "S_VALVE").to_string();
        assert_eq!(s, "SubEquipment S_VALVE (#12)");
    }
}
