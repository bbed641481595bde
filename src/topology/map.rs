//! # Parent/child topology lookups.
//!
//! The [`Topology`] trait is the seam the
//! [`CascadeRouter`](crate::CascadeRouter) uses to find the SubEquipment
//! children of an Equipment when a status change must be propagated.
//! [`TopologyMap`] is the in-memory implementation maintained by the
//! [`SupervisionManager`](crate::SupervisionManager) as entities are
//! commissioned and decommissioned.
//!
//! ## Rules
//! - Lookups return clones; no lock is held while callers act on the result.
//! - `children_of` on a non-Equipment ref returns an empty list, which is
//!   what bounds cascades to one hierarchy level per event.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::topology::entity::{EntityKind, EntityRef};

/// Read-side topology lookups used by the cascade path.
#[async_trait]
pub trait Topology: Send + Sync + 'static {
    /// SubEquipment children of the given equipment (empty for other kinds).
    async fn children_of(&self, equipment: &EntityRef) -> Vec<EntityRef>;

    /// Equipments attached to the given process (empty for other kinds).
    async fn equipments_of(&self, process: &EntityRef) -> Vec<EntityRef>;

    /// Parent of the given entity, if any.
    async fn parent_of(&self, entity: &EntityRef) -> Option<EntityRef>;
}

/// In-memory topology with parent and child edges.
#[derive(Default)]
pub struct TopologyMap {
    inner: RwLock<Edges>,
}

#[derive(Default)]
struct Edges {
    parents: HashMap<EntityRef, EntityRef>,
    children: HashMap<EntityRef, Vec<EntityRef>>,
}

impl TopologyMap {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity, linking it to `parent` when given.
    ///
    /// Re-inserting an existing entity replaces its parent edge.
    pub async fn insert(&self, entity: EntityRef, parent: Option<EntityRef>) {
        let mut edges = self.inner.write().await;
        if let Some(old) = edges.parents.remove(&entity) {
            if let Some(siblings) = edges.children.get_mut(&old) {
                siblings.retain(|c| c != &entity);
            }
        }
        if let Some(parent) = parent {
            edges
                .children
                .entry(parent.clone())
                .or_default()
                .push(entity.clone());
            edges.parents.insert(entity, parent);
        }
    }

    /// Removes an entity and all edges touching it.
    ///
    /// Children of a removed entity are kept but lose their parent edge.
    pub async fn remove(&self, entity: &EntityRef) {
        let mut edges = self.inner.write().await;
        if let Some(parent) = edges.parents.remove(entity) {
            if let Some(siblings) = edges.children.get_mut(&parent) {
                siblings.retain(|c| c != entity);
            }
        }
        if let Some(orphans) = edges.children.remove(entity) {
            for orphan in orphans {
                edges.parents.remove(&orphan);
            }
        }
    }
}

#[async_trait]
impl Topology for TopologyMap {
    async fn children_of(&self, equipment: &EntityRef) -> Vec<EntityRef> {
        if equipment.kind != EntityKind::Equipment {
            return Vec::new();
        }
        self.inner
            .read()
            .await
            .children
            .get(equipment)
            .cloned()
            .unwrap_or_default()
    }

    async fn equipments_of(&self, process: &EntityRef) -> Vec<EntityRef> {
        if process.kind != EntityKind::Process {
            return Vec::new();
        }
        self.inner
            .read()
            .await
            .children
            .get(process)
            .cloned()
            .unwrap_or_default()
    }

    async fn parent_of(&self, entity: &EntityRef) -> Option<EntityRef> {
        self.inner.read().await.parents.get(entity).cloned()
    }
}
