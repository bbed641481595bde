//! # Status registry: the authoritative per-entity state machine.
//!
//! Maintains one [`StatusRecord`] per supervised entity and applies
//! transitions with monotonic-timestamp acceptance. All mutation goes
//! through [`StatusRegistry::apply`] (or the convenience transitions that
//! wrap it); no other component writes these records.
//!
//! ## Architecture
//! ```text
//! signal sources ──► SupervisionManager ──┐
//! scanner/faults ──► CascadeRouter      ──┼──► StatusRegistry::apply()
//!                                          │         │ per-entity lock
//!                                          │         ▼
//!                                          │   RwLock<HashMap<EntityRef, Mutex<StatusRecord>>>
//!                                          │         │
//!                                          └──◄── Bus: Update (every accept)
//!                                                     StatusChange (availability flip)
//! ```
//!
//! ## Rules
//! - **Monotonic acceptance**: a transition with `ts < status_time` is a
//!   no-op ([`Transition::Stale`]); ordering is last-write-wins on the
//!   signal timestamp, never on arrival order.
//! - **Per-key serialization**: records for different entities update
//!   independently; updates to one entity are serialized by its own lock.
//! - **Events under the lock**: `Update`/`StatusChange` are published while
//!   the per-entity lock is held, so successive transitions of one entity
//!   cannot overtake each other on the bus.
//! - **Idempotent resume/suspend**: resuming an already-running entity with
//!   the same description, or suspending an already-down entity, is a full
//!   no-op ([`Transition::Unchanged`]) and emits nothing.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::SupervisionError;
use crate::events::{Bus, Event, EventKind};
use crate::status::status::SupervisionStatus;
use crate::topology::EntityRef;

/// Authoritative status of one supervised entity.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    /// The entity this record belongs to.
    pub entity: EntityRef,
    /// Current availability status.
    pub status: SupervisionStatus,
    /// Free-text reason for the current status; never null, defaults empty.
    pub description: Arc<str>,
    /// Timestamp of the last accepted transition (epoch milliseconds).
    pub status_time: u64,
}

/// Outcome of a transition attempt.
#[derive(Debug, Clone)]
pub enum Transition {
    /// The transition was accepted and the record replaced atomically.
    Applied {
        /// Record before the transition, retained for comparison.
        previous: StatusRecord,
        /// Record after the transition.
        current: StatusRecord,
    },
    /// Rejected: the signal timestamp is older than the current record.
    ///
    /// An expected race under network reordering; silently ignored.
    Stale,
    /// No-op: the record already describes the requested state.
    Unchanged,
}

impl Transition {
    /// True if the transition was accepted.
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }

    /// True if the accepted transition flipped the availability boolean.
    pub fn changed_availability(&self) -> bool {
        match self {
            Transition::Applied { previous, current } => {
                previous.status.is_running() != current.status.is_running()
            }
            _ => false,
        }
    }
}

/// Registry of per-entity status records.
///
/// ### Responsibilities
/// - Holds exactly one [`StatusRecord`] per registered entity (created
///   `Down` at commissioning time, removed at decommissioning).
/// - Applies transitions with the monotonic-timestamp rule.
/// - Emits [`EventKind::Update`] on every accept and
///   [`EventKind::StatusChange`] when availability flips.
pub struct StatusRegistry {
    records: RwLock<HashMap<EntityRef, Arc<Mutex<StatusRecord>>>>,
    bus: Bus,
}

impl StatusRegistry {
    /// Creates an empty registry publishing to the given bus.
    pub fn new(bus: Bus) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Registers an entity with the initial `Down` status.
    ///
    /// Re-registering an existing entity is a no-op: the record must be
    /// updated in place, never replaced.
    pub async fn register(&self, entity: EntityRef) {
        let mut records = self.records.write().await;
        records.entry(entity.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(StatusRecord {
                entity,
                status: SupervisionStatus::Down,
                description: Arc::from(""),
                status_time: 0,
            }))
        });
    }

    /// Removes the record for a decommissioned entity.
    pub async fn remove(&self, entity: &EntityRef) {
        self.records.write().await.remove(entity);
    }

    /// Returns a snapshot of the current record.
    pub async fn get(&self, entity: &EntityRef) -> Result<StatusRecord, SupervisionError> {
        let slot = self.slot(entity).await?;
        let rec = slot.lock().await;
        Ok(rec.clone())
    }

    /// Applies a transition to the given status.
    ///
    /// Rejected as [`Transition::Stale`] when `ts` is older than the
    /// record's `status_time`; otherwise status/description/status_time are
    /// replaced atomically and the previous record is returned for
    /// comparison by the caller.
    pub async fn apply(
        &self,
        entity: &EntityRef,
        status: SupervisionStatus,
        description: &str,
        ts: u64,
    ) -> Result<Transition, SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        Ok(self.apply_locked(&mut rec, status, description, ts))
    }

    /// Transition to `Startup` with the generated "was started" description.
    pub async fn start(&self, entity: &EntityRef, ts: u64) -> Result<Transition, SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        let description = format!("{} was started", rec.entity.name);
        Ok(self.apply_locked(&mut rec, SupervisionStatus::Startup, &description, ts))
    }

    /// Transition to `Down` with the generated "was stopped" description.
    pub async fn stop(&self, entity: &EntityRef, ts: u64) -> Result<Transition, SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        let description = format!("{} was stopped", rec.entity.name);
        Ok(self.apply_locked(&mut rec, SupervisionStatus::Down, &description, ts))
    }

    /// Transition to `Running`.
    ///
    /// No-op when the entity is already running with the same description:
    /// steady heartbeats and repeated no-fault signals must not generate an
    /// event per signal.
    pub async fn resume(
        &self,
        entity: &EntityRef,
        ts: u64,
        description: &str,
    ) -> Result<Transition, SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        if rec.status.is_running() && rec.description.as_ref() == description {
            return Ok(Transition::Unchanged);
        }
        Ok(self.apply_locked(&mut rec, SupervisionStatus::Running, description, ts))
    }

    /// Transition to `Down` with a reason.
    ///
    /// No-op when the entity is already down; a second expiry or fault for
    /// an entity that is down adds nothing.
    pub async fn suspend(
        &self,
        entity: &EntityRef,
        ts: u64,
        description: &str,
    ) -> Result<Transition, SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        if rec.status == SupervisionStatus::Down {
            return Ok(Transition::Unchanged);
        }
        Ok(self.apply_locked(&mut rec, SupervisionStatus::Down, description, ts))
    }

    /// Sorted refs of all registered entities.
    pub async fn entities(&self) -> Vec<EntityRef> {
        let records = self.records.read().await;
        let mut refs: Vec<EntityRef> = records.keys().cloned().collect();
        refs.sort_unstable_by_key(|e| (e.kind as u8, e.id));
        refs
    }

    async fn slot(&self, entity: &EntityRef) -> Result<Arc<Mutex<StatusRecord>>, SupervisionError> {
        self.records
            .read()
            .await
            .get(entity)
            .cloned()
            .ok_or_else(|| SupervisionError::not_found(entity))
    }

    /// Core transition with the record lock held.
    ///
    /// Events are published before the lock is released; the bus send is
    /// non-blocking, and this keeps per-entity bus order identical to
    /// per-entity transition order.
    fn apply_locked(
        &self,
        rec: &mut StatusRecord,
        status: SupervisionStatus,
        description: &str,
        ts: u64,
    ) -> Transition {
        if ts < rec.status_time {
            debug!(
                entity = %rec.entity,
                ts,
                status_time = rec.status_time,
                "rejecting out-of-order supervision transition"
            );
            return Transition::Stale;
        }

        let previous = rec.clone();
        rec.status = status;
        rec.description = Arc::from(description);
        rec.status_time = ts;
        let current = rec.clone();

        self.bus.publish(
            Event::new(EventKind::Update)
                .with_entity(current.entity.clone())
                .with_status(status)
                .with_reason(Arc::clone(&current.description))
                .with_timestamp(ts),
        );
        if previous.status.is_running() != current.status.is_running() {
            self.bus.publish(
                Event::new(EventKind::StatusChange)
                    .with_entity(current.entity.clone())
                    .with_status(status)
                    .with_reason(Arc::clone(&current.description))
                    .with_timestamp(ts),
            );
        }

        Transition::Applied { previous, current }
    }
}
