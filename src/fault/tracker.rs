//! # Fault-signal tracker.
//!
//! Maintains one [`FaultRecord`] per fault channel and enforces the
//! stale-update invariant: an update is accepted only if its timestamp is
//! not older than the previously accepted one for the same entity.
//!
//! Accepted updates are published as [`EventKind::FaultAccepted`] for the
//! cascade path to evaluate; rejected ones are an expected race under
//! network reordering and are dropped silently (debug log only).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::SupervisionError;
use crate::events::{Bus, Event, EventKind};
use crate::topology::EntityRef;

/// State of one communication-fault channel.
#[derive(Debug, Clone)]
pub struct FaultRecord {
    /// Owner of the fault channel.
    pub entity: EntityRef,
    /// Last accepted fault value; `None` until the tag first receives one.
    pub value: Option<bool>,
    /// Timestamp of the last accepted update (epoch milliseconds).
    pub timestamp: u64,
}

/// Outcome of a fault-update attempt.
#[derive(Debug, Clone)]
pub enum FaultUpdate {
    /// Accepted and recorded; carries the updated record.
    Accepted(FaultRecord),
    /// Rejected: older than the previously accepted update.
    Stale,
}

/// Tracker of fault channels for all supervised entities.
pub struct FaultTracker {
    records: RwLock<HashMap<EntityRef, Arc<Mutex<FaultRecord>>>>,
    bus: Bus,
}

impl FaultTracker {
    /// Creates an empty tracker publishing accepted updates to the bus.
    pub fn new(bus: Bus) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Registers a fault channel with no value yet.
    ///
    /// Re-registering an existing channel keeps the record in place.
    pub async fn register(&self, entity: EntityRef) {
        let mut records = self.records.write().await;
        records.entry(entity.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(FaultRecord {
                entity,
                value: None,
                timestamp: 0,
            }))
        });
    }

    /// Removes the channel of a decommissioned entity.
    pub async fn remove(&self, entity: &EntityRef) {
        self.records.write().await.remove(entity);
    }

    /// Returns a snapshot of one record.
    pub async fn get(&self, entity: &EntityRef) -> Result<FaultRecord, SupervisionError> {
        let slot = self.slot(entity).await?;
        let rec = slot.lock().await;
        Ok(rec.clone())
    }

    /// Applies a fault-signal update.
    ///
    /// Updates with `ts` older than the record are rejected as
    /// [`FaultUpdate::Stale`]. Accepted updates replace value/timestamp
    /// atomically and publish [`EventKind::FaultAccepted`] while the record
    /// lock is held, so per-entity bus order matches acceptance order.
    pub async fn apply_update(
        &self,
        entity: &EntityRef,
        value: bool,
        ts: u64,
    ) -> Result<FaultUpdate, SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;

        if ts < rec.timestamp {
            debug!(
                entity = %rec.entity,
                ts,
                accepted = rec.timestamp,
                "rejecting stale fault update"
            );
            return Ok(FaultUpdate::Stale);
        }

        rec.value = Some(value);
        rec.timestamp = ts;
        let updated = rec.clone();

        self.bus.publish(
            Event::new(EventKind::FaultAccepted)
                .with_entity(updated.entity.clone())
                .with_fault(value)
                .with_timestamp(ts),
        );

        Ok(FaultUpdate::Accepted(updated))
    }

    async fn slot(&self, entity: &EntityRef) -> Result<Arc<Mutex<FaultRecord>>, SupervisionError> {
        self.records
            .read()
            .await
            .get(entity)
            .cloned()
            .ok_or_else(|| SupervisionError::not_found(entity))
    }
}
