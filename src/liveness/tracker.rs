//! # Heartbeat liveness tracker.
//!
//! Maintains one [`LivenessRecord`] per heartbeat channel and decides, from
//! timestamps alone, whether a channel has gone silent for too long.
//!
//! ## Architecture
//! ```text
//! DAQ adapters ──► SupervisionManager::on_heartbeat ──► touch()
//!                                                          │
//!                                                          ▼
//!                                RwLock<HashMap<EntityRef, Mutex<LivenessRecord>>>
//!                                                          ▲
//! ExpiryScanner ──► expire_if_due()  (atomic check + deactivate) ──┘
//! ```
//!
//! ## Rules
//! - **One record per entity**: registration upserts in place; two records
//!   for the same entity must never exist.
//! - **Per-key serialization**: a heartbeat arriving mid-sweep for one
//!   entity cannot be lost or double-processed; each record has its own lock.
//! - **Grace buffer**: a channel expires only after `interval + interval/3`
//!   of silence; the extra third absorbs clock skew between the signal
//!   source and this tracker.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::SupervisionError;
use crate::topology::EntityRef;

/// State of one heartbeat channel.
#[derive(Debug, Clone)]
pub struct LivenessRecord {
    /// Owner of the heartbeat channel.
    pub entity: EntityRef,
    /// Expected max gap between heartbeats (milliseconds).
    pub interval_ms: u64,
    /// Timestamp of the last accepted heartbeat (epoch milliseconds).
    pub last_update: u64,
    /// Whether the channel is currently being watched for expiry.
    pub active: bool,
}

/// Outcome of the scanner-side expiry check for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    /// Active and fresh.
    Alive,
    /// Was active and overdue; deactivated by this call. Carries the
    /// recorded last update for the expiry notification.
    Expired {
        /// The channel's last heartbeat timestamp.
        last_update: u64,
    },
    /// Already inactive (expired earlier or never started).
    Inactive,
}

/// Tracker of heartbeat channels for all supervised entities.
pub struct LivenessTracker {
    records: RwLock<HashMap<EntityRef, Arc<Mutex<LivenessRecord>>>>,
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a heartbeat channel, inactive until the first touch.
    ///
    /// Re-registering updates the interval in place and keeps the record.
    pub async fn register(&self, entity: EntityRef, interval_ms: u64) {
        let mut records = self.records.write().await;
        match records.get(&entity) {
            Some(slot) => {
                let mut rec = slot.lock().await;
                rec.interval_ms = interval_ms;
            }
            None => {
                records.insert(
                    entity.clone(),
                    Arc::new(Mutex::new(LivenessRecord {
                        entity,
                        interval_ms,
                        last_update: 0,
                        active: false,
                    })),
                );
            }
        }
    }

    /// Removes the channel of a decommissioned entity.
    pub async fn remove(&self, entity: &EntityRef) {
        self.records.write().await.remove(entity);
    }

    /// Force-refreshes a channel: activates it and advances `last_update`
    /// to `max(current, ts)` regardless of the active flag.
    ///
    /// This is the ordinary heartbeat path; it must always refresh the
    /// timestamp or every steadily-beating channel would expire.
    pub async fn touch(&self, entity: &EntityRef, ts: u64) -> Result<(), SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        rec.active = true;
        rec.last_update = rec.last_update.max(ts);
        Ok(())
    }

    /// Activates and stamps a channel only if it is currently inactive.
    ///
    /// Idempotent no-op when already active, so an explicit start event
    /// cannot clobber a fresher heartbeat timestamp.
    ///
    /// Returns true if the channel was activated by this call.
    pub async fn start_if_inactive(
        &self,
        entity: &EntityRef,
        ts: u64,
    ) -> Result<bool, SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        if rec.active {
            return Ok(false);
        }
        rec.active = true;
        rec.last_update = ts;
        Ok(true)
    }

    /// Deactivates a channel, stamping `last_update` only when the flag
    /// actually changes.
    pub async fn deactivate(&self, entity: &EntityRef, ts: u64) -> Result<(), SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        if rec.active {
            rec.active = false;
            rec.last_update = ts;
        }
        Ok(())
    }

    /// True if the channel is active and has been silent beyond
    /// `interval + interval/3`.
    pub async fn has_expired(&self, entity: &EntityRef, now: u64) -> Result<bool, SupervisionError> {
        let slot = self.slot(entity).await?;
        let rec = slot.lock().await;
        Ok(is_overdue(&rec, now))
    }

    /// True if a heartbeat timestamp lags the local clock by more than
    /// twice the interval; such beats are delayed arrivals at the server
    /// and must be discarded instead of refreshing the channel.
    pub async fn is_delayed_arrival(
        &self,
        entity: &EntityRef,
        ts: u64,
        now: u64,
    ) -> Result<bool, SupervisionError> {
        let slot = self.slot(entity).await?;
        let rec = slot.lock().await;
        Ok(now.saturating_sub(ts) > 2 * rec.interval_ms)
    }

    /// Atomic scanner-side check: if the channel is active and overdue,
    /// deactivates it and reports [`ExpiryCheck::Expired`] with the
    /// recorded last update.
    ///
    /// The check and the deactivation happen under the record's own lock,
    /// so a heartbeat racing the sweep either lands before (no expiry) or
    /// after (channel restarts via `touch`).
    pub async fn expire_if_due(
        &self,
        entity: &EntityRef,
        now: u64,
    ) -> Result<ExpiryCheck, SupervisionError> {
        let slot = self.slot(entity).await?;
        let mut rec = slot.lock().await;
        if !rec.active {
            return Ok(ExpiryCheck::Inactive);
        }
        if is_overdue(&rec, now) {
            rec.active = false;
            return Ok(ExpiryCheck::Expired {
                last_update: rec.last_update,
            });
        }
        Ok(ExpiryCheck::Alive)
    }

    /// Activates every channel, stamping only those whose flag changes.
    pub async fn bulk_activate(&self, now: u64) {
        let slots = self.snapshot_slots().await;
        for slot in slots {
            let mut rec = slot.lock().await;
            if !rec.active {
                rec.active = true;
                rec.last_update = now;
            }
        }
    }

    /// Deactivates every channel, stamping only those whose flag changes.
    pub async fn bulk_deactivate(&self, now: u64) {
        let slots = self.snapshot_slots().await;
        for slot in slots {
            let mut rec = slot.lock().await;
            if rec.active {
                rec.active = false;
                rec.last_update = now;
            }
        }
    }

    /// Snapshot of all registered entity refs, for the scanner sweep.
    pub async fn entities(&self) -> Vec<EntityRef> {
        self.records.read().await.keys().cloned().collect()
    }

    /// Returns a snapshot of one record.
    pub async fn get(&self, entity: &EntityRef) -> Result<LivenessRecord, SupervisionError> {
        let slot = self.slot(entity).await?;
        let rec = slot.lock().await;
        Ok(rec.clone())
    }

    async fn slot(
        &self,
        entity: &EntityRef,
    ) -> Result<Arc<Mutex<LivenessRecord>>, SupervisionError> {
        self.records
            .read()
            .await
            .get(entity)
            .cloned()
            .ok_or_else(|| SupervisionError::not_found(entity))
    }

    async fn snapshot_slots(&self) -> Vec<Arc<Mutex<LivenessRecord>>> {
        self.records.read().await.values().cloned().collect()
    }
}

fn is_overdue(rec: &LivenessRecord, now: u64) -> bool {
    rec.active && now.saturating_sub(rec.last_update) > rec.interval_ms + rec.interval_ms / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: u64 = 9_000;

    async fn tracker_with(entity: &EntityRef) -> LivenessTracker {
        let t = LivenessTracker::new();
        t.register(entity.clone(), INTERVAL).await;
        t
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let eq = EntityRef::equipment(1, "E1");
        let t = tracker_with(&eq).await;
        t.touch(&eq, 10_000).await.unwrap();

        // Exactly at interval: not expired.
        assert!(!t.has_expired(&eq, 10_000 + INTERVAL).await.unwrap());
        // At interval + grace: still not expired.
        let grace = INTERVAL / 3;
        assert!(!t.has_expired(&eq, 10_000 + INTERVAL + grace).await.unwrap());
        // One past the grace buffer: expired.
        assert!(t
            .has_expired(&eq, 10_000 + INTERVAL + grace + 1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_inactive_never_expires() {
        let eq = EntityRef::equipment(1, "E1");
        let t = tracker_with(&eq).await;
        assert!(!t.has_expired(&eq, u64::MAX).await.unwrap());
    }

    #[tokio::test]
    async fn test_touch_is_monotonic_and_forces_activation() {
        let eq = EntityRef::equipment(1, "E1");
        let t = tracker_with(&eq).await;

        t.touch(&eq, 5_000).await.unwrap();
        // An older beat must not move last_update backwards.
        t.touch(&eq, 3_000).await.unwrap();
        let rec = t.get(&eq).await.unwrap();
        assert_eq!(rec.last_update, 5_000);
        assert!(rec.active);

        // Touch reactivates a deactivated channel.
        t.deactivate(&eq, 6_000).await.unwrap();
        t.touch(&eq, 7_000).await.unwrap();
        assert!(t.get(&eq).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_start_if_inactive_is_idempotent() {
        let eq = EntityRef::equipment(1, "E1");
        let t = tracker_with(&eq).await;

        assert!(t.start_if_inactive(&eq, 1_000).await.unwrap());
        t.touch(&eq, 5_000).await.unwrap();
        // Already active: must not clobber the fresher timestamp.
        assert!(!t.start_if_inactive(&eq, 2_000).await.unwrap());
        assert_eq!(t.get(&eq).await.unwrap().last_update, 5_000);
    }

    #[tokio::test]
    async fn test_expire_if_due_deactivates_once() {
        let eq = EntityRef::equipment(1, "E1");
        let t = tracker_with(&eq).await;
        t.touch(&eq, 0).await.unwrap();

        let overdue = INTERVAL + INTERVAL / 3 + 1;
        let first = t.expire_if_due(&eq, overdue).await.unwrap();
        assert_eq!(first, ExpiryCheck::Expired { last_update: 0 });

        let second = t.expire_if_due(&eq, overdue).await.unwrap();
        assert_eq!(second, ExpiryCheck::Inactive);
    }

    #[tokio::test]
    async fn test_bulk_ops_stamp_only_on_change() {
        let e1 = EntityRef::equipment(1, "E1");
        let e2 = EntityRef::equipment(2, "E2");
        let t = LivenessTracker::new();
        t.register(e1.clone(), INTERVAL).await;
        t.register(e2.clone(), INTERVAL).await;
        t.touch(&e1, 5_000).await.unwrap();

        t.bulk_activate(9_000).await;
        // e1 was already active: timestamp untouched.
        assert_eq!(t.get(&e1).await.unwrap().last_update, 5_000);
        // e2 flipped: stamped.
        assert_eq!(t.get(&e2).await.unwrap().last_update, 9_000);

        t.bulk_deactivate(12_000).await;
        assert!(!t.get(&e1).await.unwrap().active);
        assert_eq!(t.get(&e1).await.unwrap().last_update, 12_000);
    }

    #[tokio::test]
    async fn test_delayed_arrival_detection() {
        let eq = EntityRef::equipment(1, "E1");
        let t = tracker_with(&eq).await;

        let now = 100_000;
        assert!(!t
            .is_delayed_arrival(&eq, now - 2 * INTERVAL, now)
            .await
            .unwrap());
        assert!(t
            .is_delayed_arrival(&eq, now - 2 * INTERVAL - 1, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_entity_is_not_found() {
        let t = LivenessTracker::new();
        let ghost = EntityRef::process(404, "P_GONE");
        let err = t.touch(&ghost, 1).await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
