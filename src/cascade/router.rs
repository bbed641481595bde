//! # Cascade router - event-driven supervision propagation.
//!
//! The router subscribes to the bus and converts upstream signals into
//! state-machine transitions:
//! - `AliveExpired` → suspend the owning entity
//! - `FaultAccepted` → evaluate the fault value, resume/suspend the owner
//! - `StatusChange` on an Equipment → resume/suspend its SubEquipment
//!   children
//!
//! ## Architecture
//! ```text
//! Bus → CascadeRouter listener
//!         ├─► AliveExpired(e, last_update) → registry.suspend(e, ...)
//!         ├─► FaultAccepted(e, value, ts)  → guards → evaluate → resume/suspend
//!         └─► StatusChange(e: Equipment)   → topology.children_of(e)
//!                                             └─► per child: resume/suspend
//! ```
//!
//! ## Rules
//! - Cascades key off `StatusChange` only; `Update` refreshes never
//!   re-propagate a status that did not actually change availability.
//! - One hierarchy level per event: the only fan-out is
//!   Equipment → SubEquipment. A child's own `StatusChange` finds no
//!   children and the cascade ends there. Process-level status changes are
//!   deliberately not cascaded to equipment: each equipment's own
//!   liveness/fault channels stay authoritative for it.
//! - A missing child or owner (`NotFound`) is logged and skipped; the
//!   remaining children are still propagated to.
//! - Stale transitions surface as no-ops from the registry; the router does
//!   not re-check timestamps itself.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{Bus, Event, EventKind};
use crate::fault::{can_update, evaluate, has_id_mismatch, FaultRecord};
use crate::status::{StatusRegistry, SupervisionStatus};
use crate::topology::{EntityKind, Topology};

/// Event-driven propagation of supervision signals.
pub struct CascadeRouter {
    bus: Bus,
    registry: Arc<StatusRegistry>,
    topology: Arc<dyn Topology>,
}

impl CascadeRouter {
    /// Creates a router over the given registry and topology.
    pub fn new(bus: Bus, registry: Arc<StatusRegistry>, topology: Arc<dyn Topology>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            registry,
            topology,
        })
    }

    /// Spawns the bus listener.
    ///
    /// Call once during manager start. The listener runs until the token is
    /// cancelled or the bus closes; lagging behind the bus drops the missed
    /// events (logged) and keeps listening.
    pub fn spawn_listener(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => self.route(&ev).await,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(n)) => {
                            warn!(missed = n, "cascade listener lagged behind the bus");
                            continue;
                        }
                    }
                }
            }
        })
    }

    /// Dispatches one event.
    pub async fn route(&self, event: &Event) {
        match event.kind {
            EventKind::AliveExpired => self.on_alive_expired(event).await,
            EventKind::FaultAccepted => self.on_fault_accepted(event).await,
            EventKind::StatusChange => self.on_status_change(event).await,
            _ => {}
        }
    }

    /// Expiry notification: suspend the owner at the recorded last update.
    async fn on_alive_expired(&self, event: &Event) {
        let Some(entity) = &event.entity else { return };
        let ts = event.timestamp.unwrap_or(0);
        let description = format!("Alive timer expired for {entity}");

        if let Err(err) = self.registry.suspend(entity, ts, &description).await {
            warn!(entity = %entity, error = %err, "cannot suspend on alive expiry");
        }
    }

    /// Accepted fault update: evaluate and drive the owner's state.
    async fn on_fault_accepted(&self, event: &Event) {
        let Some(entity) = &event.entity else { return };
        let record = FaultRecord {
            entity: entity.clone(),
            value: event.fault,
            timestamp: event.timestamp.unwrap_or(0),
        };
        if !can_update(&record) {
            return;
        }

        // Wiring check against the authoritative record; mismatches are
        // flagged and the update is still applied.
        match self.registry.get(entity).await {
            Ok(state) => {
                if has_id_mismatch(entity, &state.entity) {
                    warn!(
                        fault = %entity,
                        state = %state.entity,
                        "fault channel wired to a mismatching supervision record"
                    );
                }
            }
            Err(err) => {
                warn!(entity = %entity, error = %err, "no supervision record for fault channel");
                return;
            }
        }

        let value = record.value.unwrap_or_default();
        let ts = record.timestamp;
        let outcome = match evaluate(value) {
            SupervisionStatus::Down => {
                let description =
                    format!("Communication fault tag indicates that {entity} is down");
                self.registry.suspend(entity, ts, &description).await
            }
            _ => {
                let description = format!("Communication fault tag indicates that {entity} is up");
                self.registry.resume(entity, ts, &description).await
            }
        };
        if let Err(err) = outcome {
            warn!(entity = %entity, error = %err, "cannot apply fault evaluation");
        }
    }

    /// Availability flip on an Equipment: propagate to SubEquipment children.
    async fn on_status_change(&self, event: &Event) {
        let Some(entity) = &event.entity else { return };
        if entity.kind != EntityKind::Equipment {
            return;
        }
        let Some(status) = event.status else { return };
        let ts = event.timestamp.unwrap_or(0);

        let children = self.topology.children_of(entity).await;
        if children.is_empty() {
            return;
        }
        debug!(
            equipment = %entity,
            children = children.len(),
            status = status.as_label(),
            "cascading equipment status change"
        );

        for child in children {
            let outcome = if status.is_running() {
                let description = format!(
                    "Automatically resumed because of parent Equipment switching state to RUNNING on {ts}"
                );
                self.registry.resume(&child, ts, &description).await
            } else {
                let description = format!(
                    "Automatically suspended because of parent Equipment switching state to DOWN on {ts}"
                );
                self.registry.suspend(&child, ts, &description).await
            };
            if let Err(err) = outcome {
                // Child decommissioned mid-cascade; keep going.
                warn!(child = %child, error = %err, "skipping child during cascade");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{EntityRef, TopologyMap};

    async fn setup() -> (Arc<CascadeRouter>, Arc<StatusRegistry>, Arc<TopologyMap>, Bus) {
        let bus = Bus::new(128);
        let registry = Arc::new(StatusRegistry::new(bus.clone()));
        let topology = Arc::new(TopologyMap::new());
        let router = CascadeRouter::new(
            bus.clone(),
            Arc::clone(&registry),
            Arc::clone(&topology) as Arc<dyn Topology>,
        );
        (router, registry, topology, bus)
    }

    #[tokio::test]
    async fn test_expiry_suspends_owner() {
        let (router, registry, _topology, _bus) = setup().await;
        let eq = EntityRef::equipment(1, "E1");
        registry.register(eq.clone()).await;
        registry.resume(&eq, 1_000, "up").await.unwrap();

        router
            .route(
                &Event::new(EventKind::AliveExpired)
                    .with_entity(eq.clone())
                    .with_timestamp(5_000),
            )
            .await;

        let rec = registry.get(&eq).await.unwrap();
        assert_eq!(rec.status, SupervisionStatus::Down);
        assert_eq!(rec.status_time, 5_000);
        assert!(rec.description.contains("expired"));
    }

    #[tokio::test]
    async fn test_fault_drives_owner_state() {
        let (router, registry, _topology, _bus) = setup().await;
        let eq = EntityRef::equipment(1, "E1");
        registry.register(eq.clone()).await;
        registry.resume(&eq, 1_000, "up").await.unwrap();

        router
            .route(
                &Event::new(EventKind::FaultAccepted)
                    .with_entity(eq.clone())
                    .with_fault(true)
                    .with_timestamp(2_000),
            )
            .await;
        assert_eq!(
            registry.get(&eq).await.unwrap().status,
            SupervisionStatus::Down
        );

        router
            .route(
                &Event::new(EventKind::FaultAccepted)
                    .with_entity(eq.clone())
                    .with_fault(false)
                    .with_timestamp(3_000),
            )
            .await;
        let rec = registry.get(&eq).await.unwrap();
        assert_eq!(rec.status, SupervisionStatus::Running);
        assert!(rec.description.contains("is up"));
    }

    #[tokio::test]
    async fn test_fault_without_value_is_ignored() {
        let (router, registry, _topology, _bus) = setup().await;
        let eq = EntityRef::equipment(1, "E1");
        registry.register(eq.clone()).await;
        registry.resume(&eq, 1_000, "up").await.unwrap();

        // No fault payload: the unset-tag guard must reject it.
        router
            .route(
                &Event::new(EventKind::FaultAccepted)
                    .with_entity(eq.clone())
                    .with_timestamp(2_000),
            )
            .await;
        assert_eq!(
            registry.get(&eq).await.unwrap().status,
            SupervisionStatus::Running
        );
    }

    #[tokio::test]
    async fn test_status_change_fans_out_to_children_once() {
        let (router, registry, topology, _bus) = setup().await;
        let eq = EntityRef::equipment(1, "E1");
        let subs = [
            EntityRef::subequipment(10, "S1"),
            EntityRef::subequipment(11, "S2"),
            EntityRef::subequipment(12, "S3"),
        ];
        registry.register(eq.clone()).await;
        topology.insert(eq.clone(), None).await;
        for s in &subs {
            registry.register(s.clone()).await;
            topology.insert(s.clone(), Some(eq.clone())).await;
            registry.resume(s, 1_000, "up").await.unwrap();
        }

        router
            .route(
                &Event::new(EventKind::StatusChange)
                    .with_entity(eq.clone())
                    .with_status(SupervisionStatus::Down)
                    .with_timestamp(7_000),
            )
            .await;

        for s in &subs {
            let rec = registry.get(s).await.unwrap();
            assert_eq!(rec.status, SupervisionStatus::Down);
            assert_eq!(rec.status_time, 7_000);
            assert!(rec.description.contains("parent Equipment"));
        }
    }

    #[tokio::test]
    async fn test_process_status_change_does_not_cascade() {
        let (router, registry, topology, _bus) = setup().await;
        let proc = EntityRef::process(1, "P1");
        let eq = EntityRef::equipment(2, "E1");
        registry.register(proc.clone()).await;
        registry.register(eq.clone()).await;
        topology.insert(proc.clone(), None).await;
        topology.insert(eq.clone(), Some(proc.clone())).await;
        registry.resume(&eq, 1_000, "up").await.unwrap();

        router
            .route(
                &Event::new(EventKind::StatusChange)
                    .with_entity(proc.clone())
                    .with_status(SupervisionStatus::Down)
                    .with_timestamp(5_000),
            )
            .await;

        // The equipment keeps its own authoritative state.
        assert_eq!(
            registry.get(&eq).await.unwrap().status,
            SupervisionStatus::Running
        );
    }

    #[tokio::test]
    async fn test_update_refresh_does_not_cascade() {
        let (router, registry, topology, _bus) = setup().await;
        let eq = EntityRef::equipment(1, "E1");
        let sub = EntityRef::subequipment(10, "S1");
        registry.register(eq.clone()).await;
        registry.register(sub.clone()).await;
        topology.insert(sub.clone(), Some(eq.clone())).await;
        registry.resume(&sub, 1_000, "up").await.unwrap();

        // A refresh is an Update, not a StatusChange; the router must not
        // touch the child.
        router
            .route(
                &Event::new(EventKind::Update)
                    .with_entity(eq.clone())
                    .with_status(SupervisionStatus::Down)
                    .with_timestamp(5_000),
            )
            .await;

        assert_eq!(
            registry.get(&sub).await.unwrap().status,
            SupervisionStatus::Running
        );
    }

    #[tokio::test]
    async fn test_missing_child_does_not_stop_cascade() {
        let (router, registry, topology, _bus) = setup().await;
        let eq = EntityRef::equipment(1, "E1");
        let ghost = EntityRef::subequipment(10, "S_GONE");
        let live = EntityRef::subequipment(11, "S_LIVE");
        registry.register(eq.clone()).await;
        registry.register(live.clone()).await;
        topology.insert(ghost.clone(), Some(eq.clone())).await;
        topology.insert(live.clone(), Some(eq.clone())).await;
        registry.resume(&live, 1_000, "up").await.unwrap();

        router
            .route(
                &Event::new(EventKind::StatusChange)
                    .with_entity(eq.clone())
                    .with_status(SupervisionStatus::Down)
                    .with_timestamp(5_000),
            )
            .await;

        assert_eq!(
            registry.get(&live).await.unwrap().status,
            SupervisionStatus::Down
        );
    }
}
