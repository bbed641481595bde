//! # SupervisionManager: wires the components and receives raw signals.
//!
//! The manager owns the bus and every tracker/registry, spawns the cascade
//! listener and the expiry scanner on [`start`](SupervisionManager::start),
//! and is the entry point the DAQ protocol adapters call with heartbeats,
//! fault values and process lifecycle notifications.
//!
//! ## High-level architecture
//! ```text
//! DAQ adapters:
//!   on_heartbeat(e, ts) ──► delayed-arrival check ──► LivenessTracker::touch
//!                                                     StatusRegistry::resume
//!   on_fault(e, v, ts)  ──► FaultTracker::apply_update ──► Bus: FaultAccepted
//!   on_process_started / on_process_disconnected ──► start/stop transitions
//!
//! Background (spawned by start(), stopped by stop()):
//!   ExpiryScanner ──► Bus: AliveExpired ──┐
//!                                          ├──► CascadeRouter ──► StatusRegistry
//!   Bus: FaultAccepted / StatusChange ────┘
//!   Bus ──► fan-out listener ──► SubscriberSet ──► external consumers
//! ```
//!
//! ## Rules
//! - Commissioning creates every per-entity record the spec wires
//!   (status always, liveness/fault when the spec asks for them);
//!   decommissioning removes all of them. Records are never replaced while
//!   the entity exists.
//! - A process disconnect stops the process AND its equipments and their
//!   subequipments explicitly. This is the one place a process-level event
//!   reaches equipment: the status-change cascade itself stays
//!   Equipment → SubEquipment only.
//! - All entry points absorb `NotFound` races by reporting them to the
//!   caller as recoverable errors; nothing here terminates the host.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cascade::CascadeRouter;
use crate::clock::epoch_millis;
use crate::config::Config;
use crate::error::SupervisionError;
use crate::events::Bus;
use crate::fault::{FaultTracker, FaultUpdate};
use crate::liveness::{ExpiryScanner, LivenessTracker};
use crate::status::{StatusRegistry, SupervisionStatus};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::topology::{EntityRef, EntitySpec, Topology, TopologyMap};

/// Supervision facade: component wiring plus raw-signal entry points.
pub struct SupervisionManager {
    cfg: Config,
    bus: Bus,
    topology: Arc<TopologyMap>,
    liveness: Arc<LivenessTracker>,
    faults: Arc<FaultTracker>,
    registry: Arc<StatusRegistry>,
    scanner: Arc<ExpiryScanner>,
    router: Arc<CascadeRouter>,
    subs: Arc<SubscriberSet>,
    runtime_token: CancellationToken,
}

impl SupervisionManager {
    /// Creates a manager with the given configuration and subscribers.
    ///
    /// Nothing runs until [`start`](Self::start) is called.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let topology = Arc::new(TopologyMap::new());
        let liveness = Arc::new(LivenessTracker::new());
        let faults = Arc::new(FaultTracker::new(bus.clone()));
        let registry = Arc::new(StatusRegistry::new(bus.clone()));
        let scanner = Arc::new(ExpiryScanner::new(
            Arc::clone(&liveness),
            bus.clone(),
            &cfg,
        ));
        let router = CascadeRouter::new(
            bus.clone(),
            Arc::clone(&registry),
            Arc::clone(&topology) as Arc<dyn Topology>,
        );
        let subs = Arc::new(SubscriberSet::new(subscribers));

        Self {
            cfg,
            bus,
            topology,
            liveness,
            faults,
            registry,
            scanner,
            router,
            subs,
            runtime_token: CancellationToken::new(),
        }
    }

    /// Spawns the cascade listener, the expiry scanner and the subscriber
    /// fan-out. Idempotent per manager instance; call once.
    pub fn start(&self) {
        info!(
            scan_period = ?self.cfg.scan_period,
            initial_delay = ?self.cfg.initial_scan_delay,
            "starting supervision core"
        );
        Arc::clone(&self.router).spawn_listener(self.runtime_token.child_token());
        Arc::clone(&self.scanner).spawn(self.runtime_token.child_token());
        self.spawn_fanout_listener();
    }

    /// Cancels every background task spawned by [`start`](Self::start).
    ///
    /// Does not interrupt work already in flight; tasks stop at their next
    /// cancellation point.
    pub fn stop(&self) {
        info!("stopping supervision core");
        self.runtime_token.cancel();
    }

    // ---------------------------
    // Topology lifecycle
    // ---------------------------

    /// Commissions one entity: topology edge, status record (initial
    /// `Down`), and the liveness/fault channels the spec wires.
    pub async fn register(&self, spec: &EntitySpec) -> EntityRef {
        let entity = spec.entity().clone();
        self.topology
            .insert(entity.clone(), spec.parent().cloned())
            .await;
        self.registry.register(entity.clone()).await;
        if let Some(interval) = spec.alive_interval_ms() {
            self.liveness.register(entity.clone(), interval).await;
        }
        if spec.has_fault_channel() {
            self.faults.register(entity.clone()).await;
        }
        debug!(entity = %entity, "commissioned supervised entity");
        entity
    }

    /// Decommissions an entity, removing every record it owns.
    pub async fn decommission(&self, entity: &EntityRef) {
        self.liveness.remove(entity).await;
        self.faults.remove(entity).await;
        self.registry.remove(entity).await;
        self.topology.remove(entity).await;
        debug!(entity = %entity, "decommissioned supervised entity");
    }

    // ---------------------------
    // Signal-source entry points
    // ---------------------------

    /// Handles one heartbeat for an entity's alive channel.
    ///
    /// Beats that lag the local clock by more than twice the channel
    /// interval are delayed arrivals and are discarded; fresh beats refresh
    /// the channel and resume the entity at the beat's timestamp.
    pub async fn on_heartbeat(&self, entity: &EntityRef, ts: u64) -> Result<(), SupervisionError> {
        let now = epoch_millis();
        if self.liveness.is_delayed_arrival(entity, ts, now).await? {
            debug!(entity = %entity, ts, "rejecting heartbeat as delayed arrival");
            return Ok(());
        }

        self.liveness.touch(entity, ts).await?;
        let description = format!("{} alive tag received.", entity.kind);
        self.registry.resume(entity, ts, &description).await?;
        Ok(())
    }

    /// Handles one fault-signal value change.
    ///
    /// Stale updates are dropped inside the tracker; accepted ones reach
    /// the cascade path via the bus.
    pub async fn on_fault(
        &self,
        entity: &EntityRef,
        value: bool,
        ts: u64,
    ) -> Result<FaultUpdate, SupervisionError> {
        self.faults.apply_update(entity, value, ts).await
    }

    /// Handles a process announcing itself after (re)connection.
    ///
    /// Moves the process to `Startup` and arms its alive channel without
    /// clobbering a fresher heartbeat timestamp.
    pub async fn on_process_started(
        &self,
        process: &EntityRef,
        ts: u64,
    ) -> Result<(), SupervisionError> {
        if let Err(err) = self.liveness.start_if_inactive(process, ts).await {
            // A process without an alive channel is legal configuration.
            debug!(process = %process, error = %err, "no alive channel to arm on start");
        }
        self.registry.start(process, ts).await?;
        Ok(())
    }

    /// Handles an orderly process disconnection.
    ///
    /// Stops the process and explicitly stops its equipments and their
    /// subequipments, deactivating every alive channel on the way. Honored
    /// for a process in `Running` or `Startup`; a disconnect for a process
    /// that is already down is ignored (warn).
    pub async fn on_process_disconnected(
        &self,
        process: &EntityRef,
        ts: u64,
    ) -> Result<(), SupervisionError> {
        let record = self.registry.get(process).await?;
        if !record.status.is_running() && record.status != SupervisionStatus::Startup {
            warn!(
                process = %process,
                "received disconnection for a process that is not running; ignored"
            );
            return Ok(());
        }

        self.stop_entity(process, ts).await;
        for equipment in self.topology.equipments_of(process).await {
            self.stop_entity(&equipment, ts).await;
            for sub in self.topology.children_of(&equipment).await {
                self.stop_entity(&sub, ts).await;
            }
        }
        Ok(())
    }

    /// Stop transition plus alive-channel deactivation, absorbing races
    /// with concurrent decommissioning.
    async fn stop_entity(&self, entity: &EntityRef, ts: u64) {
        if let Err(err) = self.registry.stop(entity, ts).await {
            warn!(entity = %entity, error = %err, "cannot stop entity on disconnect");
        }
        if let Err(err) = self.liveness.deactivate(entity, ts).await {
            debug!(entity = %entity, error = %err, "no alive channel to deactivate");
        }
    }

    // ---------------------------
    // Accessors
    // ---------------------------

    /// The event bus shared by all components.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The heartbeat tracker (bulk activate/deactivate live here).
    pub fn liveness(&self) -> &Arc<LivenessTracker> {
        &self.liveness
    }

    /// The fault tracker.
    pub fn faults(&self) -> &Arc<FaultTracker> {
        &self.faults
    }

    /// The authoritative status registry.
    pub fn registry(&self) -> &Arc<StatusRegistry> {
        &self.registry
    }

    /// The topology map.
    pub fn topology(&self) -> &Arc<TopologyMap> {
        &self.topology
    }

    /// The expiry scanner (sweeps can be driven directly in tests).
    pub fn scanner(&self) -> &Arc<ExpiryScanner> {
        &self.scanner
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    fn spawn_fanout_listener(&self) {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);
        let token = self.runtime_token.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => subs.emit_arc(Arc::new(ev)),
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(missed = n, "subscriber fan-out lagged behind the bus");
                            continue;
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SupervisionManager {
        SupervisionManager::new(Config::default(), Vec::new())
    }

    async fn commission_plant(mgr: &SupervisionManager) -> (EntityRef, EntityRef, EntityRef) {
        let proc = mgr
            .register(&EntitySpec::process(1, "P_DAQ").with_alive_interval(10_000))
            .await;
        let eq = mgr
            .register(
                &EntitySpec::equipment(100, "E_PUMP", proc.clone())
                    .with_alive_interval(10_000)
                    .with_fault_channel(),
            )
            .await;
        let sub = mgr
            .register(&EntitySpec::subequipment(200, "S_VALVE", eq.clone()))
            .await;
        (proc, eq, sub)
    }

    #[tokio::test]
    async fn test_commission_creates_all_records() {
        let mgr = manager();
        let (proc, eq, sub) = commission_plant(&mgr).await;

        assert_eq!(
            mgr.registry().get(&proc).await.unwrap().status,
            SupervisionStatus::Down
        );
        assert!(mgr.liveness().get(&eq).await.is_ok());
        assert!(mgr.faults().get(&eq).await.is_ok());
        // The subequipment has no channels of its own, only a status record.
        assert!(mgr.liveness().get(&sub).await.is_err());
        assert_eq!(mgr.topology().children_of(&eq).await, vec![sub]);
    }

    #[tokio::test]
    async fn test_heartbeat_resumes_entity() {
        let mgr = manager();
        let (_proc, eq, _sub) = commission_plant(&mgr).await;

        let ts = epoch_millis();
        mgr.on_heartbeat(&eq, ts).await.unwrap();

        let rec = mgr.registry().get(&eq).await.unwrap();
        assert_eq!(rec.status, SupervisionStatus::Running);
        assert!(rec.description.contains("alive tag received"));
        assert!(mgr.liveness().get(&eq).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_delayed_heartbeat_is_discarded() {
        let mgr = manager();
        let (_proc, eq, _sub) = commission_plant(&mgr).await;

        // More than 2 × interval behind the local clock.
        let stale_ts = epoch_millis() - 25_000;
        mgr.on_heartbeat(&eq, stale_ts).await.unwrap();

        assert_eq!(
            mgr.registry().get(&eq).await.unwrap().status,
            SupervisionStatus::Down
        );
        assert!(!mgr.liveness().get(&eq).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_process_start_and_disconnect_lifecycle() {
        let mgr = manager();
        let (proc, eq, sub) = commission_plant(&mgr).await;

        let t0 = epoch_millis();
        mgr.on_process_started(&proc, t0).await.unwrap();
        assert_eq!(
            mgr.registry().get(&proc).await.unwrap().status,
            SupervisionStatus::Startup
        );

        // Equipment and subequipment come up on their own signals.
        mgr.on_heartbeat(&eq, t0 + 1).await.unwrap();
        mgr.registry().resume(&sub, t0 + 1, "up").await.unwrap();

        mgr.on_process_disconnected(&proc, t0 + 10).await.unwrap();

        for e in [&proc, &eq, &sub] {
            let rec = mgr.registry().get(e).await.unwrap();
            assert_eq!(rec.status, SupervisionStatus::Down, "{e} should be down");
            assert!(rec.description.contains("was stopped"));
        }
        assert!(!mgr.liveness().get(&eq).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_disconnect_of_stopped_process_is_ignored() {
        let mgr = manager();
        let (proc, eq, _sub) = commission_plant(&mgr).await;
        mgr.registry().resume(&eq, 1_000, "up").await.unwrap();

        // Process is still Down: the disconnect must not touch anything.
        mgr.on_process_disconnected(&proc, 2_000).await.unwrap();
        assert_eq!(
            mgr.registry().get(&eq).await.unwrap().status,
            SupervisionStatus::Running
        );
    }

    #[tokio::test]
    async fn test_decommission_removes_records() {
        let mgr = manager();
        let (_proc, eq, _sub) = commission_plant(&mgr).await;

        mgr.decommission(&eq).await;
        assert!(mgr.registry().get(&eq).await.is_err());
        assert!(mgr.liveness().get(&eq).await.is_err());
        assert!(mgr.faults().get(&eq).await.is_err());
    }
}
