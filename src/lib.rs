//! # vigil
//!
//! **Vigil** is the supervision core of an industrial monitoring platform.
//!
//! It tracks the operational health of a hierarchy of remote
//! data-acquisition processes (Process → Equipment → SubEquipment),
//! converts intermittent heartbeat and fault signals into an authoritative,
//! monotonic supervision status per entity, cascades availability changes
//! down the topology, and guarantees eventual delivery of status events to
//! external consumers across transient publication failures.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ DAQ adapter  │   │ DAQ adapter  │   │   operator   │
//!     │ (heartbeats) │   │   (faults)   │   │   actions    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  SupervisionManager (facade)                                      │
//! │  - LivenessTracker (heartbeat channels, per-entity records)       │
//! │  - FaultTracker (fault channels, stale-update rejection)          │
//! │  - StatusRegistry (Startup/Running/Down state machine)            │
//! │  - TopologyMap (parent → children edges)                          │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!   ┌───────────┐     ┌────────────┐    ┌─────────────┐
//!   │ExpiryScan.│     │CascadeRout.│    │SubscriberSet│
//!   │ (periodic │     │(bus listen.│    │ (fan-out to │
//!   │  sweep)   │     │ propagate) │    │  consumers) │
//!   └─────┬─────┘     └─────┬──────┘    └──────┬──────┘
//!         │ AliveExpired    │ resume/suspend   │ on_event()
//!         ▼                 ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │   Update / StatusChange / AliveExpired / FaultAccepted / outage   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Signal flow
//! ```text
//! heartbeat(e, ts) ─► LivenessTracker::touch ─► StatusRegistry::resume
//! fault(e, v, ts)  ─► FaultTracker ─► Bus:FaultAccepted ─► CascadeRouter
//!                         └─ stale? dropped (timestamp order, not arrival)
//! scanner sweep    ─► expire_if_due ─► Bus:AliveExpired ─► CascadeRouter
//! StatusRegistry   ─► Bus:StatusChange (availability flips only)
//!                         └─► CascadeRouter ─► children resume/suspend
//! delivery failure ─► Republisher::publication_failed ─► retry on delay
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                       |
//! |-------------------|-------------------------------------------------------------------|------------------------------------------|
//! | **Liveness**      | Heartbeat channels with grace-buffered expiry detection.          | [`LivenessTracker`], [`ExpiryScanner`]   |
//! | **Faults**        | Fault channels with stale rejection and pure evaluation.          | [`FaultTracker`], [`evaluate`]           |
//! | **State machine** | Monotonic Startup/Running/Down transitions per entity.            | [`StatusRegistry`], [`Transition`]       |
//! | **Cascade**       | Equipment → SubEquipment propagation of availability flips.       | [`CascadeRouter`], [`Topology`]          |
//! | **Redelivery**    | Fixed-delay retry of failed event publications.                   | [`Republisher`], [`Publish`]             |
//! | **Observability** | Broadcast bus plus per-subscriber fan-out queues.                 | [`Bus`], [`Subscribe`], [`SubscriberSet`]|
//!
//! ## Example
//! ```rust
//! use vigil::{Config, EntitySpec, SupervisionManager, SupervisionStatus, epoch_millis};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = SupervisionManager::new(Config::default(), Vec::new());
//!     manager.start();
//!
//!     // Commission a small plant.
//!     let process = manager
//!         .register(&EntitySpec::process(1, "P_DAQ_01").with_alive_interval(10_000))
//!         .await;
//!     let equipment = manager
//!         .register(
//!             &EntitySpec::equipment(100, "E_PUMP", process.clone())
//!                 .with_alive_interval(10_000)
//!                 .with_fault_channel(),
//!         )
//!         .await;
//!
//!     // Raw signals drive the state machine.
//!     manager.on_process_started(&process, epoch_millis()).await?;
//!     manager.on_heartbeat(&equipment, epoch_millis()).await?;
//!
//!     let record = manager.registry().get(&equipment).await?;
//!     assert_eq!(record.status, SupervisionStatus::Running);
//!
//!     manager.stop();
//!     Ok(())
//! }
//! ```

mod cascade;
mod clock;
mod config;
mod error;
mod events;
mod fault;
mod liveness;
mod manager;
mod republish;
mod status;
mod subscribers;
mod topology;

// ---- Public re-exports ----

pub use cascade::CascadeRouter;
pub use clock::epoch_millis;
pub use config::Config;
pub use error::{PublishError, SupervisionError};
pub use events::{Bus, Event, EventKind};
pub use fault::{can_update, evaluate, has_id_mismatch, FaultRecord, FaultTracker, FaultUpdate};
pub use liveness::{ExpiryCheck, ExpiryScanner, LivenessRecord, LivenessTracker, SweepReport};
pub use manager::SupervisionManager;
pub use republish::{Publish, Republisher};
pub use status::{StatusRecord, StatusRegistry, SupervisionStatus, Transition};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use topology::{EntityKind, EntityRef, EntitySpec, Topology, TopologyMap};
