//! # Supervision events emitted by the core components.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **State events**: accepted transitions on a status record (update,
//!   availability change)
//! - **Signal events**: raw-signal outcomes fed back into the cascade path
//!   (alive expiry, accepted fault update)
//! - **Outage events**: edge-triggered mass-outage detection
//!
//! The [`Event`] struct carries metadata such as the entity ref, the new
//! status, a human-readable reason, and the signal timestamp.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically with emission order. Supervision *decisions* are ordered by
//! the signal `timestamp`, not by `seq`; `seq` only restores emission order
//! when events are consumed out of order.
//!
//! ## Example
//! ```rust
//! use vigil::{Event, EventKind, EntityRef, SupervisionStatus};
//!
//! let ev = Event::new(EventKind::StatusChange)
//!     .with_entity(EntityRef::equipment(4, "E_PUMP"))
//!     .with_status(SupervisionStatus::Down)
//!     .with_reason("Communication fault tag indicates that Equipment E_PUMP (#4) is down")
//!     .with_timestamp(1_700_000_000_000);
//!
//! assert_eq!(ev.kind, EventKind::StatusChange);
//! assert_eq!(ev.status, Some(SupervisionStatus::Down));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::status::SupervisionStatus;
use crate::topology::EntityRef;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervision events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === State events ===
    /// A transition was accepted on a status record.
    ///
    /// Emitted for every accepted transition, including refreshes that keep
    /// the same availability (e.g. a description change).
    ///
    /// Sets: `entity`, `status`, `reason`, `timestamp`, `seq`.
    Update,

    /// A transition flipped the running-vs-not-running boolean.
    ///
    /// Emitted *in addition to* [`EventKind::Update`]. This is the event the
    /// cascade path keys off of, so refreshes never re-cascade.
    ///
    /// Sets: `entity`, `status`, `reason`, `timestamp`, `seq`.
    StatusChange,

    // === Signal events ===
    /// A heartbeat channel expired during a scanner sweep.
    ///
    /// Sets:
    /// - `entity`: owner of the expired channel
    /// - `timestamp`: the channel's recorded last update
    /// - `seq`: global sequence
    AliveExpired,

    /// A fault-signal update passed stale-rejection and was recorded.
    ///
    /// Sets:
    /// - `entity`: owner of the fault channel
    /// - `fault`: the accepted fault value
    /// - `timestamp`: the accepted signal timestamp
    /// - `seq`: global sequence
    FaultAccepted,

    // === Outage events ===
    /// The count of down entities crossed the configured high-water mark.
    ///
    /// Edge-triggered: raised once per outage episode.
    ///
    /// Sets: `down_count`, `seq`.
    MassOutageDetected,

    /// The down-count stayed under the threshold long enough to clear.
    ///
    /// Sets: `down_count`, `seq`.
    MassOutageCleared,
}

/// Supervision event with optional metadata.
///
/// - `seq`: monotonic global sequence for emission ordering
/// - `timestamp`: signal-domain epoch milliseconds, when applicable
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Event classification.
    pub kind: EventKind,
    /// Entity the event concerns, if applicable.
    pub entity: Option<EntityRef>,
    /// New supervision status, for state events.
    pub status: Option<SupervisionStatus>,
    /// Human-readable reason/description.
    pub reason: Option<Arc<str>>,
    /// Signal timestamp (epoch milliseconds).
    pub timestamp: Option<u64>,
    /// Accepted fault value, for [`EventKind::FaultAccepted`].
    pub fault: Option<bool>,
    /// Number of down entities, for outage events.
    pub down_count: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
            entity: None,
            status: None,
            reason: None,
            timestamp: None,
            fault: None,
            down_count: None,
        }
    }

    /// Attaches the entity the event concerns.
    #[inline]
    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Attaches the new supervision status.
    #[inline]
    pub fn with_status(mut self, status: SupervisionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the signal timestamp (epoch milliseconds).
    #[inline]
    pub fn with_timestamp(mut self, ts: u64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Attaches the accepted fault value.
    #[inline]
    pub fn with_fault(mut self, fault: bool) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Attaches the down-entity count.
    #[inline]
    pub fn with_down_count(mut self, n: usize) -> Self {
        self.down_count = Some(n);
        self
    }

    /// True for events that describe an availability flip.
    #[inline]
    pub fn is_status_change(&self) -> bool {
        matches!(self.kind, EventKind::StatusChange)
    }
}
