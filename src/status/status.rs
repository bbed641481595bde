//! Supervision status lifecycle.

use std::fmt;

/// Authoritative availability status of a supervised entity.
///
/// Lifecycle: entities are created `Down`, move to `Startup` when their
/// process announces itself, and then oscillate between `Running` and `Down`
/// driven by heartbeats, fault signals and cascades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionStatus {
    /// Transient state set explicitly on process start.
    Startup,
    /// The entity is reachable and delivering data.
    Running,
    /// The entity is unreachable or stopped (initial state).
    Down,
}

impl SupervisionStatus {
    /// True only for [`SupervisionStatus::Running`].
    ///
    /// This boolean is what [`EventKind::StatusChange`](crate::EventKind)
    /// tracks: a transition emits one exactly when `is_running` flips.
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, SupervisionStatus::Running)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            SupervisionStatus::Startup => "startup",
            SupervisionStatus::Running => "running",
            SupervisionStatus::Down => "down",
        }
    }
}

impl fmt::Display for SupervisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisionStatus::Startup => write!(f, "STARTUP"),
            SupervisionStatus::Running => write!(f, "RUNNING"),
            SupervisionStatus::Down => write!(f, "DOWN"),
        }
    }
}
