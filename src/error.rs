//! Error types used by the supervision core.
//!
//! This module defines two main error enums:
//!
//! - [`SupervisionError`]: errors raised by the supervision components themselves.
//! - [`PublishError`]: delivery-failure classification supplied by the
//!   transport callback consumed by the [`Republisher`](crate::Republisher).
//!
//! Both types provide `as_label` helpers for logging/metrics. Expected races
//! (out-of-order timestamps, repeated identical transitions) are NOT errors:
//! they are reported through return values such as
//! [`Transition::Stale`](crate::Transition).

use thiserror::Error;

use crate::topology::{EntityKind, EntityRef};

/// # Errors produced by the supervision components.
///
/// `NotFound` is non-fatal by contract: the referenced entity may have been
/// decommissioned concurrently, so callers log and continue. `IllegalState`
/// is a programming error (component used before `start()`) and should be
/// treated as fatal by the caller.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisionError {
    /// No record is registered for the referenced entity.
    #[error("no supervision record registered for {kind} #{id}")]
    NotFound {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// Id of the missing entity.
        id: u64,
    },

    /// A component was used before being started.
    #[error("{component} used before start()")]
    IllegalState {
        /// Name of the misused component.
        component: &'static str,
    },
}

impl SupervisionError {
    /// Builds a `NotFound` for the given entity ref.
    pub fn not_found(entity: &EntityRef) -> Self {
        SupervisionError::NotFound {
            kind: entity.kind,
            id: entity.id,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisionError::NotFound { .. } => "entity_not_found",
            SupervisionError::IllegalState { .. } => "illegal_state",
        }
    }

    /// True for errors that callers are expected to absorb (log and skip).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SupervisionError::NotFound { .. })
    }
}

/// # Delivery-failure classification for event publication.
///
/// Produced by the caller-supplied publish callback, never generated by this
/// crate. The [`Republisher`](crate::Republisher) keeps retrying on
/// `Retryable` and permanently drops the event on `Permanent`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PublishError {
    /// Transient delivery failure; the event stays pending and is retried.
    #[error("retryable publication failure: {reason}")]
    Retryable {
        /// The underlying failure message.
        reason: String,
    },

    /// Unrecoverable delivery failure; the event is dropped for good.
    #[error("permanent publication failure: {reason}")]
    Permanent {
        /// The underlying failure message.
        reason: String,
    },
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Retryable { .. } => "publish_retryable",
            PublishError::Permanent { .. } => "publish_permanent",
        }
    }

    /// Indicates whether a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::Retryable { .. })
    }
}
