//! # Logging subscriber.
//!
//! [`LogWriter`] forwards supervision events to `tracing` in a compact,
//! grep-friendly form. Useful as a default observability sink; replace with
//! a custom [`Subscribe`] implementation for metrics or alarm bridges.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs every supervision event via `tracing`.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let entity = e.entity.as_ref().map(|x| x.to_string()).unwrap_or_default();
        match e.kind {
            EventKind::Update => {
                info!(
                    %entity,
                    status = e.status.map(|s| s.as_label()).unwrap_or(""),
                    reason = e.reason.as_deref().unwrap_or(""),
                    ts = e.timestamp.unwrap_or(0),
                    "supervision update"
                );
            }
            EventKind::StatusChange => {
                info!(
                    %entity,
                    status = e.status.map(|s| s.as_label()).unwrap_or(""),
                    reason = e.reason.as_deref().unwrap_or(""),
                    ts = e.timestamp.unwrap_or(0),
                    "supervision status change"
                );
            }
            EventKind::AliveExpired => {
                warn!(%entity, last_update = e.timestamp.unwrap_or(0), "alive timer expired");
            }
            EventKind::FaultAccepted => {
                info!(%entity, fault = e.fault.unwrap_or(false), "fault update accepted");
            }
            EventKind::MassOutageDetected => {
                warn!(down = e.down_count.unwrap_or(0), "mass outage detected");
            }
            EventKind::MassOutageCleared => {
                info!(down = e.down_count.unwrap_or(0), "mass outage cleared");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
