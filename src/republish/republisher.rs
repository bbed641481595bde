//! # Republisher: generic reliable-delivery retry engine.
//!
//! Accepts "publication failed" notifications for arbitrary events and
//! retries delivery on a fixed delay until each event either succeeds or is
//! permanently rejected by the transport.
//!
//! ## Architecture
//! ```text
//! producers ──► publication_failed(Arc<T>) ──► pending set (identity-keyed)
//!                                                  │ schedules (if idle)
//!                                                  ▼
//!                                     retry task: sleep(delay)
//!                                       └─► snapshot pending
//!                                             ├─ publish Ok        → remove
//!                                             ├─ Err(Retryable)    → keep, count
//!                                             └─ Err(Permanent)    → drop, log
//!                                       └─► pending non-empty? sleep again
//!                                           pending empty?     → back to Idle
//! ```
//!
//! ## State machine
//! ```text
//! {Stopped} ─ start() ─► {Idle} ─ publication_failed() ─► {Scheduled}
//!     ▲                    ▲                                   │
//!     │                    └──────── pending set drained ──────┘
//!     └─ stop() from any state (cancels the timer)
//! ```
//!
//! ## Rules
//! - **Identity coalescing**: the pending set is keyed by the `Arc`
//!   pointer, so reporting the same event twice keeps one entry.
//! - **Snapshot per pass**: failures arriving during a pass go into the
//!   set but are only attempted on the next pass; a hot producer cannot
//!   starve the pass.
//! - **Classification is the transport's job**: this engine never decides
//!   what is retryable; it only reacts to [`PublishError`] variants.
//! - **Must be started**: `publication_failed` while `{Stopped}` is an
//!   [`IllegalState`](crate::SupervisionError::IllegalState) error.
//! - `stop()` halts future scheduling but does not interrupt a publish
//!   call already in progress.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{PublishError, SupervisionError};

/// Delivery transport callback consumed by the [`Republisher`].
///
/// Implementations may block or fail; failure classification
/// (retryable vs permanent) is part of this contract.
#[async_trait]
pub trait Publish<T>: Send + Sync + 'static {
    /// Attempts to deliver one event.
    async fn publish(&self, event: &T) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Idle,
    Scheduled,
}

struct Inner<T> {
    state: RunState,
    pending: HashMap<usize, Arc<T>>,
    token: CancellationToken,
}

/// Generic retry engine for failed event publications.
///
/// ### Statistics
/// - [`failed_attempts`](Self::failed_attempts) counts the original failure
///   notifications plus every retryable failure during retry passes.
/// - [`pending_len`](Self::pending_len) is the current size of the
///   unpublished set.
pub struct Republisher<T> {
    publisher: Arc<dyn Publish<T>>,
    delay: Duration,
    inner: Arc<Mutex<Inner<T>>>,
    failed: Arc<AtomicU64>,
}

impl<T: Send + Sync + 'static> Republisher<T> {
    /// Creates a stopped republisher delivering through `publisher`.
    pub fn new(publisher: Arc<dyn Publish<T>>, delay: Duration) -> Self {
        Self {
            publisher,
            delay,
            inner: Arc::new(Mutex::new(Inner {
                state: RunState::Stopped,
                pending: HashMap::new(),
                token: CancellationToken::new(),
            })),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Moves `{Stopped}` → `{Idle}`. Idempotent.
    pub async fn start(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == RunState::Stopped {
            inner.state = RunState::Idle;
            inner.token = CancellationToken::new();
        }
    }

    /// Cancels the retry timer and moves to `{Stopped}` from any state.
    ///
    /// Events still pending are kept; they will be retried again once the
    /// engine is restarted and a new failure schedules a pass.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.token.cancel();
        inner.state = RunState::Stopped;
    }

    /// Registers a failed publication for redelivery.
    ///
    /// Inserts the event into the pending set and, if no retry task is
    /// currently scheduled, schedules one after the configured delay.
    ///
    /// Errors with `IllegalState` when called before [`start`](Self::start):
    /// that is a programming error on the caller's side.
    pub async fn publication_failed(&self, event: Arc<T>) -> Result<(), SupervisionError> {
        let mut inner = self.inner.lock().await;
        if inner.state == RunState::Stopped {
            return Err(SupervisionError::IllegalState {
                component: "republisher",
            });
        }

        let key = Arc::as_ptr(&event) as usize;
        inner.pending.insert(key, event);
        self.failed.fetch_add(1, AtomicOrdering::Relaxed);

        if inner.state == RunState::Idle {
            inner.state = RunState::Scheduled;
            let token = inner.token.clone();
            drop(inner);
            self.spawn_retry_task(token);
        }
        Ok(())
    }

    /// Number of events currently awaiting redelivery.
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Total failed attempts counted so far (originals + retry failures).
    pub fn failed_attempts(&self) -> u64 {
        self.failed.load(AtomicOrdering::Relaxed)
    }

    fn spawn_retry_task(&self, token: CancellationToken) {
        let inner = Arc::clone(&self.inner);
        let publisher = Arc::clone(&self.publisher);
        let failed = Arc::clone(&self.failed);
        let delay = self.delay;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = time::sleep(delay) => {}
                }

                // Snapshot so failures reported during the pass wait for
                // the next one.
                let snapshot: Vec<(usize, Arc<T>)> = {
                    let guard = inner.lock().await;
                    guard
                        .pending
                        .iter()
                        .map(|(k, v)| (*k, Arc::clone(v)))
                        .collect()
                };

                for (key, event) in snapshot {
                    match publisher.publish(event.as_ref()).await {
                        Ok(()) => {
                            inner.lock().await.pending.remove(&key);
                        }
                        Err(err) if err.is_retryable() => {
                            failed.fetch_add(1, AtomicOrdering::Relaxed);
                            debug!(error = %err, "republication attempt failed; keeping event");
                        }
                        Err(err) => {
                            error!(error = %err, "dropping event after permanent rejection");
                            inner.lock().await.pending.remove(&key);
                        }
                    }
                }

                let mut guard = inner.lock().await;
                if guard.pending.is_empty() {
                    // Nothing left: a future failure schedules fresh.
                    if guard.state == RunState::Scheduled {
                        guard.state = RunState::Idle;
                    }
                    return;
                }
                // Set still non-empty: keep the timer running.
            }
        });
    }
}
