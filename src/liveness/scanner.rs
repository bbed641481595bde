//! # Periodic expiry scanner.
//!
//! A single periodic task that sweeps all heartbeat channels, deactivates
//! the ones that went silent, and raises the corresponding events.
//!
//! ## Architecture
//! ```text
//! spawn(token)
//!   └─► sleep(initial_scan_delay)        (cold start: let heartbeats arrive)
//!   └─► every scan_period:
//!         sweep(now)
//!           ├─ debounce: skip if < scan_debounce since last completed sweep
//!           ├─ snapshot entity keys
//!           ├─ per entity: expire_if_due() ──► Bus: AliveExpired
//!           └─ down-count vs high-water mark ──► Bus: MassOutageDetected /
//!                                                     MassOutageCleared
//! ```
//!
//! ## Rules
//! - **Single-flight**: the sweep runs on one timer task and never overlaps
//!   itself; an early firing no-ops via the debounce guard instead of
//!   queuing. The guard also lets cooperating instances share one logical
//!   clock without duplicate work.
//! - **Per-entity atomicity**: deactivation uses the tracker's per-key
//!   locks, the sweep itself holds no global lock.
//! - **Keep sweeping**: a missing entity (decommissioned mid-sweep) is
//!   logged and skipped; the remaining entities are still checked in the
//!   same pass.
//! - **Edge-triggered outage signal**: `MassOutageDetected` fires once per
//!   episode; clearing requires `mass_outage_clear_scans` consecutive
//!   under-threshold sweeps so a flapping count cannot spam consumers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::epoch_millis;
use crate::config::Config;
use crate::events::{Bus, Event, EventKind};
use crate::liveness::tracker::{ExpiryCheck, LivenessTracker};

/// Outcome of one sweep, returned for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// True if the debounce guard skipped this firing.
    pub skipped: bool,
    /// Channels examined.
    pub scanned: usize,
    /// Channels expired by this sweep.
    pub expired: usize,
    /// Channels down after this sweep (expired now + already inactive).
    pub down: usize,
}

#[derive(Default)]
struct SweepState {
    /// Completion time of the previous sweep; `None` until the first one.
    last_completed: Option<u64>,
    outage_active: bool,
    clear_streak: u32,
}

/// Periodic expiry detector over a [`LivenessTracker`].
pub struct ExpiryScanner {
    tracker: Arc<LivenessTracker>,
    bus: Bus,
    period: Duration,
    initial_delay: Duration,
    debounce_ms: u64,
    outage_threshold: Option<usize>,
    outage_clear_scans: u32,
    state: Mutex<SweepState>,
}

impl ExpiryScanner {
    /// Creates a scanner over the given tracker.
    pub fn new(tracker: Arc<LivenessTracker>, bus: Bus, cfg: &Config) -> Self {
        Self {
            tracker,
            bus,
            period: cfg.scan_period,
            initial_delay: cfg.initial_scan_delay,
            debounce_ms: cfg.scan_debounce.as_millis() as u64,
            outage_threshold: cfg.mass_outage_threshold(),
            outage_clear_scans: cfg.mass_outage_clear_scans.max(1),
            state: Mutex::new(SweepState::default()),
        }
    }

    /// Spawns the periodic task.
    ///
    /// The task sleeps for the initial delay, then sweeps once per period
    /// until the token is cancelled. A pass that finds nothing to do (or is
    /// debounced away) still leaves the schedule intact.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = time::sleep(self.initial_delay) => {}
            }

            let mut tick = time::interval(self.period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        let report = self.sweep(epoch_millis()).await;
                        if report.expired > 0 {
                            info!(
                                expired = report.expired,
                                down = report.down,
                                scanned = report.scanned,
                                "expiry sweep deactivated silent channels"
                            );
                        }
                    }
                }
            }
        })
    }

    /// Runs one sweep at the given wall-clock time.
    ///
    /// Public so the sweep can be driven directly with an explicit `now`
    /// (the periodic task passes [`epoch_millis`]).
    pub async fn sweep(&self, now: u64) -> SweepReport {
        {
            let state = self.state.lock().await;
            if let Some(last) = state.last_completed {
                if now.saturating_sub(last) < self.debounce_ms {
                    debug!(now, last, "sweep debounced");
                    return SweepReport {
                        skipped: true,
                        ..SweepReport::default()
                    };
                }
            }
        }

        let entities = self.tracker.entities().await;
        let mut report = SweepReport {
            scanned: entities.len(),
            ..SweepReport::default()
        };

        for entity in entities {
            match self.tracker.expire_if_due(&entity, now).await {
                Ok(ExpiryCheck::Expired { last_update }) => {
                    report.expired += 1;
                    report.down += 1;
                    debug!(entity = %entity, last_update, "heartbeat channel expired");
                    self.bus.publish(
                        Event::new(EventKind::AliveExpired)
                            .with_entity(entity)
                            .with_timestamp(last_update),
                    );
                }
                Ok(ExpiryCheck::Inactive) => report.down += 1,
                Ok(ExpiryCheck::Alive) => {}
                Err(err) => {
                    // Entity decommissioned mid-sweep; never abort the pass.
                    debug!(entity = %entity, error = %err, "skipping entity during sweep");
                }
            }
        }

        let mut state = self.state.lock().await;
        self.track_outage(&mut state, report.down);
        state.last_completed = Some(now);
        report
    }

    /// High-water-mark bookkeeping for the mass-outage signal.
    fn track_outage(&self, state: &mut SweepState, down: usize) {
        let Some(threshold) = self.outage_threshold else {
            return;
        };

        if down >= threshold {
            state.clear_streak = 0;
            if !state.outage_active {
                state.outage_active = true;
                warn!(down, threshold, "mass outage detected");
                self.bus
                    .publish(Event::new(EventKind::MassOutageDetected).with_down_count(down));
            }
        } else if state.outage_active {
            state.clear_streak += 1;
            if state.clear_streak >= self.outage_clear_scans {
                state.outage_active = false;
                state.clear_streak = 0;
                info!(down, threshold, "mass outage cleared");
                self.bus
                    .publish(Event::new(EventKind::MassOutageCleared).with_down_count(down));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::EntityRef;

    const INTERVAL: u64 = 10_000;

    fn config() -> Config {
        Config {
            scan_debounce: Duration::from_secs(9),
            mass_outage_threshold: 2,
            mass_outage_clear_scans: 2,
            ..Config::default()
        }
    }

    async fn setup(n: usize) -> (Arc<LivenessTracker>, Arc<ExpiryScanner>, Bus) {
        let bus = Bus::new(64);
        let tracker = Arc::new(LivenessTracker::new());
        for i in 0..n {
            let e = EntityRef::equipment(i as u64 + 1, format!("E{i}"));
            tracker.register(e.clone(), INTERVAL).await;
            tracker.touch(&e, 0).await.unwrap();
        }
        let scanner = Arc::new(ExpiryScanner::new(Arc::clone(&tracker), bus.clone(), &config()));
        (tracker, scanner, bus)
    }

    #[tokio::test]
    async fn test_sweep_expires_and_publishes() {
        let (_tracker, scanner, bus) = setup(1).await;
        let mut rx = bus.subscribe();

        let report = scanner.sweep(15_000).await;
        assert_eq!(report.expired, 1);
        assert_eq!(report.down, 1);

        let ev = rx.try_recv().expect("expiry event");
        assert_eq!(ev.kind, EventKind::AliveExpired);
        assert_eq!(ev.timestamp, Some(0));
    }

    #[tokio::test]
    async fn test_fresh_channel_survives_sweep() {
        let (tracker, scanner, bus) = setup(1).await;
        let e = EntityRef::equipment(1, "E0");
        tracker.touch(&e, 14_000).await.unwrap();
        let mut rx = bus.subscribe();

        let report = scanner.sweep(15_000).await;
        assert_eq!(report.expired, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_debounce_skips_early_firing() {
        let (_tracker, scanner, _bus) = setup(1).await;

        let first = scanner.sweep(15_000).await;
        assert!(!first.skipped);

        // 5s later: under the 9s debounce window.
        let second = scanner.sweep(20_000).await;
        assert!(second.skipped);

        let third = scanner.sweep(24_500).await;
        assert!(!third.skipped);
    }

    #[tokio::test]
    async fn test_mass_outage_is_edge_triggered_and_debounced() {
        let (tracker, scanner, bus) = setup(3).await;
        let mut rx = bus.subscribe();

        // All three expire: threshold (2) crossed, one detection event.
        scanner.sweep(15_000).await;
        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == EventKind::MassOutageDetected)
                .count(),
            1
        );

        // Still down on the next sweep: no second detection.
        scanner.sweep(30_000).await;
        assert!(std::iter::from_fn(|| rx.try_recv().ok())
            .all(|e| e.kind != EventKind::MassOutageDetected));

        // Recovery: all channels beat again.
        for i in 0..3 {
            let e = EntityRef::equipment(i + 1, format!("E{i}"));
            tracker.touch(&e, 40_000).await.unwrap();
        }

        // First under-threshold sweep: streak 1 of 2, no clear yet.
        scanner.sweep(45_000).await;
        assert!(std::iter::from_fn(|| rx.try_recv().ok())
            .all(|e| e.kind != EventKind::MassOutageCleared));

        // Keep the channels fresh across the next sweep.
        for i in 0..3 {
            let e = EntityRef::equipment(i + 1, format!("E{i}"));
            tracker.touch(&e, 52_000).await.unwrap();
        }

        // Second consecutive under-threshold sweep: cleared.
        scanner.sweep(55_000).await;
        let cleared = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.kind == EventKind::MassOutageCleared)
            .count();
        assert_eq!(cleared, 1);
    }

    #[tokio::test]
    async fn test_decommissioned_entity_does_not_abort_pass() {
        let (tracker, scanner, bus) = setup(2).await;
        // Remove one entity between snapshot and check by removing it now;
        // the sweep must still expire the other.
        let gone = EntityRef::equipment(1, "E0");
        tracker.remove(&gone).await;
        let mut rx = bus.subscribe();

        let report = scanner.sweep(15_000).await;
        assert_eq!(report.expired, 1);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::AliveExpired);
    }
}
