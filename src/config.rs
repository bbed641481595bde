//! # Global supervision configuration.
//!
//! Provides [`Config`] centralized settings for the supervision core.
//!
//! Config is consumed in two places:
//! 1. **Manager creation**: `SupervisionManager::new(config, ...)`
//! 2. **Component construction**: the expiry scanner and republisher read
//!    their periods/thresholds from it.
//!
//! ## Sentinel values
//! - `mass_outage_threshold = 0` → mass-outage detection disabled
//! - `bus_capacity` is clamped to a minimum of 1 by the bus

use std::time::Duration;

/// Global configuration for the supervision core.
///
/// ## Field semantics
/// - `scan_period`: fixed period of the expiry scanner
/// - `initial_scan_delay`: cold-start delay before the first sweep, so
///   heartbeats have a chance to arrive before anything is declared expired
/// - `scan_debounce`: minimum elapsed time since the previous *completed*
///   sweep; a sweep firing earlier no-ops, which lets cooperating instances
///   share one logical clock without duplicate work
/// - `mass_outage_threshold`: down-entity count at which a mass-outage
///   signal is raised (`0` = disabled)
/// - `mass_outage_clear_scans`: consecutive under-threshold sweeps required
///   before the mass-outage signal is cleared (flap damping)
/// - `republication_delay`: fixed delay between republication passes
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by the bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Fixed period of the expiry scanner.
    pub scan_period: Duration,

    /// Delay before the scanner's first sweep after a cold start.
    pub initial_scan_delay: Duration,

    /// Minimum gap since the previous completed sweep; earlier firings skip.
    pub scan_debounce: Duration,

    /// Down-entity count that raises the mass-outage signal (`0` = disabled).
    pub mass_outage_threshold: usize,

    /// Consecutive under-threshold sweeps required to clear the signal.
    pub mass_outage_clear_scans: u32,

    /// Delay between republication passes of the retry engine.
    pub republication_delay: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` events will
    /// observe `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the mass-outage threshold as an `Option`.
    ///
    /// - `None` → detection disabled
    /// - `Some(n)` → signal raised once the down-count reaches `n`
    #[inline]
    pub fn mass_outage_threshold(&self) -> Option<usize> {
        if self.mass_outage_threshold == 0 {
            None
        } else {
            Some(self.mass_outage_threshold)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `scan_period = 10s`
    /// - `initial_scan_delay = 120s` (let heartbeats arrive after cold start)
    /// - `scan_debounce = 9s`
    /// - `mass_outage_threshold = 50`
    /// - `mass_outage_clear_scans = 3`
    /// - `republication_delay = 10s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            scan_period: Duration::from_secs(10),
            initial_scan_delay: Duration::from_secs(120),
            scan_debounce: Duration::from_secs(9),
            mass_outage_threshold: 50,
            mass_outage_clear_scans: 3,
            republication_delay: Duration::from_secs(10),
            bus_capacity: 1024,
        }
    }
}
