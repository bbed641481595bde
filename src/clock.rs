//! Wall-clock access in the shared signal clock domain (epoch milliseconds).

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as epoch milliseconds.
///
/// All supervision timestamps (heartbeats, fault updates, transitions) live
/// in this clock domain; signal sources are expected to supply comparable
/// values.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
