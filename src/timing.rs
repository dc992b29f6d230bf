//! Millisecond-accurate waiting.
//!
//! OS sleeps overshoot by several milliseconds, so a wait sleeps in chunks
//! that stop [`SLEEP_MARGIN`] short of the deadline while more than
//! [`SPIN_THRESHOLD`] remains, then yields in a loop for the final slice.
//! Waits are not interruptible.

use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Below this much remaining time the wait stops sleeping and spins.
pub const SPIN_THRESHOLD: Duration = Duration::from_millis(10);

/// How far before the deadline each sleep chunk ends.
pub const SLEEP_MARGIN: Duration = Duration::from_millis(2);

/// Duration of one scaled PLC cycle. Saturates at [`Duration::MAX`].
pub fn scaled_cycle(cycle_time_ms: u64, scaling_factor: f64) -> Duration {
    let millis = cycle_time_ms as f64 * scaling_factor;
    if millis.is_nan() || millis <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
}

/// Block for `cycle_time_ms × scaling_factor` milliseconds from call entry.
///
/// ```rust
/// use plc_conformance::timing::wait_for;
/// use std::time::{Duration, Instant};
///
/// let started = Instant::now();
/// wait_for(5, 2.0);
/// assert!(started.elapsed() >= Duration::from_millis(10));
/// ```
pub fn wait_for(cycle_time_ms: u64, scaling_factor: f64) {
    let entered = Instant::now();
    let cycle = scaled_cycle(cycle_time_ms, scaling_factor);
    match entered.checked_add(cycle) {
        Some(deadline) => wait_until(deadline),
        None => warn!(?cycle, "scaled cycle exceeds the clock range, not waiting"),
    }
}

/// Block until `deadline`. Returns immediately if it already passed.
pub fn wait_until(deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let remaining = deadline - now;
        if remaining > SPIN_THRESHOLD {
            thread::sleep(remaining - SLEEP_MARGIN);
        } else {
            thread::yield_now();
        }
    }
}
