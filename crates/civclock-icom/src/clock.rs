//! Reference time and minute alignment.
//!
//! The rig's clock has minute resolution, so the time is only sent at the
//! instant the host clock rolls over to a new minute. [`ClockAligner`]
//! samples the host clock every [`POLL_INTERVAL`] until the seconds reach
//! zero; the boundary is coarse and a 50 ms jitter is acceptable, so a
//! sleep loop is all that is needed.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use civclock_core::Clock;
use tracing::{debug, info};

/// Interval between clock samples while waiting for the minute boundary.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Supplies reference time for payload construction.
///
/// In reversed time zone mode the reference time is UTC (the rig's clock
/// shows UTC and its "UTC" display shows local time); otherwise it is local
/// time.
#[derive(Debug, Clone)]
pub struct ClockAligner<K> {
    clock: K,
    reversed_time_zone: bool,
    quiet: bool,
}

impl<K: Clock> ClockAligner<K> {
    /// Create an aligner over `clock`.
    pub fn new(clock: K, reversed_time_zone: bool) -> Self {
        ClockAligner {
            clock,
            reversed_time_zone,
            quiet: false,
        }
    }

    /// Suppress the notice logged before waiting for the minute boundary.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Whether reversed time zone mode is on.
    pub fn reversed_time_zone(&self) -> bool {
        self.reversed_time_zone
    }

    /// Current reference time: UTC in reversed mode, local otherwise.
    pub fn reference_time(&self) -> DateTime<FixedOffset> {
        let local = self.clock.local_now();
        if self.reversed_time_zone {
            local.with_timezone(&Utc).fixed_offset()
        } else {
            local
        }
    }

    /// The host's local UTC offset, regardless of reversed mode.
    pub fn utc_offset(&self) -> FixedOffset {
        *self.clock.local_now().offset()
    }

    /// Sleep until the reference time is at second zero of a minute and
    /// return that sample.
    ///
    /// Terminates within one minute of wall-clock time.
    pub async fn wait_for_minute_boundary(&self) -> DateTime<FixedOffset> {
        if !self.quiet {
            info!("waiting for the full minute to set time");
        }
        let mut now = self.reference_time();
        while now.second() != 0 {
            tokio::time::sleep(POLL_INTERVAL).await;
            now = self.reference_time();
        }
        debug!(time = %now, "minute boundary reached");
        now
    }
}
