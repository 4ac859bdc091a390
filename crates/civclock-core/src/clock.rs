//! Host clock abstraction.
//!
//! The engine never reads the system clock directly; it asks a [`Clock`].
//! [`SystemClock`] is the production implementation, tests substitute a
//! scripted clock.

use chrono::{DateTime, FixedOffset, Local};

/// Source of the host's local wall-clock time.
pub trait Clock: Send + Sync {
    /// Current local time, carrying the local UTC offset in effect.
    fn local_now(&self) -> DateTime<FixedOffset>;
}

/// The operating system clock and time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn local_now(&self) -> DateTime<FixedOffset> {
        (**self).local_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn system_clock_tracks_utc() {
        let local = SystemClock.local_now();
        let utc = Utc::now();
        let drift = (utc - local.with_timezone(&Utc)).num_seconds().abs();
        assert!(drift < 5, "system clock drifted {drift}s from UTC");
    }
}
