//! Deterministic host clock for timing-sensitive tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, FixedOffset};
use civclock_core::Clock;

/// A [`Clock`] that replays a fixed sequence of local times.
///
/// Each call to `local_now()` consumes the next sample; once the script is
/// exhausted the last sample repeats forever.
#[derive(Debug)]
pub struct ScriptedClock {
    state: Mutex<ScriptState>,
}

#[derive(Debug)]
struct ScriptState {
    remaining: VecDeque<DateTime<FixedOffset>>,
    last: DateTime<FixedOffset>,
    taken: usize,
}

impl ScriptedClock {
    /// Replay `samples` in order.
    ///
    /// # Panics
    ///
    /// Panics if `samples` is empty.
    pub fn new(samples: impl IntoIterator<Item = DateTime<FixedOffset>>) -> Self {
        let remaining: VecDeque<_> = samples.into_iter().collect();
        let last = *remaining
            .front()
            .expect("ScriptedClock needs at least one sample");
        ScriptedClock {
            state: Mutex::new(ScriptState {
                remaining,
                last,
                taken: 0,
            }),
        }
    }

    /// A clock stopped at `time`.
    pub fn fixed(time: DateTime<FixedOffset>) -> Self {
        Self::new([time])
    }

    /// Number of times the clock has been read.
    pub fn samples_taken(&self) -> usize {
        self.state.lock().map(|s| s.taken).unwrap_or(0)
    }
}

impl Clock for ScriptedClock {
    fn local_now(&self) -> DateTime<FixedOffset> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.taken += 1;
        if let Some(next) = state.remaining.pop_front() {
            state.last = next;
        }
        state.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn t(s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 5, 24, 13, 39, s)
            .unwrap()
    }

    #[test]
    fn replays_then_repeats_last() {
        let clock = ScriptedClock::new([t(1), t(2)]);
        assert_eq!(clock.local_now().second(), 1);
        assert_eq!(clock.local_now().second(), 2);
        assert_eq!(clock.local_now().second(), 2);
        assert_eq!(clock.samples_taken(), 3);
    }

    #[test]
    fn fixed_clock() {
        let clock = ScriptedClock::fixed(t(30));
        for _ in 0..5 {
            assert_eq!(clock.local_now(), t(30));
        }
    }
}
