//! Heartbeat timing policy.
//!
//! A beacon is due once `interval - guard_margin` has elapsed since the last
//! one. The margin absorbs scheduling jitter so the server never sees a late
//! heartbeat. Pure: the caller supplies every instant.

use std::time::{Duration, Instant};

/// Default safety margin subtracted from the server's interval.
pub const DEFAULT_GUARD_MARGIN: Duration = Duration::from_millis(5000);

/// Decides when the next heartbeat is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatScheduler {
    guard_margin: Duration,
}

impl Default for HeartbeatScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_GUARD_MARGIN)
    }
}

impl HeartbeatScheduler {
    pub fn new(guard_margin: Duration) -> Self {
        Self { guard_margin }
    }

    pub fn guard_margin(&self) -> Duration {
        self.guard_margin
    }

    /// Time allowed between two beacons.
    ///
    /// A margin at or above the interval would make every evaluation due;
    /// in that case the full interval is used instead.
    pub fn deadline(&self, interval: Duration) -> Duration {
        if self.guard_margin < interval {
            interval - self.guard_margin
        } else {
            interval
        }
    }

    /// Whether a heartbeat must be sent at `now`.
    pub fn is_due(&self, interval: Duration, last_sent: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_sent) >= self.deadline(interval)
    }

    /// How long until the next beacon is due (zero if already due).
    pub fn remaining(&self, interval: Duration, last_sent: Instant, now: Instant) -> Duration {
        self.deadline(interval)
            .saturating_sub(now.saturating_duration_since(last_sent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn discord_interval_first_due_at_36_25s() {
        let sched = HeartbeatScheduler::default();
        let interval = ms(41_250);
        let t0 = Instant::now();

        assert!(!sched.is_due(interval, t0, t0 + ms(36_000)));
        assert!(!sched.is_due(interval, t0, t0 + ms(36_249)));
        assert!(sched.is_due(interval, t0, t0 + ms(36_250)));
        assert!(sched.is_due(interval, t0, t0 + ms(40_000)));
    }

    #[test]
    fn due_iff_elapsed_reaches_deadline() {
        let t0 = Instant::now();
        for (interval, margin) in [(1_000, 0), (1_000, 999), (45_000, 5_000), (10, 3)] {
            let sched = HeartbeatScheduler::new(ms(margin));
            let deadline = interval - margin;
            for elapsed in [0, 1, deadline - 1, deadline, deadline + 1, interval * 2] {
                assert_eq!(
                    sched.is_due(ms(interval), t0, t0 + ms(elapsed)),
                    elapsed >= deadline,
                    "interval={interval} margin={margin} elapsed={elapsed}"
                );
            }
        }
    }

    #[test]
    fn never_due_right_after_sending() {
        let sched = HeartbeatScheduler::new(ms(5_000));
        let now = Instant::now();
        assert!(!sched.is_due(ms(41_250), now, now));
    }

    #[test]
    fn oversized_margin_falls_back_to_interval() {
        let sched = HeartbeatScheduler::new(ms(5_000));
        let t0 = Instant::now();
        assert_eq!(sched.deadline(ms(4_000)), ms(4_000));
        assert!(!sched.is_due(ms(4_000), t0, t0));
        assert!(sched.is_due(ms(4_000), t0, t0 + ms(4_000)));
    }

    #[test]
    fn clock_going_backwards_is_not_due() {
        let sched = HeartbeatScheduler::default();
        let t0 = Instant::now() + ms(10_000);
        assert!(!sched.is_due(ms(41_250), t0, t0 - ms(5_000)));
    }

    #[test]
    fn remaining_counts_down() {
        let sched = HeartbeatScheduler::default();
        let t0 = Instant::now();
        assert_eq!(sched.remaining(ms(41_250), t0, t0), ms(36_250));
        assert_eq!(sched.remaining(ms(41_250), t0, t0 + ms(36_000)), ms(250));
        assert_eq!(sched.remaining(ms(41_250), t0, t0 + ms(50_000)), Duration::ZERO);
    }
}
