//! # Tick Clock
//!
//! Fixed-timestep clock at 50Hz by default.
//!
//! ## Design
//!
//! The clock must:
//! - Schedule tick `n` at `origin + n * interval`, never at `now + interval`,
//!   so processing time does not accumulate as drift
//! - Never skip a tick number: after a stall every elapsed tick is drained
//!   (catch-up, not skip)
//! - Count ticks strictly upward by one

use std::time::{Duration, Instant};

/// Fixed-timestep tick clock.
///
/// Pure bookkeeping: it never sleeps itself. The scheduler's run loop asks
/// it how long to sleep and how many ticks are due.
#[derive(Debug)]
pub struct TickClock {
    /// Target tick duration.
    interval: Duration,
    /// Instant at which the next tick becomes due.
    next_due: Instant,
    /// Last completed tick.
    tick: u64,
    /// Tick timing statistics.
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug)]
pub struct TickStats {
    /// Minimum tick processing time observed.
    pub min_tick_us: u64,
    /// Maximum tick processing time observed.
    pub max_tick_us: u64,
    /// Rolling average tick processing time.
    pub avg_tick_us: u64,
    /// Ticks whose processing took longer than the interval.
    pub late_ticks: u64,
    /// Ticks executed to catch up after a stall.
    pub catch_up_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn new(interval: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: interval.as_micros() as u64,
            late_ticks: 0,
            catch_up_ticks: 0,
            total_ticks: 0,
        }
    }
}

impl TickClock {
    /// Creates a clock whose first tick is due one interval after `origin`.
    #[must_use]
    pub fn new(interval: Duration, origin: Instant) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self {
            interval,
            next_due: origin + interval,
            tick: 0,
            stats: TickStats::new(interval),
        }
    }

    /// Creates a clock starting now.
    #[must_use]
    pub fn starting_now(interval: Duration) -> Self {
        Self::new(interval, Instant::now())
    }

    /// Last completed tick.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Target tick duration.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant at which the next tick is due.
    #[inline]
    #[must_use]
    pub const fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Time left before the next tick is due (zero if already due).
    #[must_use]
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// Number of whole tick multiples that have elapsed by `now`.
    #[must_use]
    pub fn due_ticks(&self, now: Instant) -> u64 {
        if now < self.next_due {
            return 0;
        }
        let behind = now.duration_since(self.next_due).as_nanos();
        1 + (behind / self.interval.as_nanos()) as u64
    }

    /// Completes one tick and schedules the next exactly one interval later.
    ///
    /// Returns the new tick number.
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.next_due += self.interval;
        self.tick
    }

    /// Records the processing time of one tick.
    pub fn record(&mut self, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros() as u64;

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(elapsed_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(elapsed_us);

        // Rolling average
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + elapsed_us) / 16;

        if elapsed > self.interval {
            self.stats.late_ticks += 1;
        }
    }

    /// Records ticks that ran back-to-back to catch up after a stall.
    pub fn record_catch_up(&mut self, extra_ticks: u64) {
        self.stats.catch_up_ticks += extra_ticks;
    }

    /// Returns tick statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::new(self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(20);

    #[test]
    fn test_clock_creation() {
        let origin = Instant::now();
        let clock = TickClock::new(INTERVAL, origin);
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.next_due(), origin + INTERVAL);
        assert_eq!(clock.due_ticks(origin), 0);
    }

    #[test]
    fn test_due_ticks_counts_every_elapsed_multiple() {
        let origin = Instant::now();
        let clock = TickClock::new(INTERVAL, origin);
        assert_eq!(clock.due_ticks(origin + Duration::from_millis(19)), 0);
        assert_eq!(clock.due_ticks(origin + Duration::from_millis(20)), 1);
        assert_eq!(clock.due_ticks(origin + Duration::from_millis(39)), 1);
        assert_eq!(clock.due_ticks(origin + Duration::from_millis(105)), 5);
    }

    #[test]
    fn test_catch_up_after_stall_never_skips() {
        let origin = Instant::now();
        let mut clock = TickClock::new(INTERVAL, origin);
        let stalled = origin + Duration::from_millis(200);

        let mut seen = Vec::new();
        for _ in 0..clock.due_ticks(stalled) {
            seen.push(clock.advance());
        }
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
        assert_eq!(clock.due_ticks(stalled), 0);
    }

    #[test]
    fn test_schedule_does_not_drift() {
        let origin = Instant::now();
        let mut clock = TickClock::new(INTERVAL, origin);
        for _ in 0..1000 {
            clock.advance();
        }
        assert_eq!(clock.next_due(), origin + INTERVAL * 1001);
    }

    #[test]
    fn test_stats_tracking() {
        let mut clock = TickClock::new(INTERVAL, Instant::now());
        clock.record(Duration::from_micros(500));
        clock.record(Duration::from_millis(25));
        clock.record_catch_up(3);

        let stats = clock.stats();
        assert_eq!(stats.total_ticks, 2);
        assert_eq!(stats.min_tick_us, 500);
        assert_eq!(stats.max_tick_us, 25_000);
        assert_eq!(stats.late_ticks, 1);
        assert_eq!(stats.catch_up_ticks, 3);

        clock.reset_stats();
        assert_eq!(clock.stats().total_ticks, 0);
    }
}
