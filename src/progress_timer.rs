//! Locally simulated playback position for the booth's current song.
//!
//! The booth listener never streams its position, so elapsed time is derived
//! from a wall-clock epoch (`now - start_epoch`) rather than from counting
//! ticks. Late or missed ticks therefore never skew the reported position.

use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by `Instant::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic timing.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        // Offset so epochs can be rewound without underflowing the monotonic origin.
        Self {
            now: Mutex::new(Instant::now() + Duration::from_secs(3_600)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

#[cfg(test)]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Outcome of a single timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Timer is not running; nothing changed.
    Idle,
    /// Elapsed time advanced.
    Advanced,
    /// Elapsed reached the duration on this tick.
    Completed,
}

/// Progress timer for the currently loaded song.
pub struct ProgressTimer {
    clock: Arc<dyn Clock>,
    duration: Duration,
    elapsed: Duration,
    running: bool,
    start_epoch: Option<Instant>,
    /// Bumped on every start/stop so stale observers can detect a new timeline.
    generation: u64,
}

impl ProgressTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            duration: Duration::ZERO,
            elapsed: Duration::ZERO,
            running: false,
            start_epoch: None,
            generation: 0,
        }
    }

    /// Starts counting from zero. Returns `false` and stays idle for unknown durations.
    pub fn start(&mut self, duration: Duration) -> bool {
        self.reset();
        if duration.is_zero() {
            return false;
        }
        self.duration = duration;
        self.start_epoch = Some(self.clock.now());
        self.running = true;
        true
    }

    /// Records a duration without running, so paused or stopped songs still render a length.
    pub fn prime(&mut self, duration: Duration) {
        if !self.running {
            self.duration = duration;
            self.elapsed = self.elapsed.min(duration);
        }
    }

    /// Freezes elapsed at the current position.
    pub fn pause(&mut self) {
        if self.running {
            self.recompute();
        }
        self.running = false;
    }

    /// Continues from `total - remaining` with a fresh epoch.
    pub fn resume(&mut self, remaining: Duration, total: Duration) -> bool {
        if total.is_zero() {
            return false;
        }
        let already_elapsed = total.saturating_sub(remaining);
        self.duration = total;
        self.elapsed = already_elapsed;
        if already_elapsed >= total {
            self.running = false;
            return false;
        }
        let now = self.clock.now();
        self.start_epoch = Some(now.checked_sub(already_elapsed).unwrap_or(now));
        self.running = true;
        true
    }

    /// Clears all progress.
    pub fn reset(&mut self) {
        self.duration = Duration::ZERO;
        self.elapsed = Duration::ZERO;
        self.running = false;
        self.start_epoch = None;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn stop(&mut self) {
        self.reset();
    }

    /// Recomputes elapsed from the wall clock.
    pub fn tick(&mut self) -> TimerTick {
        if !self.running {
            return TimerTick::Idle;
        }
        if self.recompute() {
            self.running = false;
            TimerTick::Completed
        } else {
            TimerTick::Advanced
        }
    }

    /// Returns `true` once elapsed has reached the duration.
    fn recompute(&mut self) -> bool {
        let Some(start_epoch) = self.start_epoch else {
            return false;
        };
        let since_start = self.clock.now().saturating_duration_since(start_epoch);
        if since_start >= self.duration {
            self.elapsed = self.duration;
            true
        } else {
            self.elapsed = since_start;
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Formats seconds as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use super::{format_time, ManualClock, ProgressTimer, TimerTick};
    use std::sync::Arc;
    use std::time::Duration;

    fn timer_with_clock() -> (ProgressTimer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ProgressTimer::new(clock.clone()), clock)
    }

    #[test]
    fn test_full_duration_completes_without_overshoot() {
        let (mut timer, clock) = timer_with_clock();
        assert!(timer.start(Duration::from_secs(180)));

        clock.advance(Duration::from_secs(90));
        assert_eq!(timer.tick(), TimerTick::Advanced);
        assert_eq!(timer.elapsed(), Duration::from_secs(90));

        clock.advance(Duration::from_secs(95));
        assert_eq!(timer.tick(), TimerTick::Completed);
        assert_eq!(timer.elapsed(), Duration::from_secs(180));
        assert!(!timer.is_running());
        assert_eq!(timer.tick(), TimerTick::Idle);
        assert_eq!(timer.elapsed(), Duration::from_secs(180));
    }

    #[test]
    fn test_elapsed_is_exact_at_duration_boundary() {
        let (mut timer, clock) = timer_with_clock();
        timer.start(Duration::from_secs(180));
        clock.advance(Duration::from_secs(180));
        assert_eq!(timer.tick(), TimerTick::Completed);
        assert_eq!(timer.elapsed(), Duration::from_secs(180));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_missed_ticks_do_not_skew_elapsed() {
        let (mut timer, clock) = timer_with_clock();
        timer.start(Duration::from_secs(60));
        // Single tick after a long stall, as after app backgrounding.
        clock.advance(Duration::from_millis(12_345));
        timer.tick();
        assert_eq!(timer.elapsed(), Duration::from_millis(12_345));
    }

    #[test]
    fn test_pause_then_resume_preserves_continuity() {
        let (mut timer, clock) = timer_with_clock();
        timer.start(Duration::from_secs(100));
        clock.advance(Duration::from_secs(40));
        timer.pause();
        assert_eq!(timer.elapsed(), Duration::from_secs(40));
        assert!(!timer.is_running());

        clock.advance(Duration::from_secs(25));
        assert_eq!(timer.tick(), TimerTick::Idle);
        assert_eq!(timer.elapsed(), Duration::from_secs(40));

        assert!(timer.resume(Duration::from_secs(60), Duration::from_secs(100)));
        clock.advance(Duration::from_secs(60));
        assert_eq!(timer.tick(), TimerTick::Completed);
        assert_eq!(timer.elapsed(), Duration::from_secs(100));
    }

    #[test]
    fn test_unknown_duration_does_not_start() {
        let (mut timer, clock) = timer_with_clock();
        assert!(!timer.start(Duration::ZERO));
        clock.advance(Duration::from_secs(5));
        assert_eq!(timer.tick(), TimerTick::Idle);
        assert_eq!(timer.elapsed(), Duration::ZERO);
        assert!(!timer.resume(Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn test_stop_clears_progress_and_bumps_generation() {
        let (mut timer, clock) = timer_with_clock();
        timer.start(Duration::from_secs(30));
        let started_generation = timer.generation();
        clock.advance(Duration::from_secs(10));
        timer.tick();

        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.elapsed(), Duration::ZERO);
        assert_eq!(timer.duration(), Duration::ZERO);
        assert!(timer.generation() > started_generation);
    }

    #[test]
    fn test_prime_sets_duration_only_while_idle() {
        let (mut timer, _clock) = timer_with_clock();
        timer.prime(Duration::from_secs(45));
        assert_eq!(timer.duration(), Duration::from_secs(45));
        assert!(!timer.is_running());

        timer.start(Duration::from_secs(30));
        timer.prime(Duration::from_secs(99));
        assert_eq!(timer.duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_format_time_pads_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(600.0), "10:00");
    }
}
