//! # Control loop clock
//!
//! Fixed-period, deadline based scheduling for the periodic loops of the software. Deadlines are
//! computed from a fixed anchor as `anchor + ticks * period`, so the time spent doing work in a
//! cycle never accumulates as drift.
//!
//! When a cycle overruns its deadline the tick returns immediately and reports the overrun. If
//! the loop has fallen a whole period or more behind, the anchor is moved so that the current
//! deadline is "now", rather than running a burst of back-to-back cycles to catch up.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::{Duration, Instant};

use log::warn;
use spin_sleep::SpinSleeper;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of monotonic time that the clock can also block on.
pub trait TimeSource {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;

    /// Block until `now() >= deadline`. Returns immediately if the deadline has passed.
    fn sleep_until(&mut self, deadline: Duration);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Monotonic wall-clock time, sleeping with a spin sleeper for low wake-up jitter.
pub struct MonotonicTime {
    origin: Instant,
    sleeper: SpinSleeper,
}

/// Manually driven time, used to step loops deterministically.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now: Duration,
}

/// Fixed-period deadline scheduler.
pub struct ControlLoopClock<S = MonotonicTime> {
    name: String,

    source: S,

    period_ns: u64,

    /// Time at which tick zero is considered to have happened.
    anchor_ns: u64,

    ticks: u64,

    num_overruns: u64,

    num_consec_overruns: u64,

    last_overrun: Option<Duration>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("Invalid clock period of {0} s, the period must be finite and greater than zero")]
    InvalidPeriod(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MonotonicTime {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            sleeper: SpinSleeper::default(),
        }
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            self.sleeper.sleep(deadline - now);
        }
    }
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward, simulating work done inside a cycle.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep_until(&mut self, deadline: Duration) {
        if deadline > self.now {
            self.now = deadline;
        }
    }
}

impl ControlLoopClock<MonotonicTime> {
    /// Start a new clock running on the monotonic system time.
    ///
    /// `name` is only used to identify the loop in overrun warnings.
    pub fn start(name: &str, period_s: f64) -> Result<Self, ClockError> {
        Self::with_source(name, period_s, MonotonicTime::default())
    }
}

impl<S: TimeSource> ControlLoopClock<S> {
    /// Start a new clock using the given time source. The anchor is the source's current time.
    pub fn with_source(name: &str, period_s: f64, source: S) -> Result<Self, ClockError> {
        if !period_s.is_finite() || period_s <= 0.0 {
            return Err(ClockError::InvalidPeriod(period_s))
        }

        let period_ns = (period_s * 1e9).round() as u64;
        if period_ns == 0 {
            return Err(ClockError::InvalidPeriod(period_s))
        }

        let anchor_ns = as_nanos(source.now());

        Ok(Self {
            name: name.to_string(),
            source,
            period_ns,
            anchor_ns,
            ticks: 0,
            num_overruns: 0,
            num_consec_overruns: 0,
            last_overrun: None,
        })
    }

    /// Wait for the next deadline.
    ///
    /// Returns `true` if the deadline had already passed when this function was called, i.e. the
    /// work done since the previous tick exceeded the period. In that case no sleep is performed.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;

        let target_ns = self.deadline_ns();
        let now_ns = as_nanos(self.source.now());

        if now_ns <= target_ns {
            self.source.sleep_until(Duration::from_nanos(target_ns));
            self.num_consec_overruns = 0;
            return false
        }

        let lag = Duration::from_nanos(now_ns - target_ns);
        self.num_overruns += 1;
        self.num_consec_overruns += 1;
        self.last_overrun = Some(lag);

        if now_ns - target_ns >= self.period_ns {
            self.anchor_ns = now_ns.saturating_sub(self.ticks.saturating_mul(self.period_ns));
            warn!(
                "{} loop overran by {:.6} s ({} consecutive), resynchronising to now",
                self.name,
                lag.as_secs_f64(),
                self.num_consec_overruns
            );
        }
        else {
            warn!(
                "{} loop overran by {:.6} s ({} consecutive)",
                self.name,
                lag.as_secs_f64(),
                self.num_consec_overruns
            );
        }

        true
    }

    /// The deadline of the most recent tick, relative to the time source's origin.
    pub fn deadline(&self) -> Duration {
        Duration::from_nanos(self.deadline_ns())
    }

    /// The deadline of the most recent tick in seconds.
    pub fn deadline_s(&self) -> f64 {
        self.deadline().as_secs_f64()
    }

    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_ns)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn num_overruns(&self) -> u64 {
        self.num_overruns
    }

    pub fn num_consec_overruns(&self) -> u64 {
        self.num_consec_overruns
    }

    /// Magnitude of the most recent overrun, if any has occured.
    pub fn last_overrun(&self) -> Option<Duration> {
        self.last_overrun
    }

    pub fn time_source(&self) -> &S {
        &self.source
    }

    pub fn time_source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn deadline_ns(&self) -> u64 {
        self.anchor_ns
            .saturating_add(self.ticks.saturating_mul(self.period_ns))
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
