//! Clocks, cooperative scheduling, and cancellation.
//!
//! Decoders run tight loops over large buffers; they stay responsive
//! by checking an injected [`Scheduler`] and [`CancelToken`] instead
//! of baking host assumptions in. Time is always read through a
//! [`Clock`] so throttling and hold windows are testable.

use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Time source capability.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests. Shareable across threads so a
/// test can advance time while a component holds the clock.
pub struct ManualClock {
    start: Instant,
    offset_micros: std::sync::atomic::AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_micros: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.offset_micros
            .fetch_add(delta.as_micros() as u64, Ordering::Relaxed);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + Duration::from_micros(self.offset_micros.load(Ordering::Relaxed))
    }
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Cooperative scheduler injected into decoders.
pub trait Scheduler {
    /// Yield to the host if the current time slice is spent.
    fn yield_if_budget_exceeded(&mut self);
}

/// Scheduler that yields the thread after a bounded slice of work, so
/// large-file decoding never monopolises a shared execution context.
pub struct TimeSliceScheduler {
    clock: Box<dyn Clock + Send>,
    slice: Duration,
    slice_start: Instant,
}

impl TimeSliceScheduler {
    pub fn new() -> Self {
        Self::with_clock(
            Box::new(SystemClock),
            Duration::from_millis(constants::TIME_SLICE_MS),
        )
    }

    pub fn with_clock(clock: Box<dyn Clock + Send>, slice: Duration) -> Self {
        let slice_start = clock.now();
        Self {
            clock,
            slice,
            slice_start,
        }
    }
}

impl Default for TimeSliceScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TimeSliceScheduler {
    fn yield_if_budget_exceeded(&mut self) {
        let now = self.clock.now();
        if now.duration_since(self.slice_start) >= self.slice {
            std::thread::yield_now();
            self.slice_start = self.clock.now();
        }
    }
}

/// Scheduler that never yields. For tests and tiny inline decodes.
pub struct NoopScheduler;

impl Scheduler for NoopScheduler {
    fn yield_if_budget_exceeded(&mut self) {}
}

/// Cooperative cancellation flag shared between a caller and the
/// decoder it spawned. Observed at window and per-point granularity.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Phase timing for one decode, logged through the `log` facade.
///
/// Holds its own last-mark state instead of a process-wide timestamp,
/// so concurrent sessions never mix their timings.
pub struct Telemetry {
    clock: Box<dyn Clock + Send>,
    label: String,
    last_mark: Option<Instant>,
}

impl Telemetry {
    pub fn new(label: &str) -> Self {
        Self::with_clock(label, Box::new(SystemClock))
    }

    pub fn with_clock(label: &str, clock: Box<dyn Clock + Send>) -> Self {
        Self {
            clock,
            label: label.to_string(),
            last_mark: None,
        }
    }

    /// Record a phase boundary, logging the delta since the last one.
    pub fn mark(&mut self, phase: &str) {
        let now = self.clock.now();
        let delta = self
            .last_mark
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        debug!("[pointcloud] {} {phase} (+{delta:?})", self.label);
        self.last_mark = Some(now);
    }
}
