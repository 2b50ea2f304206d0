//! Frame timing and session lifecycle.
//!
//! Time sources abstract the clock so still frames and tests stay
//! deterministic; the lifecycle state machine makes the load/run/teardown
//! ordering explicit and rejects out-of-order transitions.

use std::time::Instant;

use chrono::{Datelike, Local, Timelike};
use thiserror::Error;

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let elapsed = self.origin.elapsed();
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time }
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {}

    fn sample(&mut self) -> TimeSample {
        TimeSample::new(self.time, 0)
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Everything a stage's uniforms need for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub width: u32,
    pub height: u32,
    /// Seconds since the session started (or the fixed timestamp).
    pub time: f32,
    /// Seconds since the previous frame; zero on the first frame.
    pub delta: f32,
    pub frame: u64,
    /// ShaderToy mouse packing: xy current cursor, zw the press anchor while
    /// the button is held (zero otherwise).
    pub mouse: [f32; 4],
    /// ShaderToy date packing: year, month (0-based), day, seconds into day.
    pub date: [f32; 4],
}

/// Reads the local calendar date in ShaderToy's `iDate` packing.
pub fn local_date_uniform() -> [f32; 4] {
    let now = Local::now();
    let seconds_into_day = now.num_seconds_from_midnight() as f32
        + now.timestamp_subsec_millis() as f32 / 1000.0;
    [
        now.year() as f32,
        now.month0() as f32,
        now.day() as f32,
        seconds_into_day,
    ]
}

/// Samples a time source and derives the per-frame delta.
pub struct FrameClock {
    source: BoxedTimeSource,
    last_seconds: Option<f32>,
}

impl FrameClock {
    pub fn new(source: BoxedTimeSource) -> Self {
        Self {
            source,
            last_seconds: None,
        }
    }

    pub fn animated(fixed_time: Option<f32>) -> Self {
        match fixed_time {
            Some(time) => Self::new(Box::new(FixedTimeSource::new(time))),
            None => Self::new(Box::new(SystemTimeSource::new())),
        }
    }

    pub fn reset(&mut self) {
        self.source.reset();
        self.last_seconds = None;
    }

    /// Advances the clock and returns `(sample, delta_seconds)`.
    pub fn tick(&mut self) -> (TimeSample, f32) {
        let sample = self.source.sample();
        let delta = match self.last_seconds {
            Some(last) => (sample.seconds - last).max(0.0),
            None => 0.0,
        };
        self.last_seconds = Some(sample.seconds);
        (sample, delta)
    }
}

/// Spaces redraws to honour an optional FPS cap. Without a cap every
/// callback renders.
pub struct FramePacer {
    interval: Option<std::time::Duration>,
    next_deadline: Option<Instant>,
}

impl FramePacer {
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| *fps > 0.0)
            .map(|fps| std::time::Duration::from_secs_f32(1.0 / fps));
        Self {
            interval,
            next_deadline: None,
        }
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.next_deadline) {
            (None, _) => true,
            (_, None) => true,
            (Some(_), Some(deadline)) => now >= deadline,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        if let Some(interval) = self.interval {
            self.next_deadline = Some(now + interval);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.interval.and(self.next_deadline)
    }
}

/// Session lifecycle: resources exist between `Loaded` and `Destroyed`, and
/// frames may only render while `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Loaded,
    Running,
    Destroyed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid lifecycle transition from {from:?} to {to:?}")]
pub struct LifecycleError {
    pub from: Phase,
    pub to: Phase,
}

/// Tracks the current phase and validates transitions.
#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    fn transition(&mut self, allowed: &[Phase], to: Phase) -> Result<(), LifecycleError> {
        if allowed.contains(&self.phase) {
            self.phase = to;
            Ok(())
        } else {
            Err(LifecycleError {
                from: self.phase,
                to,
            })
        }
    }

    /// All GPU resources were created; a destroyed session may load again.
    pub fn mark_loaded(&mut self) -> Result<(), LifecycleError> {
        self.transition(&[Phase::Uninitialized, Phase::Destroyed], Phase::Loaded)
    }

    pub fn mark_running(&mut self) -> Result<(), LifecycleError> {
        self.transition(&[Phase::Loaded], Phase::Running)
    }

    pub fn mark_destroyed(&mut self) -> Result<(), LifecycleError> {
        self.transition(&[Phase::Loaded, Phase::Running], Phase::Destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_never_advances() {
        let mut clock = FrameClock::animated(Some(12.5));
        let (first, delta_first) = clock.tick();
        let (second, delta_second) = clock.tick();
        assert_eq!(first.seconds, 12.5);
        assert_eq!(second.seconds, 12.5);
        assert_eq!(delta_first, 0.0);
        assert_eq!(delta_second, 0.0);
    }

    #[test]
    fn first_tick_has_zero_delta() {
        let mut clock = FrameClock::animated(None);
        let (_, delta) = clock.tick();
        assert_eq!(delta, 0.0);
    }

    #[test]
    fn system_source_counts_frames() {
        let mut source = SystemTimeSource::new();
        assert_eq!(source.sample().frame_index, 0);
        assert_eq!(source.sample().frame_index, 1);
        source.reset();
        assert_eq!(source.sample().frame_index, 0);
    }

    #[test]
    fn uncapped_pacer_is_always_ready() {
        let pacer = FramePacer::new(None);
        assert!(pacer.ready_for_frame(Instant::now()));
        assert!(pacer.next_deadline().is_none());
    }

    #[test]
    fn capped_pacer_waits_out_the_interval() {
        let mut pacer = FramePacer::new(Some(10.0));
        let now = Instant::now();
        assert!(pacer.ready_for_frame(now));
        pacer.mark_rendered(now);
        assert!(!pacer.ready_for_frame(now));
        let deadline = pacer.next_deadline().unwrap();
        assert!(pacer.ready_for_frame(deadline));
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), Phase::Uninitialized);
        lifecycle.mark_loaded().unwrap();
        lifecycle.mark_running().unwrap();
        assert!(lifecycle.is_running());
        lifecycle.mark_destroyed().unwrap();
        assert_eq!(lifecycle.phase(), Phase::Destroyed);
    }

    #[test]
    fn destroyed_session_may_reload() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.mark_loaded().unwrap();
        lifecycle.mark_destroyed().unwrap();
        lifecycle.mark_loaded().unwrap();
        assert_eq!(lifecycle.phase(), Phase::Loaded);
    }

    #[test]
    fn running_before_loaded_is_rejected() {
        let mut lifecycle = Lifecycle::new();
        let err = lifecycle.mark_running().unwrap_err();
        assert_eq!(err.from, Phase::Uninitialized);
        assert_eq!(err.to, Phase::Running);
    }

    #[test]
    fn double_destroy_is_rejected() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.mark_loaded().unwrap();
        lifecycle.mark_destroyed().unwrap();
        assert!(lifecycle.mark_destroyed().is_err());
    }
}
