//! Timing constants and tempo arithmetic.
//!
//! Two clocks are involved in playback:
//!
//! - the **device clock** (seconds, `f64`) reported by
//!   [`AudioOutput::current_time`](crate::audio::AudioOutput::current_time).
//!   Step deadlines and audio onsets live on this clock.
//! - the **wall clock** (`tokio::time::Instant`), which drives the periodic
//!   tick and the visual flash timeline.

use std::time::Duration;

/// Tempo a new session starts at.
pub const DEFAULT_BPM: f64 = 120.0;
/// Slowest accepted tempo.
pub const MIN_BPM: f64 = 72.0;
/// Fastest accepted tempo.
pub const MAX_BPM: f64 = 148.0;

/// How far ahead of the device clock steps are scheduled, in seconds.
pub const LOOKAHEAD_SECS: f64 = 0.16;
/// Period of the scheduler tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(25);
/// Shortest tick period a session accepts.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);
/// Delay between pressing start and the first step onset, in seconds.
pub const STARTUP_OFFSET_SECS: f64 = 0.05;
/// How long a triggered cell stays highlighted.
pub const FLASH_DURATION: Duration = Duration::from_millis(300);

/// Clamp a requested tempo into `[MIN_BPM, MAX_BPM]`.
///
/// Non-finite input falls back to [`DEFAULT_BPM`].
pub fn clamp_tempo(bpm: f64) -> f64 {
    if !bpm.is_finite() {
        return DEFAULT_BPM;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Duration of one step in seconds. Every column is one beat.
#[inline]
pub fn step_duration(bpm: f64) -> f64 {
    60.0 / bpm
}

/// Runtime timing parameters for a [`Session`](crate::Session).
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub bpm: f64,
    pub lookahead_secs: f64,
    pub tick_interval: Duration,
    pub startup_offset_secs: f64,
    pub flash_duration: Duration,
    /// Linear gain applied by the output's master stage.
    pub master_gain: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            lookahead_secs: LOOKAHEAD_SECS,
            tick_interval: TICK_INTERVAL,
            startup_offset_secs: STARTUP_OFFSET_SECS,
            flash_duration: FLASH_DURATION,
            master_gain: 1.0,
        }
    }
}
