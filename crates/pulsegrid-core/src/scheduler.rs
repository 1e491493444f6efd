//! Lookahead step scheduler.
//!
//! Each tick asks the scheduler which steps have a deadline inside the
//! lookahead window `[.., now + lookahead)` on the device clock. Every due step
//! is returned with its own deadline, so the audio output can start it
//! sample-accurately even though the tick itself runs on a coarse timer.

use crate::catalog::SoundId;
use crate::grid::{Grid, COLUMNS};
use crate::timing::{clamp_tempo, step_duration, DEFAULT_BPM, LOOKAHEAD_SECS};

/// Upper bound on steps emitted by one tick.
const MAX_STEPS_PER_TICK: usize = 64;

/// Mutable transport position.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub tempo_bpm: f64,
    /// Column that will be emitted next.
    pub current_step: usize,
    /// Device time of the next step onset, in seconds.
    pub next_step_deadline: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            tempo_bpm: DEFAULT_BPM,
            current_step: 0,
            next_step_deadline: 0.0,
        }
    }
}

/// One step whose onset falls inside the lookahead window.
#[derive(Clone, Debug, PartialEq)]
pub struct DueStep {
    pub step: usize,
    /// Device time the step sounds at.
    pub deadline: f64,
    /// Non-empty cells of the step's column as `(row, id)`, read from the grid
    /// as it was at tick time.
    pub cells: Vec<(usize, SoundId)>,
}

#[derive(Clone, Debug)]
pub struct StepScheduler {
    state: PlaybackState,
    lookahead: f64,
    playhead: Option<usize>,
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new(LOOKAHEAD_SECS)
    }
}

impl StepScheduler {
    pub fn new(lookahead_secs: f64) -> Self {
        Self {
            state: PlaybackState::default(),
            lookahead: lookahead_secs.max(0.0),
            playhead: None,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Last emitted step, if any since the last reset.
    pub fn playhead(&self) -> Option<usize> {
        self.playhead
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn tempo(&self) -> f64 {
        self.state.tempo_bpm
    }

    /// Rewind to step 0 and arm the first deadline at `now + offset`.
    pub fn reset(&mut self, now: f64, offset: f64) {
        self.state.current_step = 0;
        self.state.next_step_deadline = now + offset.max(0.0);
        self.state.is_playing = true;
        self.playhead = None;
    }

    pub fn stop(&mut self) {
        self.state.is_playing = false;
        self.state.current_step = 0;
        self.playhead = None;
    }

    /// Set the tempo (clamped). Only deadlines computed afterwards use it.
    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        self.state.tempo_bpm = clamp_tempo(bpm);
        self.state.tempo_bpm
    }

    /// Emit every step whose deadline is before `now + lookahead`.
    pub fn collect_due_steps(&mut self, now: f64, grid: &Grid) -> Vec<DueStep> {
        let mut due = Vec::new();
        if !self.state.is_playing {
            return due;
        }

        let window_end = now + self.lookahead;
        while self.state.next_step_deadline < window_end {
            if due.len() >= MAX_STEPS_PER_TICK {
                log::warn!(
                    "[SCHEDULER] Runaway tick: {} steps due, deferring the rest (deadline {:.3}s, now {:.3}s)",
                    due.len(),
                    self.state.next_step_deadline,
                    now
                );
                break;
            }

            let step = self.state.current_step;
            let cells: Vec<(usize, SoundId)> = grid
                .column(step)
                .map(|(row, id)| (row, id.clone()))
                .collect();
            log::debug!(
                "[SCHEDULER] Step {} at {:.3}s ({} cell(s))",
                step,
                self.state.next_step_deadline,
                cells.len()
            );
            due.push(DueStep {
                step,
                deadline: self.state.next_step_deadline,
                cells,
            });

            self.playhead = Some(step);
            self.state.current_step = (step + 1) % COLUMNS;
            self.state.next_step_deadline += step_duration(self.state.tempo_bpm);
        }
        due
    }
}
