//! Visual feedback timeline.
//!
//! Audio is scheduled ahead of time, so the display has to wait until each
//! step actually sounds. Every due step queues wall-clock transitions: the
//! playhead moves to the column at the onset, each triggered cell flashes on at
//! the onset and off a fixed time later.
//!
//! Entries are tagged with the session generation that queued them so a stop
//! can drop everything belonging to that run in one call.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::grid::{COLUMNS, ROWS};
use crate::timing::FLASH_DURATION;

/// A triggered cell whose flash still has to be shown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingVisualEvent {
    pub row: usize,
    pub step: usize,
    /// Device time the cell sounds at.
    pub onset: f64,
}

/// A single change to the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisualTransition {
    Playhead(usize),
    FlashOn { row: usize, column: usize },
    FlashOff { row: usize, column: usize },
}

/// What the grid view should currently show.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub playhead: Option<usize>,
    pub flashing: [[bool; COLUMNS]; ROWS],
}

impl DisplayState {
    pub fn is_flashing(&self, row: usize, column: usize) -> bool {
        self.flashing[row][column]
    }

    pub fn any_flashing(&self) -> bool {
        self.flashing.iter().flatten().any(|f| *f)
    }

    fn apply(&mut self, transition: VisualTransition) {
        match transition {
            VisualTransition::Playhead(column) => self.playhead = Some(column),
            VisualTransition::FlashOn { row, column } => self.flashing[row][column] = true,
            VisualTransition::FlashOff { row, column } => self.flashing[row][column] = false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    transition: VisualTransition,
    generation: u64,
}

/// Wall-clock ordered queue of display transitions.
#[derive(Debug)]
pub struct VisualTimeline {
    queue: BTreeMap<(Instant, u64), Entry>,
    seq: u64,
    flash_duration: Duration,
    display: DisplayState,
}

impl Default for VisualTimeline {
    fn default() -> Self {
        Self::new(FLASH_DURATION)
    }
}

/// Wall instant at which device time `onset` is reached.
fn onset_instant(onset: f64, audio_now: f64, wall_now: Instant) -> Instant {
    let delay = (onset - audio_now).max(0.0);
    wall_now + Duration::from_secs_f64(delay)
}

impl VisualTimeline {
    pub fn new(flash_duration: Duration) -> Self {
        Self {
            queue: BTreeMap::new(),
            seq: 0,
            flash_duration,
            display: DisplayState::default(),
        }
    }

    fn push(&mut self, at: Instant, transition: VisualTransition, generation: u64) {
        self.seq += 1;
        self.queue.insert(
            (at, self.seq),
            Entry {
                transition,
                generation,
            },
        );
    }

    /// Queue the playhead move for a step sounding at device time `onset`.
    pub fn schedule_playhead(
        &mut self,
        step: usize,
        onset: f64,
        audio_now: f64,
        wall_now: Instant,
        generation: u64,
    ) {
        let at = onset_instant(onset, audio_now, wall_now);
        self.push(at, VisualTransition::Playhead(step), generation);
    }

    /// Queue the flash-on / flash-off pair for one triggered cell.
    pub fn schedule(
        &mut self,
        event: PendingVisualEvent,
        audio_now: f64,
        wall_now: Instant,
        generation: u64,
    ) {
        let on = onset_instant(event.onset, audio_now, wall_now);
        let (row, column) = (event.row, event.step);
        self.push(on, VisualTransition::FlashOn { row, column }, generation);
        self.push(
            on + self.flash_duration,
            VisualTransition::FlashOff { row, column },
            generation,
        );
    }

    /// Apply every transition due at or before `wall_now`, in time order.
    /// Returns how many were applied.
    pub fn poll(&mut self, wall_now: Instant) -> usize {
        let mut applied = 0;
        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > wall_now {
                break;
            }
            let Entry { transition, .. } = entry.remove();
            self.display.apply(transition);
            applied += 1;
        }
        applied
    }

    /// Drop every queued transition of `generation`.
    pub fn cancel(&mut self, generation: u64) -> usize {
        let before = self.queue.len();
        self.queue.retain(|_, entry| entry.generation != generation);
        before - self.queue.len()
    }

    /// Clear the playhead and every flash.
    pub fn reset(&mut self) {
        self.display = DisplayState::default();
    }

    /// Earliest queued transition.
    pub fn next_due(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }
}
