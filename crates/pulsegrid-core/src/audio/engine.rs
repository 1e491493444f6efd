//! Sample-accurate mixing engine.
//!
//! Runs inside the audio callback. Plays are scheduled against the engine's
//! frame clock; a play whose start frame lands inside the block being rendered
//! starts at exactly that frame offset. The engine never allocates after
//! construction: the voice pool is a fixed-capacity `Vec`.

use std::sync::Arc;

use super::StereoFrame;
use crate::buffer_cache::DecodedBuffer;

/// Hard cap on simultaneous voices so the callback never reallocates.
pub const MAX_VOICES: usize = 32;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Commands sent from the control thread to the audio callback.
#[derive(Clone, Debug)]
pub enum EngineCommand {
    /// Start `buffer` at absolute engine frame `start_frame`.
    Play {
        buffer: Arc<DecodedBuffer>,
        start_frame: u64,
    },
    SetMasterGain(f32),
}

struct Voice {
    buffer: Arc<DecodedBuffer>,
    start_frame: u64,
    /// Read position in source frames.
    pos: f64,
    /// Source frames advanced per output frame.
    step: f64,
}

impl Voice {
    /// Mix into `out`; returns false once the buffer is exhausted.
    fn render_into(&mut self, out: &mut [StereoFrame], gain: f32) -> bool {
        let data = &self.buffer.frames;
        for frame in out.iter_mut() {
            let i = self.pos as usize;
            if i >= data.len() {
                return false;
            }
            let frac = (self.pos - i as f64) as f32;
            let s0 = data[i];
            let s1 = data.get(i + 1).copied().unwrap_or(s0);
            frame.left += lerp(s0.left, s1.left, frac) * gain;
            frame.right += lerp(s0.right, s1.right, frac) * gain;
            self.pos += self.step;
        }
        (self.pos as usize) < data.len()
    }
}

/// Voice pool + frame clock.
pub struct Engine {
    sample_rate: u32,
    frame_clock: u64,
    master_gain: f32,
    voices: Vec<Voice>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frame_clock: 0,
            master_gain: 1.0,
            voices: Vec::with_capacity(MAX_VOICES),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far; the device clock in frames.
    pub fn frame_clock(&self) -> u64 {
        self.frame_clock
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn handle_cmd(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Play {
                buffer,
                start_frame,
            } => self.start_voice(buffer, start_frame),
            EngineCommand::SetMasterGain(gain) => self.master_gain = gain.clamp(0.0, 2.0),
        }
    }

    fn start_voice(&mut self, buffer: Arc<DecodedBuffer>, start_frame: u64) {
        if buffer.is_empty() {
            return;
        }
        // steal the oldest voice when the pool is full
        if self.voices.len() == MAX_VOICES {
            self.voices.remove(0);
        }
        let step = buffer.sample_rate.max(1) as f64 / self.sample_rate as f64;
        self.voices.push(Voice {
            buffer,
            start_frame,
            pos: 0.0,
            step,
        });
    }

    /// Render one block and advance the frame clock by its length.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::zero());

        let block_start = self.frame_clock;
        let block_end = block_start + out.len() as u64;
        let gain = self.master_gain;

        self.voices.retain_mut(|voice| {
            if voice.start_frame >= block_end {
                return true;
            }
            // late plays start at the top of the block
            let offset = voice.start_frame.saturating_sub(block_start) as usize;
            voice.render_into(&mut out[offset..], gain)
        });

        self.frame_clock = block_end;
    }
}
