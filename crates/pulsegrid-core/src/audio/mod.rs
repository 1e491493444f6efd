//! Audio output.
//!
//! The session talks to the sound card through two traits:
//!
//! - [`AudioBackend`] opens an output device. Only the session calls it.
//! - [`AudioOutput`] is an open device: it exposes the monotonic device clock
//!   and accepts buffers scheduled at a future device time. Sample-accurate
//!   onset is the output's job once a play is scheduled.
//!
//! The [`Engine`] does the actual mixing and is shared by every real backend.

mod engine;

#[cfg(feature = "native")]
mod cpal_backend;

use std::sync::Arc;

use crate::buffer_cache::DecodedBuffer;
use crate::error::AudioError;

pub use engine::{Engine, EngineCommand, MAX_VOICES};

#[cfg(feature = "native")]
pub use cpal_backend::{list_output_devices, print_output_devices, CpalBackend, CpalOutput, OutputDeviceInfo};

/// The smallest unit of audio; one stereo frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// An open audio output device.
pub trait AudioOutput {
    /// Device clock in seconds. Monotonic, advances with rendered audio.
    fn current_time(&self) -> f64;

    /// Make sure the device is rendering (resume a suspended stream).
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Play `buffer` once, starting exactly at device time `at`.
    ///
    /// Times already in the past start as soon as possible.
    fn schedule(&mut self, buffer: Arc<DecodedBuffer>, at: f64);

    /// The single master gain stage, linear.
    fn set_master_gain(&mut self, gain: f32);

    fn sample_rate(&self) -> u32;
}

/// Opens audio output devices.
pub trait AudioBackend {
    fn open(&self) -> Result<Box<dyn AudioOutput>, AudioError>;
}

/// Backend used when audio output support is compiled out.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn open(&self) -> Result<Box<dyn AudioOutput>, AudioError> {
        Err(AudioError::Unsupported)
    }
}
