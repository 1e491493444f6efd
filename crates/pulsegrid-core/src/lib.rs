//! pulsegrid core - an interactive grid step sequencer.
//!
//! This crate provides the building blocks of pulsegrid:
//!
//! - **Catalog** - Sound descriptors and their presentation attributes
//! - **Grid** - The 5x8 matrix of sound bindings and its shared store
//! - **Buffer cache** - Single-flight decoding of sound sources
//! - **Scheduler** - Lookahead step scheduling against the audio clock
//! - **Visual** - Wall-clock timeline for playhead and flash feedback
//! - **Session** - Transport controller tying everything together
//! - **Audio** - Output traits, mixing engine and the cpal backend
//!
//! # Architecture
//!
//! A [`Session`] is driven by its host: the host awaits `start()`, calls
//! [`Session::pump`] whenever [`Session::next_wakeup`] comes due and edits the
//! grid at any time through the [`GridStore`]. Each tick the [`StepScheduler`]
//! returns the steps whose onset falls inside the lookahead window and the
//! session hands the cached buffers to the [`AudioOutput`] at their exact
//! deadline.
//!
//! # Feature Flags
//!
//! - `native` (default) - cpal audio output and device enumeration

pub mod audio;
pub mod buffer_cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod grid;
pub mod scheduler;
pub mod session;
pub mod timing;
pub mod visual;

// Re-export main types for convenience
pub use audio::{AudioBackend, AudioOutput, Engine, EngineCommand, NullBackend, StereoFrame};
pub use buffer_cache::{BufferCache, DecodedBuffer, FileSource, SoundSource};
pub use catalog::{Animation, Catalog, CatalogEntry, Presentation, Shape, SoundDescriptor, SoundId};
pub use config::Config;
pub use error::{AudioError, CatalogError, DecodeError, Error, PreloadError, Result};
pub use grid::{Grid, GridStore, COLUMNS, ROWS};
pub use scheduler::{DueStep, PlaybackState, StepScheduler};
pub use session::{Session, StatusEvent, TransportState};
pub use timing::{SessionSettings, MAX_BPM, MIN_BPM};
pub use visual::{DisplayState, VisualTimeline};

// Native-only re-exports
#[cfg(feature = "native")]
pub use audio::{list_output_devices, print_output_devices, CpalBackend, OutputDeviceInfo};
