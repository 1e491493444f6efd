//! Error types for pulsegrid-core.
//!
//! Every failure a user can see is one of four kinds: catalog errors, audio
//! device errors, decode/fetch errors (surfaced through preload), and
//! configuration errors. Unknown ids at trigger time are not errors at all;
//! the session skips them.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::SoundId;

/// Result type alias for pulsegrid-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors while loading or validating the sound catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The manifest file could not be read.
    #[error("Cannot read catalog manifest {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not a valid list of sound descriptors.
    #[error("Malformed catalog manifest: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The manifest parsed but contained no sounds.
    #[error("Catalog is empty")]
    Empty,

    /// Two descriptors share the same id.
    #[error("Duplicate sound id in catalog: {0}")]
    DuplicateId(SoundId),
}

/// Errors while fetching or decoding a single sound.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The source file could not be opened.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The WAV data is invalid or uses an unsupported encoding.
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),

    /// The audio format is recognised but not supported.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The blocking decode task did not complete.
    #[error("Decode task failed: {0}")]
    Task(String),
}

/// Errors constructing or running the audio output device.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No default output device is available.
    #[error("No audio output device available")]
    NoDevice,

    /// A named output device was requested but not found.
    #[error("Audio output device not found: {0}")]
    DeviceNotFound(String),

    /// The device refused to report or accept a configuration.
    #[error("Audio device configuration error: {0}")]
    Config(String),

    /// The output stream could not be built.
    #[error("Failed to build audio stream: {0}")]
    Build(String),

    /// The output stream could not be started or resumed.
    #[error("Failed to start audio stream: {0}")]
    Play(String),

    /// Audio output support is compiled out.
    #[error("Audio output is not available in this build")]
    Unsupported,
}

/// One failed locator inside a preload.
#[derive(Debug)]
pub struct PreloadFailure {
    pub locator: String,
    pub error: DecodeError,
}

/// Aggregate error for a preload where at least one buffer failed.
#[derive(Debug, Error)]
#[error("Failed to load {} sound(s): {}", failures.len(), summary(failures))]
pub struct PreloadError {
    pub failures: Vec<PreloadFailure>,
}

fn summary(failures: &[PreloadFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.locator, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Umbrella error for pulsegrid-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Cannot decode {locator}: {source}")]
    Decode {
        locator: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Preload(#[from] PreloadError),

    /// `start()` or `preview_sound()` was called before a catalog loaded.
    #[error("No sound catalog loaded")]
    NoCatalog,

    /// A sound id that is not part of the catalog.
    #[error("Unknown sound: {0}")]
    UnknownSound(SoundId),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
