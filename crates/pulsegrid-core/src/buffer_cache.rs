//! Decoded audio buffers and the per-locator buffer cache.
//!
//! Entries are write-once: the first successful decode for a locator wins and
//! stays for the lifetime of the cache. Each locator owns a
//! `tokio::sync::OnceCell`, so concurrent requests for the same locator share
//! one in-flight decode. A failed decode leaves the cell empty and the next
//! request retries.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::OnceCell;

use crate::audio::StereoFrame;
use crate::catalog::Catalog;
use crate::error::{DecodeError, PreloadError, PreloadFailure};
use crate::grid::Grid;

/// Decoded, stereo, f32 audio.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBuffer {
    pub sample_rate: u32,
    pub frames: Vec<StereoFrame>,
}

impl DecodedBuffer {
    pub fn new(sample_rate: u32, frames: Vec<StereoFrame>) -> Self {
        Self {
            sample_rate,
            frames,
        }
    }

    /// Decode WAV data from any reader.
    ///
    /// Mono files are duplicated to both channels; files with more than two
    /// channels keep the first two. Integer PCM is normalized to `[-1, 1]`.
    pub fn from_wav_reader<R: Read>(reader: R) -> Result<Self, DecodeError> {
        let reader = hound::WavReader::new(reader)?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(DecodeError::UnsupportedFormat("zero channels".to_string()));
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(DecodeError::UnsupportedFormat(format!(
                        "{}-bit integer PCM",
                        spec.bits_per_sample
                    )));
                }
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let frames = if channels == 1 {
            samples
                .into_iter()
                .map(|s| StereoFrame { left: s, right: s })
                .collect()
        } else {
            samples
                .chunks_exact(channels)
                .map(|c| StereoFrame {
                    left: c[0],
                    right: c[1],
                })
                .collect()
        };

        Ok(Self {
            sample_rate: spec.sample_rate,
            frames,
        })
    }

    /// Decode a WAV file from disk.
    pub fn load_wav(path: &Path) -> Result<Self, DecodeError> {
        let file = std::fs::File::open(path)?;
        Self::from_wav_reader(std::io::BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Length in seconds at the buffer's own sample rate.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.sample_rate as f64
    }
}

/// Where encoded sound data comes from.
#[async_trait]
pub trait SoundSource: Send + Sync {
    /// Fetch and decode the sound at `locator`.
    async fn load(&self, locator: &str) -> Result<DecodedBuffer, DecodeError>;
}

/// Loads WAV files relative to a base directory.
#[derive(Clone, Debug)]
pub struct FileSource {
    base_dir: PathBuf,
}

impl FileSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn resolve(&self, locator: &str) -> PathBuf {
        self.base_dir.join(locator)
    }
}

#[async_trait]
impl SoundSource for FileSource {
    async fn load(&self, locator: &str) -> Result<DecodedBuffer, DecodeError> {
        let path = self.resolve(locator);
        log::debug!("Decoding {}", path.display());
        tokio::task::spawn_blocking(move || DecodedBuffer::load_wav(&path))
            .await
            .map_err(|e| DecodeError::Task(e.to_string()))?
    }
}

type Slot = Arc<OnceCell<Arc<DecodedBuffer>>>;

/// Memoizing cache of decoded buffers keyed by source locator.
pub struct BufferCache {
    source: Arc<dyn SoundSource>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl BufferCache {
    pub fn new(source: Arc<dyn SoundSource>) -> Self {
        Self {
            source,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, locator: &str) -> Slot {
        let mut slots = self.slots.lock().expect("Buffer cache lock poisoned");
        slots.entry(locator.to_string()).or_default().clone()
    }

    /// Get the decoded buffer for `locator`, decoding it on first use.
    ///
    /// Concurrent calls for the same locator wait on the same decode.
    pub async fn get(&self, locator: &str) -> Result<Arc<DecodedBuffer>, DecodeError> {
        let slot = self.slot(locator);
        let buffer = slot
            .get_or_try_init(|| async {
                let buffer = self.source.load(locator).await?;
                log::debug!(
                    "Cached {} ({} frames @ {} Hz)",
                    locator,
                    buffer.len(),
                    buffer.sample_rate
                );
                Ok::<_, DecodeError>(Arc::new(buffer))
            })
            .await?;
        Ok(Arc::clone(buffer))
    }

    /// The buffer for `locator` if it has already been decoded. Never suspends.
    pub fn get_cached(&self, locator: &str) -> Option<Arc<DecodedBuffer>> {
        let slots = self.slots.lock().expect("Buffer cache lock poisoned");
        slots.get(locator).and_then(|slot| slot.get().cloned())
    }

    pub fn is_cached(&self, locator: &str) -> bool {
        self.get_cached(locator).is_some()
    }

    /// Number of decoded entries.
    pub fn cached_count(&self) -> usize {
        let slots = self.slots.lock().expect("Buffer cache lock poisoned");
        slots.values().filter(|slot| slot.initialized()).count()
    }

    /// Decode every sound referenced by a non-empty cell of `grid`.
    ///
    /// All requests run concurrently and this returns once every one has
    /// settled. Ids missing from the catalog are ignored. Returns the number
    /// of distinct locators that are now cached.
    pub async fn preload(&self, grid: &Grid, catalog: &Catalog) -> Result<usize, PreloadError> {
        let mut locators: Vec<&str> = Vec::new();
        for id in grid.occupied_ids() {
            match catalog.get(id) {
                Some(descriptor) => {
                    let locator = descriptor.source_locator.as_str();
                    if !locators.contains(&locator) {
                        locators.push(locator);
                    }
                }
                None => log::debug!("Preload: '{}' is not in the catalog, ignoring", id),
            }
        }

        let results = join_all(locators.iter().map(|locator| self.get(locator))).await;

        let failures: Vec<PreloadFailure> = locators
            .iter()
            .zip(results)
            .filter_map(|(locator, result)| {
                result.err().map(|error| PreloadFailure {
                    locator: locator.to_string(),
                    error,
                })
            })
            .collect();

        if failures.is_empty() {
            log::info!("Preloaded {} sound(s)", locators.len());
            Ok(locators.len())
        } else {
            Err(PreloadError { failures })
        }
    }
}

impl std::fmt::Debug for BufferCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCache")
            .field("cached", &self.cached_count())
            .finish_non_exhaustive()
    }
}
