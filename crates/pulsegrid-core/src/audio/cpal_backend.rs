//! cpal output backend and device enumeration.
//!
//! The output stream owns an [`Engine`]. The control side sends
//! [`EngineCommand`]s over a bounded channel and reads the device clock from an
//! atomic frame counter the callback updates after every block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

use super::{AudioBackend, AudioOutput, Engine, EngineCommand, StereoFrame};
use crate::buffer_cache::DecodedBuffer;
use crate::error::AudioError;

const COMMAND_QUEUE: usize = 1024;
const COMMON_SAMPLE_RATES: [u32; 7] = [22050, 44100, 48000, 88200, 96000, 176400, 192000];

/// Opens the default (or a named) output device through cpal.
#[derive(Clone, Debug, Default)]
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the output device with this exact name instead of the default.
    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device_name = device;
        self
    }
}

impl AudioBackend for CpalBackend {
    fn open(&self) -> Result<Box<dyn AudioOutput>, AudioError> {
        Ok(Box::new(CpalOutput::open(self.device_name.as_deref())?))
    }
}

/// A running cpal output stream.
pub struct CpalOutput {
    stream: cpal::Stream,
    tx: Sender<EngineCommand>,
    frames_rendered: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CpalOutput {
    pub fn open(device_name: Option<&str>) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(wanted) => host
                .output_devices()
                .map_err(|e| AudioError::Config(e.to_string()))?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceNotFound(wanted.to_string()))?,
            None => host.default_output_device().ok_or(AudioError::NoDevice)?,
        };

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::Config(format!(
                "unsupported sample format {:?} (only f32 supported)",
                supported.sample_format()
            )));
        }

        let sample_rate = supported.sample_rate();
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;
        if channels == 0 {
            return Err(AudioError::Config("device reports zero output channels".to_string()));
        }

        let (tx, rx) = crossbeam_channel::bounded::<EngineCommand>(COMMAND_QUEUE);
        let frames_rendered = Arc::new(AtomicU64::new(0));
        let clock = Arc::clone(&frames_rendered);
        let mut engine = Engine::new(sample_rate);
        let mut scratch = vec![StereoFrame::zero(); 4096];

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    while let Ok(cmd) = rx.try_recv() {
                        engine.handle_cmd(cmd);
                    }

                    let n_frames = data.len() / channels;
                    if scratch.len() < n_frames {
                        scratch.resize(n_frames, StereoFrame::zero());
                    }
                    let block = &mut scratch[..n_frames];
                    engine.render_block(block);

                    for (out, frame) in data.chunks_exact_mut(channels).zip(block.iter()) {
                        match out {
                            [mono] => *mono = 0.5 * (frame.left + frame.right),
                            [left, right, rest @ ..] => {
                                *left = frame.left;
                                *right = frame.right;
                                rest.fill(0.0);
                            }
                            [] => {}
                        }
                    }

                    clock.store(engine.frame_clock(), Ordering::Release);
                },
                |err| log::error!("audio output stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::Build(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Play(e.to_string()))?;

        log::info!(
            "Audio output opened: {} Hz, {} channel(s)",
            sample_rate,
            channels
        );

        Ok(Self {
            stream,
            tx,
            frames_rendered,
            sample_rate,
        })
    }

    fn send(&self, cmd: EngineCommand) {
        if self.tx.try_send(cmd).is_err() {
            log::warn!("Audio command queue full, dropping command");
        }
    }
}

impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::Play(e.to_string()))
    }

    fn schedule(&mut self, buffer: Arc<DecodedBuffer>, at: f64) {
        let start_frame = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        self.send(EngineCommand::Play {
            buffer,
            start_frame,
        });
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.send(EngineCommand::SetMasterGain(gain));
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Information about an output device.
#[derive(Clone, Debug)]
pub struct OutputDeviceInfo {
    /// Device name (as reported by the system)
    pub name: String,
    /// Maximum supported output channels
    pub max_channels: u32,
    /// Supported sample rates (sorted)
    pub sample_rates: Vec<u32>,
    pub is_default: bool,
}

/// List output devices, default device first, then by name.
pub fn list_output_devices() -> Result<Vec<OutputDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host
        .output_devices()
        .map_err(|e| AudioError::Config(e.to_string()))?
    {
        let name = match device.name() {
            Ok(n) => n,
            Err(_) => continue,
        };

        let mut max_channels = 0;
        let mut sample_rates: Vec<u32> = Vec::new();
        if let Ok(configs) = device.supported_output_configs() {
            for config in configs {
                max_channels = max_channels.max(config.channels() as u32);
                let min = config.min_sample_rate();
                let max = config.max_sample_rate();
                for rate in COMMON_SAMPLE_RATES {
                    if rate >= min && rate <= max && !sample_rates.contains(&rate) {
                        sample_rates.push(rate);
                    }
                }
            }
        }
        if max_channels == 0 {
            continue;
        }
        sample_rates.sort();

        let is_default = default_name.as_ref().is_some_and(|d| d == &name);
        devices.push(OutputDeviceInfo {
            name,
            max_channels,
            sample_rates,
            is_default,
        });
    }

    devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(devices)
}

/// Print a formatted list of output devices to stdout.
pub fn print_output_devices() -> Result<(), AudioError> {
    let devices = list_output_devices()?;

    println!("Available Output Devices:");
    println!("=========================\n");

    if devices.is_empty() {
        println!("  No output devices found.");
        return Ok(());
    }

    for device in devices {
        let marker = if device.is_default { " [default]" } else { "" };
        println!("  {}{}", device.name, marker);
        println!("    Channels:     {}", device.max_channels);
        if !device.sample_rates.is_empty() {
            let rates: Vec<String> = device.sample_rates.iter().map(|r| r.to_string()).collect();
            println!("    Sample rates: {}", rates.join(", "));
        }
        println!();
    }

    Ok(())
}
