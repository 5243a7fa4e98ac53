use crate::config::{AudioSettings, ToneParams};
use crate::playback::{PlaybackError, ToneOutput};
use crate::synth::MixBus;
use rodio::cpal::traits::DeviceTrait;
use rodio::cpal::traits::HostTrait;
use rodio::source::Source;
use rodio::{OutputStream, OutputStreamBuilder, StreamError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "playback::audio";

/// Samples rendered per bus lock on the audio thread.
const BLOCK_SIZE: usize = 256;

/// A minimal, poison-tolerant, lazy initializer for a single value.
///
/// [`rodio::OutputStream`] stops all sound when dropped, so the stream and
/// the bus feeding it are opened once and kept for the process lifetime.
struct LazyInit<T> {
    value: Mutex<Option<T>>,
}

impl<T> LazyInit<T> {
    fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    fn get_or_try_init_with<R, E>(
        &self,
        init: impl FnOnce() -> Result<T, E>,
        f: impl FnOnce(&T) -> R,
        invariant_err: impl FnOnce() -> E,
    ) -> Result<R, E> {
        let mut guard = match self.value.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    "output cache lock was poisoned; recovering and continuing"
                );
                poisoned.into_inner()
            }
        };

        // NOTE: `init` is used at most once (only when the cache is empty).
        if guard.is_none() {
            *guard = Some(init()?);
        }

        match guard.as_ref() {
            Some(v) => Ok(f(v)),
            None => Err(invariant_err()),
        }
    }
}

struct RateLimitedWarn {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimitedWarn {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    fn should_log(&self) -> bool {
        let mut guard = match self.last.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        match *guard {
            None => {
                *guard = Some(now);
                true
            }
            Some(prev) if now.duration_since(prev) >= self.interval => {
                *guard = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

struct OpenOutput {
    _stream: OutputStream,
    bus: MixBus,
}

/// Tone output backed by the system audio device.
///
/// The device is opened on the first emission. If that fails the output
/// disables itself and every later emission is a silent no-op.
#[derive(Clone)]
pub struct AudioToneOutput {
    settings: AudioSettings,
    disabled: Arc<AtomicBool>,
    disabled_details: Arc<OnceLock<String>>,

    // Clones share a single stream and bus.
    output: Arc<LazyInit<OpenOutput>>,
    open_attempts: Arc<AtomicUsize>,

    unavailable_warn: Arc<RateLimitedWarn>,
}

impl AudioToneOutput {
    pub fn new(settings: AudioSettings) -> Result<Self, PlaybackError> {
        settings
            .validate()
            .map_err(|e| PlaybackError::AudioOutputUnavailable {
                details: format!("invalid audio settings: {e}"),
            })?;

        Ok(Self {
            settings,
            disabled: Arc::new(AtomicBool::new(false)),
            disabled_details: Arc::new(OnceLock::new()),

            output: Arc::new(LazyInit::new()),
            open_attempts: Arc::new(AtomicUsize::new(0)),
            unavailable_warn: Arc::new(RateLimitedWarn::new(Duration::from_secs(5))),
        })
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn disabled_details(&self) -> Option<&str> {
        self.disabled_details.get().map(String::as_str)
    }

    fn open_output_stream(&self) -> Result<OutputStream, PlaybackError> {
        let attempt = self.open_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let configured = self.settings.output_device.as_deref();
        tracing::debug!(
            target: LOG_TARGET,
            attempt,
            configured_output_device = %configured.unwrap_or("<default>"),
            "opening Rodio OutputStream"
        );

        match configured {
            Some(wanted) => match open_named_output_stream(wanted) {
                Ok(stream) => Ok(stream),
                Err(NamedDeviceStreamError::DeviceNotFound { wanted, available }) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        wanted_device = %wanted,
                        available_devices = %format_device_list(&available),
                        "configured output device not found; falling back to default output device"
                    );
                    open_default_stream(Some(wanted.as_str()))
                }
                Err(NamedDeviceStreamError::OpenFailed {
                    wanted,
                    error,
                    available,
                }) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        wanted_device = %wanted,
                        error = %error,
                        available_devices = %format_device_list(&available),
                        "failed to open configured output device; using default output device"
                    );
                    open_default_stream(Some(wanted.as_str()))
                }
            },
            None => open_default_stream(None),
        }
    }

    fn open(&self) -> Result<OpenOutput, PlaybackError> {
        let stream = self.open_output_stream()?;
        let bus = MixBus::new(&self.settings);
        stream.mixer().add(BusSource::new(bus.clone()));
        tracing::info!(
            target: LOG_TARGET,
            sample_rate_hz = self.settings.sample_rate_hz,
            "audio output ready"
        );
        Ok(OpenOutput {
            _stream: stream,
            bus,
        })
    }

    fn with_bus<R>(
        &self,
        open: impl FnOnce() -> Result<OpenOutput, PlaybackError>,
        f: impl FnOnce(&MixBus) -> R,
    ) -> Result<R, PlaybackError> {
        self.output.get_or_try_init_with(
            open,
            |open| f(&open.bus),
            || PlaybackError::AudioOutputUnavailable {
                details: "internal error: output cache invariant violated".to_owned(),
            },
        )
    }
}

impl ToneOutput for AudioToneOutput {
    fn emit(&self, tone: ToneParams, volume: f64) -> Result<(), PlaybackError> {
        self.emit_with(tone, volume, || self.open())
    }
}

impl AudioToneOutput {
    fn emit_with(
        &self,
        tone: ToneParams,
        volume: f64,
        open: impl FnOnce() -> Result<OpenOutput, PlaybackError>,
    ) -> Result<(), PlaybackError> {
        if self.is_disabled() {
            if self.unavailable_warn.should_log() {
                tracing::warn!(
                    target: LOG_TARGET,
                    details = %self.disabled_details().unwrap_or("<unknown>"),
                    "audio output unavailable; ignoring tone (rate-limited)"
                );
            }
            return Ok(());
        }

        match self.with_bus(open, |bus| bus.start(&tone, volume)) {
            Ok(()) => Ok(()),
            Err(PlaybackError::AudioOutputUnavailable { details }) => {
                self.disabled.store(true, Ordering::Relaxed);
                tracing::warn!(
                    target: LOG_TARGET,
                    details = %details,
                    "audio output unavailable; further tones are ignored"
                );
                let _ = self.disabled_details.set(details);
                Ok(())
            }
        }
    }
}

/// Endless mono source pulling rendered blocks from a [`MixBus`].
pub struct BusSource {
    bus: MixBus,
    sample_rate: u32,
    block: Vec<f32>,
    pos: usize,
}

impl BusSource {
    pub fn new(bus: MixBus) -> Self {
        let sample_rate = bus.sample_rate_hz();
        Self {
            bus,
            sample_rate,
            block: vec![0.0; BLOCK_SIZE],
            pos: BLOCK_SIZE,
        }
    }
}

impl Iterator for BusSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.block.len() {
            self.bus.render_block(&mut self.block);
            self.pos = 0;
        }
        let sample = self.block[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for BusSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<std::time::Duration> {
        None
    }
}

fn open_default_stream(wanted: Option<&str>) -> Result<OutputStream, PlaybackError> {
    OutputStreamBuilder::open_default_stream().map_err(|e| {
        let details = match wanted {
            Some(w) => format!("default-device fallback: {e} (configured_device={w})"),
            None => format!("open default output stream: {e}"),
        };
        PlaybackError::AudioOutputUnavailable { details }
    })
}

#[derive(Debug)]
enum NamedDeviceStreamError {
    DeviceNotFound {
        wanted: String,
        available: Vec<String>,
    },
    OpenFailed {
        wanted: String,
        error: StreamError,
        available: Vec<String>,
    },
}

fn normalize_device_name(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

fn open_named_output_stream(wanted: &str) -> Result<OutputStream, NamedDeviceStreamError> {
    let wanted_norm = normalize_device_name(wanted);

    let host = rodio::cpal::default_host();
    let devices = host.output_devices().ok();
    let mut available: Vec<String> = Vec::new();
    let mut selected = None;

    if let Some(devices) = devices {
        for d in devices {
            let name = d.name().unwrap_or_else(|_| "<unnamed>".to_owned());
            if normalize_device_name(&name) == wanted_norm {
                selected = Some(d);
            }
            available.push(name);
        }
    }

    let Some(device) = selected else {
        return Err(NamedDeviceStreamError::DeviceNotFound {
            wanted: wanted.to_owned(),
            available,
        });
    };

    match OutputStreamBuilder::from_device(device).and_then(|b| b.open_stream_or_fallback()) {
        Ok(stream) => Ok(stream),
        Err(error) => Err(NamedDeviceStreamError::OpenFailed {
            wanted: wanted.to_owned(),
            error,
            available,
        }),
    }
}

fn format_device_list(devices: &[String]) -> String {
    if devices.is_empty() {
        return "<unknown>".to_owned();
    }
    devices.join(", ")
}

#[cfg(feature = "playback-device-enum")]
pub fn enumerate_output_device_names() -> Result<Vec<String>, PlaybackError> {
    let host = rodio::cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| PlaybackError::AudioOutputUnavailable {
            details: format!("failed to list output devices: {e}"),
        })?;

    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "<unnamed>".to_owned()))
        .collect())
}
