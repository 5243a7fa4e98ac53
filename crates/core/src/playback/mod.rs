mod audio;
mod dummy;
mod scheduler;

use crate::config::ToneParams;

pub use audio::{AudioToneOutput, BusSource};
#[cfg(feature = "playback-device-enum")]
pub use audio::enumerate_output_device_names;
pub use dummy::{DummyToneOutput, Emission};
pub use scheduler::{
    build_schedule, duration_from_secs, PlaybackScheduler, Schedule, ScheduledTone,
    SequenceHandle, FAR_FUTURE,
};

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("audio output unavailable: {details}")]
    AudioOutputUnavailable { details: String },
}

/// Destination for emitted tones. Emission starts the tone and returns
/// without waiting for it to finish.
pub trait ToneOutput: Send + Sync {
    fn emit(&self, tone: ToneParams, volume: f64) -> Result<(), PlaybackError>;
}
