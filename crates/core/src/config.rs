use crate::sequence::ToneDescriptor;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 44_100;
pub const DEFAULT_ENVELOPE_FLOOR: f64 = 0.001;
pub const DEFAULT_SPEED: f64 = 1.0;
pub const DEFAULT_AMPLITUDE_SCALE: f64 = 1.0;
pub const DEFAULT_VOLUME: f64 = 1.0;

pub const UI_SPEED_RANGE: RangeInclusive<f64> = 0.5..=2.0;
pub const UI_AMPLITUDE_RANGE: RangeInclusive<f64> = 0.1..=2.0;
pub const UI_VOLUME_RANGE: RangeInclusive<f64> = 0.0..=2.0;

pub const ENV_OUTPUT_DEVICE: &str = "HEBREW_TONES_OUTPUT_DEVICE";
pub const ENV_SPEED: &str = "HEBREW_TONES_SPEED";
pub const ENV_AMPLITUDE: &str = "HEBREW_TONES_AMPLITUDE";
pub const ENV_VOLUME: &str = "HEBREW_TONES_VOLUME";

/// Playback speed multiplier; tone lengths are divided by it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Speed(f64);

impl Speed {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::NonPositiveSpeed(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(DEFAULT_SPEED)
    }
}

/// Multiplier applied to each letter's amplitude at the start of its tone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AmplitudeScale(f64);

impl AmplitudeScale {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::NegativeAmplitude(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Default for AmplitudeScale {
    fn default() -> Self {
        Self(DEFAULT_AMPLITUDE_SCALE)
    }
}

/// Output gain stage, independent of per-tone amplitude.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Volume(f64);

impl Volume {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::NegativeVolume(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Display value: the [0, 2] slider shown as 0-100%.
    pub fn percent(&self) -> f64 {
        self.0 * 50.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(DEFAULT_VOLUME)
    }
}

/// Concrete parameters for one emitted tone.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct ToneParams {
    pub frequency_hz: f64,
    pub duration_secs: f64,
    pub start_gain: f64,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaybackControls {
    pub speed: Speed,
    pub amplitude: AmplitudeScale,
    pub volume: Volume,
}

impl PlaybackControls {
    pub fn new(speed: f64, amplitude: f64, volume: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            speed: Speed::new(speed)?,
            amplitude: AmplitudeScale::new(amplitude)?,
            volume: Volume::new(volume)?,
        })
    }

    /// Like [`PlaybackControls::new`], but restricted to the slider bounds.
    pub fn from_ui(speed: f64, amplitude: f64, volume: f64) -> Result<Self, ConfigError> {
        check_bounds("speed", speed, &UI_SPEED_RANGE)?;
        check_bounds("amplitude", amplitude, &UI_AMPLITUDE_RANGE)?;
        check_bounds("volume", volume, &UI_VOLUME_RANGE)?;
        Self::new(speed, amplitude, volume)
    }

    pub fn tone_params(&self, descriptor: &ToneDescriptor) -> ToneParams {
        ToneParams {
            frequency_hz: descriptor.frequency,
            duration_secs: descriptor.duration / self.speed.get(),
            start_gain: descriptor.amplitude * self.amplitude.get(),
        }
    }
}

fn check_bounds(
    control: &'static str,
    value: f64,
    range: &RangeInclusive<f64>,
) -> Result<(), ConfigError> {
    if !range.contains(&value) {
        return Err(ConfigError::OutOfBounds {
            control,
            value,
            min: *range.start(),
            max: *range.end(),
        });
    }
    Ok(())
}

/// Soft-knee compressor settings for the output stage.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct LimiterSettings {
    pub threshold_db: f64,
    pub knee_db: f64,
    pub ratio: f64,
    pub attack_secs: f64,
    pub release_secs: f64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack_secs: 0.0,
            release_secs: 0.25,
        }
    }
}

impl LimiterSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.threshold_db <= 0.0, "threshold_db must be <= 0"),
            (self.knee_db >= 0.0, "knee_db must be >= 0"),
            (self.ratio >= 1.0, "ratio must be >= 1"),
            (self.attack_secs >= 0.0, "attack_secs must be >= 0"),
            (self.release_secs > 0.0, "release_secs must be > 0"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, reason)) => Err(ConfigError::InvalidLimiter(*reason)),
            None => Ok(()),
        }
    }
}

/// What happens to pending tones when a new sequence starts.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RetriggerPolicy {
    #[default]
    CancelPending,
    Overlap,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioSettings {
    pub sample_rate_hz: u32,
    pub envelope_floor: f64,
    pub limiter: LimiterSettings,
    pub retrigger: RetriggerPolicy,
    pub output_device: Option<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            envelope_floor: DEFAULT_ENVELOPE_FLOOR,
            limiter: LimiterSettings::default(),
            retrigger: RetriggerPolicy::default(),
            output_device: None,
        }
    }
}

impl AudioSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if !(self.envelope_floor > 0.0 && self.envelope_floor.is_finite()) {
            return Err(ConfigError::NonPositiveFloor(self.envelope_floor));
        }
        self.limiter.validate()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("speed must be a finite value > 0, got {0}")]
    NonPositiveSpeed(f64),
    #[error("amplitude multiplier must be a finite value >= 0, got {0}")]
    NegativeAmplitude(f64),
    #[error("volume must be a finite value >= 0, got {0}")]
    NegativeVolume(f64),
    #[error("{control} {value} outside [{min}, {max}]")]
    OutOfBounds {
        control: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("invalid limiter settings: {0}")]
    InvalidLimiter(&'static str),
    #[error("sample rate must be > 0")]
    ZeroSampleRate,
    #[error("envelope floor must be a finite value > 0, got {0}")]
    NonPositiveFloor(f64),
    #[error("{key}: cannot parse {value:?} as a number")]
    NotANumber { key: String, value: String },
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

pub fn resolve_f64_with_default(
    cli_value: Option<f64>,
    env_key: &str,
    env: &impl Env,
    default: f64,
) -> Result<f64, ConfigError> {
    match cli_value {
        Some(v) => Ok(v),
        None => match env.var(env_key) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::NotANumber {
                    key: env_key.to_owned(),
                    value: raw,
                }),
            None => Ok(default),
        },
    }
}

/// Resolves the three controls (CLI, then env, then default) within the
/// slider bounds.
pub fn resolve_controls(
    speed: Option<f64>,
    amplitude: Option<f64>,
    volume: Option<f64>,
    env: &impl Env,
) -> Result<PlaybackControls, ConfigError> {
    PlaybackControls::from_ui(
        resolve_f64_with_default(speed, ENV_SPEED, env, DEFAULT_SPEED)?,
        resolve_f64_with_default(amplitude, ENV_AMPLITUDE, env, DEFAULT_AMPLITUDE_SCALE)?,
        resolve_f64_with_default(volume, ENV_VOLUME, env, DEFAULT_VOLUME)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_must_be_positive_and_finite() {
        assert!(Speed::new(0.0).is_err());
        assert!(Speed::new(-1.0).is_err());
        assert!(Speed::new(f64::NAN).is_err());
        assert!(Speed::new(f64::INFINITY).is_err());
        assert_eq!(Speed::new(3.5).map(|s| s.get()), Ok(3.5));
    }

    #[test]
    fn ui_bounds_are_enforced() {
        assert!(PlaybackControls::from_ui(0.5, 0.1, 0.0).is_ok());
        assert!(PlaybackControls::from_ui(2.0, 2.0, 2.0).is_ok());
        assert!(matches!(
            PlaybackControls::from_ui(0.4, 1.0, 1.0),
            Err(ConfigError::OutOfBounds {
                control: "speed",
                ..
            })
        ));
        assert!(matches!(
            PlaybackControls::from_ui(1.0, 0.0, 1.0),
            Err(ConfigError::OutOfBounds {
                control: "amplitude",
                ..
            })
        ));
        // outside the slider but still a valid speed
        assert!(PlaybackControls::new(8.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn volume_percent_scales_by_fifty() {
        assert_eq!(Volume::new(2.0).map(|v| v.percent()), Ok(100.0));
        assert_eq!(Volume::new(0.5).map(|v| v.percent()), Ok(25.0));
    }

    #[test]
    fn tone_params_apply_speed_and_amplitude() {
        let controls = PlaybackControls::new(2.0, 1.5, 1.0).expect("valid");
        let meta = crate::letters::lookup('ל').expect("lamed");
        let spec = crate::mapping::ToneSpec {
            frequency: 40.0,
            duration: 3.0,
            amplitude: 0.08,
        };
        let params = controls.tone_params(&ToneDescriptor::new(meta, &spec));
        assert_eq!(params.frequency_hz, 40.0);
        assert_eq!(params.duration_secs, 1.5);
        assert!((params.start_gain - 0.12).abs() < 1e-12);
    }

    #[test]
    fn default_limiter_and_settings_validate() {
        assert_eq!(AudioSettings::default().validate(), Ok(()));
        let bad = LimiterSettings {
            ratio: 0.5,
            ..LimiterSettings::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn cli_takes_precedence_over_env() {
        let env = MapEnv::default().with_var(ENV_SPEED, "1.5");
        assert_eq!(
            resolve_f64_with_default(Some(0.7), ENV_SPEED, &env, DEFAULT_SPEED),
            Ok(0.7)
        );
        assert_eq!(
            resolve_f64_with_default(None, ENV_SPEED, &env, DEFAULT_SPEED),
            Ok(1.5)
        );
        assert_eq!(
            resolve_f64_with_default(None, ENV_SPEED, &MapEnv::default(), DEFAULT_SPEED),
            Ok(DEFAULT_SPEED)
        );
    }

    #[test]
    fn env_garbage_is_reported() {
        let env = MapEnv::default().with_var(ENV_VOLUME, "loud");
        assert!(matches!(
            resolve_controls(None, None, None, &env),
            Err(ConfigError::NotANumber { .. })
        ));
    }

    #[test]
    fn output_device_env_fallback() {
        let env = MapEnv::default().with_var(ENV_OUTPUT_DEVICE, "Speakers");
        assert_eq!(
            resolve_optional_string(None, ENV_OUTPUT_DEVICE, &env).as_deref(),
            Some("Speakers")
        );
    }
}
