//! Tone synthesis: one decaying sine voice per emitted tone, summed on a
//! shared bus that applies the volume gain stage and the output limiter.

mod bus;
mod limiter;

pub use bus::{MixBus, Mixer};
pub use limiter::Limiter;

use crate::config::ToneParams;
use std::f64::consts::TAU;

/// A single sounding tone.
///
/// The gain starts at `start_gain` and decays exponentially so that the last
/// sample sits at `floor`. A start gain at or below the floor is held flat.
#[derive(Clone, Debug)]
pub struct Voice {
    phase: f64,
    phase_step: f64,
    gain: f64,
    decay: f64,
    remaining: usize,
}

impl Voice {
    pub fn new(tone: &ToneParams, sample_rate_hz: u32, floor: f64) -> Self {
        let sample_rate = f64::from(sample_rate_hz);
        let samples = sample_count(tone.duration_secs, sample_rate_hz);
        let decay = if tone.start_gain > floor && samples > 1 {
            (floor / tone.start_gain).powf(1.0 / (samples - 1) as f64)
        } else {
            1.0
        };

        Self {
            phase: 0.0,
            phase_step: TAU * tone.frequency_hz / sample_rate,
            gain: tone.start_gain.max(0.0),
            decay,
            remaining: samples,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining_samples(&self) -> usize {
        self.remaining
    }

    pub fn next_sample(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        let sample = self.phase.sin() * self.gain;
        self.phase = (self.phase + self.phase_step) % TAU;
        self.gain *= self.decay;
        self.remaining -= 1;
        Some(sample)
    }
}

/// Number of samples a tone of `duration_secs` occupies.
pub fn sample_count(duration_secs: f64, sample_rate_hz: u32) -> usize {
    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        return 0;
    }
    (duration_secs * f64::from(sample_rate_hz)).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frequency_hz: f64, duration_secs: f64, start_gain: f64) -> ToneParams {
        ToneParams {
            frequency_hz,
            duration_secs,
            start_gain,
        }
    }

    #[test]
    fn voice_length_follows_duration() {
        let mut voice = Voice::new(&tone(440.0, 0.01, 0.1), 48_000, 0.001);
        assert_eq!(voice.remaining_samples(), 480);
        let rendered = std::iter::from_fn(|| voice.next_sample()).count();
        assert_eq!(rendered, 480);
        assert!(voice.is_finished());
    }

    #[test]
    fn envelope_decays_to_floor() {
        let floor = 0.001;
        let mut voice = Voice::new(&tone(20.0, 0.5, 0.1), 1_000, floor);
        let mut last_gain = voice.gain;
        while voice.remaining_samples() > 1 {
            voice.next_sample();
            assert!(voice.gain < last_gain);
            last_gain = voice.gain;
        }
        assert!((voice.gain - floor).abs() < 1e-9);
    }

    #[test]
    fn silent_start_gain_stays_flat() {
        let mut voice = Voice::new(&tone(20.0, 0.1, 0.0), 1_000, 0.001);
        assert!(std::iter::from_fn(|| voice.next_sample()).all(|s| s == 0.0));
    }

    #[test]
    fn zero_or_invalid_duration_renders_nothing() {
        assert_eq!(sample_count(0.0, 44_100), 0);
        assert_eq!(sample_count(f64::NAN, 44_100), 0);
        assert!(Voice::new(&tone(20.0, 0.0, 0.1), 44_100, 0.001).is_finished());
    }

    #[test]
    fn samples_stay_within_start_gain() {
        let mut voice = Voice::new(&tone(30.0, 0.2, 0.08), 8_000, 0.001);
        assert!(std::iter::from_fn(|| voice.next_sample()).all(|s| s.abs() <= 0.08));
    }
}
