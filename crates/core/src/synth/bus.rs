use super::{Limiter, Voice};
use crate::config::{AudioSettings, ToneParams};
use std::sync::{Arc, Mutex, MutexGuard};

/// Sums active voices, applies the volume gain stage, then the limiter.
#[derive(Clone, Debug)]
pub struct Mixer {
    voices: Vec<Voice>,
    volume: f64,
    limiter: Limiter,
    sample_rate_hz: u32,
    envelope_floor: f64,
}

impl Mixer {
    pub fn new(settings: &AudioSettings) -> Self {
        Self {
            voices: Vec::new(),
            volume: 1.0,
            limiter: Limiter::new(settings.limiter, settings.sample_rate_hz),
            sample_rate_hz: settings.sample_rate_hz,
            envelope_floor: settings.envelope_floor,
        }
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn start(&mut self, tone: &ToneParams) {
        let voice = Voice::new(tone, self.sample_rate_hz, self.envelope_floor);
        if !voice.is_finished() {
            self.voices.push(voice);
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.max(0.0);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            let mixed: f64 = self
                .voices
                .iter_mut()
                .filter_map(|v| v.next_sample())
                .sum();
            *slot = self.limiter.process(mixed * self.volume) as f32;
        }
        self.voices.retain(|v| !v.is_finished());
    }
}

/// Shared handle to a [`Mixer`]: tone emission on one side, the audio
/// callback pulling blocks on the other.
#[derive(Clone, Debug)]
pub struct MixBus {
    inner: Arc<Mutex<Mixer>>,
}

impl MixBus {
    pub fn new(settings: &AudioSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Mixer::new(settings))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Mixer> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("mix bus lock was poisoned; recovering and continuing");
                poisoned.into_inner()
            }
        }
    }

    pub fn start(&self, tone: &ToneParams, volume: f64) {
        let mut mixer = self.lock();
        mixer.set_volume(volume);
        mixer.start(tone);
    }

    pub fn active_voices(&self) -> usize {
        self.lock().active_voices()
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.lock().sample_rate_hz()
    }

    pub fn render_block(&self, out: &mut [f32]) {
        self.lock().render(out);
    }
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

    fn settings(sample_rate_hz: u32) -> AudioSettings {
        AudioSettings {
            sample_rate_hz,
            ..AudioSettings::default()
        }
    }

    #[test]
    fn idle_bus_renders_silence() {
        let bus = MixBus::new(&settings(8_000));
        let mut block = [1.0_f32; 64];
        bus.render_block(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn finished_voices_are_dropped() {
        let bus = MixBus::new(&settings(1_000));
        bus.start(&tone(20.0, 0.01, 0.1), 1.0);
        bus.start(&tone(30.0, 0.05, 0.1), 1.0);
        assert_eq!(bus.active_voices(), 2);

        let mut block = [0.0_f32; 10];
        bus.render_block(&mut block);
        assert_eq!(bus.active_voices(), 1);
        for _ in 0..4 {
            bus.render_block(&mut block);
        }
        assert_eq!(bus.active_voices(), 0);
    }

    #[test]
    fn zero_volume_mutes_output() {
        let bus = MixBus::new(&settings(8_000));
        bus.start(&tone(440.0, 0.01, 0.1), 0.0);
        let mut block = [1.0_f32; 80];
        bus.render_block(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn overlapping_loud_tones_stay_bounded() {
        let mut mixer = Mixer::new(&settings(8_000));
        mixer.set_volume(2.0);
        for f in [220.0, 330.0, 440.0, 550.0] {
            mixer.start(&tone(f, 0.1, 0.2));
        }
        let mut block = vec![0.0_f32; 800];
        mixer.render(&mut block);
        assert!(block.iter().all(|s| s.abs() < 1.0));
    }

    #[test]
    fn empty_tone_is_not_queued() {
        let mut mixer = Mixer::new(&settings(8_000));
        mixer.start(&tone(440.0, 0.0, 0.1));
        assert_eq!(mixer.active_voices(), 0);
    }
}
