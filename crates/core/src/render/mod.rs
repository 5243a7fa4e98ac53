//! Offline rendering of a schedule through the same voice, bus and limiter
//! chain the live output uses.

use crate::config::AudioSettings;
use crate::playback::Schedule;
use crate::synth::{sample_count, Mixer};
use std::path::Path;

/// Longest schedule that will be rendered in memory.
pub const MAX_RENDER_SECS: f64 = 3_600.0;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("invalid audio settings: {0}")]
    Settings(#[from] crate::config::ConfigError),

    #[error("schedule runs {seconds}s; at most {max}s can be rendered", max = MAX_RENDER_SECS)]
    TooLong { seconds: f64 },

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}

/// Renders `schedule` to mono samples at `settings.sample_rate_hz`.
///
/// Tone starts are placed on the sample nearest to their offset. The output
/// runs until the last voice has finished.
pub fn render_schedule(
    schedule: &Schedule,
    settings: &AudioSettings,
) -> Result<Vec<f32>, RenderError> {
    settings.validate()?;
    let seconds = schedule
        .tones()
        .iter()
        .map(|t| t.offset_secs + t.tone.duration_secs)
        .fold(0.0, f64::max);
    if seconds > MAX_RENDER_SECS {
        return Err(RenderError::TooLong { seconds });
    }

    let rate = settings.sample_rate_hz;
    let mut mixer = Mixer::new(settings);
    mixer.set_volume(schedule.volume());

    let end = schedule
        .tones()
        .iter()
        .map(|t| sample_count(t.offset_secs, rate) + sample_count(t.tone.duration_secs, rate))
        .max()
        .unwrap_or(0);
    let mut samples = vec![0.0_f32; end];
    let mut cursor = 0;

    for scheduled in schedule.tones() {
        let start = sample_count(scheduled.offset_secs, rate).min(end);
        if start > cursor {
            mixer.render(&mut samples[cursor..start]);
            cursor = start;
        }
        mixer.start(&scheduled.tone);
    }
    mixer.render(&mut samples[cursor..]);

    tracing::debug!(
        tones = schedule.len(),
        samples = samples.len(),
        sample_rate_hz = rate,
        "schedule rendered"
    );

    Ok(samples)
}

/// Writes mono 32-bit float samples as a WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate_hz: u32) -> Result<(), RenderError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackControls;
    use crate::mapping::generate_frequency_mapping;
    use crate::playback::build_schedule;
    use crate::sequence::expand;

    fn settings() -> AudioSettings {
        AudioSettings {
            sample_rate_hz: 8_000,
            ..AudioSettings::default()
        }
    }

    fn schedule(text: &str, controls: &PlaybackControls) -> Schedule {
        build_schedule(&expand(text, &generate_frequency_mapping(text)), controls)
    }

    #[test]
    fn length_matches_total_duration() {
        let controls = PlaybackControls::new(2.0, 1.0, 1.0).expect("valid");
        let s = schedule("אבגד", &controls);
        let samples = render_schedule(&s, &settings()).expect("renders");
        let expected = (s.total_secs() * 8_000.0).round() as usize;
        assert!(samples.len().abs_diff(expected) <= 1);
    }

    #[test]
    fn empty_schedule_renders_nothing() {
        let samples = render_schedule(&Schedule::default(), &settings()).expect("renders");
        assert!(samples.is_empty());
    }

    #[test]
    fn rendering_is_deterministic() {
        let controls = PlaybackControls::default();
        let s = schedule("שלום", &controls);
        let a = render_schedule(&s, &settings()).expect("renders");
        let b = render_schedule(&s, &settings()).expect("renders");
        assert_eq!(a, b);
        assert!(a.iter().any(|x| x.abs() > 0.0));
        assert!(a.iter().all(|x| x.abs() < 1.0));
    }

    #[test]
    fn wav_round_trips_sample_count() {
        let dir = std::env::temp_dir().join(format!("hebrew-tones-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("tones.wav");

        let samples = vec![0.0, 0.25, -0.25, 0.0];
        write_wav(&path, &samples, 8_000).expect("written");

        let reader = hound::WavReader::open(&path).expect("readable");
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len(), 4);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_invalid_settings() {
        let bad = AudioSettings {
            envelope_floor: 0.0,
            ..settings()
        };
        assert!(matches!(
            render_schedule(&Schedule::default(), &bad),
            Err(RenderError::Settings(_))
        ));
    }

    #[test]
    fn overlong_schedules_are_refused() {
        let controls = PlaybackControls::new(1e-20, 1.0, 1.0).expect("valid");
        let s = schedule("תת", &controls);
        assert!(matches!(
            render_schedule(&s, &settings()),
            Err(RenderError::TooLong { seconds }) if seconds > MAX_RENDER_SECS
        ));
    }
}
