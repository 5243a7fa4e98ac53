use crate::config::LimiterSettings;

fn amp_to_db(amp: f64) -> f64 {
    20.0 * amp.abs().max(1e-10).log10()
}

fn db_to_amp(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

fn time_coeff(secs: f64, sample_rate: f64) -> f64 {
    if secs <= 0.0 {
        0.0
    } else {
        (-1.0 / (secs * sample_rate)).exp()
    }
}

/// Soft-knee compressor on the summed output.
#[derive(Clone, Debug)]
pub struct Limiter {
    settings: LimiterSettings,
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
}

impl Limiter {
    pub fn new(settings: LimiterSettings, sample_rate_hz: u32) -> Self {
        let sample_rate = f64::from(sample_rate_hz);
        Self {
            settings,
            attack_coeff: time_coeff(settings.attack_secs, sample_rate),
            release_coeff: time_coeff(settings.release_secs, sample_rate),
            envelope: 0.0,
        }
    }

    /// Gain change in dB for a signal level of `level_db`. Always <= 0.
    pub fn gain_db(&self, level_db: f64) -> f64 {
        let LimiterSettings {
            threshold_db,
            knee_db,
            ratio,
            ..
        } = self.settings;
        let over = level_db - threshold_db;
        let slope = 1.0 / ratio - 1.0;

        if 2.0 * over < -knee_db {
            0.0
        } else if knee_db > 0.0 && 2.0 * over.abs() <= knee_db {
            slope * (over + knee_db / 2.0).powi(2) / (2.0 * knee_db)
        } else {
            slope * over
        }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let level = input.abs();
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;

        input * db_to_amp(self.gain_db(amp_to_db(self.envelope)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> Limiter {
        Limiter::new(LimiterSettings::default(), 44_100)
    }

    #[test]
    fn quiet_signal_passes_untouched() {
        // -39 dB is the bottom of the default knee
        let mut l = limiter();
        for _ in 0..100 {
            assert_eq!(l.process(0.005), 0.005);
        }
    }

    #[test]
    fn full_scale_is_pulled_down_immediately() {
        let mut l = limiter();
        let out = l.process(1.0);
        assert!(out < 0.2, "got {out}");
        assert!(out > 0.0);
    }

    #[test]
    fn gain_curve_is_continuous_at_knee_edges() {
        let l = limiter();
        let s = LimiterSettings::default();
        let lower = s.threshold_db - s.knee_db / 2.0;
        let upper = s.threshold_db + s.knee_db / 2.0;
        assert!(l.gain_db(lower).abs() < 1e-9);
        let above = l.gain_db(upper + 1e-9);
        assert!((l.gain_db(upper) - above).abs() < 1e-6);
    }

    #[test]
    fn hard_knee_matches_ratio() {
        let l = Limiter::new(
            LimiterSettings {
                knee_db: 0.0,
                ..LimiterSettings::default()
            },
            44_100,
        );
        // 12 dB over threshold at 12:1 leaves 1 dB over
        assert!((l.gain_db(-12.0) + 11.0).abs() < 1e-9);
        assert_eq!(l.gain_db(-30.0), 0.0);
    }

    #[test]
    fn release_lets_envelope_fall_gradually() {
        let mut l = limiter();
        l.process(1.0);
        let after_peak = l.envelope;
        l.process(0.0);
        assert!(l.envelope < after_peak);
        assert!(l.envelope > 0.9 * after_peak);
    }
}
