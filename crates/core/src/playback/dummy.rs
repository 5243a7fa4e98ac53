use crate::config::ToneParams;
use crate::playback::{PlaybackError, ToneOutput};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emission {
    pub at: Instant,
    pub tone: ToneParams,
    pub volume: f64,
}

/// Silent output that remembers what it was asked to play.
#[derive(Clone, Debug, Default)]
pub struct DummyToneOutput {
    emissions: Arc<Mutex<Vec<Emission>>>,
}

impl DummyToneOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emissions(&self) -> Vec<Emission> {
        match self.emissions.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ToneOutput for DummyToneOutput {
    fn emit(&self, tone: ToneParams, volume: f64) -> Result<(), PlaybackError> {
        let emission = Emission {
            at: Instant::now(),
            tone,
            volume,
        };
        match self.emissions.lock() {
            Ok(mut g) => g.push(emission),
            Err(poisoned) => poisoned.into_inner().push(emission),
        }
        Ok(())
    }
}
