use crate::mapping::{generate_frequency_mapping, ToneTable};
use crate::sequence::{expand, ToneDescriptor};
use crate::stats::{analyze, SequenceStatistics};
use serde::Serialize;

const LOG_TARGET: &str = "pipeline";

/// Shown in place of results when a recompute fails.
pub const PROCESSING_FAILED_MESSAGE: &str =
    "An error occurred while processing the text. Please try again.";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("tone table invariant violated: {0}")]
    ToneTable(String),
    #[error("descriptor {index} ({symbol}) has no tone in the table")]
    MissingTone { index: usize, symbol: char },
    #[error("statistics contain non-finite values")]
    NonFiniteStatistics,
}

/// Everything derived from one input text.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Analysis {
    pub tones: ToneTable,
    pub descriptors: Vec<ToneDescriptor>,
    pub statistics: Option<SequenceStatistics>,
}

impl Analysis {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Runs mapping, expansion and statistics over `text` and checks the result.
pub fn analyze_text(text: &str) -> Result<Analysis, PipelineError> {
    let tones = generate_frequency_mapping(text);
    let descriptors = expand(text, &tones);
    let statistics = analyze(&descriptors);

    let analysis = Analysis {
        tones,
        descriptors,
        statistics,
    };
    check_invariants(&analysis)?;

    tracing::debug!(
        target: LOG_TARGET,
        letters = analysis.descriptors.len(),
        distinct = analysis.tones.len(),
        "text analyzed"
    );
    Ok(analysis)
}

fn check_invariants(analysis: &Analysis) -> Result<(), PipelineError> {
    let mut previous: Option<f64> = None;
    for entry in analysis.tones.iter() {
        let spec = entry.spec;
        if !(spec.frequency.is_finite() && spec.duration.is_finite()) {
            return Err(PipelineError::ToneTable(format!(
                "non-finite tone for {}",
                entry.symbol
            )));
        }
        if previous.is_some_and(|p| p >= spec.frequency) {
            return Err(PipelineError::ToneTable(format!(
                "frequency of {} does not increase with rank",
                entry.symbol
            )));
        }
        if !(0.0..=0.1).contains(&spec.amplitude) {
            return Err(PipelineError::ToneTable(format!(
                "amplitude {} of {} outside [0, 0.1]",
                spec.amplitude, entry.symbol
            )));
        }
        previous = Some(spec.frequency);
    }

    for (index, d) in analysis.descriptors.iter().enumerate() {
        if analysis.tones.get(d.symbol).is_none() {
            return Err(PipelineError::MissingTone {
                index,
                symbol: d.symbol,
            });
        }
    }

    match &analysis.statistics {
        Some(stats) if !stats.is_finite() => Err(PipelineError::NonFiniteStatistics),
        _ => Ok(()),
    }
}

/// Recompute-on-change state for one input box.
///
/// A failed recompute keeps the last good analysis on display and records
/// [`PROCESSING_FAILED_MESSAGE`] until the next successful one.
#[derive(Debug, Default)]
pub struct Session {
    text: String,
    current: Analysis,
    error: Option<&'static str>,
}

impl Session {
    pub fn new(text: &str) -> Self {
        let mut session = Self::default();
        session.set_text(text);
        session
    }

    pub fn set_text(&mut self, text: &str) -> &Analysis {
        self.set_text_with(text, analyze_text)
    }

    fn set_text_with(
        &mut self,
        text: &str,
        run: impl FnOnce(&str) -> Result<Analysis, PipelineError>,
    ) -> &Analysis {
        self.text = text.to_owned();
        match run(text) {
            Ok(analysis) => {
                self.current = analysis;
                self.error = None;
            }
            Err(e) => {
                tracing::error!(target: LOG_TARGET, error = %e, "error processing text");
                self.error = Some(PROCESSING_FAILED_MESSAGE);
            }
        }
        &self.current
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn analysis(&self) -> &Analysis {
        &self.current
    }

    pub fn error(&self) -> Option<&'static str> {
        self.error
    }
}
