use crate::sequence::ToneDescriptor;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct RangeSummary {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct DurationSummary {
    pub total: f64,
    pub average: f64,
    pub median: f64,
}

/// Descriptive statistics over every occurrence in a descriptor sequence.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct SequenceStatistics {
    pub frequency: RangeSummary,
    pub duration: DurationSummary,
    pub amplitude: RangeSummary,
}

impl SequenceStatistics {
    pub fn is_finite(&self) -> bool {
        [
            self.frequency.average,
            self.frequency.median,
            self.frequency.min,
            self.frequency.max,
            self.duration.total,
            self.duration.average,
            self.duration.median,
            self.amplitude.average,
            self.amplitude.median,
            self.amplitude.min,
            self.amplitude.max,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Summarizes `descriptors`. An empty sequence has no statistics.
pub fn analyze(descriptors: &[ToneDescriptor]) -> Option<SequenceStatistics> {
    if descriptors.is_empty() {
        return None;
    }

    let frequencies: Vec<f64> = descriptors.iter().map(|d| d.frequency).collect();
    let durations: Vec<f64> = descriptors.iter().map(|d| d.duration).collect();
    let amplitudes: Vec<f64> = descriptors.iter().map(|d| d.amplitude).collect();

    Some(SequenceStatistics {
        frequency: range_summary(&frequencies)?,
        duration: DurationSummary {
            total: sum(&durations),
            average: average(&durations)?,
            median: median(&durations)?,
        },
        amplitude: range_summary(&amplitudes)?,
    })
}

/// Serializes statistics as pretty JSON; `None` becomes `null`.
pub fn to_json(stats: &Option<SequenceStatistics>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(stats)
}

fn range_summary(values: &[f64]) -> Option<RangeSummary> {
    Some(RangeSummary {
        average: average(values)?,
        median: median(values)?,
        min: values.iter().copied().reduce(f64::min)?,
        max: values.iter().copied().reduce(f64::max)?,
    })
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(sum(values) / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::generate_frequency_mapping;
    use crate::sequence::expand;

    fn descriptors(text: &str) -> Vec<ToneDescriptor> {
        expand(text, &generate_frequency_mapping(text))
    }

    #[test]
    fn empty_sequence_has_no_statistics() {
        assert_eq!(analyze(&[]), None);
        assert_eq!(to_json(&None).expect("serializable"), "null");
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn repeated_letters_weigh_by_occurrence() {
        // alef x3 -> 20 Hz, bet x1 -> 30 Hz
        let stats = analyze(&descriptors("אאבא")).expect("non-empty");
        assert_eq!(stats.frequency.min, 20.0);
        assert_eq!(stats.frequency.max, 30.0);
        assert_eq!(stats.frequency.median, 20.0);
        assert_eq!(stats.frequency.average, 22.5);
    }

    #[test]
    fn duration_total_is_exact_sum() {
        let seq = descriptors("שלום עולם ומה שלומך");
        let stats = analyze(&seq).expect("non-empty");
        let expected: f64 = seq.iter().map(|d| d.duration).sum();
        assert_eq!(stats.duration.total, expected);
    }

    #[test]
    fn even_length_frequency_median_averages_central_values() {
        // four distinct letters ranked 20, 30, 40, 50 Hz
        let stats = analyze(&descriptors("אבגד")).expect("non-empty");
        assert_eq!(stats.frequency.median, 35.0);
        assert!(stats.is_finite());
    }

    #[test]
    fn serializes_with_nested_field_names() {
        let stats = analyze(&descriptors("אב"));
        let json: serde_json::Value =
            serde_json::from_str(&to_json(&stats).expect("serializable")).expect("valid json");
        assert_eq!(json["frequency"]["min"], 20.0);
        assert_eq!(json["duration"]["total"].as_f64().map(|t| t > 0.0), Some(true));
        assert!(json["duration"].get("min").is_none());
    }
}
