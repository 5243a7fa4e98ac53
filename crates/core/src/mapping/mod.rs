use crate::letters;
use serde::Serialize;
use std::collections::HashMap;

pub const BASE_FREQUENCY_HZ: f64 = 20.0;
pub const FREQUENCY_STEP_HZ: f64 = 10.0;
pub const DURATION_SCALE_SECS: f64 = 0.1;
pub const AMPLITUDE_SCALE: f64 = 0.1;

/// Synthesized tone for one distinct letter.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct ToneSpec {
    pub frequency: f64,
    pub duration: f64,
    pub amplitude: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RankedTone {
    pub symbol: char,
    pub rank: usize,
    pub occurrences: usize,
    pub share: f64,
    pub spec: ToneSpec,
}

/// Letter to tone assignment for one input text, in rank order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToneTable {
    entries: Vec<RankedTone>,
    index: HashMap<char, usize>,
}

impl ToneTable {
    pub fn get(&self, symbol: char) -> Option<&ToneSpec> {
        self.index.get(&symbol).map(|&i| &self.entries[i].spec)
    }

    pub fn ranked(&self, symbol: char) -> Option<&RankedTone> {
        self.index.get(&symbol).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedTone> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of occurrences over every distinct letter.
    pub fn total_occurrences(&self) -> usize {
        self.entries.iter().map(|e| e.occurrences).sum()
    }
}

impl Serialize for ToneTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

struct LetterCount {
    symbol: char,
    count: usize,
}

fn count_letters(text: &str) -> Vec<LetterCount> {
    let mut counts: Vec<LetterCount> = Vec::new();
    let mut position: HashMap<char, usize> = HashMap::new();

    for c in text.chars().filter(|&c| letters::is_recognized(c)) {
        match position.get(&c) {
            Some(&i) => counts[i].count += 1,
            None => {
                position.insert(c, counts.len());
                counts.push(LetterCount {
                    symbol: c,
                    count: 1,
                });
            }
        }
    }

    counts
}

/// Builds the rank-based tone table for `text`.
///
/// Letters are ranked by descending occurrence share. Equal shares keep the
/// order in which the letters first appear in `text`. Rank `i` is assigned
/// `20 + 10·i` Hz, a duration of `0.1 · numeric_value / 10` seconds and an
/// amplitude of `0.1 · (1 − share)`.
///
/// Text without any recognized letter yields an empty table.
pub fn generate_frequency_mapping(text: &str) -> ToneTable {
    let mut counts = count_letters(text);
    let total: usize = counts.iter().map(|c| c.count).sum();
    if total == 0 {
        return ToneTable::default();
    }

    // Stable sort: ties stay in first-encountered order. Comparing integer
    // counts orders exactly like comparing the shares.
    counts.sort_by(|a, b| b.count.cmp(&a.count));

    let mut table = ToneTable {
        entries: Vec::with_capacity(counts.len()),
        index: HashMap::with_capacity(counts.len()),
    };

    for (rank, LetterCount { symbol, count }) in counts.into_iter().enumerate() {
        let Some(meta) = letters::lookup(symbol) else {
            continue;
        };
        let share = count as f64 / total as f64;
        let spec = ToneSpec {
            frequency: BASE_FREQUENCY_HZ + FREQUENCY_STEP_HZ * rank as f64,
            duration: DURATION_SCALE_SECS * (f64::from(meta.numeric_value) / 10.0),
            amplitude: AMPLITUDE_SCALE * (1.0 - share),
        };
        table.index.insert(symbol, table.entries.len());
        table.entries.push(RankedTone {
            symbol,
            rank,
            occurrences: count,
            share,
            spec,
        });
    }

    tracing::debug!(
        distinct_letters = table.len(),
        total_letters = total,
        "tone table generated"
    );

    table
}
