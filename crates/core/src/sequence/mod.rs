use crate::letters::{self, LetterMetadata};
use crate::mapping::{ToneSpec, ToneTable};
use serde::Serialize;

/// One recognized letter occurrence: its metadata joined with its tone.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ToneDescriptor {
    pub symbol: char,
    pub display_name: &'static str,
    pub numeric_value: u32,
    pub meaning: &'static str,
    pub frequency: f64,
    pub duration: f64,
    pub amplitude: f64,
}

impl ToneDescriptor {
    pub fn new(meta: &LetterMetadata, spec: &ToneSpec) -> Self {
        Self {
            symbol: meta.symbol,
            display_name: meta.display_name,
            numeric_value: meta.numeric_value,
            meaning: meta.meaning,
            frequency: spec.frequency,
            duration: spec.duration,
            amplitude: spec.amplitude,
        }
    }

    pub fn spec(&self) -> ToneSpec {
        ToneSpec {
            frequency: self.frequency,
            duration: self.duration,
            amplitude: self.amplitude,
        }
    }
}

/// Emits one descriptor per recognized character of `text`, in input order.
///
/// Characters without metadata, or missing from `table`, are skipped.
pub fn expand(text: &str, table: &ToneTable) -> Vec<ToneDescriptor> {
    text.chars()
        .filter_map(|c| {
            let meta = letters::lookup(c)?;
            let spec = table.get(c)?;
            Some(ToneDescriptor::new(meta, spec))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::generate_frequency_mapping;

    #[test]
    fn expands_in_input_order_with_shared_specs() {
        let text = "אבא";
        let table = generate_frequency_mapping(text);
        let seq = expand(text, &table);

        let symbols: Vec<char> = seq.iter().map(|d| d.symbol).collect();
        assert_eq!(symbols, vec!['א', 'ב', 'א']);
        assert_eq!(seq[0].spec(), seq[2].spec());
        assert_eq!(seq[0].display_name, "Alef");
        assert_eq!(seq[1].numeric_value, 2);
        assert_eq!(seq[1].meaning, "House, In");
    }

    #[test]
    fn length_matches_recognized_character_count() {
        let text = "בְּרֵאשִׁית בָּרָא";
        let table = generate_frequency_mapping(text);
        let seq = expand(text, &table);
        let recognized = text.chars().filter(|&c| letters::is_recognized(c)).count();
        assert_eq!(seq.len(), recognized);
        assert_eq!(seq.len(), 9);
    }

    #[test]
    fn empty_table_expands_to_nothing() {
        assert!(expand("", &ToneTable::default()).is_empty());
        assert!(expand("abc", &generate_frequency_mapping("abc")).is_empty());
    }
}
