//! Fixed metadata for the 22 letters of the Hebrew alphabet.
//!
//! Final forms, vowel points and cantillation marks have no entry here and
//! are skipped by every consumer.

use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct LetterMetadata {
    pub symbol: char,
    pub display_name: &'static str,
    pub numeric_value: u32,
    pub meaning: &'static str,
}

const fn letter(
    symbol: char,
    display_name: &'static str,
    numeric_value: u32,
    meaning: &'static str,
) -> LetterMetadata {
    LetterMetadata {
        symbol,
        display_name,
        numeric_value,
        meaning,
    }
}

pub const LETTER_COUNT: usize = 22;

/// Alphabet order, which is also ascending numeric value.
pub static LETTERS: [LetterMetadata; LETTER_COUNT] = [
    letter('א', "Alef", 1, "Ox, Leader"),
    letter('ב', "Bet", 2, "House, In"),
    letter('ג', "Gimel", 3, "Camel, Pride"),
    letter('ד', "Dalet", 4, "Door, Pathway"),
    letter('ה', "He", 5, "Window, Reveal"),
    letter('ו', "Vav", 6, "Hook, Connect"),
    letter('ז', "Zayin", 7, "Weapon, Cut"),
    letter('ח', "Chet", 8, "Fence, Separate"),
    letter('ט', "Tet", 9, "Snake, Surround"),
    letter('י', "Yod", 10, "Hand, Work"),
    letter('כ', "Kaf", 20, "Palm, Open"),
    letter('ל', "Lamed", 30, "Staff, Teach"),
    letter('מ', "Mem", 40, "Water, Chaos"),
    letter('נ', "Nun", 50, "Fish, Activity"),
    letter('ס', "Samekh", 60, "Support, Trust"),
    letter('ע', "Ayin", 70, "Eye, See"),
    letter('פ', "Pe", 80, "Mouth, Speak"),
    letter('צ', "Tsade", 90, "Fish hook, Catch"),
    letter('ק', "Qof", 100, "Back of head, Last"),
    letter('ר', "Resh", 200, "Head, Highest"),
    letter('ש', "Shin", 300, "Tooth, Sharp"),
    letter('ת', "Tav", 400, "Cross, Sign"),
];

pub fn lookup(symbol: char) -> Option<&'static LetterMetadata> {
    // Final forms sit between the base letters in U+05D0..=U+05EA, so no
    // range arithmetic here.
    LETTERS.iter().find(|l| l.symbol == symbol)
}

pub fn is_recognized(symbol: char) -> bool {
    lookup(symbol).is_some()
}

pub fn all() -> &'static [LetterMetadata] {
    &LETTERS
}
