//! Initial-unit codec.
//!
//! An initial-unit is one precomposed Hangul syllable. A word's initials
//! are its full syllable sequence; the "first initial" of a word is its
//! leading syllable. All functions here are pure.

use unicode_normalization::UnicodeNormalization;

use crate::error::{LexiconError, Result};

/// True for precomposed Hangul syllables (U+AC00..=U+D7A3).
#[must_use]
pub const fn is_initial_unit(ch: char) -> bool {
    matches!(ch, '가'..='힣')
}

/// Trim and NFC-normalize a word so decomposed jamo sequences compare
/// equal to their precomposed form.
#[must_use]
pub fn normalize_word(word: &str) -> String {
    word.trim().nfc().collect()
}

/// The syllable sequence of `word`.
pub fn initials_of(word: &str) -> Result<Vec<char>> {
    let normalized = normalize_word(word);
    if normalized.is_empty() {
        return Err(LexiconError::EmptyWord);
    }
    let mut units = Vec::with_capacity(normalized.chars().count());
    for ch in normalized.chars() {
        if !is_initial_unit(ch) {
            return Err(LexiconError::UnsupportedCharacter {
                word: word.to_string(),
                ch,
            });
        }
        units.push(ch);
    }
    Ok(units)
}

/// First syllable of each word, concatenated. Used to derive a search
/// target from example words rather than raw initials.
pub fn initials_from_words<S: AsRef<str>>(words: &[S]) -> Result<Vec<char>> {
    let mut initials = Vec::with_capacity(words.len());
    for word in words {
        let normalized = normalize_word(word.as_ref());
        match normalized.chars().find(|ch| is_initial_unit(*ch)) {
            Some(unit) => initials.push(unit),
            None => {
                return Err(match normalized.chars().next() {
                    Some(ch) => LexiconError::UnsupportedCharacter {
                        word: word.as_ref().to_string(),
                        ch,
                    },
                    None => LexiconError::EmptyWord,
                });
            }
        }
    }
    Ok(initials)
}

/// Flatten user-supplied initial strings into validated units. Each item
/// contributes all of its syllables, so both `["결근"]` and
/// `["결", "근"]` parse to the same target.
pub fn parse_units<S: AsRef<str>>(items: &[S]) -> Result<Vec<char>> {
    let mut units = Vec::new();
    for item in items {
        units.extend(initials_of(item.as_ref())?);
    }
    Ok(units)
}
