use crate::codec;
use crate::error::{LexiconError, Result};

/// A single (word, source) record from an externally produced entry list.
///
/// The constructor is the only way invariants are established: the word
/// is stored in its normalized form, `initials` is its non-empty syllable
/// sequence, and the score is finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub word: String,
    pub initials: Vec<char>,
    pub score: f64,
    pub source: String,
}

impl Entry {
    pub fn new(word: &str, score: f64, source: &str) -> Result<Self> {
        let initials = codec::initials_of(word)?;
        if !score.is_finite() || score < 0.0 {
            return Err(LexiconError::InvalidScore {
                word: word.to_string(),
                score,
            });
        }
        Ok(Self {
            word: initials.iter().collect(),
            initials,
            score,
            source: source.to_string(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.initials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.initials.is_empty()
    }
}
