use serde::{Deserialize, Serialize};

use crate::target::Mode;

/// A finished word combination.
///
/// `words`, `word_scores` and `word_sources` are parallel vectors. The
/// combination covers the first `coverage * requested` units of the target;
/// anything below 1.0 marks a partial result kept after the search could not
/// extend it further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combo {
    /// Words joined with a single space, in presentation order.
    pub combo: String,
    pub words: Vec<String>,
    pub word_scores: Vec<f64>,
    pub word_sources: Vec<Vec<String>>,
    pub mode: Mode,
    pub score: f64,
    pub coverage: f64,
}

impl Combo {
    pub fn is_complete(&self) -> bool {
        self.coverage >= 1.0
    }
}
