use mnemo_lexicon::WordRecord;
use serde::{Deserialize, Serialize};

/// How a combination's cumulative word score is folded into its final score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreNorm {
    /// Average over the number of words; insensitive to combination length.
    #[default]
    Mean,
    /// Raw penalized sum; favors combinations that consume more units.
    Sum,
}

/// Scoring knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Bonus per syllable beyond the first, rewarding longer words.
    pub length_bonus: f64,
    /// Penalty per word boundary, discouraging fragmented combinations.
    pub segment_penalty: f64,
    pub normalization: ScoreNorm,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            length_bonus: 0.3,
            segment_penalty: 0.2,
            normalization: ScoreNorm::Mean,
        }
    }
}

impl Tuning {
    /// Score contribution of a single word.
    pub fn word_score(&self, record: &WordRecord) -> f64 {
        record.score + self.length_bonus * (record.initials.len().saturating_sub(1)) as f64
    }

    /// Final combination score from the cumulative word score.
    pub fn finalize(&self, cumulative: f64, word_count: usize) -> f64 {
        if word_count == 0 {
            return 0.0;
        }
        let penalized = cumulative - self.segment_penalty * (word_count - 1) as f64;
        match self.normalization {
            ScoreNorm::Mean => penalized / word_count as f64,
            ScoreNorm::Sum => penalized,
        }
    }
}
