//! Optional `mnemo.toml` configuration.
//!
//! Flags beat config values, config values beat built-in defaults. The
//! raw shape is all-optional so a file may set only the keys it cares
//! about; unknown keys are rejected to catch typos early.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use mnemo_search::{ScoreNorm, Tuning, DEFAULT_BEAM_WIDTH, DEFAULT_MAX_RESULTS};
use serde::Deserialize;

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub search: SearchDefaults,
    pub tuning: Tuning,
    /// Per-source base scores for import rows that carry no score.
    pub weights: BTreeMap<String, f64>,
}

#[derive(Clone, Copy, Debug)]
pub struct SearchDefaults {
    pub beam_width: usize,
    pub max_results: usize,
    pub allow_repeated_words: bool,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        SearchDefaults {
            beam_width: DEFAULT_BEAM_WIDTH,
            max_results: DEFAULT_MAX_RESULTS,
            allow_repeated_words: true,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    search: Option<RawSearch>,
    #[serde(default)]
    scoring: Option<RawScoring>,
    #[serde(default)]
    weights: Option<BTreeMap<String, f64>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSearch {
    beam_width: Option<usize>,
    max_results: Option<usize>,
    allow_repeated_words: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScoring {
    length_bonus: Option<f64>,
    segment_penalty: Option<f64>,
    normalization: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Self::from_raw(raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(search) = raw.search {
            if let Some(beam_width) = search.beam_width {
                if beam_width == 0 {
                    return Err(anyhow!("search.beam_width must be at least 1"));
                }
                cfg.search.beam_width = beam_width;
            }
            if let Some(max_results) = search.max_results {
                if max_results == 0 {
                    return Err(anyhow!("search.max_results must be at least 1"));
                }
                cfg.search.max_results = max_results;
            }
            if let Some(allow) = search.allow_repeated_words {
                cfg.search.allow_repeated_words = allow;
            }
        }

        if let Some(scoring) = raw.scoring {
            if let Some(length_bonus) = scoring.length_bonus {
                validate_weight("scoring.length_bonus", length_bonus)?;
                cfg.tuning.length_bonus = length_bonus;
            }
            if let Some(segment_penalty) = scoring.segment_penalty {
                validate_weight("scoring.segment_penalty", segment_penalty)?;
                cfg.tuning.segment_penalty = segment_penalty;
            }
            if let Some(normalization) = scoring.normalization {
                cfg.tuning.normalization = match normalization.as_str() {
                    "mean" => ScoreNorm::Mean,
                    "sum" => ScoreNorm::Sum,
                    other => {
                        return Err(anyhow!(
                            "scoring.normalization must be \"mean\" or \"sum\", got {other:?}"
                        ))
                    }
                };
            }
        }

        if let Some(weights) = raw.weights {
            for (source, weight) in &weights {
                validate_weight(&format!("weights.{source}"), *weight)?;
            }
            cfg.weights = weights;
        }

        Ok(cfg)
    }
}

fn validate_weight(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("{field} must be a finite non-negative number"));
    }
    Ok(())
}
