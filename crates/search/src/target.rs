use std::fmt;

use serde::{Deserialize, Serialize};

/// How the search consumes the target initials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Words must match the remaining initials left to right.
    Sequence,
    /// Words may draw initials from anywhere in the remaining multiset.
    Bag,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Sequence => write!(f, "sequence"),
            Mode::Bag => write!(f, "bag"),
        }
    }
}

/// Target initials, already validated as Hangul syllables.
///
/// Bag targets keep their units sorted so that equal multisets compare equal
/// regardless of the order the caller supplied them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    Sequence(Vec<char>),
    Bag(Vec<char>),
}

impl SearchTarget {
    pub fn sequence(units: Vec<char>) -> Self {
        SearchTarget::Sequence(units)
    }

    pub fn bag(mut units: Vec<char>) -> Self {
        units.sort_unstable();
        SearchTarget::Bag(units)
    }

    pub fn mode(&self) -> Mode {
        match self {
            SearchTarget::Sequence(_) => Mode::Sequence,
            SearchTarget::Bag(_) => Mode::Bag,
        }
    }

    pub fn units(&self) -> &[char] {
        match self {
            SearchTarget::Sequence(units) | SearchTarget::Bag(units) => units,
        }
    }

    pub fn len(&self) -> usize {
        self.units().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units().is_empty()
    }
}

/// Removes `initials` from the sorted multiset `remaining`.
///
/// Returns the sorted residual, or `None` when `initials` is not a
/// sub-multiset of `remaining`.
pub(crate) fn remove_multiset(remaining: &[char], initials: &[char]) -> Option<Vec<char>> {
    let mut take = initials.to_vec();
    take.sort_unstable();

    let mut out = Vec::with_capacity(remaining.len().saturating_sub(take.len()));
    let mut i = 0;
    for &unit in remaining {
        if i < take.len() && take[i] == unit {
            i += 1;
        } else {
            out.push(unit);
        }
    }
    (i == take.len()).then_some(out)
}

/// Fraction of the requested units consumed so far.
pub(crate) fn coverage(requested: usize, residual: usize) -> f64 {
    if requested == 0 {
        return 1.0;
    }
    (requested - residual) as f64 / requested as f64
}
