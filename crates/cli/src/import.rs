//! Entry-list ingestion for `mnemo import`.
//!
//! The input is plain JSONL, one row per (word, sources) pair:
//!
//! ```text
//! {"w":"결과","source":"표준국어대사전","score":2.0}
//! {"w":"결근","sources":["표준국어대사전","우리말샘"]}
//! ```
//!
//! A row without a score falls back to the best `[weights]` entry among
//! its sources. Validation happens in the `Entry` constructor, so the
//! artifact only ever contains normalized Hangul words.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use mnemo_lexicon::Entry;
use serde::Deserialize;

const FALLBACK_SCORE: f64 = 1.0;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryRow {
    w: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl EntryRow {
    fn sources(&self) -> Vec<String> {
        let mut sources = self.sources.clone();
        if let Some(source) = &self.source {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources
    }
}

/// Read and validate all rows, one `Entry` per (word, source).
pub fn read_entries(path: &Path, weights: &BTreeMap<String, f64>) -> Result<Vec<Entry>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open entry list {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let number = idx + 1;
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row: EntryRow = serde_json::from_str(trimmed)
            .with_context(|| format!("{}:{number}: malformed entry row", path.display()))?;
        let sources = row.sources();
        if sources.is_empty() {
            bail!("{}:{number}: entry row needs a source", path.display());
        }

        let score = row.score.unwrap_or_else(|| default_score(&sources, weights));
        for source in sources {
            let entry = Entry::new(&row.w, score, &source)
                .with_context(|| format!("{}:{number}: invalid entry", path.display()))?;
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Best configured weight among the row's sources.
fn default_score(sources: &[String], weights: &BTreeMap<String, f64>) -> f64 {
    sources
        .iter()
        .filter_map(|source| weights.get(source).copied())
        .fold(None, |best: Option<f64>, weight| {
            Some(best.map_or(weight, |b| b.max(weight)))
        })
        .unwrap_or(FALLBACK_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs
            .iter()
            .map(|(source, weight)| (source.to_string(), *weight))
            .collect()
    }

    fn write_rows(rows: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.jsonl");
        fs::write(&path, rows.join("\n")).unwrap();
        (dir, path)
    }

    #[test]
    fn rows_expand_to_one_entry_per_source() {
        let (_dir, path) = write_rows(&[
            r#"{"w":"결과","source":"a","score":2.0}"#,
            r#"{"w":"결근","sources":["a","b"],"score":1.0}"#,
            "",
        ]);
        let entries = read_entries(&path, &BTreeMap::new()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].word, "결과");
        assert_eq!(entries[1].source, "a");
        assert_eq!(entries[2].source, "b");
    }

    #[test]
    fn missing_score_falls_back_to_best_source_weight() {
        let (_dir, path) = write_rows(&[r#"{"w":"결과","sources":["a","b"]}"#]);
        let entries = read_entries(&path, &weights(&[("a", 0.5), ("b", 2.5)])).unwrap();
        assert!(entries.iter().all(|entry| entry.score == 2.5));

        let entries = read_entries(&path, &BTreeMap::new()).unwrap();
        assert!(entries.iter().all(|entry| entry.score == FALLBACK_SCORE));
    }

    #[test]
    fn bad_rows_report_their_line_number() {
        let (_dir, path) = write_rows(&[r#"{"w":"결과","source":"a"}"#, "not json"]);
        let err = read_entries(&path, &BTreeMap::new()).unwrap_err();
        assert!(format!("{err:#}").contains(":2:"));

        let (_dir, path) = write_rows(&[r#"{"w":"결과"}"#]);
        let err = read_entries(&path, &BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("needs a source"));

        let (_dir, path) = write_rows(&[r#"{"w":"abc","source":"a"}"#]);
        let err = read_entries(&path, &BTreeMap::new()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid entry"));
    }
}
