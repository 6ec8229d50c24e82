use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::entry::Entry;
use crate::error::{LexiconError, Result};

/// How duplicate records for the same word are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Keep the maximum score and the union of sources.
    #[default]
    MaxScore,
    /// Like `MaxScore`, but a (word, source) pair reporting two
    /// different scores fails with `DuplicateSourceConflict`.
    Strict,
}

/// One merged word with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct WordRecord {
    pub word: String,
    pub initials: Vec<char>,
    pub score: f64,
    pub sources: Vec<String>,
}

/// On-disk row of the lexicon artifact (one JSON object per line).
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactRow {
    w: String,
    sources: Vec<String>,
    score: f64,
}

/// Normalized, immutable set of word records keyed by word.
#[derive(Debug, Default)]
pub struct EntryStore {
    records: BTreeMap<String, WordRecord>,
}

impl EntryStore {
    /// Merge raw entries into one record per word. Deterministic for any
    /// input order: scores reconcile via max and sources sort.
    pub fn from_entries(entries: Vec<Entry>, policy: MergePolicy) -> Result<Self> {
        let mut records: BTreeMap<String, WordRecord> = BTreeMap::new();
        let mut seen: BTreeMap<(String, String), f64> = BTreeMap::new();

        for entry in entries {
            if policy == MergePolicy::Strict {
                let key = (entry.word.clone(), entry.source.clone());
                match seen.get(&key) {
                    Some(prev) if prev.to_bits() != entry.score.to_bits() => {
                        return Err(LexiconError::DuplicateSourceConflict {
                            word: entry.word,
                            source: entry.source,
                        });
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(key, entry.score);
                    }
                }
            }

            match records.get_mut(&entry.word) {
                Some(record) => {
                    record.score = record.score.max(entry.score);
                    if !record.sources.contains(&entry.source) {
                        record.sources.push(entry.source);
                    }
                }
                None => {
                    records.insert(
                        entry.word.clone(),
                        WordRecord {
                            word: entry.word,
                            initials: entry.initials,
                            score: entry.score,
                            sources: vec![entry.source],
                        },
                    );
                }
            }
        }

        for record in records.values_mut() {
            record.sources.sort();
        }
        Ok(Self { records })
    }

    /// Read an artifact written by [`EntryStore::save`] (or the external
    /// entry-list producer). Duplicate rows for a word merge with
    /// `MaxScore` semantics; every row is re-validated on the way in.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = if is_gzip(path) {
            Box::new(BufReader::new(GzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        let mut records: BTreeMap<String, WordRecord> = BTreeMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let row: ArtifactRow =
                serde_json::from_str(trimmed).map_err(|err| LexiconError::Artifact {
                    line: idx + 1,
                    detail: err.to_string(),
                })?;
            let initials = codec::initials_of(&row.w)?;
            if !row.score.is_finite() || row.score < 0.0 {
                return Err(LexiconError::InvalidScore {
                    word: row.w,
                    score: row.score,
                });
            }
            let word: String = initials.iter().collect();
            match records.get_mut(&word) {
                Some(record) => {
                    record.score = record.score.max(row.score);
                    for source in row.sources {
                        if !record.sources.contains(&source) {
                            record.sources.push(source);
                        }
                    }
                }
                None => {
                    records.insert(
                        word.clone(),
                        WordRecord {
                            word,
                            initials,
                            score: row.score,
                            sources: row.sources,
                        },
                    );
                }
            }
        }

        for record in records.values_mut() {
            record.sources.sort();
        }
        info!(
            "Loaded {} lexicon records from {}",
            records.len(),
            path.display()
        );
        Ok(Self { records })
    }

    /// Write the artifact, rows ordered by score descending then word,
    /// gzip-compressed when the path ends in `.gz`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut rows: Vec<&WordRecord> = self.records.values().collect();
        rows.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.word.cmp(&b.word)));

        let file = File::create(path)?;
        if is_gzip(path) {
            let mut writer = GzEncoder::new(BufWriter::new(file), Compression::default());
            write_rows(&mut writer, &rows)?;
            writer.finish()?.flush()?;
        } else {
            let mut writer = BufWriter::new(file);
            write_rows(&mut writer, &rows)?;
            writer.flush()?;
        }
        info!(
            "Saved {} lexicon records to {}",
            self.records.len(),
            path.display()
        );
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, word: &str) -> Option<&WordRecord> {
        self.records.get(word)
    }

    /// Records in word-ascending order.
    pub fn records(&self) -> impl Iterator<Item = &WordRecord> {
        self.records.values()
    }

    pub(crate) fn into_records(self) -> Vec<WordRecord> {
        self.records.into_values().collect()
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

fn write_rows<W: Write>(writer: &mut W, rows: &[&WordRecord]) -> Result<()> {
    for record in rows {
        let row = ArtifactRow {
            w: record.word.clone(),
            sources: record.sources.clone(),
            score: record.score,
        };
        let line = serde_json::to_string(&row)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}
