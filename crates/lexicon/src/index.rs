use std::collections::HashMap;

use log::debug;

use crate::codec;
use crate::entry::Entry;
use crate::error::Result;
use crate::store::{EntryStore, MergePolicy, WordRecord};

#[derive(Debug, Default)]
struct Node {
    children: HashMap<char, Box<Node>>,
    record: Option<usize>,
}

/// Prefix tree over initial-units: one branching level per syllable,
/// the word's record attached at the terminal node. Built once, then
/// strictly read-only, so a shared reference is safe across threads.
#[derive(Debug)]
pub struct LexiconIndex {
    root: Node,
    records: Vec<WordRecord>,
}

impl LexiconIndex {
    /// Build the index from a merged store. Infallible: conflict
    /// detection happens during the store merge.
    #[must_use]
    pub fn build(store: EntryStore) -> Self {
        let records = store.into_records();
        let mut root = Node::default();
        for (id, record) in records.iter().enumerate() {
            let mut node: &mut Node = &mut root;
            for &unit in &record.initials {
                node = node.children.entry(unit).or_default().as_mut();
            }
            node.record = Some(id);
        }
        debug!("lexicon index built: {} records", records.len());
        Self { root, records }
    }

    /// Merge raw entries and build in one step.
    pub fn from_entries(entries: Vec<Entry>, policy: MergePolicy) -> Result<Self> {
        Ok(Self::build(EntryStore::from_entries(entries, policy)?))
    }

    fn descend(&self, path: &[char]) -> Option<&Node> {
        let mut node = &self.root;
        for unit in path {
            node = node.children.get(unit)?;
        }
        Some(node)
    }

    /// Records whose initials start with `prefix`, sorted by score
    /// descending then word ascending. `limit == 0` returns all matches.
    #[must_use]
    pub fn lookup_prefix(&self, prefix: &[char], limit: usize) -> Vec<&WordRecord> {
        let Some(node) = self.descend(prefix) else {
            return Vec::new();
        };
        let mut matches = Vec::new();
        self.gather(node, &mut matches);
        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.word.cmp(&b.word)));
        if limit > 0 {
            matches.truncate(limit);
        }
        matches
    }

    fn gather<'a>(&'a self, node: &'a Node, out: &mut Vec<&'a WordRecord>) {
        if let Some(id) = node.record {
            out.push(&self.records[id]);
        }
        for child in node.children.values() {
            self.gather(child, out);
        }
    }

    /// Records whose initials equal `initials` exactly. Word and initials
    /// are a bijection here, so this holds at most one record; the
    /// sequence shape matches the prefix-lookup contract.
    #[must_use]
    pub fn lookup_exact(&self, initials: &[char]) -> Vec<&WordRecord> {
        self.descend(initials)
            .and_then(|node| node.record)
            .map(|id| vec![&self.records[id]])
            .unwrap_or_default()
    }

    #[must_use]
    pub fn record_of(&self, word: &str) -> Option<&WordRecord> {
        let path: Vec<char> = codec::normalize_word(word).chars().collect();
        self.descend(&path)
            .and_then(|node| node.record)
            .map(|id| &self.records[id])
    }

    #[must_use]
    pub fn contains(&self, word: &str) -> bool {
        self.record_of(word).is_some()
    }

    #[must_use]
    pub fn score_of(&self, word: &str) -> Option<f64> {
        self.record_of(word).map(|record| record.score)
    }

    #[must_use]
    pub fn has_prefix(&self, prefix: &[char]) -> bool {
        self.descend(prefix).is_some()
    }

    /// Number of indexed words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose full initials form a prefix of `seq`, shortest
    /// first, each with the number of units it consumes. This is the
    /// sequence-mode candidate walk: cost is bounded by `seq.len()`.
    #[must_use]
    pub fn walk_prefixes(&self, seq: &[char]) -> Vec<(usize, &WordRecord)> {
        let mut out = Vec::new();
        let mut node = &self.root;
        for (depth, unit) in seq.iter().enumerate() {
            match node.children.get(unit) {
                Some(child) => {
                    node = child;
                    if let Some(id) = node.record {
                        out.push((depth + 1, &self.records[id]));
                    }
                }
                None => break,
            }
        }
        out
    }

    /// Records whose initials multiset fits inside `units` (a multiset
    /// of available initial-units), word-ascending. This is the bag-mode
    /// candidate walk: the trie is explored only along branches whose
    /// unit is still available.
    #[must_use]
    pub fn walk_bag(&self, units: &[char]) -> Vec<&WordRecord> {
        let mut counts: HashMap<char, usize> = HashMap::new();
        for &unit in units {
            *counts.entry(unit).or_insert(0) += 1;
        }
        let mut out = Vec::new();
        self.bag_dfs(&self.root, &mut counts, &mut out);
        out.sort_by(|a, b| a.word.cmp(&b.word));
        out
    }

    fn bag_dfs<'a>(
        &'a self,
        node: &'a Node,
        counts: &mut HashMap<char, usize>,
        out: &mut Vec<&'a WordRecord>,
    ) {
        if let Some(id) = node.record {
            out.push(&self.records[id]);
        }
        for (&unit, child) in &node.children {
            if counts.get(&unit).copied().unwrap_or(0) == 0 {
                continue;
            }
            if let Some(available) = counts.get_mut(&unit) {
                *available -= 1;
            }
            self.bag_dfs(child, counts, out);
            if let Some(available) = counts.get_mut(&unit) {
                *available += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn index(entries: &[(&str, f64)]) -> LexiconIndex {
        let entries = entries
            .iter()
            .map(|(word, score)| Entry::new(word, *score, "test").unwrap())
            .collect();
        LexiconIndex::from_entries(entries, MergePolicy::MaxScore).unwrap()
    }

    fn words(records: &[&WordRecord]) -> Vec<String> {
        records.iter().map(|r| r.word.clone()).collect()
    }

    #[test]
    fn prefix_lookup_sorts_by_score_then_word() {
        let index = index(&[
            ("가구", 2.0),
            ("가방", 3.0),
            ("가로수", 1.0),
            ("나무", 5.0),
        ]);
        let matches = index.lookup_prefix(&['가'], 0);
        assert_eq!(words(&matches), vec!["가방", "가구", "가로수"]);

        let top = index.lookup_prefix(&['가'], 2);
        assert_eq!(words(&top), vec!["가방", "가구"]);
    }

    #[test]
    fn prefix_lookup_breaks_score_ties_by_word() {
        let index = index(&[("가구", 1.0), ("가방", 1.0)]);
        let matches = index.lookup_prefix(&['가'], 0);
        assert_eq!(words(&matches), vec!["가구", "가방"]);
    }

    #[test]
    fn exact_lookup_matches_full_initials_only() {
        let index = index(&[("결과", 2.0), ("결", 1.0)]);
        assert_eq!(words(&index.lookup_exact(&['결', '과'])), vec!["결과"]);
        assert_eq!(words(&index.lookup_exact(&['결'])), vec!["결"]);
        assert!(index.lookup_exact(&['결', '과', '물']).is_empty());
    }

    #[test]
    fn exact_and_prefix_paths_agree_on_full_initials() {
        let index = index(&[("결과", 2.0), ("결단", 1.0)]);
        for record in index.lookup_prefix(&[], 0) {
            let exact = index.lookup_exact(&record.initials);
            assert_eq!(exact, vec![record]);
        }
    }

    #[test]
    fn membership_and_scores() {
        let index = index(&[("시간", 3.0)]);
        assert!(index.contains("시간"));
        assert!(index.contains(" 시간 "));
        assert!(!index.contains("시"));
        assert_eq!(index.score_of("시간"), Some(3.0));
        assert_eq!(index.score_of("없음"), None);
        assert!(index.has_prefix(&['시']));
        assert!(!index.has_prefix(&['하']));
    }

    #[test]
    fn walk_prefixes_collects_words_along_the_path() {
        let index = index(&[("결", 1.0), ("결과", 2.0), ("결과물", 3.0), ("과일", 1.0)]);
        let seq = ['결', '과', '물', '상'];
        let matched: Vec<(usize, String)> = index
            .walk_prefixes(&seq)
            .into_iter()
            .map(|(consumed, record)| (consumed, record.word.clone()))
            .collect();
        assert_eq!(
            matched,
            vec![
                (1, "결".to_string()),
                (2, "결과".to_string()),
                (3, "결과물".to_string()),
            ]
        );
    }

    #[test]
    fn walk_bag_respects_unit_counts() {
        let index = index(&[("가나", 1.0), ("나가", 1.0), ("가가", 1.0), ("나나", 1.0)]);
        let matches = index.walk_bag(&['가', '나']);
        assert_eq!(words(&matches), vec!["가나", "나가"]);

        let matches = index.walk_bag(&['가', '가']);
        assert_eq!(words(&matches), vec!["가가"]);
    }

    #[test]
    fn walk_bag_includes_shorter_words() {
        let index = index(&[("가", 1.0), ("나", 1.0), ("가나다", 1.0)]);
        let matches = index.walk_bag(&['가', '나', '다']);
        assert_eq!(words(&matches), vec!["가", "가나다", "나"]);
    }
}
