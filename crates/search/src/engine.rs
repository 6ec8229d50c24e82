use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use mnemo_lexicon::{LexiconIndex, WordRecord};
use serde::Serialize;

use crate::combo::Combo;
use crate::error::{Result, SearchError};
use crate::ranker;
use crate::score::Tuning;
use crate::target::{self, Mode, SearchTarget};

pub const DEFAULT_BEAM_WIDTH: usize = 64;
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Cooperative cancellation flag, polled at level boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyTargetPolicy {
    /// An empty target yields one empty combination with full coverage.
    #[default]
    Accept,
    /// An empty target fails the search.
    Reject,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub empty_target: EmptyTargetPolicy,
    /// Whether one word may appear more than once in a combination.
    pub allow_repeated_words: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            empty_target: EmptyTargetPolicy::Accept,
            allow_repeated_words: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub target: SearchTarget,
    pub beam_width: usize,
    pub max_results: usize,
}

impl SearchRequest {
    pub fn new(target: SearchTarget) -> Self {
        SearchRequest {
            target,
            beam_width: DEFAULT_BEAM_WIDTH,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = beam_width;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub combos: Vec<Combo>,
    /// True when the search stopped at a level boundary on request. The
    /// combinations finalized before the stop are still returned.
    pub cancelled: bool,
    pub levels: usize,
    pub expanded: usize,
}

/// Step-by-step record of a search, for debugging and tooling.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Level { level: usize, frontier: usize, finalized: usize },
    Extend { words: Vec<String>, score: f64, remaining: String },
    Complete { words: Vec<String>, score: f64 },
    Stuck { words: Vec<String>, coverage: f64 },
    Prune { kept: usize, dropped: usize },
    Cancelled { level: usize },
    Done { results: usize },
}

/// One in-progress combination.
///
/// `key_words` is the dedup form of `words`: the word list as chosen in
/// sequence mode, sorted in bag mode so permutations of the same words
/// collapse into one state.
struct BeamState<'a> {
    words: Vec<&'a WordRecord>,
    remaining: Vec<char>,
    cumulative: f64,
    key_words: Vec<String>,
}

fn state_key(words: &[&WordRecord], mode: Mode) -> Vec<String> {
    let mut key: Vec<String> = words.iter().map(|r| r.word.clone()).collect();
    if mode == Mode::Bag {
        key.sort_unstable();
    }
    key
}

fn push_trace(trace: &mut Option<&mut Vec<TraceEvent>>, event: TraceEvent) {
    if let Some(sink) = trace.as_mut() {
        sink.push(event);
    }
}

/// Level-synchronous beam search over a shared read-only lexicon index.
///
/// Each call owns its frontier and accumulator, so one engine can serve
/// concurrent searches without locks.
pub struct SearchEngine {
    index: Arc<LexiconIndex>,
    tuning: Tuning,
    options: SearchOptions,
}

impl SearchEngine {
    pub fn new(index: Arc<LexiconIndex>) -> Self {
        SearchEngine {
            index,
            tuning: Tuning::default(),
            options: SearchOptions::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn index(&self) -> &LexiconIndex {
        &self.index
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        self.run(request, None, None)
    }

    pub fn search_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome> {
        self.run(request, Some(cancel), None)
    }

    pub fn search_traced(
        &self,
        request: &SearchRequest,
        trace: &mut Vec<TraceEvent>,
    ) -> Result<SearchOutcome> {
        self.run(request, None, Some(trace))
    }

    fn run(
        &self,
        request: &SearchRequest,
        cancel: Option<&CancelToken>,
        mut trace: Option<&mut Vec<TraceEvent>>,
    ) -> Result<SearchOutcome> {
        if request.beam_width == 0 || request.max_results == 0 {
            return Err(SearchError::InvalidParameter {
                beam_width: request.beam_width,
                max_results: request.max_results,
            });
        }

        let mode = request.target.mode();
        let requested = request.target.len();
        if requested == 0 {
            return match self.options.empty_target {
                EmptyTargetPolicy::Reject => Err(SearchError::EmptyTarget),
                EmptyTargetPolicy::Accept => Ok(SearchOutcome {
                    combos: vec![self.empty_combo(mode)],
                    cancelled: false,
                    levels: 0,
                    expanded: 0,
                }),
            };
        }

        let mut frontier = vec![BeamState {
            words: Vec::new(),
            remaining: request.target.units().to_vec(),
            cumulative: 0.0,
            key_words: Vec::new(),
        }];
        let mut drafts: Vec<Combo> = Vec::new();
        let mut cancelled = false;
        let mut levels = 0;
        let mut expanded = 0;

        while !frontier.is_empty() && drafts.len() < request.max_results {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                warn!("search cancelled at level {levels}, returning partial results");
                push_trace(&mut trace, TraceEvent::Cancelled { level: levels });
                cancelled = true;
                break;
            }
            push_trace(
                &mut trace,
                TraceEvent::Level {
                    level: levels,
                    frontier: frontier.len(),
                    finalized: drafts.len(),
                },
            );

            let mut pool: Vec<BeamState> = Vec::new();
            let mut seen: HashMap<(Vec<String>, Vec<char>), usize> = HashMap::new();

            for state in std::mem::take(&mut frontier) {
                let candidates: Vec<(&WordRecord, Vec<char>)> = match mode {
                    Mode::Sequence => self
                        .index
                        .walk_prefixes(&state.remaining)
                        .into_iter()
                        .map(|(consumed, record)| (record, state.remaining[consumed..].to_vec()))
                        .collect(),
                    Mode::Bag => self
                        .index
                        .walk_bag(&state.remaining)
                        .into_iter()
                        .filter_map(|record| {
                            target::remove_multiset(&state.remaining, &record.initials)
                                .map(|residual| (record, residual))
                        })
                        .collect(),
                };

                let mut extended = false;
                for (record, residual) in candidates {
                    if !self.options.allow_repeated_words
                        && state.words.iter().any(|used| used.word == record.word)
                    {
                        continue;
                    }
                    extended = true;
                    expanded += 1;

                    let mut words = state.words.clone();
                    words.push(record);
                    let cumulative = state.cumulative + self.tuning.word_score(record);

                    if residual.is_empty() {
                        let combo = self.make_combo(&words, mode, cumulative, requested, 0);
                        push_trace(
                            &mut trace,
                            TraceEvent::Complete {
                                words: combo.words.clone(),
                                score: combo.score,
                            },
                        );
                        drafts.push(combo);
                        continue;
                    }

                    let key_words = state_key(&words, mode);
                    push_trace(
                        &mut trace,
                        TraceEvent::Extend {
                            words: key_words.clone(),
                            score: cumulative,
                            remaining: residual.iter().collect(),
                        },
                    );
                    let successor = BeamState {
                        words,
                        remaining: residual,
                        cumulative,
                        key_words,
                    };
                    let key = (successor.key_words.clone(), successor.remaining.clone());
                    match seen.get(&key) {
                        Some(&at) if pool[at].cumulative >= successor.cumulative => {}
                        Some(&at) => pool[at] = successor,
                        None => {
                            seen.insert(key, pool.len());
                            pool.push(successor);
                        }
                    }
                }

                if !extended && !state.words.is_empty() {
                    let combo = self.make_combo(
                        &state.words,
                        mode,
                        state.cumulative,
                        requested,
                        state.remaining.len(),
                    );
                    push_trace(
                        &mut trace,
                        TraceEvent::Stuck {
                            words: combo.words.clone(),
                            coverage: combo.coverage,
                        },
                    );
                    drafts.push(combo);
                }
            }

            pool.sort_by(|a, b| {
                b.cumulative
                    .total_cmp(&a.cumulative)
                    .then_with(|| a.key_words.cmp(&b.key_words))
            });
            if pool.len() > request.beam_width {
                push_trace(
                    &mut trace,
                    TraceEvent::Prune {
                        kept: request.beam_width,
                        dropped: pool.len() - request.beam_width,
                    },
                );
                pool.truncate(request.beam_width);
            }
            frontier = pool;
            levels += 1;
        }

        let combos = ranker::rank(drafts, request.max_results);
        push_trace(&mut trace, TraceEvent::Done { results: combos.len() });
        debug!(
            "search mode={mode} levels={levels} expanded={expanded} results={} cancelled={cancelled}",
            combos.len()
        );
        Ok(SearchOutcome {
            combos,
            cancelled,
            levels,
            expanded,
        })
    }

    fn make_combo(
        &self,
        words: &[&WordRecord],
        mode: Mode,
        cumulative: f64,
        requested: usize,
        residual: usize,
    ) -> Combo {
        let mut ordered = words.to_vec();
        if mode == Mode::Bag {
            // Canonical presentation: longer words first, then alphabetical.
            ordered.sort_by(|a, b| {
                b.initials
                    .len()
                    .cmp(&a.initials.len())
                    .then_with(|| a.word.cmp(&b.word))
            });
        }
        let words: Vec<String> = ordered.iter().map(|r| r.word.clone()).collect();
        Combo {
            combo: words.join(" "),
            word_scores: ordered.iter().map(|r| self.tuning.word_score(r)).collect(),
            word_sources: ordered.iter().map(|r| r.sources.clone()).collect(),
            words,
            mode,
            score: self.tuning.finalize(cumulative, ordered.len()),
            coverage: target::coverage(requested, residual),
        }
    }

    fn empty_combo(&self, mode: Mode) -> Combo {
        Combo {
            combo: String::new(),
            words: Vec::new(),
            word_scores: Vec::new(),
            word_sources: Vec::new(),
            mode,
            score: 0.0,
            coverage: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreNorm;
    use mnemo_lexicon::{Entry, MergePolicy};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn lexicon(words: &[(&str, f64)]) -> Arc<LexiconIndex> {
        let entries = words
            .iter()
            .map(|(word, score)| Entry::new(word, *score, "test").unwrap())
            .collect();
        Arc::new(LexiconIndex::from_entries(entries, MergePolicy::MaxScore).unwrap())
    }

    fn engine(words: &[(&str, f64)]) -> SearchEngine {
        SearchEngine::new(lexicon(words))
    }

    fn sequence(units: &[char]) -> SearchRequest {
        SearchRequest::new(SearchTarget::sequence(units.to_vec()))
    }

    fn bag(units: &[char]) -> SearchRequest {
        SearchRequest::new(SearchTarget::bag(units.to_vec()))
    }

    #[test]
    fn single_word_outranks_fragmented_combo() {
        let engine = engine(&[("가나다", 2.0), ("가", 1.0), ("나", 1.0), ("다", 1.0)]);
        let outcome = engine.search(&sequence(&['가', '나', '다'])).unwrap();

        assert_eq!(outcome.combos.len(), 2);
        let top = &outcome.combos[0];
        assert_eq!(top.words, vec!["가나다"]);
        assert_eq!(top.combo, "가나다");
        assert_eq!(top.coverage, 1.0);
        assert!(top.is_complete());
        assert!((top.score - 2.6).abs() < 1e-9);

        let runner_up = &outcome.combos[1];
        assert_eq!(runner_up.words, vec!["가", "나", "다"]);
        assert!((runner_up.score - (3.0 - 0.4) / 3.0).abs() < 1e-9);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn stuck_state_keeps_partial_coverage() {
        let engine = engine(&[("가", 1.0)]);
        let outcome = engine.search(&sequence(&['가', '라'])).unwrap();

        assert_eq!(outcome.combos.len(), 1);
        let partial = &outcome.combos[0];
        assert_eq!(partial.words, vec!["가"]);
        assert_eq!(partial.coverage, 0.5);
        assert!(!partial.is_complete());
    }

    #[test]
    fn bag_mode_collapses_permutations() {
        let engine = engine(&[("가", 1.0), ("나", 1.0), ("다", 1.0)]);
        let outcome = engine.search(&bag(&['다', '나', '가'])).unwrap();

        assert_eq!(outcome.combos.len(), 1);
        let combo = &outcome.combos[0];
        assert_eq!(combo.words, vec!["가", "나", "다"]);
        assert_eq!(combo.mode, Mode::Bag);
        assert_eq!(combo.coverage, 1.0);
    }

    #[test]
    fn bag_mode_presents_longer_words_first() {
        let engine = engine(&[("나", 1.0), ("다가", 1.0)]);
        let outcome = engine.search(&bag(&['가', '나', '다'])).unwrap();

        assert_eq!(outcome.combos.len(), 1);
        assert_eq!(outcome.combos[0].words, vec!["다가", "나"]);
        assert_eq!(outcome.combos[0].combo, "다가 나");
    }

    #[test]
    fn wider_beam_finds_higher_scoring_combo() {
        let words = [("가", 1.0), ("가나", 0.5), ("나다", 0.1), ("다", 3.0)];
        let engine = engine(&words);
        let request = sequence(&['가', '나', '다']);

        let narrow = engine.search(&request.clone().with_beam_width(1)).unwrap();
        let wide = engine.search(&request.with_beam_width(10)).unwrap();

        assert_eq!(narrow.combos[0].words, vec!["가", "나다"]);
        assert_eq!(wide.combos[0].words, vec!["가나", "다"]);
        assert!(wide.combos[0].score >= narrow.combos[0].score);
    }

    #[test]
    fn zero_parameters_are_rejected() {
        let engine = engine(&[("가", 1.0)]);
        let request = sequence(&['가']).with_max_results(0);
        assert!(matches!(
            engine.search(&request),
            Err(SearchError::InvalidParameter { .. })
        ));

        let request = sequence(&['가']).with_beam_width(0);
        assert!(matches!(
            engine.search(&request),
            Err(SearchError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn empty_target_yields_trivial_combo() {
        let engine = engine(&[("가", 1.0)]);
        let outcome = engine.search(&sequence(&[])).unwrap();

        assert_eq!(outcome.combos.len(), 1);
        let combo = &outcome.combos[0];
        assert!(combo.words.is_empty());
        assert_eq!(combo.combo, "");
        assert_eq!(combo.coverage, 1.0);
        assert_eq!(combo.score, 0.0);
    }

    #[test]
    fn empty_target_can_be_rejected() {
        let engine = engine(&[("가", 1.0)]).with_options(SearchOptions {
            empty_target: EmptyTargetPolicy::Reject,
            ..SearchOptions::default()
        });
        assert!(matches!(
            engine.search(&sequence(&[])),
            Err(SearchError::EmptyTarget)
        ));
    }

    #[test]
    fn unmatched_first_unit_returns_nothing() {
        let engine = engine(&[("가", 1.0)]);
        let outcome = engine.search(&sequence(&['라'])).unwrap();
        assert!(outcome.combos.is_empty());
        assert!(!outcome.cancelled);
    }

    #[test]
    fn cancelled_token_stops_before_the_first_level() {
        let engine = engine(&[("가", 1.0)]);
        let token = CancelToken::new();
        token.cancel();

        let outcome = engine
            .search_with_cancel(&sequence(&['가']), &token)
            .unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.combos.is_empty());
        assert_eq!(outcome.levels, 0);
    }

    #[test]
    fn fresh_token_does_not_interfere() {
        let engine = engine(&[("가", 1.0)]);
        let token = CancelToken::new();
        let outcome = engine
            .search_with_cancel(&sequence(&['가']), &token)
            .unwrap();
        assert!(!outcome.cancelled);
        assert_eq!(outcome.combos.len(), 1);
    }

    #[test]
    fn repeated_words_can_be_disallowed() {
        let words = [("가", 1.0)];
        let request = sequence(&['가', '가']);

        let permissive = engine(&words).search(&request).unwrap();
        assert_eq!(permissive.combos[0].words, vec!["가", "가"]);
        assert_eq!(permissive.combos[0].coverage, 1.0);

        let strict = engine(&words).with_options(SearchOptions {
            allow_repeated_words: false,
            ..SearchOptions::default()
        });
        let outcome = strict.search(&request).unwrap();
        assert_eq!(outcome.combos.len(), 1);
        assert_eq!(outcome.combos[0].words, vec!["가"]);
        assert_eq!(outcome.combos[0].coverage, 0.5);
    }

    #[test]
    fn bag_dedup_bounds_state_blowup() {
        let engine = engine(&[("가", 1.0), ("나", 1.0), ("다", 1.0), ("라", 1.0)]);
        let outcome = engine
            .search(&bag(&['가', '가', '나', '나', '다', '다', '라', '라']))
            .unwrap();

        assert_eq!(outcome.combos.len(), 1);
        assert_eq!(outcome.combos[0].words.len(), 8);
        assert_eq!(outcome.combos[0].coverage, 1.0);
        assert!(
            outcome.expanded < 1000,
            "permutation dedup failed, expanded {} states",
            outcome.expanded
        );
    }

    #[test]
    fn sum_normalization_favors_fragmented_coverage() {
        let words = [("가나다", 2.0), ("가", 1.2), ("나", 1.2), ("다", 1.2)];
        let request = sequence(&['가', '나', '다']);

        let by_mean = engine(&words).search(&request).unwrap();
        assert_eq!(by_mean.combos[0].words, vec!["가나다"]);

        let by_sum = engine(&words)
            .with_tuning(Tuning {
                normalization: ScoreNorm::Sum,
                ..Tuning::default()
            })
            .search(&request)
            .unwrap();
        assert_eq!(by_sum.combos[0].words, vec!["가", "나", "다"]);
        assert!((by_sum.combos[0].score - 3.2).abs() < 1e-9);
    }

    #[test]
    fn trace_records_the_level_flow() {
        let engine = engine(&[("가나다", 2.0), ("가", 1.0), ("나", 1.0), ("다", 1.0)]);
        let mut events = Vec::new();
        let outcome = engine
            .search_traced(&sequence(&['가', '나', '다']), &mut events)
            .unwrap();

        assert!(matches!(
            events.first(),
            Some(TraceEvent::Level { level: 0, frontier: 1, .. })
        ));
        assert!(events
            .iter()
            .any(|event| matches!(event, TraceEvent::Complete { .. })));
        assert!(matches!(
            events.last(),
            Some(TraceEvent::Done { results }) if *results == outcome.combos.len()
        ));

        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["event"], "level");
    }

    fn proptest_pool() -> Vec<(&'static str, f64)> {
        vec![
            ("가", 1.0),
            ("나", 0.9),
            ("다", 1.5),
            ("라", 0.5),
            ("마", 0.7),
            ("가나", 2.0),
            ("나다", 1.2),
            ("다라", 0.8),
            ("가나다", 2.5),
            ("라마", 1.1),
        ]
    }

    fn unit_strategy() -> impl Strategy<Value = Vec<char>> {
        prop::collection::vec(prop::sample::select(vec!['가', '나', '다', '라', '마']), 1..6)
    }

    proptest! {
        #[test]
        fn proptest_search_is_deterministic(
            units in unit_strategy(),
            beam in 1usize..6,
            max in 1usize..8,
            as_bag in proptest::bool::ANY,
        ) {
            let engine = engine(&proptest_pool());
            let target = if as_bag {
                SearchTarget::bag(units.clone())
            } else {
                SearchTarget::sequence(units)
            };
            let request = SearchRequest::new(target)
                .with_beam_width(beam)
                .with_max_results(max);

            let first = engine.search(&request).unwrap();
            let second = engine.search(&request).unwrap();
            prop_assert_eq!(first.combos, second.combos);
            prop_assert_eq!(first.expanded, second.expanded);
            prop_assert_eq!(first.levels, second.levels);
        }

        #[test]
        fn proptest_results_respect_bounds(
            units in unit_strategy(),
            beam in 1usize..6,
            max in 1usize..8,
            as_bag in proptest::bool::ANY,
        ) {
            let engine = engine(&proptest_pool());
            let target = if as_bag {
                SearchTarget::bag(units)
            } else {
                SearchTarget::sequence(units)
            };
            let request = SearchRequest::new(target)
                .with_beam_width(beam)
                .with_max_results(max);

            let outcome = engine.search(&request).unwrap();
            prop_assert!(outcome.combos.len() <= max);
            for combo in &outcome.combos {
                prop_assert!(!combo.words.is_empty());
                prop_assert!(combo.coverage > 0.0 && combo.coverage <= 1.0);
            }
        }

        #[test]
        fn proptest_combos_reproduce_the_target(
            units in unit_strategy(),
            beam in 1usize..6,
            as_bag in proptest::bool::ANY,
        ) {
            let engine = engine(&proptest_pool());
            let target = if as_bag {
                SearchTarget::bag(units.clone())
            } else {
                SearchTarget::sequence(units.clone())
            };
            let requested = target.units().to_vec();
            let request = SearchRequest::new(target).with_beam_width(beam);

            let outcome = engine.search(&request).unwrap();
            for combo in &outcome.combos {
                let mut matched: Vec<char> =
                    combo.words.iter().flat_map(|word| word.chars()).collect();
                if as_bag {
                    matched.sort_unstable();
                }

                let expected_coverage = matched.len() as f64 / requested.len() as f64;
                prop_assert_eq!(combo.coverage, expected_coverage);
                if combo.is_complete() {
                    prop_assert_eq!(&matched, &requested);
                } else if as_bag {
                    prop_assert!(
                        target::remove_multiset(&requested, &matched).is_some(),
                        "partial {:?} is not a sub-multiset of {:?}",
                        matched,
                        requested
                    );
                } else {
                    prop_assert_eq!(&matched[..], &requested[..matched.len()]);
                }
            }
        }
    }
}
