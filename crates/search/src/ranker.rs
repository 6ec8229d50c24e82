use std::cmp::Ordering;
use std::collections::HashMap;

use crate::combo::Combo;

fn rank_order(a: &Combo, b: &Combo) -> Ordering {
    b.coverage
        .total_cmp(&a.coverage)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.words.len().cmp(&b.words.len()))
        .then_with(|| a.words.cmp(&b.words))
}

/// Deduplicates by word list, orders by rank and keeps the best `max_results`.
///
/// Duplicate word lists keep the higher-scoring occurrence. The final order is
/// coverage descending, then score descending, then fewer words, then the word
/// list itself, which makes the output a total order.
pub fn rank(combos: Vec<Combo>, max_results: usize) -> Vec<Combo> {
    let mut best: HashMap<Vec<String>, Combo> = HashMap::with_capacity(combos.len());
    for combo in combos {
        match best.get_mut(&combo.words) {
            Some(kept) if kept.score >= combo.score => {}
            Some(kept) => *kept = combo,
            None => {
                best.insert(combo.words.clone(), combo);
            }
        }
    }

    let mut ranked: Vec<Combo> = best.into_values().collect();
    ranked.sort_by(rank_order);
    ranked.truncate(max_results);
    ranked
}
