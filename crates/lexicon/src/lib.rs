//! # Mnemo Lexicon
//!
//! Korean lexicon primitives for initial-letter (두문자) matching.
//!
//! ## Pipeline
//!
//! ```text
//! entry list (JSONL[.gz]) -> EntryStore (merge per word) -> LexiconIndex (trie)
//! ```
//!
//! The store reconciles duplicate words across dictionary sources; the
//! index is built once and read-only afterwards, so it can be shared
//! across concurrent searches without locks.

mod codec;
mod entry;
mod error;
mod index;
mod store;

pub use codec::{initials_from_words, initials_of, is_initial_unit, normalize_word, parse_units};
pub use entry::Entry;
pub use error::{LexiconError, Result};
pub use index::LexiconIndex;
pub use store::{EntryStore, MergePolicy, WordRecord};
