use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Lexicon error: {0}")]
    LexiconError(#[from] mnemo_lexicon::LexiconError),

    #[error("Beam width and max results must be positive (beam_width={beam_width}, max_results={max_results})")]
    InvalidParameter { beam_width: usize, max_results: usize },

    #[error("Empty search target")]
    EmptyTarget,
}
