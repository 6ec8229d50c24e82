use thiserror::Error;

pub type Result<T> = std::result::Result<T, LexiconError>;

#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported character {ch:?} in {word:?}: only Hangul syllables form initials")]
    UnsupportedCharacter { word: String, ch: char },

    #[error("Empty word: at least one Hangul syllable is required")]
    EmptyWord,

    #[error("Conflicting scores for {word:?} from source {source:?}")]
    DuplicateSourceConflict {
        word: String,
        // `r#` keeps thiserror from treating this data field as the error cause.
        r#source: String,
    },

    #[error("Invalid score {score} for {word:?}: scores must be finite and non-negative")]
    InvalidScore { word: String, score: f64 },

    #[error("Malformed lexicon row at line {line}: {detail}")]
    Artifact { line: usize, detail: String },
}
