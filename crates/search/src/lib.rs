mod combo;
mod engine;
mod error;
mod ranker;
mod score;
mod target;

pub use combo::Combo;
pub use engine::{
    CancelToken, EmptyTargetPolicy, SearchEngine, SearchOptions, SearchOutcome, SearchRequest,
    TraceEvent, DEFAULT_BEAM_WIDTH, DEFAULT_MAX_RESULTS,
};
pub use error::{Result, SearchError};
pub use ranker::rank;
pub use score::{ScoreNorm, Tuning};
pub use target::{Mode, SearchTarget};
