//! MCP Tools for Mnemo
//!
//! Exposes lexicon lookups and initial-sound combination search to AI agents
//! via MCP protocol.

use anyhow::{Context as AnyhowContext, Result};
use mnemo_lexicon::{initials_from_words, parse_units, EntryStore, LexiconIndex};
use mnemo_search::{
    CancelToken, Combo, Mode, SearchEngine, SearchOutcome, SearchRequest, SearchTarget,
    DEFAULT_BEAM_WIDTH, DEFAULT_MAX_RESULTS,
};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const LEXICON_ENV: &str = "MNEMO_LEXICON";
const DEFAULT_LEXICON_PATH: &str = "artifacts/lexicon.jsonl.gz";

const SEARCH_TIMEOUT_ENV: &str = "MNEMO_SEARCH_TIMEOUT_MS";
const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 2_000;

/// Mnemo MCP Service
#[derive(Clone)]
pub struct MnemoService {
    /// Shared read-only search engine
    engine: Arc<SearchEngine>,
    /// Tool router
    tool_router: ToolRouter<Self>,
}

impl MnemoService {
    pub fn from_env() -> Result<Self> {
        let path = env::var(LEXICON_ENV).unwrap_or_else(|_| DEFAULT_LEXICON_PATH.to_string());
        Self::from_artifact(PathBuf::from(path))
    }

    pub fn from_artifact(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let store = EntryStore::load(path)
            .with_context(|| format!("failed to load lexicon from {}", path.display()))?;
        log::info!("loaded {} lexicon words from {}", store.len(), path.display());
        let index = Arc::new(LexiconIndex::build(store));
        Ok(Self {
            engine: Arc::new(SearchEngine::new(index)),
            tool_router: Self::tool_router(),
        })
    }

    /// Runs one search under the advisory deadline, returning whatever was
    /// finalized when the deadline fires.
    async fn run_with_deadline(
        &self,
        request: &SearchRequest,
    ) -> mnemo_search::Result<SearchOutcome> {
        let token = CancelToken::new();
        let deadline = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(search_deadline()).await;
            deadline.cancel();
        });
        let outcome = self.engine.search_with_cancel(request, &token);
        timer.abort();
        outcome
    }
}

#[tool_handler]
impl ServerHandler for MnemoService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Mnemo finds Korean word combinations whose initial syllables match a target (두문자 찾기). Use 'suggest_combos' with target initials, 'combos_from_words' to derive the target from example words, 'check_word' to validate a word, and 'words_starting_with' to browse the lexicon by prefix.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

fn parse_mode(raw: Option<&str>) -> Result<Mode, String> {
    match raw.unwrap_or("sequence") {
        "sequence" => Ok(Mode::Sequence),
        "bag" => Ok(Mode::Bag),
        other => Err(format!(
            "Error: unknown mode '{other}', expected 'sequence' or 'bag'"
        )),
    }
}

fn search_deadline() -> Duration {
    let millis = env::var(SEARCH_TIMEOUT_ENV)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_SEARCH_TIMEOUT_MS);
    Duration::from_millis(millis)
}

// ============================================================================
// Tool Input/Output Schemas
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SuggestRequest {
    /// Target initials, one Hangul syllable per unit
    #[schemars(description = "Target initials as Hangul syllables, e.g. [\"결\",\"준\",\"위\"]")]
    pub initials: Vec<String>,

    /// Match mode (default: sequence)
    #[schemars(description = "Match mode: sequence (in order) or bag (any order)")]
    pub mode: Option<String>,

    /// Beam width (default: 64)
    #[schemars(description = "Number of in-progress combinations kept per search level (1-1024)")]
    pub beam_width: Option<usize>,

    /// Maximum results (default: 20)
    #[schemars(description = "Maximum number of combinations to return (1-100)")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FromWordsRequest {
    /// Words whose first syllables form the target
    #[schemars(description = "Example words, e.g. [\"결과\",\"준비\"] targets 결준")]
    pub words: Vec<String>,

    /// Match mode (default: sequence)
    #[schemars(description = "Match mode: sequence (in order) or bag (any order)")]
    pub mode: Option<String>,

    /// Beam width (default: 64)
    #[schemars(description = "Number of in-progress combinations kept per search level (1-1024)")]
    pub beam_width: Option<usize>,

    /// Maximum results (default: 20)
    #[schemars(description = "Maximum number of combinations to return (1-100)")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct SuggestResult {
    /// Target initials the search ran against
    pub target: String,
    /// Mode the search ran in
    pub mode: String,
    /// True when the search hit the advisory deadline; combos are partial
    pub cancelled: bool,
    /// Ranked combinations
    pub combos: Vec<ComboInfo>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct ComboInfo {
    /// Words joined with spaces
    pub combo: String,
    /// Words in presentation order
    pub words: Vec<String>,
    /// Per-word scores, parallel to `words`
    pub word_scores: Vec<f64>,
    /// Per-word dictionary sources, parallel to `words`
    pub word_sources: Vec<Vec<String>>,
    /// Combination score
    pub score: f64,
    /// Fraction of the target covered (1.0 = complete)
    pub coverage: f64,
}

impl From<&Combo> for ComboInfo {
    fn from(combo: &Combo) -> Self {
        ComboInfo {
            combo: combo.combo.clone(),
            words: combo.words.clone(),
            word_scores: combo.word_scores.clone(),
            word_sources: combo.word_sources.clone(),
            score: combo.score,
            coverage: combo.coverage,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CheckWordRequest {
    /// Word to validate
    #[schemars(description = "Word to look up in the lexicon")]
    pub word: String,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct CheckWordResult {
    /// The word as normalized by the lexicon
    pub word: String,
    /// Whether the lexicon contains the word itself
    pub is_word: bool,
    /// Whether any lexicon word starts with this word's syllables
    pub has_prefix: bool,
    /// Lexicon score, if found
    pub score: Option<f64>,
    /// Dictionary sources, if found
    pub sources: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PrefixRequest {
    /// Initials prefix as Hangul syllables
    #[schemars(description = "Initials prefix, e.g. \"결\" or \"결과\"")]
    pub prefix: String,

    /// Maximum words (default: 50)
    #[schemars(description = "Maximum number of words to return (1-100)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct PrefixResult {
    /// The prefix that was looked up
    pub prefix: String,
    /// Matching words, best score first
    pub words: Vec<WordInfo>,
}

#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct WordInfo {
    pub word: String,
    pub score: f64,
    pub sources: Vec<String>,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl MnemoService {
    /// Word combinations for target initials
    #[tool(description = "Find Korean word combinations whose initial syllables match the target initials. Sequence mode matches in order, bag mode treats the target as an unordered multiset. Combos with coverage below 1.0 cover only part of the target.")]
    pub async fn suggest_combos(
        &self,
        Parameters(request): Parameters<SuggestRequest>,
    ) -> Result<CallToolResult, McpError> {
        let units = match parse_units(&request.initials) {
            Ok(units) => units,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error: {e}"
                ))]))
            }
        };
        let mode = match parse_mode(request.mode.as_deref()) {
            Ok(mode) => mode,
            Err(message) => return Ok(CallToolResult::error(vec![Content::text(message)])),
        };

        self.respond(units, mode, request.beam_width, request.max_results)
            .await
    }

    /// Word combinations for the initials of example words
    #[tool(description = "Find Korean word combinations for the target formed by the first syllable of each given word. Useful when the user provides example words instead of raw initials.")]
    pub async fn combos_from_words(
        &self,
        Parameters(request): Parameters<FromWordsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let units = match initials_from_words(&request.words) {
            Ok(units) => units,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error: {e}"
                ))]))
            }
        };
        let mode = match parse_mode(request.mode.as_deref()) {
            Ok(mode) => mode,
            Err(message) => return Ok(CallToolResult::error(vec![Content::text(message)])),
        };

        self.respond(units, mode, request.beam_width, request.max_results)
            .await
    }

    /// Validate one word against the lexicon
    #[tool(description = "Check whether a word exists in the lexicon. Returns its score and dictionary sources when found, plus whether any lexicon word continues it.")]
    pub async fn check_word(
        &self,
        Parameters(request): Parameters<CheckWordRequest>,
    ) -> Result<CallToolResult, McpError> {
        let index = self.engine.index();
        let record = index.record_of(&request.word);
        let has_prefix = mnemo_lexicon::initials_of(&request.word)
            .map(|units| index.has_prefix(&units))
            .unwrap_or(false);
        let result = CheckWordResult {
            word: record
                .map(|r| r.word.clone())
                .unwrap_or_else(|| request.word.clone()),
            is_word: record.is_some(),
            has_prefix,
            score: record.map(|r| r.score),
            sources: record.map(|r| r.sources.clone()).unwrap_or_default(),
        };
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&result).unwrap_or_default(),
        )]))
    }

    /// List lexicon words under an initials prefix
    #[tool(description = "List lexicon words whose initial syllables start with the given prefix, best score first.")]
    pub async fn words_starting_with(
        &self,
        Parameters(request): Parameters<PrefixRequest>,
    ) -> Result<CallToolResult, McpError> {
        let units = match parse_units(&[&request.prefix]) {
            Ok(units) => units,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error: {e}"
                ))]))
            }
        };
        let limit = request.limit.unwrap_or(50).clamp(1, 100);

        let words: Vec<WordInfo> = self
            .engine
            .index()
            .lookup_prefix(&units, limit)
            .into_iter()
            .map(|record| WordInfo {
                word: record.word.clone(),
                score: record.score,
                sources: record.sources.clone(),
            })
            .collect();
        let result = PrefixResult {
            prefix: units.iter().collect(),
            words,
        };
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&result).unwrap_or_default(),
        )]))
    }
}

impl MnemoService {
    async fn respond(
        &self,
        units: Vec<char>,
        mode: Mode,
        beam_width: Option<usize>,
        max_results: Option<usize>,
    ) -> Result<CallToolResult, McpError> {
        let target_label: String = units.iter().collect();
        let target = match mode {
            Mode::Sequence => SearchTarget::sequence(units),
            Mode::Bag => SearchTarget::bag(units),
        };
        let request = SearchRequest::new(target)
            .with_beam_width(beam_width.unwrap_or(DEFAULT_BEAM_WIDTH).clamp(1, 1024))
            .with_max_results(max_results.unwrap_or(DEFAULT_MAX_RESULTS).clamp(1, 100));

        let outcome = match self.run_with_deadline(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error: {e}"
                ))]))
            }
        };

        let result = SuggestResult {
            target: target_label,
            mode: mode.to_string(),
            cancelled: outcome.cancelled,
            combos: outcome.combos.iter().map(ComboInfo::from).collect(),
        };
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&result).unwrap_or_default(),
        )]))
    }
}
