use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mnemo_lexicon::{EntryStore, LexiconIndex, MergePolicy, WordRecord};
use mnemo_search::{SearchEngine, SearchOptions, SearchRequest, SearchTarget};

mod config;
mod import;

use config::Config;

const LEXICON_ENV: &str = "MNEMO_LEXICON";
const DEFAULT_LEXICON_PATH: &str = "artifacts/lexicon.jsonl.gz";

#[derive(Parser)]
#[command(name = "mnemo")]
#[command(about = "Korean initial-sound (두문자) word combinations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Lexicon artifact path (overrides MNEMO_LEXICON)
    #[arg(long, global = true)]
    lexicon: Option<PathBuf>,

    /// Config file (default: ./mnemo.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find word combinations whose initials spell the target
    Search(SearchArgs),

    /// Check whether a word is in the lexicon
    Check(CheckArgs),

    /// List lexicon words starting with an initials prefix
    Prefix(PrefixArgs),

    /// Build a lexicon artifact from a JSONL entry list
    Import(ImportArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Initials to cover, e.g. "결근" or "결" "근"
    #[arg(required = true)]
    items: Vec<String>,

    /// Treat items as example words and take their first syllables
    #[arg(long)]
    from_words: bool,

    /// Match initials in any order instead of left to right
    #[arg(long)]
    bag: bool,

    /// Beam width per search level
    #[arg(long)]
    beam: Option<usize>,

    /// Maximum combinations to return
    #[arg(long)]
    max: Option<usize>,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,

    /// Print trace events to stderr as JSON lines
    #[arg(long)]
    trace: bool,

    /// Maximum trace events to print
    #[arg(long, default_value_t = 40)]
    trace_limit: usize,
}

#[derive(Args)]
struct CheckArgs {
    /// Word to look up
    word: String,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PrefixArgs {
    /// Initials prefix, e.g. "결" or "결과"
    prefix: String,

    /// Maximum words to list
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ImportArgs {
    /// Entry list, one JSON object per line
    input: PathBuf,

    /// Artifact to write (default: the lexicon path)
    #[arg(long)]
    out: Option<PathBuf>,

    /// How duplicate (word, source) rows are reconciled
    #[arg(long, value_enum, default_value = "max")]
    policy: PolicyArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    /// Keep the best score and union the sources
    Max,
    /// Fail when one source reports two scores for a word
    Strict,
}

impl From<PolicyArg> for MergePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Max => MergePolicy::MaxScore,
            PolicyArg::Strict => MergePolicy::Strict,
        }
    }
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let json_output = match &cli.command {
        Commands::Search(args) => args.json,
        Commands::Check(args) => args.json,
        Commands::Prefix(args) => args.json,
        Commands::Import(_) => false,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;
    let lexicon = lexicon_path(cli.lexicon.clone());

    match cli.command {
        Commands::Search(args) => run_search(args, &lexicon, &config),
        Commands::Check(args) => run_check(&args, &lexicon),
        Commands::Prefix(args) => run_prefix(&args, &lexicon),
        Commands::Import(args) => run_import(args, &lexicon, &config),
    }
}

fn load_config(flag: Option<&Path>) -> Result<Config> {
    match flag {
        Some(path) => Config::load(path),
        None => {
            let default = Path::new("mnemo.toml");
            if default.exists() {
                Config::load(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn lexicon_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os(LEXICON_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LEXICON_PATH))
}

fn load_index(path: &Path) -> Result<LexiconIndex> {
    let store = EntryStore::load(path)
        .with_context(|| format!("Failed to load lexicon {}", path.display()))?;
    Ok(LexiconIndex::build(store))
}

fn load_engine(path: &Path, config: &Config) -> Result<SearchEngine> {
    let index = load_index(path)?;
    Ok(SearchEngine::new(Arc::new(index))
        .with_tuning(config.tuning)
        .with_options(SearchOptions {
            allow_repeated_words: config.search.allow_repeated_words,
            ..SearchOptions::default()
        }))
}

fn run_search(args: SearchArgs, lexicon: &Path, config: &Config) -> Result<()> {
    let units = if args.from_words {
        mnemo_lexicon::initials_from_words(&args.items)?
    } else {
        mnemo_lexicon::parse_units(&args.items)?
    };
    let target = if args.bag {
        SearchTarget::bag(units)
    } else {
        SearchTarget::sequence(units)
    };

    let engine = load_engine(lexicon, config)?;
    let request = SearchRequest::new(target)
        .with_beam_width(args.beam.unwrap_or(config.search.beam_width))
        .with_max_results(args.max.unwrap_or(config.search.max_results));

    let outcome = if args.trace {
        let mut events = Vec::new();
        let outcome = engine.search_traced(&request, &mut events)?;
        for event in events.iter().take(args.trace_limit) {
            eprintln!("{}", serde_json::to_string(event)?);
        }
        if events.len() > args.trace_limit {
            eprintln!("... {} more trace events", events.len() - args.trace_limit);
        }
        outcome
    } else {
        engine.search(&request)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.combos.is_empty() {
        println!("No combinations found");
    }
    for (i, combo) in outcome.combos.iter().enumerate() {
        let marker = if combo.is_complete() {
            String::new()
        } else {
            format!(" [partial, {:.0}% covered]", combo.coverage * 100.0)
        };
        println!("{}. {} (score: {:.3}){}", i + 1, combo.combo, combo.score, marker);
        for ((word, score), sources) in combo
            .words
            .iter()
            .zip(combo.word_scores.iter())
            .zip(combo.word_sources.iter())
        {
            println!("   {word} (score: {score:.3}) [{}]", sources.join(", "));
        }
        println!();
    }
    if outcome.cancelled {
        eprintln!("Search was cancelled; results may be incomplete");
    }
    Ok(())
}

fn run_check(args: &CheckArgs, lexicon: &Path) -> Result<()> {
    let index = load_index(lexicon)?;
    let record = index.record_of(&args.word);
    let has_prefix = mnemo_lexicon::initials_of(&args.word)
        .map(|units| index.has_prefix(&units))
        .unwrap_or(false);

    if args.json {
        let report = serde_json::json!({
            "word": args.word,
            "is_word": record.is_some(),
            "has_prefix": has_prefix,
            "score": record.map(|r| r.score),
            "sources": record.map(|r| r.sources.clone()).unwrap_or_default(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match record {
        Some(record) => {
            println!("{} (score: {:.3})", record.word, record.score);
            println!("   Sources: {}", record.sources.join(", "));
        }
        None if has_prefix => println!("{}: not a word, but lexicon words start with it", args.word),
        None => println!("{}: not in the lexicon", args.word),
    }
    Ok(())
}

fn run_prefix(args: &PrefixArgs, lexicon: &Path) -> Result<()> {
    let index = load_index(lexicon)?;
    let units = mnemo_lexicon::parse_units(std::slice::from_ref(&args.prefix))?;
    let records = index.lookup_prefix(&units, args.limit);

    if args.json {
        let words: Vec<_> = records
            .iter()
            .map(|record| {
                serde_json::json!({
                    "word": record.word,
                    "score": record.score,
                    "sources": record.sources,
                })
            })
            .collect();
        let report = serde_json::json!({ "prefix": args.prefix, "words": words });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No words start with {}", args.prefix);
    }
    for (i, record) in records.iter().enumerate() {
        println!(
            "{}. {} (score: {:.3}) [{}]",
            i + 1,
            record.word,
            record.score,
            record.sources.join(", ")
        );
    }
    Ok(())
}

fn run_import(args: ImportArgs, lexicon: &Path, config: &Config) -> Result<()> {
    let entries = import::read_entries(&args.input, &config.weights)?;
    let store = EntryStore::from_entries(entries, args.policy.into())
        .context("Failed to merge entry list")?;
    let out = args.out.unwrap_or_else(|| lexicon.to_path_buf());
    store
        .save(&out)
        .with_context(|| format!("Failed to write artifact {}", out.display()))?;

    println!("Imported {} words into {}", store.len(), out.display());

    let mut by_source: BTreeMap<&str, usize> = BTreeMap::new();
    for record in store.records() {
        for source in &record.sources {
            *by_source.entry(source.as_str()).or_insert(0) += 1;
        }
    }
    if !by_source.is_empty() {
        let sources: Vec<String> = by_source
            .iter()
            .map(|(source, count)| format!("{source} ({count})"))
            .collect();
        println!("Sources: {}", sources.join(", "));
    }

    let mut top: Vec<&WordRecord> = store.records().collect();
    top.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.word.cmp(&b.word)));
    if !top.is_empty() {
        println!("Top entries:");
        for (i, record) in top.iter().take(5).enumerate() {
            println!(
                "  {}. {} (score: {:.3}) [{}]",
                i + 1,
                record.word,
                record.score,
                record.sources.join(", ")
            );
        }
    }
    Ok(())
}
