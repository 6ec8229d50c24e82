//! Mnemo MCP Server
//!
//! Provides Korean initial-sound (두문자) word combination search to AI agents
//! via MCP protocol.
//!
//! ## Tools
//!
//! - `suggest_combos` - Word combinations matching a sequence or bag of initials
//! - `combos_from_words` - Combinations for the initials derived from example words
//! - `check_word` - Validate a single word against the lexicon
//! - `words_starting_with` - List lexicon words under an initials prefix
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "mnemo": {
//!       "command": "mnemo-mcp",
//!       "env": { "MNEMO_LEXICON": "/path/to/lexicon.jsonl.gz" }
//!     }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use rmcp::transport::stdio;
use rmcp::ServiceExt;

mod tools;

use tools::MnemoService;

#[tokio::main]
async fn main() -> Result<()> {
    // Configure logging to stderr only (stdout is for MCP protocol)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting Mnemo MCP server");

    let service = MnemoService::from_env().context("failed to load lexicon")?;
    let server = service.serve(stdio()).await?;

    // Wait for shutdown
    server.waiting().await?;

    log::info!("Mnemo MCP server stopped");
    Ok(())
}
