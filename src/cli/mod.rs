//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "storyfind",
    version,
    author = "neur0map",
    about = "Hybrid lexical + semantic ranking for oral-history transcripts",
    long_about = "Storyfind fuses BM25 and vector retrieval results over transcript chunks into one \
                  relevance ranking, collapses near-duplicate timestamps and filters on a tunable \
                  relevance window. Recorded candidate sets can be replayed to tune rankings offline."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/storyfind/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank recorded retrieval candidates for a query
    Search(SearchArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Search query text
    pub query: String,

    /// JSON file with recorded lexical/semantic candidates
    #[arg(short = 'f', long, value_name = "FILE")]
    pub candidates: PathBuf,

    /// Retrieval mode (defaults to the configured mode)
    #[arg(short, long, value_parser = ["lexical", "semantic", "hybrid"])]
    pub mode: Option<String>,

    /// Maximum number of results to return
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Number of backend candidates to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Lowest combined score to keep
    #[arg(long)]
    pub min: Option<f64>,

    /// Highest combined score to keep
    #[arg(long)]
    pub max: Option<f64>,

    /// Search within a single interview
    #[arg(short, long)]
    pub document: Option<String>,

    /// Restrict to collections (repeatable)
    #[arg(long = "collection")]
    pub collections: Vec<String>,

    /// Restrict to chunks carrying any of these NER labels (repeatable)
    #[arg(long = "label")]
    pub labels: Vec<String>,

    /// Restrict to chunks mentioning any of these entities (repeatable)
    #[arg(long = "entity")]
    pub entities: Vec<String>,

    /// Leave out one interview
    #[arg(long)]
    pub exclude_document: Option<String>,

    /// Profile to use (e.g., "strict", "keyword")
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Show results in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
