use std::path::PathBuf;
use std::sync::Arc;
use storyfind::cli::{Cli, Commands, ConfigAction, SearchArgs};
use storyfind::config::Config;
use storyfind::error::{Result, StoryfindError};
use storyfind::retrieval::{
    FixedEmbedder, HybridSearcher, RankedResultSet, RecordedCandidates, ReplayBackend,
    SearchMode, SearchQuery, SearchScope,
};
use storyfind::transcript::format_timestamp;

const PREVIEW_CHARS: usize = 120;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    match cli.command {
        Commands::Search(args) => {
            cmd_search(cli.config, args)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "storyfind=debug"
    } else {
        "storyfind=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_search(config_path: Option<PathBuf>, args: SearchArgs) -> Result<()> {
    let config = load_config(config_path, args.profile.as_deref())?;
    let retrieval = &config.retrieval;

    let recorded = RecordedCandidates::load(&args.candidates)?;
    tracing::debug!(
        "Loaded {} lexical and {} semantic candidates",
        recorded.lexical.len(),
        recorded.semantic.len()
    );

    // Recorded semantic results are already query specific
    let searcher = HybridSearcher::new(
        Arc::new(ReplayBackend::new(recorded)),
        Arc::new(FixedEmbedder::new(vec![1.0])),
        retrieval,
    )?;
    tracing::debug!(
        "Fusion weights lexical {} / semantic {}, dedup window {}s",
        searcher.fusion_config().lexical_weight,
        searcher.fusion_config().semantic_weight,
        searcher.dedup_epsilon()
    );

    let mode = match args.mode.as_deref() {
        Some(mode) => mode.parse::<SearchMode>()?,
        None => retrieval.default_mode,
    };

    let mut scope = SearchScope::new()
        .with_collections(args.collections)
        .with_entity_labels(args.labels)
        .with_entity_texts(args.entities);
    if let Some(excluded) = args.exclude_document {
        scope = scope.excluding_document(excluded);
    }

    let query = SearchQuery::new(args.query, args.limit.unwrap_or(retrieval.default_limit))
        .with_mode(mode)
        .with_scope(scope)
        .with_offset(args.offset)
        .with_threshold(
            args.min.unwrap_or(retrieval.threshold_min),
            args.max.unwrap_or(retrieval.threshold_max),
        );

    let rt = tokio::runtime::Runtime::new().map_err(|e| StoryfindError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    let results = rt.block_on(async {
        match &args.document {
            Some(document_id) => searcher.search_within_document(document_id, &query).await,
            None => searcher.search(&query).await,
        }
    })?;

    if args.json {
        let json = serde_json::to_string_pretty(&results).map_err(|e| StoryfindError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", json);
    } else {
        print_results(&query.text, &results);
    }

    Ok(())
}

fn print_results(query: &str, results: &RankedResultSet) {
    if results.is_empty() {
        println!("No results for '{}' ({})", query, results.mode);
        return;
    }

    println!(
        "{} results for '{}' ({}{})",
        results.len(),
        query,
        results.mode,
        if results.has_more {
            ", more may exist"
        } else {
            ""
        }
    );

    for (rank, hit) in results.iter().enumerate() {
        let title = hit
            .payload
            .get_str("interview_title")
            .unwrap_or(hit.document_id.as_str());

        println!(
            "\n{:>3}. [{} - {}] {}",
            rank + 1,
            format_timestamp(hit.start_time),
            format_timestamp(hit.end_time),
            title
        );
        println!(
            "     score {:.3} (lexical {:.3}, semantic {:.3})",
            hit.combined_score, hit.lexical_score, hit.semantic_score
        );

        if let Some(preview) = hit.preview("transcription", PREVIEW_CHARS) {
            println!("     {}", preview);
        }
    }
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!(
                "  Fusion weights: lexical {} / semantic {}",
                config.retrieval.lexical_weight, config.retrieval.semantic_weight
            );
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoryfindError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<&str>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'storyfind config init' to create one."
        );
        let mut config = Config::default();
        if let Some(profile) = profile {
            config.apply_profile(profile)?;
        }
        return Ok(config);
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, profile),
        None => Config::load(&path),
    }
}
