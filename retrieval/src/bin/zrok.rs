//! zrok CLI: semantic code indexing and retrieval.

use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tracing_subscriber::EnvFilter;

use zrok_retrieval::config::debug_verbose;
use zrok_retrieval::config::ProjectConfig;
use zrok_retrieval::config::StatePaths;
use zrok_retrieval::indexing::watch;
use zrok_retrieval::indexing::Indexer;
use zrok_retrieval::search::MultiHopParams;
use zrok_retrieval::search::Searcher;
use zrok_retrieval::types::ChunkKind;
use zrok_retrieval::types::Language;
use zrok_retrieval::types::SearchFilter;
use zrok_retrieval::types::SearchResponse;
use zrok_retrieval::RetrievalErr;

#[derive(Parser)]
#[command(name = "zrok", about = "Semantic code index and search for code review")]
struct Cli {
    /// Emit machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the semantic index.
    Index {
        #[command(subcommand)]
        command: IndexCommand,
    },
    /// Query the index with natural language.
    ///
    /// `zrok semantic related <file>` returns chunks related to a whole
    /// file instead of a query.
    Semantic(SemanticArgs),
}

#[derive(Subcommand)]
enum IndexCommand {
    /// Write the index configuration into project.yaml.
    Enable {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        dimension: Option<usize>,
    },
    /// Full build of the index.
    Build {
        /// Clear the existing index first.
        #[arg(long)]
        force: bool,
    },
    /// Incremental update against the current tree.
    Update,
    /// Watch the tree and keep the index current until interrupted.
    Watch,
    /// Show provider, counts and per-kind/per-language breakdowns.
    Status,
    /// Wipe the index.
    Clear,
}

#[derive(Args)]
struct SemanticArgs {
    /// Query words, or `related <file>`.
    #[arg(required = true)]
    query: Vec<String>,

    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Iterative neighbor expansion instead of a single pass.
    #[arg(long)]
    multi_hop: bool,

    #[arg(long, default_value_t = 3)]
    max_hops: u32,

    /// Minimum similarity score for hits.
    #[arg(long)]
    threshold: Option<f32>,

    /// Restrict to chunk kinds (repeatable).
    #[arg(long = "type", value_name = "KIND")]
    kinds: Vec<String>,

    /// Restrict to a file path glob.
    #[arg(long)]
    file: Option<String>,

    /// Restrict to languages (repeatable).
    #[arg(long)]
    language: Vec<String>,

    /// Soft time budget in seconds (multi-hop).
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let json = cli.json;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Warnings already went to stderr; the error object is the only
            // thing JSON consumers see on stdout.
            if json {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
            }
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_logging() {
    let default = if debug_verbose() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let root = std::env::current_dir().context("cannot determine working directory")?;
    let paths = StatePaths::new(&root);

    match cli.command {
        Command::Index { command } => run_index(command, paths, cli.json).await,
        Command::Semantic(args) => run_semantic(args, paths, cli.json).await,
    }
}

async fn run_index(command: IndexCommand, paths: StatePaths, json: bool) -> anyhow::Result<()> {
    match command {
        IndexCommand::Enable {
            provider,
            model,
            endpoint,
            dimension,
        } => {
            if !matches!(provider.as_str(), "ollama" | "openai" | "huggingface") {
                return Err(RetrievalErr::UnknownProvider { name: provider }.into());
            }

            let mut config = ProjectConfig::load(&paths)?;
            if config.name.is_empty() {
                config.name = paths
                    .root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }
            config.index.provider = provider;
            config.index.model = model;
            config.index.endpoint = endpoint;
            config.index.dimension = dimension;
            config.save(&paths)?;

            if json {
                println!("{}", serde_json::to_string(&config.index)?);
            } else {
                println!("index enabled: provider={}", config.index.provider);
            }
            Ok(())
        }

        IndexCommand::Build { force } => {
            let indexer = open_indexer(&paths)?;
            install_interrupt(&indexer);
            let report = indexer.build(force).await?;
            indexer.close().await?;

            if json {
                println!("{}", serde_json::to_string(&report)?);
            } else if debug_verbose() {
                println!(
                    "indexed {} files ({} chunks), skipped {}",
                    report.files_indexed, report.chunks_indexed, report.files_skipped
                );
            } else {
                println!(
                    "indexed {} files ({} chunks)",
                    report.files_indexed, report.chunks_indexed
                );
            }
            Ok(())
        }

        IndexCommand::Update => {
            let indexer = open_indexer(&paths)?;
            install_interrupt(&indexer);
            let report = indexer.update().await?;
            indexer.close().await?;

            if json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!(
                    "updated: {} indexed, {} removed, {} skipped",
                    report.files_indexed, report.files_removed, report.files_skipped
                );
            }
            Ok(())
        }

        IndexCommand::Watch => {
            let indexer = Arc::new(open_indexer(&paths)?);
            install_interrupt(&indexer);
            watch(&indexer).await?;
            indexer.close().await?;
            Ok(())
        }

        IndexCommand::Status => {
            let indexer = open_indexer(&paths)?;
            let stats = indexer.stats().await?;

            if json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                println!("provider:  {} (model {})", stats.provider, stats.model);
                println!("dimension: {}", stats.dimension);
                println!("chunks:    {}", stats.store.total_chunks);
                println!("files:     {}", stats.store.total_files);
                println!("vectors:   {}", stats.vectors);
                if !stats.store.by_kind.is_empty() {
                    println!("by kind:");
                    for (kind, count) in &stats.store.by_kind {
                        println!("  {kind:<10} {count}");
                    }
                }
                if !stats.store.by_language.is_empty() {
                    println!("by language:");
                    for (language, count) in &stats.store.by_language {
                        println!("  {language:<16} {count}");
                    }
                }
            }
            Ok(())
        }

        IndexCommand::Clear => {
            let indexer = open_indexer(&paths)?;
            indexer.clear().await?;
            if json {
                println!("{}", serde_json::json!({ "cleared": true }));
            } else {
                println!("index cleared");
            }
            Ok(())
        }
    }
}

async fn run_semantic(args: SemanticArgs, paths: StatePaths, json: bool) -> anyhow::Result<()> {
    let indexer = open_indexer(&paths)?;
    let searcher = Searcher::new(&indexer);

    // `semantic related <file>` is a sibling query, not a text search.
    if args.query.len() == 2 && args.query[0] == "related" {
        let response = searcher.related_by_file(&args.query[1], args.limit).await?;
        print_results(&response, json)?;
        return Ok(());
    }

    let query = args.query.join(" ");
    let filter = build_filter(&args)?;

    let response = if args.multi_hop {
        let params = MultiHopParams {
            limit: args.limit,
            max_hops: args.max_hops,
            time_limit: Duration::from_secs(args.timeout),
            ..Default::default()
        };
        searcher
            .search_multi_hop(&query, &filter, &params, args.threshold)
            .await?
    } else {
        searcher
            .search(&query, args.limit, &filter, args.threshold)
            .await?
    };

    print_results(&response, json)?;
    Ok(())
}

fn build_filter(args: &SemanticArgs) -> anyhow::Result<SearchFilter> {
    let mut kinds = Vec::new();
    for raw in &args.kinds {
        match ChunkKind::from_str(raw) {
            Ok(kind) => kinds.push(kind),
            Err(e) => bail!("{e}"),
        }
    }
    let mut languages = Vec::new();
    for raw in &args.language {
        match Language::from_str(raw) {
            Ok(language) => languages.push(language),
            Err(e) => bail!("{e}"),
        }
    }
    Ok(SearchFilter {
        file_glob: args.file.clone(),
        kinds,
        languages,
    })
}

fn print_results(response: &SearchResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for result in &response.results {
        let chunk = &result.chunk;
        println!(
            "{:>6.3}  {}:{}-{}  {} {}",
            result.score, chunk.file, chunk.start_line, chunk.end_line, chunk.kind, chunk.name
        );
    }
    if response.total_hops > 1 {
        println!("({} hops)", response.total_hops);
    }
    Ok(())
}

fn open_indexer(paths: &StatePaths) -> anyhow::Result<Indexer> {
    let config = ProjectConfig::load(paths)?;
    Ok(Indexer::open(paths.clone(), config.index)?)
}

/// SIGINT (and SIGTERM on POSIX) cancel the running operation; the final
/// savepoint still runs before exit.
fn install_interrupt(indexer: &Indexer) {
    let cancel = indexer.cancel_token();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::signal;
            use tokio::signal::unix::SignalKind;
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(_) => return cancel_on_ctrl_c(cancel).await,
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            tracing::info!("Interrupt received, finishing up");
            cancel.cancel();
        }
        #[cfg(not(unix))]
        {
            cancel_on_ctrl_c(cancel).await;
        }
    });
}

async fn cancel_on_ctrl_c(cancel: tokio_util::sync::CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Interrupt received, finishing up");
        cancel.cancel();
    }
}
