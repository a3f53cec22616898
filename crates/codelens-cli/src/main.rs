//! Codelens CLI
//!
//! Index a source tree, search it, report on it, export it, or keep it
//! current while files change.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codelens_core::{CodelensConfig, Workspace};
use codelens_indexer::{
    FileWatcher, SearchFilters, SearchMode, SearchOptions, SearchQuery, WatcherOptions,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codelens")]
#[command(about = "Codelens - code search and analytics for source trees")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/codelens/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory and print statistics
    Index {
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Search a directory
    Search {
        root: PathBuf,

        query: String,

        /// full_text, semantic, regex, fuzzy or exact
        #[arg(short, long, default_value = "full_text")]
        mode: String,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Restrict to a language (repeatable)
        #[arg(long = "lang")]
        languages: Vec<String>,

        #[arg(long)]
        case_sensitive: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print an analytics report
    Report {
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write an index snapshot (`.msgpack` or JSON)
    Export {
        root: PathBuf,
        output: PathBuf,
    },

    /// Index, then keep the index current until Ctrl+C
    Watch {
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CodelensConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CodelensConfig::load(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Index { root } => cmd_index(&root, config).await,
        Commands::Search {
            root,
            query,
            mode,
            limit,
            languages,
            case_sensitive,
            json,
        } => {
            let mode: SearchMode = mode.parse().map_err(anyhow::Error::msg)?;
            let query = SearchQuery::new(query, mode)
                .with_filters(SearchFilters {
                    languages,
                    ..Default::default()
                })
                .with_options(SearchOptions {
                    limit,
                    case_sensitive,
                    ..Default::default()
                });
            cmd_search(&root, config, &query, json).await
        }
        Commands::Report { root, json } => cmd_report(&root, config, json).await,
        Commands::Export { root, output } => cmd_export(&root, config, &output).await,
        Commands::Watch { root } => cmd_watch(&root, config).await,
    }
}

async fn open_indexed(root: &Path, config: CodelensConfig) -> Result<Workspace> {
    let workspace = Workspace::open(root, config)
        .with_context(|| format!("Cannot open {}", root.display()))?;
    workspace.index_all().await.context("Indexing failed")?;
    Ok(workspace)
}

async fn cmd_index(root: &Path, config: CodelensConfig) -> Result<()> {
    let workspace = open_indexed(root, config).await?;
    let stats = workspace.stats();
    let progress = workspace.pipeline().progress();

    println!("Indexed {} files", stats.documents);
    println!("  Tokens:   {}", stats.tokens);
    println!("  Postings: {}", stats.postings);
    println!("  Symbols:  {}", stats.symbols);
    println!("  Modules:  {}", stats.modules);
    if progress.failed > 0 {
        println!("  Failed:   {}", progress.failed);
        for error in &progress.errors {
            println!("    {}: {}", error.path, error.message);
        }
    }
    Ok(())
}

async fn cmd_search(
    root: &Path,
    config: CodelensConfig,
    query: &SearchQuery,
    json: bool,
) -> Result<()> {
    let workspace = open_indexed(root, config).await?;
    let results = workspace.search(query);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results for '{}'", query.text);
        return Ok(());
    }
    for result in &results {
        match result.line_number {
            Some(line) => println!("{}:{}  [{:.2}]", result.file_path, line, result.score),
            None => println!("{}  [{:.2}]", result.file_path, result.score),
        }
        if !result.preview.is_empty() {
            println!("    {}", result.preview.trim());
        }
    }
    Ok(())
}

async fn cmd_report(root: &Path, config: CodelensConfig, json: bool) -> Result<()> {
    let workspace = open_indexed(root, config).await?;
    let report = workspace.generate_report();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let summary = &report.summary;
    println!("Files:                 {}", summary.total_files);
    println!("Dependencies:          {}", summary.total_dependencies);
    println!("Average complexity:    {:.1}", summary.average_complexity);
    println!("Circular dependencies: {}", summary.circular_dependency_count);

    if !report.hotspots.is_empty() {
        println!();
        println!("Hotspots:");
        for hotspot in &report.hotspots {
            println!(
                "  {:?} {:.1}  {}",
                hotspot.severity, hotspot.score, hotspot.path
            );
        }
    }
    if !report.code_smells.is_empty() {
        println!();
        println!("Code smells:");
        for smell in &report.code_smells {
            println!("  {}:{:?}  {}", smell.path, smell.line, smell.message);
        }
    }
    if !report.patterns.is_empty() {
        println!();
        println!("Patterns:");
        for pattern in &report.patterns {
            println!(
                "  {:?} {} in {} ({:.0}%)",
                pattern.kind,
                pattern.name,
                pattern.path,
                pattern.confidence * 100.0
            );
        }
    }
    if !report.cycles.is_empty() {
        println!();
        println!("Cycles:");
        for cycle in &report.cycles {
            println!("  {}", cycle.join(" -> "));
        }
    }
    Ok(())
}

async fn cmd_export(root: &Path, config: CodelensConfig, output: &Path) -> Result<()> {
    let workspace = open_indexed(root, config).await?;
    workspace
        .save_snapshot(output)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Exported {} files to {}",
        workspace.stats().documents,
        output.display()
    );
    Ok(())
}

async fn cmd_watch(root: &Path, config: CodelensConfig) -> Result<()> {
    let debounce = config.pipeline.debounce();
    let workspace = open_indexed(root, config).await?;
    println!("Indexed {} files", workspace.stats().documents);

    let mut watcher = FileWatcher::new(WatcherOptions {
        debounce_duration: debounce,
        ..Default::default()
    });
    watcher.watch(root).context("Failed to start watcher")?;

    workspace.pipeline().subscribe(|progress| {
        if !progress.is_flushing && progress.queued == 0 && progress.in_flight == 0 {
            tracing::debug!(indexed = progress.indexed, "Pipeline idle");
        }
    });

    println!("Watching {} (Ctrl+C to stop)", root.display());
    loop {
        tokio::select! {
            event = watcher.next() => {
                let Some(event) = event else { break };
                if let Err(e) = workspace.pipeline().handle_event(event).await {
                    tracing::error!(error = %e, "Dropped change event");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    workspace.pipeline().drain().await;
    workspace.shutdown();
    println!("Stopped. {} files indexed", workspace.stats().documents);
    Ok(())
}
