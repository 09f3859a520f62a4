//! Pagecrawl main entry point
//!
//! This is the command-line interface for the pagecrawl pagination crawler.

use anyhow::Context;
use clap::Parser;
use pagecrawl::config::{load_config_with_hash, Config};
use pagecrawl::crawler::ContentCache;
use pagecrawl::{CrawlReport, Crawler, SeedRequest};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pagecrawl: an adaptive pagination crawler
///
/// Pagecrawl classifies each seed listing page (numbered pages, "next" links
/// or JavaScript-driven loading), follows its pagination within the configured
/// budgets and prints the article URLs it discovered.
#[derive(Parser, Debug)]
#[command(name = "pagecrawl")]
#[command(version)]
#[command(about = "An adaptive pagination crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Print one JSON report per seed instead of plain URLs
    #[arg(long, conflicts_with = "dry_run")]
    json: bool,

    /// Retrieve the raw HTML of every discovered URL and print its size
    #[arg(long, conflicts_with = "dry_run")]
    fetch_content: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let seeds = config.seed_requests()?;

    if cli.dry_run {
        handle_dry_run(&config, &seeds);
        return Ok(());
    }

    handle_crawl(&config, &seeds, cli.json, cli.fetch_content).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagecrawl=info,warn"),
            1 => EnvFilter::new("pagecrawl=debug,info"),
            2 => EnvFilter::new("pagecrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: shows the effective budgets per seed
fn handle_dry_run(config: &Config, seeds: &[SeedRequest]) {
    println!("=== Pagecrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Max render steps: {}", config.crawler.max_render_steps);
    println!("  Concurrent seeds: {}", config.crawler.max_concurrent_seeds);
    match config.crawler.crawl_deadline_secs {
        Some(secs) => println!("  Deadline: {}s", secs),
        None => println!("  Deadline: none"),
    }

    println!("\nFetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!("  Timeout: {}ms", config.fetch.request_timeout_ms);
    println!(
        "  Attempts: {} (backoff {}ms..{}ms)",
        config.fetch.max_attempts, config.fetch.base_delay_ms, config.fetch.max_delay_ms
    );

    println!("\nRender:");
    println!("  Headless: {}", config.render.headless);
    println!("  Load-more labels: {}", config.render.load_more_labels.join(", "));

    println!("\nSeeds ({}):", seeds.len());
    for seed in seeds {
        println!(
            "  - {} (pages: {}, render steps: {})",
            seed.url(),
            seed.max_pages(),
            seed.max_render_steps()
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    seeds: &[SeedRequest],
    json: bool,
    fetch_content: bool,
) -> anyhow::Result<()> {
    if seeds.is_empty() {
        tracing::warn!("No [[seed]] entries in configuration, nothing to crawl");
        return Ok(());
    }

    let crawler = Crawler::from_config(config).context("failed to build crawler")?;

    // Interrupts stop every seed between steps; partial results are still printed
    let token = crawler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing current step");
            token.cancel();
        }
    });

    let reports = crawler.crawl_all(seeds).await;

    for report in &reports {
        if json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            print_report(report);
        }
    }

    if fetch_content {
        let mut cache = ContentCache::new();
        for url in reports.iter().flat_map(|r| r.urls.iter()) {
            let content = crawler.fetch_raw_cached(url, &mut cache).await;
            println!("{}\t{} bytes", url, content.len());
        }
        tracing::info!("Fetched content for {} URLs", cache.len());
    }

    let total: usize = reports.iter().map(|r| r.urls.len()).sum();
    tracing::info!("Crawl completed: {} URLs from {} seeds", total, reports.len());
    Ok(())
}

fn print_report(report: &CrawlReport) {
    for url in &report.urls {
        println!("{}", url);
    }
}
