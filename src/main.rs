//! Job-Harvester main entry point
//!
//! This is the command-line interface for the Job-Harvester scheduler.

use clap::Parser;
use job_harvester::config::{load_config_with_hash, Config};
use job_harvester::executor::{CancelToken, SiteRegistry};
use job_harvester::state::PersistenceStore;
use job_harvester::storage::{JobStore, SqliteStorage};
use job_harvester::Scheduler;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Job-Harvester: a polite, resumable job-posting harvester
///
/// Job-Harvester runs each configured site on its own cadency, one site at
/// a time, backing off after failures and resuming interrupted keyword
/// crawls where they stopped.
#[derive(Parser, Debug)]
#[command(name = "job-harvester")]
#[command(version)]
#[command(about = "A polite, resumable job-posting harvester", long_about = None)]
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

    /// Treat sites that never ran as having just run
    #[arg(long)]
    wait_before_first_run: bool,

    /// Run this site immediately, deferring all others until it has run
    #[arg(long, value_name = "SITE", conflicts_with = "sites")]
    start_at: Option<String>,

    /// Run these sites once, in order, ignoring their timers
    #[arg(long, value_name = "SITE,...", value_delimiter = ',')]
    sites: Vec<String>,

    /// Print the status table and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    status: bool,

    /// Validate config and show what would run without running anything
    #[arg(long, conflicts_with_all = ["status", "stats"])]
    dry_run: bool,

    /// Show posting counts from the database and exit
    #[arg(long, conflicts_with_all = ["status", "dry_run"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.status {
        handle_status(config)?;
    } else if !cli.sites.is_empty() {
        handle_specified(config, &cli.sites).await?;
    } else {
        handle_run(config, cli.wait_before_first_run, cli.start_at).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("job_harvester=info,warn"),
            1 => EnvFilter::new("job_harvester=debug,info"),
            2 => EnvFilter::new("job_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Opens the state file and the posting database and builds the scheduler
fn build_scheduler(config: Config, cancel: CancelToken) -> Result<Scheduler, Box<dyn std::error::Error>> {
    let state = PersistenceStore::open(&config.scheduler.state_path);
    let jobs = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let registry = SiteRegistry::builtin();
    Ok(Scheduler::new(config, state, Box::new(jobs), &registry, cancel)?)
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Job-Harvester Dry Run ===\n");

    println!("Scheduler:");
    println!("  State file: {}", config.scheduler.state_path);
    println!(
        "  Fresh session each run: {}",
        config.scheduler.fresh_session_each_run
    );
    println!(
        "  Interrupt grace: {}ms",
        config.scheduler.interrupt_grace_ms
    );

    println!("\nCrawler:");
    println!(
        "  Minimum time on page: {}ms",
        config.crawler.minimum_time_on_page
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let registry = SiteRegistry::builtin();
    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        let known = if registry.contains(site.kind()) {
            ""
        } else {
            " (no implementation registered)"
        };
        println!(
            "  - {} [{}] every {}s, {} keywords{}{}",
            site.name,
            site.kind(),
            site.cadency,
            site.keywords.len(),
            if site.ignore_autoscheduling {
                ", manual only"
            } else {
                ""
            },
            known
        );
    }

    if !config.cadency_overrides.is_empty() {
        println!("\nCadency overrides ({}):", config.cadency_overrides.len());
        for site in &config.sites {
            for (range, duration) in config.cadency_overrides.for_site(&site.name) {
                println!("  - {} {} → {}", site.name, range, duration);
            }
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows posting counts from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    println!("Postings: {}", storage.count_jobs()?);
    for (site, count) in storage.count_jobs_by_site()? {
        println!("  {:<20} {}", site, count);
    }

    Ok(())
}

/// Handles the --status mode: prints the status table once
fn handle_status(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = build_scheduler(config, CancelToken::new())?;
    scheduler.status()?;
    Ok(())
}

/// Handles --sites: runs the listed sites once each
async fn handle_specified(config: Config, sites: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancelToken::new();
    let _listener = cancel.listen_for_ctrl_c();
    let mut scheduler = build_scheduler(config, cancel)?;

    tracing::info!("Running {} site(s): {}", sites.len(), sites.join(", "));
    scheduler.run_specified(sites).await?;
    tracing::info!("Batch finished");
    Ok(())
}

/// Handles the main scheduled loop
async fn handle_run(
    config: Config,
    wait_before_first_run: bool,
    start_at: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancelToken::new();
    let _listener = cancel.listen_for_ctrl_c();

    tracing::info!(
        "Scheduling {} sites ({} overrides)",
        config.sites.len(),
        config.cadency_overrides.len()
    );
    if let Some(site) = &start_at {
        tracing::info!("Starting at {}", site);
    }

    let mut scheduler = build_scheduler(config, cancel)?;
    match scheduler.run_all(wait_before_first_run, start_at).await {
        Ok(()) => {
            tracing::info!("Scheduler stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scheduler failed: {}", e);
            Err(e.into())
        }
    }
}
