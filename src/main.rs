//! cvdash - Cardiovascular Disease Mortality Dashboard
//!
//! A CLI tool that loads a global cardiovascular mortality table, joins it
//! with ISO country codes, and renders the dashboard panels for one set of
//! filter values.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (download, parse, config, output failure, etc.)

mod analysis;
mod cli;
mod config;
mod data;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use data::{DataSource, DatasetSources, DatasetStore, FetchOptions, SnapshotCache};
use models::{DashboardReport, ReportMetadata};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("cvdash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    origin.log();

    match run_dashboard(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .cvdash.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to change sources, default filters, and the totals policy.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load the data, build the requested page and write the report.
async fn run_dashboard(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let sources = DatasetSources {
        mortality: select_source(args.mortality_file.as_deref(), &config.sources.mortality_url),
        codes: select_source(args.codes_file.as_deref(), &config.sources.codes_url),
    };
    let options = FetchOptions {
        cache: config.sources.cache_dir.clone().map(SnapshotCache::new),
        refresh: args.refresh,
        show_progress: !args.quiet,
        timeout_seconds: config.sources.timeout_seconds,
    };

    // Step 1: Load the canonical table
    info!("Mortality source: {}", sources.mortality);
    info!("Country code source: {}", sources.codes);
    if let Some(ref cache) = options.cache {
        debug!("Snapshot cache: {}", cache.dir().display());
    }
    let mut store = DatasetStore::new(sources, options);
    let dataset = store
        .get_or_load()
        .await
        .context("Failed to load the mortality dataset")?;

    let filter_options = analysis::FilterOptions::from_dataset(&dataset)
        .context("The mortality dataset has no rows")?;

    // Handle --list-options: print the filter choices and exit
    if args.list_options {
        let listing = report::generate_options_listing(&filter_options);
        write_output(config.general.output.as_deref(), &listing)?;
        return Ok(0);
    }

    // Step 2: Resolve the filters and build the panels
    let selection = config
        .filters
        .selection_request()
        .resolve(&dataset, &filter_options);
    debug!("Selection: {:?}", selection);

    let panels = analysis::build_panels(
        &dataset,
        args.page,
        &selection,
        config.analysis.totals_policy,
    );

    let metadata = ReportMetadata {
        generated_at: Utc::now(),
        mortality_source: store.sources().mortality.to_string(),
        codes_source: store.sources().codes.to_string(),
        page: args.page,
        year: selection.year,
        totals_policy: config.analysis.totals_policy,
    };

    let report = DashboardReport {
        metadata,
        load_stats: dataset.stats().clone(),
        panels,
    };

    for title in report.double_count_warnings() {
        warn!("{} sums rows that are themselves totals", title);
    }

    // Step 3: Render and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    write_output(config.general.output.as_deref(), &output)?;

    let duration = start_time.elapsed().as_secs_f64();
    if let Some(ref path) = config.general.output {
        if !args.quiet {
            let stats = &report.load_stats;
            println!("\n📊 Dashboard Summary:");
            println!("   Page: {} | Year: {}", report.metadata.page, selection.year);
            println!(
                "   Rows: {} loaded | {} dropped | {} backfilled",
                stats.rows_loaded,
                stats.rows_dropped,
                stats.number_filled + stats.death_rate_filled
            );
            println!("   Panels: {}", report.panels.len());
            println!("   Duration: {:.1}s", duration);
            println!("\n✅ Report saved to: {}", path);
        }
    }

    Ok(0)
}

/// A local file wins over the configured URL.
fn select_source(file: Option<&Path>, url: &str) -> DataSource {
    match file {
        Some(path) => DataSource::Local(path.to_path_buf()),
        None => DataSource::Remote(url.to_string()),
    }
}

/// Write to the given file, or to stdout when no file is configured.
fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path)),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

/// Where the configuration came from.
#[derive(Debug)]
enum ConfigOrigin {
    Explicit(PathBuf),
    DefaultFile,
    BuiltIn,
    /// The default file exists but could not be loaded.
    Fallback(anyhow::Error),
}

impl ConfigOrigin {
    /// Report the origin once logging is up.
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigOrigin::BuiltIn => debug!("No config file found, using defaults"),
            ConfigOrigin::Fallback(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` path must load. A broken default file falls back
/// to the built-in defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    Ok(match Config::load_default() {
        Ok(Some(config)) => (config, ConfigOrigin::DefaultFile),
        Ok(None) => (Config::default(), ConfigOrigin::BuiltIn),
        Err(e) => (Config::default(), ConfigOrigin::Fallback(e)),
    })
}
