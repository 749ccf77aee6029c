//! filingsync CLI: reconcile SEC disclosure facts with market prices.
//!
//! Commands:
//! - `reconcile`: fetch facts and prices for a list of tickers, write the
//!   assets/prices tables, coverage report and manifest
//! - `universe`: print the built-in identifier universe as TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use filingsync_core::data::{
    CsvFactSource, CsvPriceSource, EdgarFactProvider, FactProvider, PriceProvider,
    YahooPriceProvider,
};
use filingsync_core::universe::{Universe, DEFAULT_GROUP};
use filingsync_core::BusinessCalendar;
use filingsync_runner::{save_outputs, CoverageReport, ReconcileConfig, Reconciler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "filingsync",
    about = "filingsync: align SEC filing dates with adjusted closing prices"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile disclosure facts with prices for the given identifiers.
    Reconcile(ReconcileArgs),
    /// Print the built-in identifier universe as TOML.
    Universe,
}

#[derive(Clone, Copy, ValueEnum)]
enum CalendarArg {
    WeekendsOnly,
    UsEquity,
}

impl From<CalendarArg> for BusinessCalendar {
    fn from(arg: CalendarArg) -> Self {
        match arg {
            CalendarArg::WeekendsOnly => BusinessCalendar::WeekendsOnly,
            CalendarArg::UsEquity => BusinessCalendar::UsEquity,
        }
    }
}

#[derive(clap::Args)]
struct ReconcileArgs {
    /// Tickers to reconcile (e.g., MMM AAPL BA).
    identifiers: Vec<String>,

    /// Ignore facts filed before January 1 of this year.
    #[arg(long)]
    start_year: Option<i32>,

    /// Path to a TOML config file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Universe TOML file to take identifiers from.
    #[arg(long, conflicts_with = "djia")]
    universe: Option<PathBuf>,

    /// Group within the universe file. Defaults to every group.
    #[arg(long, requires = "universe")]
    group: Option<String>,

    /// Use the built-in DJIA universe.
    #[arg(long, default_value_t = false)]
    djia: bool,

    /// Output directory. Defaults to the config value (./output).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Concurrent identifiers.
    #[arg(long)]
    workers: Option<usize>,

    /// Business-day calendar for filing-date adjustment.
    #[arg(long, value_enum)]
    calendar: Option<CalendarArg>,

    /// Contact string sent to SEC EDGAR (e.g., "Jane Analyst jane@example.com").
    #[arg(long, env = "FILINGSYNC_IDENTITY")]
    identity: Option<String>,

    /// Read facts from a CSV file instead of SEC EDGAR.
    #[arg(long)]
    facts_csv: Option<PathBuf>,

    /// Read prices from a CSV file instead of Yahoo Finance.
    #[arg(long)]
    prices_csv: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile(args) => run_reconcile(args),
        Commands::Universe => run_universe(),
    }
}

fn run_universe() -> Result<()> {
    let toml = Universe::djia()
        .to_toml()
        .context("failed to render built-in universe")?;
    print!("{toml}");
    Ok(())
}

fn run_reconcile(args: ReconcileArgs) -> Result<()> {
    let config = build_config(&args)?;
    let identifiers = collect_identifiers(&args)?;

    let facts: Arc<dyn FactProvider> = match &args.facts_csv {
        Some(path) => Arc::new(
            CsvFactSource::from_path(path)
                .with_context(|| format!("failed to load facts from {}", path.display()))?,
        ),
        None => {
            let identity = config.require_identity()?;
            Arc::new(
                EdgarFactProvider::new(identity, &config.fetch)
                    .context("failed to set up SEC EDGAR client")?,
            )
        }
    };
    let prices: Arc<dyn PriceProvider> = match &args.prices_csv {
        Some(path) => Arc::new(
            CsvPriceSource::from_path(path)
                .with_context(|| format!("failed to load prices from {}", path.display()))?,
        ),
        None => Arc::new(
            YahooPriceProvider::new(&config.fetch)
                .context("failed to set up Yahoo Finance client")?,
        ),
    };

    let reconciler = Reconciler::new(facts, prices, config);
    let output = reconciler.run_configured(&identifiers)?;

    // Outputs go to disk before the exit status is decided.
    let config = reconciler.config();
    let saved = save_outputs(&output, &config.output, &config.run_id())?;

    print_summary(&output.coverage);
    println!("Outputs saved to: {}", saved.dir.display());

    if !output.any_succeeded() {
        eprintln!("No identifier succeeded.");
        std::process::exit(1);
    }
    Ok(())
}

fn build_config(args: &ReconcileArgs) -> Result<ReconcileConfig> {
    let mut config = match &args.config {
        Some(path) => ReconcileConfig::from_file(path)?,
        None => ReconcileConfig::default(),
    };
    if let Some(year) = args.start_year {
        config.start_year = year;
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(calendar) = args.calendar {
        config.calendar = calendar.into();
    }
    if let Some(identity) = &args.identity {
        config.identity = Some(identity.clone());
    }
    config.validate()?;
    Ok(config)
}

fn collect_identifiers(args: &ReconcileArgs) -> Result<Vec<String>> {
    let mut identifiers = args.identifiers.clone();

    if args.djia {
        let universe = Universe::djia();
        identifiers.extend(universe.group(DEFAULT_GROUP)?.iter().cloned());
    }
    if let Some(path) = &args.universe {
        let universe = Universe::from_file(path)?;
        match &args.group {
            Some(group) => identifiers.extend(universe.group(group)?.iter().cloned()),
            None => identifiers.extend(universe.all_identifiers().into_iter().map(String::from)),
        }
    }

    if identifiers.is_empty() {
        bail!("no identifiers given; pass tickers, --universe <file>, or --djia");
    }
    Ok(identifiers)
}

fn print_summary(coverage: &CoverageReport) {
    println!();
    println!("=== Reconciliation Summary ===");
    println!("{coverage}");
    for issue in coverage.issues() {
        println!(
            "  {:<6} {:<8} {:<16} {}",
            issue.identifier, issue.stage, issue.category, issue.message
        );
    }
    println!();
}
