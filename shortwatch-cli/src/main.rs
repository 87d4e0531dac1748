//! Shortwatch CLI — daily ASX short-interest run and history tools.
//!
//! Commands:
//! - `run`: fetch, score, persist and publish one day
//! - `cover`: covering leaderboard over the last N report days
//! - `history status`: files and date ranges per history category
//! - `config show`: the effective configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shortwatch_core::domain::{GrossRow, PositionRow};
use shortwatch_core::{AlertConfig, SectorMap};
use shortwatch_runner::covering::covering_scores;
use shortwatch_runner::history::{
    GrossHistoryRecord, HistoryRecord, HistoryStore, PositionHistoryRecord,
};
use shortwatch_runner::{run_daily, RunOptions, Sources};

#[derive(Parser)]
#[command(
    name = "shortwatch",
    about = "Shortwatch — ASX short-selling signals from public disclosures"
)]
struct Cli {
    /// Log level when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily pipeline.
    Run {
        /// Alert configuration (defaults apply when missing).
        #[arg(long, default_value = "config/alerts.toml")]
        config: PathBuf,

        /// History, archive and signal CSV directory.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Report and API output directory.
        #[arg(long, default_value = "docs")]
        docs_dir: PathBuf,

        /// Run for this AWST date (YYYY-MM-DD) instead of today.
        #[arg(long)]
        as_of: Option<String>,

        /// Read source documents from this directory instead of the network.
        #[arg(long)]
        offline_dir: Option<PathBuf>,

        /// Skip volume lookups (days to cover stays 0).
        #[arg(long, default_value_t = false)]
        no_adv: bool,

        /// `Code,Sector` CSV.
        #[arg(long, default_value = "config/sectors.csv")]
        sectors: PathBuf,
    },
    /// Rank covering activity over the last N report days of history.
    Cover {
        #[arg(long)]
        window: usize,

        /// Rows to print.
        #[arg(long, default_value_t = 25)]
        top: usize,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// History store commands.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Report file counts and date ranges per category.
    Status {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show {
        #[arg(long, default_value = "config/alerts.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            docs_dir,
            as_of,
            offline_dir,
            no_adv,
            sectors,
        } => run_cmd(
            &config,
            data_dir,
            docs_dir,
            as_of.as_deref(),
            offline_dir.as_deref(),
            no_adv,
            &sectors,
        ),
        Commands::Cover {
            window,
            top,
            data_dir,
        } => run_cover(&data_dir, window, top),
        Commands::History { action } => match action {
            HistoryAction::Status { data_dir } => run_history_status(&data_dir),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { config } => run_config_show(&config),
        },
    }
}

/// `RUST_LOG` wins over `--log-level`. Logs go to stderr.
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to init logging: {e}"))
}

fn load_config(path: &Path) -> Result<AlertConfig> {
    AlertConfig::from_file_or_default(path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

fn run_cmd(
    config_path: &Path,
    data_dir: PathBuf,
    docs_dir: PathBuf,
    as_of: Option<&str>,
    offline_dir: Option<&Path>,
    no_adv: bool,
    sectors_path: &Path,
) -> Result<()> {
    let cfg = load_config(config_path)?;
    let sectors = SectorMap::from_csv_file(sectors_path)
        .with_context(|| format!("Failed to read sector map {}", sectors_path.display()))?;

    let mut opts = RunOptions::new(data_dir, docs_dir);
    if let Some(s) = as_of {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid --as-of date '{s}', expected YYYY-MM-DD"))?;
        opts = opts.with_as_of(date);
    }

    let sources = match offline_dir {
        Some(dir) => {
            if !no_adv {
                tracing::info!("offline run, volume lookups disabled");
            }
            Sources::offline(dir, &cfg.sources)
        }
        None => Sources::live(&cfg.sources, !no_adv).context("Failed to build HTTP client")?,
    };

    let summary = run_daily(&cfg, &sectors, &sources, &opts)?;

    println!("Gross shorts     {}  {} rows", summary.gross_date, summary.gross_rows);
    match summary.prev_positions_date {
        Some(prev) => println!(
            "Short positions  {}  {} rows (vs {prev})",
            summary.positions_date, summary.position_rows
        ),
        None => println!(
            "Short positions  {}  {} rows (no previous day)",
            summary.positions_date, summary.position_rows
        ),
    }
    for (window, codes) in &summary.covering {
        println!("Covering {window:>2}d      {codes} codes");
    }
    if summary.unknown_sectors > 0 {
        println!("Unmapped sectors {}", summary.unknown_sectors);
    }
    println!("Report written to: {}", opts.docs_dir.join("index.md").display());
    println!();
    println!("{}", summary.notification);

    Ok(())
}

fn run_cover(data_dir: &Path, window: usize, top: usize) -> Result<()> {
    let store = HistoryStore::new(data_dir);
    let rows = covering_scores(&store, window)
        .with_context(|| format!("Failed to read position history in {}", data_dir.display()))?;

    if rows.is_empty() {
        println!("No position history in {}", store.dir::<PositionHistoryRecord>().display());
        return Ok(());
    }

    println!("Covering leaderboard, last {window} report days");
    println!(
        "{:<8} {:>10} {:>9} {:>8} {:>14} {:>9}",
        "Code", "Score", "NegDays", "ΣΔpp", "ΣΔshares", "%short"
    );
    for r in rows.iter().take(top) {
        println!(
            "{:<8} {:>10.2} {:>9} {:>8.2} {:>14.0} {:>9.2}",
            r.code, r.cover_score, r.neg_days, r.cov_neg_pp, r.cov_neg_shares, r.pct_short_pp
        );
    }
    Ok(())
}

fn run_history_status(data_dir: &Path) -> Result<()> {
    let store = HistoryStore::new(data_dir);
    if !data_dir.exists() {
        println!("Data directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    println!("Data directory: {}", data_dir.display());
    print_status::<GrossHistoryRecord>(&store)?;
    print_status::<PositionHistoryRecord>(&store)?;
    print_status::<GrossRow>(&store)?;
    print_status::<PositionRow>(&store)?;
    Ok(())
}

fn print_status<R: HistoryRecord>(store: &HistoryStore) -> Result<()> {
    let s = store.summary::<R>()?;
    match (s.first, s.last) {
        (Some(first), Some(last)) => println!(
            "  {:<18} {:>4} files  {:>4} days  {first} .. {last}",
            s.dir, s.files, s.days
        ),
        _ => println!("  {:<18} empty", s.dir),
    }
    Ok(())
}

fn run_config_show(path: &Path) -> Result<()> {
    let cfg = load_config(path)?;
    let text = toml::to_string_pretty(&cfg).context("Failed to render config")?;
    print!("{text}");
    Ok(())
}
