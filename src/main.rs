//! Top gainers metrics report.
//!
//! # Usage
//!
//! ```bash
//! # Regenerate README.md from today's top gainers (archives the old one)
//! gainers-report update
//!
//! # Report on a fixed list instead of the gainers list
//! gainers-report update --symbols RELIANCE,TCS,INFY --output REPORT.md
//!
//! # Show the current gainers list
//! gainers-report gainers --limit 10
//!
//! # Metrics for a single symbol
//! gainers-report metrics --symbol SBIN
//!
//! # Write a config file with every default spelled out
//! gainers-report init-config --path gainers.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use gainers_report::config::{load_config, AppConfig};
use gainers_report::data::{LookbackWindow, NSEClient, NSEError};
use gainers_report::metrics::{MetricsCalculator, MetricsOutcome};
use gainers_report::report::assembler::ist;
use gainers_report::report::{format_timestamp, ReportAssembler, ReportWriter};

const SEPARATOR: &str = "============================================================";

/// Daily metrics report for top gaining NSE stocks.
#[derive(Parser)]
#[command(name = "gainers-report")]
#[command(about = "Build a markdown metrics report for the day's top gaining stocks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults apply if absent)
    #[arg(long, default_value = "gainers.toml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch data, compute metrics and rewrite the report
    Update {
        /// Report file to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for archived reports
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Number of gainers to include
        #[arg(short, long)]
        limit: Option<usize>,

        /// Calendar days of price history
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Comma-separated symbols to use instead of the gainers list
        #[arg(long)]
        symbols: Option<String>,
    },

    /// List the current top gainers
    Gainers {
        /// Number of gainers to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print metrics for one symbol
    Metrics {
        /// Exchange symbol
        #[arg(short, long)]
        symbol: String,

        /// Calendar days of price history
        #[arg(long)]
        lookback_days: Option<u32>,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Destination path
        #[arg(long, default_value = "gainers.toml")]
        path: PathBuf,
    },
}

fn split_symbols(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

async fn cmd_update(
    mut config: AppConfig,
    output: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
    limit: Option<usize>,
    lookback_days: Option<u32>,
    symbols: Option<String>,
) -> Result<()> {
    if let Some(output) = output {
        config.report.output_path = output;
    }
    if let Some(dir) = archive_dir {
        config.report.archive_dir = dir;
    }
    if let Some(limit) = limit {
        config.report.max_symbols = limit;
    }
    if let Some(days) = lookback_days {
        config.report.lookback_days = days;
    }

    let now = Utc::now();
    let mut client = NSEClient::new(&config.provider).context("Failed to build HTTP client")?;

    let symbols = match symbols {
        Some(list) => {
            if let Err(e) = client.warm_up().await {
                warn!("Session warm-up failed: {}", e);
            }
            split_symbols(&list)
        }
        None => {
            client
                .warm_up()
                .await
                .context("Failed to open a session with the exchange")?;
            client
                .top_gainers(config.report.max_symbols)
                .await
                .context("Failed to fetch the top gainers list")?
                .into_iter()
                .map(|g| g.symbol)
                .collect()
        }
    };
    info!("Building report for {} symbols", symbols.len());

    let window = LookbackWindow::ending_on(
        now.with_timezone(&ist()).date_naive(),
        config.report.lookback_days,
    );
    let mut fetched = client.fetch_all(&symbols, window).await.into_iter();

    let report = ReportAssembler::new(config.report.title.as_str()).build(
        &symbols,
        &format_timestamp(&now),
        |symbol| match fetched.next() {
            Some((fetched_symbol, result)) if fetched_symbol == symbol => result,
            _ => Err(NSEError::NoData {
                symbol: symbol.to_string(),
            }),
        },
    );

    let writer = ReportWriter::new(&config.report.output_path, &config.report.archive_dir);
    let outcome = writer
        .publish(&report, &now)
        .context("Failed to publish report")?;

    println!("{}", SEPARATOR);
    println!("Report written: {}", outcome.report_path.display());
    if let Some(archived) = &outcome.archived {
        println!("Previous report archived: {}", archived.display());
    }
    println!("{}", report.summary());
    println!("Requests made: {}", client.request_count());
    println!("{}", SEPARATOR);

    Ok(())
}

async fn cmd_gainers(config: AppConfig, limit: Option<usize>) -> Result<()> {
    let mut client = NSEClient::new(&config.provider).context("Failed to build HTTP client")?;
    client
        .warm_up()
        .await
        .context("Failed to open a session with the exchange")?;

    let gainers = client
        .top_gainers(limit.unwrap_or(config.report.max_symbols))
        .await
        .context("Failed to fetch the top gainers list")?;

    println!("{}", SEPARATOR);
    println!("Top gainers ({})", config.provider.index);
    println!("{}", SEPARATOR);
    for (rank, quote) in gainers.iter().enumerate() {
        println!(
            "{:>3}. {:<15} {:>12.2} {:>+8.2}%",
            rank + 1,
            quote.symbol,
            quote.last_price,
            quote.change_pct
        );
    }

    Ok(())
}

async fn cmd_metrics(config: AppConfig, symbol: String, lookback_days: Option<u32>) -> Result<()> {
    let mut client = NSEClient::new(&config.provider).context("Failed to build HTTP client")?;
    if let Err(e) = client.warm_up().await {
        warn!("Session warm-up failed: {}", e);
    }

    let symbol = symbol.trim().to_uppercase();
    let days = lookback_days.unwrap_or(config.report.lookback_days);
    let window = LookbackWindow::ending_on(Utc::now().with_timezone(&ist()).date_naive(), days);

    println!("{}", SEPARATOR);
    println!("{} ({} to {})", symbol, window.start, window.end);
    println!("{}", SEPARATOR);

    let outcome = match client.closing_prices(&symbol, window).await {
        Ok(prices) => {
            println!("Trading days: {}", prices.len());
            MetricsCalculator::compute(&prices)
        }
        Err(e) => {
            warn!("{}: {}", symbol, e);
            MetricsOutcome::Unavailable
        }
    };

    match outcome {
        MetricsOutcome::Available(metrics) => println!("{}", metrics.summary()),
        MetricsOutcome::Unavailable => println!("Metrics unavailable"),
    }

    Ok(())
}

fn read_config(path: &Path) -> Result<AppConfig> {
    load_config(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn cmd_init_config(path: PathBuf) -> Result<()> {
    AppConfig::default()
        .save_to_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gainers_report=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { path } => cmd_init_config(path)?,
        Commands::Update {
            output,
            archive_dir,
            limit,
            lookback_days,
            symbols,
        } => {
            let config = read_config(&cli.config)?;
            cmd_update(config, output, archive_dir, limit, lookback_days, symbols).await?;
        }
        Commands::Gainers { limit } => cmd_gainers(read_config(&cli.config)?, limit).await?,
        Commands::Metrics {
            symbol,
            lookback_days,
        } => cmd_metrics(read_config(&cli.config)?, symbol, lookback_days).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_symbols() {
        assert_eq!(
            split_symbols(" sbin, TCS ,,infy"),
            vec!["SBIN".to_string(), "TCS".to_string(), "INFY".to_string()]
        );
    }

    #[test]
    fn test_cli_parses_update() {
        let cli = Cli::parse_from(["gainers-report", "update", "--limit", "5", "--symbols", "A,B"]);
        match cli.command {
            Commands::Update { limit, symbols, .. } => {
                assert_eq!(limit, Some(5));
                assert_eq!(symbols.as_deref(), Some("A,B"));
            }
            _ => panic!("expected update"),
        }
        assert_eq!(cli.config, PathBuf::from("gainers.toml"));
    }
}
