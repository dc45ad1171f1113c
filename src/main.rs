//! RVOL Screener - Main Entry Point
//!
//! CLI over the scanner surface: rank the configured universe by relative
//! volume, or quote a single symbol. The paper portfolio ledger is a library
//! concern consumed by the serving layer above this crate.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rvol_screener::config::Config;
use rvol_screener::market::YahooFinanceClient;
use rvol_screener::scanner::{RvolScanner, ScanResult};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// RVOL Screener CLI
#[derive(Parser)]
#[command(name = "rvol-screener")]
#[command(version, about = "Rank equities by relative volume")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the configured universe and print the ranked results
    Scan {
        /// Number of entries to print
        #[arg(short, long)]
        count: Option<usize>,

        /// Only print symbols classified as gems
        #[arg(long)]
        gems_only: bool,
    },

    /// Print the RVOL quote for a single symbol
    Quote {
        /// Symbol in provider format, e.g. RELIANCE.NS
        symbol: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate()?;

    info!(
        "RVOL Screener v{} - {} symbols in universe",
        env!("CARGO_PKG_VERSION"),
        config.scanner.universe.len()
    );

    let provider = Arc::new(YahooFinanceClient::new(&config.market)?);
    let scanner = RvolScanner::new(provider, config.scanner.clone());

    match cli.command {
        Some(Commands::Quote { symbol }) => run_quote(&scanner, &symbol).await,
        Some(Commands::Scan { count, gems_only }) => {
            run_scan(&scanner, count.unwrap_or(config.scanner.top_count), gems_only).await
        }
        None => run_scan(&scanner, config.scanner.top_count, false).await,
    }
}

async fn run_scan(scanner: &RvolScanner, count: usize, gems_only: bool) -> Result<()> {
    let mut results = scanner.top_n(count).await;
    if gems_only {
        results.retain(|r| r.is_gem);
    }

    if results.is_empty() {
        println!("No scannable symbols (insufficient history or feed unavailable).");
        return Ok(());
    }

    println!(
        "{:<16} {:>8} {:>12} {:>9} {:>14}  {}",
        "SYMBOL", "RVOL", "PRICE", "CHG%", "VOLUME", ""
    );
    for result in &results {
        print_row(result);
    }
    Ok(())
}

fn print_row(result: &ScanResult) {
    let quote = &result.quote;
    println!(
        "{:<16} {:>8.2} {:>12.2} {:>9.2} {:>14}  {}",
        quote.symbol,
        quote.rvol,
        quote.current_price,
        quote.price_change_pct,
        quote.volume,
        if result.is_gem { "GEM" } else { "" }
    );
}

async fn run_quote(scanner: &RvolScanner, symbol: &str) -> Result<()> {
    let quote = scanner.compute_signal(symbol).await?;
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

/// Initialize logging with file output alongside stderr.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "rvol-screener.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the program duration.
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rvol_screener=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stderr.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}
