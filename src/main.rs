mod config;
mod error;
mod indicator;
mod model;
mod provider;
mod render;
mod signal;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use model::MarketHistory;
use provider::yahoo::YahooProvider;
use provider::{MarketDataProvider, RetryPolicy, fetch_basket};
use render::{LEGEND, build_renderer};
use signal::{Analysis, SignalEngine};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("market data fetch failed")]
    Fetch,
    #[display("analysis refused")]
    Analysis,
    #[display("output error")]
    Render,
}

#[derive(Parser)]
#[command(
    name = "active-defense",
    about = "Trend, momentum and macro-defense signal for a leveraged index rotation"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Output format; overrides `general.output_format`
    #[arg(short, long, value_parser = ["text", "json"])]
    format: Option<String>,

    /// Print what each signal means and exit without fetching data
    #[arg(long)]
    legend: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();

    if cli.legend {
        print!("{LEGEND}");
        return Ok(());
    }

    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    let provider = build_provider(&config)?;
    let analysis = run_analysis(provider.as_ref(), &config, Utc::now()).await?;

    let format = cli
        .format
        .as_deref()
        .unwrap_or(config.general.output_format.as_str());
    let renderer = build_renderer(format);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    renderer
        .render(&analysis, &mut out)
        .change_context(AppError::Render)?;
    out.flush().change_context(AppError::Render)?;

    Ok(())
}

/// Logs go to stderr so stdout carries only the dashboard or JSON document.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_provider(config: &AppConfig) -> Result<Box<dyn MarketDataProvider>, Report<AppError>> {
    match config.provider.name.as_str() {
        "yahoo" => Ok(Box::new(
            YahooProvider::new(&config.provider).change_context(AppError::Config)?,
        )),
        other => Err(Report::new(AppError::Config).attach(format!("unknown provider: {other}"))),
    }
}

/// Fetch, validate and classify. Every failure is terminal for the run.
async fn run_analysis(
    provider: &dyn MarketDataProvider,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<Analysis, Report<AppError>> {
    let tickers = config.symbols.tickers();
    let policy = RetryPolicy {
        max_attempts: config.provider.max_attempts,
        delay: Duration::from_millis(config.provider.retry_delay_ms),
    };

    info!(
        provider = provider.name(),
        symbols = ?tickers,
        max_attempts = policy.max_attempts,
        "fetching market data"
    );

    let fetched = fetch_basket(provider, &tickers, policy)
        .await
        .change_context(AppError::Fetch)?;

    let history =
        MarketHistory::assemble(&config.symbols, fetched).change_context(AppError::Analysis)?;

    let engine = SignalEngine::from_config(config);
    let analysis = engine
        .analyze(&history, now)
        .change_context(AppError::Analysis)?;

    info!(
        signal = %analysis.record.signal,
        trend = %analysis.record.trend,
        defense = analysis.record.signal.is_defense(),
        as_of = %analysis.record.diagnostics.as_of,
        allocation = %analysis.record.allocation,
        "decision ready"
    );

    Ok(analysis)
}
