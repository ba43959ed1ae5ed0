//! alphasim CLI — backtest runs and the paper-trading account.
//!
//! Four verbs, per the paper-runner's external interface:
//! - `config` — write `paper/config.json`
//! - `run --trade-date YYYYMMDD` — execute one paper-trading tick
//! - `positions --trade-date YYYYMMDD` — print current positions, marked to market
//! - `backtest` — run a full-history backtest from a TOML config and print its summary
//!
//! Data ingestion, feature construction, and the predictive model are
//! external collaborators (see `alphasim-core`'s `Ranker` trait); this CLI
//! reads bars/features/calendar from flat JSON files and ranks with a
//! built-in momentum ranker so the tool is runnable standalone. A real
//! deployment swaps `MomentumRanker` for its own `Ranker` implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use alphasim_core::domain::{Bar, Ticker};
use alphasim_core::signal_pipeline::{FeatureTable, Ranker};
use alphasim_runner::config::BacktestConfig;
use alphasim_runner::paper::{PaperConfig, PaperRunner, TickOutcome};
use alphasim_runner::runner::Runner;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "alphasim", about = "Daily A-share strategy simulation and paper-trading runner")]
struct Cli {
    /// Root directory for the paper-trading account's persisted state.
    #[arg(long, global = true, default_value = "paper")]
    paper_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write paper/config.json.
    Config {
        #[arg(long, default_value_t = 5)]
        top_n: usize,
        #[arg(long, default_value_t = 500_000.0)]
        initial_capital: f64,
        #[arg(long, default_value_t = 5)]
        rebalance_freq: u32,
        #[arg(long)]
        stop_loss_enabled: bool,
        #[arg(long)]
        equity_curve_enabled: bool,
        #[arg(long)]
        risk_budget_enabled: bool,
    },
    /// Execute one paper-trading tick.
    Run {
        #[arg(long)]
        trade_date: String,
        /// JSON array of YYYYMMDD trading-calendar dates.
        #[arg(long)]
        calendar: PathBuf,
        /// JSON array of Bar records.
        #[arg(long)]
        bars: PathBuf,
        /// Comma-separated ticker universe.
        #[arg(long, value_delimiter = ',')]
        universe: Vec<String>,
        /// JSON object of per-ticker feature maps for the trade date.
        #[arg(long)]
        features: Option<PathBuf>,
    },
    /// Print current positions, marked to market.
    Positions {
        #[arg(long)]
        trade_date: String,
        #[arg(long)]
        bars: PathBuf,
    },
    /// Run a full-history backtest from a TOML config.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        bars: PathBuf,
        #[arg(long)]
        calendar: PathBuf,
        #[arg(long)]
        features: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Config {
            top_n,
            initial_capital,
            rebalance_freq,
            stop_loss_enabled,
            equity_curve_enabled,
            risk_budget_enabled,
        } => {
            let config = PaperConfig {
                top_n,
                initial_capital: rust_decimal::Decimal::try_from(initial_capital)
                    .context("initial_capital must be finite")?,
                rebalance_freq,
                stop_loss_enabled,
                equity_curve_enabled,
                risk_budget_enabled,
                ..PaperConfig::default()
            };
            let runner = PaperRunner::new(&cli.paper_dir);
            runner.init(&config)?;
            println!("wrote {}", cli.paper_dir.join("config.json").display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { trade_date, calendar, bars, universe, features } => {
            let date = parse_trade_date(&trade_date)?;
            let calendar = load_calendar(&calendar)?;
            let bars = load_bars(&bars)?;
            let universe: Vec<Ticker> = universe.into_iter().map(Ticker::new).collect();
            let features = match features {
                Some(path) => load_features(&path)?,
                None => FeatureTable::new(),
            };

            let runner = PaperRunner::new(&cli.paper_dir);
            let outcome = runner.tick(&calendar, date, &universe, bars, &features, &MomentumRanker)?;
            match outcome {
                TickOutcome::Executed { date } => println!("tick executed for {date}"),
                TickOutcome::AlreadyDone { date } => println!("tick for {date} already completed, no-op"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Positions { trade_date, bars } => {
            let date = parse_trade_date(&trade_date)?;
            let bars = load_bars(&bars)?;
            let runner = PaperRunner::new(&cli.paper_dir);
            let portfolio = runner.positions(date, &bars)?;
            let summary: Vec<_> = portfolio
                .positions
                .iter()
                .map(|(ticker, lot)| {
                    serde_json::json!({
                        "ticker": ticker.as_str(),
                        "shares": lot.shares,
                        "buy_pnl_price": lot.buy_pnl_price,
                        "high_water_pnl_price": lot.high_water_pnl_price,
                    })
                })
                .collect();
            let out = serde_json::json!({
                "as_of": date,
                "cash": portfolio.cash,
                "positions": summary,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Backtest { config, bars, calendar, features } => {
            let config = BacktestConfig::load_toml(&config)?;
            let calendar = load_calendar(&calendar)?;
            let bars = load_bars(&bars)?;
            let features = match features {
                Some(path) => {
                    let raw: HashMap<String, HashMap<String, HashMap<String, f64>>> =
                        serde_json::from_str(&std::fs::read_to_string(&path)?)?;
                    raw.into_iter()
                        .map(|(date, by_ticker)| {
                            let date = NaiveDate::parse_from_str(&date, "%Y%m%d")
                                .expect("feature file dates must be YYYYMMDD");
                            let mut table = FeatureTable::new();
                            for (ticker, row) in by_ticker {
                                for (feature, value) in row {
                                    table.insert(Ticker::new(ticker.clone()), feature, value);
                                }
                            }
                            (date, table)
                        })
                        .collect()
                }
                None => HashMap::new(),
            };
            let result =
                Runner::run_backtest(&config, calendar, bars, &features, &MomentumRanker)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_trade_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .with_context(|| format!("--trade-date must be YYYYMMDD, got '{raw}'"))
}

fn load_calendar(path: &Path) -> Result<Vec<NaiveDate>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read calendar file {}", path.display()))?;
    let dates: Vec<String> = serde_json::from_str(&raw)?;
    dates
        .into_iter()
        .map(|d| NaiveDate::parse_from_str(&d, "%Y%m%d").map_err(Into::into))
        .collect()
}

fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bars file {}", path.display()))?;
    Ok(serde_json::from_str(&raw)?)
}

fn load_features(path: &Path) -> Result<FeatureTable> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read features file {}", path.display()))?;
    let by_ticker: HashMap<String, HashMap<String, f64>> = serde_json::from_str(&raw)?;
    let mut table = FeatureTable::new();
    for (ticker, row) in by_ticker {
        for (feature, value) in row {
            table.insert(Ticker::new(ticker.clone()), feature, value);
        }
    }
    Ok(table)
}

/// A minimal, standalone ranker scoring candidates by their "momentum"
/// feature — a concrete default so the CLI is runnable without a caller
/// supplying their own `Ranker`. Production deployments are expected to
/// replace this with their own fitted model.
struct MomentumRanker;

impl Ranker for MomentumRanker {
    fn generate_ranked(
        &self,
        _date: NaiveDate,
        universe: &[Ticker],
        features: &FeatureTable,
    ) -> Vec<(Ticker, f64)> {
        universe
            .iter()
            .map(|t| (t.clone(), features.get(t, "momentum").unwrap_or(0.0)))
            .collect()
    }
}
