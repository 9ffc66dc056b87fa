//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvPriceAdapter, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{build_plan, PortfolioKind, PortfolioPlan};
use crate::domain::error::LotfolioError;
use crate::domain::metrics::Metrics;
use crate::domain::tax::TaxRegime;
use crate::ports::data_port::PriceSource;
use crate::ports::report_port::ReportSink;

#[derive(Parser, Debug)]
#[command(name = "lotfolio", about = "Portfolio backtester with FIFO lots and deferred tax")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Wide CSV: date column, then one price column per instrument
        #[arg(short, long)]
        prices: PathBuf,
        /// Valuation CSV; written to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Trade event log CSV
        #[arg(long)]
        events: Option<PathBuf>,
        /// Ignore price rows after this date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// Validate a portfolio configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show instruments and date range of a price file
    Info {
        #[arg(short, long)]
        prices: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            prices,
            output,
            events,
            until,
        } => run_backtest(&config, &prices, output.as_ref(), events.as_ref(), until),
        Command::Validate { config } => run_validate(&config),
        Command::Info { prices } => run_info(&prices),
    }
}

pub fn load_plan(path: &PathBuf) -> Result<PortfolioPlan, LotfolioError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    build_plan(&adapter)
}

fn run_backtest(
    config_path: &PathBuf,
    prices_path: &PathBuf,
    output_path: Option<&PathBuf>,
    events_path: Option<&PathBuf>,
    until: Option<NaiveDate>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let plan = match load_plan(config_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 2: Load prices
    let prices = match CsvPriceAdapter::new(prices_path.clone()).load_prices() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let prices = plan.prepare(match until {
        Some(date) => prices.truncate_after(date),
        None => prices,
    });

    // Stage 3: Run
    eprintln!(
        "Running {} backtest over {} dates",
        kind_label(plan.kind),
        prices.len()
    );
    let result = match plan.backtest(&prices) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Summary
    if let Some(metrics) = Metrics::compute(&result) {
        print_summary(&metrics, matches!(plan.tax, TaxRegime::FlatRate(_)));
    }

    // Stage 5: Output
    let mut sink = match output_path {
        Some(path) => CsvReportAdapter::new(path.clone()),
        None => CsvReportAdapter::stdout(),
    };
    if let Some(events) = events_path {
        sink = sink.with_events(events.clone());
    }
    let written = sink
        .write_valuation(&result.valuation)
        .and_then(|()| sink.write_events(&result.events));
    if let (Ok(()), Some(path)) = (&written, output_path) {
        eprintln!("\nValuation written to: {}", path.display());
    }

    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: failed to write output: {e}");
            (&e).into()
        }
    }
}

fn print_summary(metrics: &Metrics, taxed: bool) {
    eprintln!("\n=== Results ===");
    eprintln!("Period:           {} to {}", metrics.start_date, metrics.end_date);
    eprintln!("Start Value:      {:.2}", metrics.start_value);
    eprintln!("End Value:        {:.2}", metrics.end_value);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("CAGR:             {:.2}%", metrics.cagr * 100.0);
    match &metrics.max_drawdown {
        Some(dd) => eprintln!(
            "Max Drawdown:     -{:.1}% ({} to {})",
            dd.percent, dd.peak, dd.trough
        ),
        None => eprintln!("Max Drawdown:     none"),
    }
    if metrics.entries + metrics.exits > 0 {
        eprintln!("Signal Trades:    {} entries, {} exits", metrics.entries, metrics.exits);
    }
    if taxed {
        eprintln!("Tax Paid:         {:.2}", metrics.tax_paid);
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating portfolio: {}", config_path.display());
    let plan = match load_plan(config_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nPortfolio ({}):", kind_label(plan.kind));
    eprintln!("  start value: {:.2}", plan.settings.start_value);
    match &plan.settings.rebalancing {
        Some(s) if s.offset.is_zero() => eprintln!("  rebalancing: every {}", s.period),
        Some(s) => eprintln!(
            "  rebalancing: every {}, first shifted by {}",
            s.period, s.offset
        ),
        None => eprintln!("  rebalancing: none"),
    }
    if plan.settings.spread > 0.0 {
        eprintln!("  spread:      {:.4}", plan.settings.spread);
    }
    match &plan.tax {
        TaxRegime::Untaxed(_) => eprintln!("  tax:         none"),
        TaxRegime::FlatRate(m) => eprintln!("  tax:         flat {}%", m.rate()),
    }

    eprintln!("\nLegs:");
    for leg in &plan.legs {
        if leg.is_gated() {
            eprintln!(
                "  {}: {}% while {} >= MA({})",
                leg.name,
                leg.weight,
                leg.reference(),
                leg.window()
            );
        } else {
            eprintln!("  {}: {}%", leg.name, leg.weight);
        }
    }

    eprintln!("\nPortfolio configuration is valid.");
    ExitCode::SUCCESS
}

fn run_info(prices_path: &PathBuf) -> ExitCode {
    let prices = match CsvPriceAdapter::new(prices_path.clone()).load_prices() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match (prices.dates().first(), prices.dates().last()) {
        (Some(first), Some(last)) => {
            println!("{} rows from {} to {}", prices.len(), first, last);
        }
        _ => println!("no rows"),
    }
    for name in prices.names() {
        println!("{}", name);
    }
    ExitCode::SUCCESS
}

fn kind_label(kind: PortfolioKind) -> &'static str {
    match kind {
        PortfolioKind::FixedWeight => "fixed-weight",
        PortfolioKind::SignalGated => "signal-gated",
    }
}
