//! Tradescope
//!
//! Analyzes trading performance from CSV/Excel trade history exports:
//! P&L statistics, drawdown, trading frequency, position changes, risk
//! metrics, and a JSON report.

mod analysis;
mod data;
mod models;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::analysis::TradeAnalyzer;
use crate::data::{export_table, ExportFormat, TradeDataProcessor};
use crate::models::{FilterSpec, TradeType};
use crate::report::Report;

/// Trade analysis CLI.
#[derive(Parser)]
#[command(name = "tradescope")]
#[command(about = "Analyze trading performance from trade history exports", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and write a JSON report
    Analyze {
        /// Trade history file (.csv, .xlsx, .xls)
        file: PathBuf,

        /// Worksheet name for Excel inputs (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Directory for the JSON report
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Number of best/worst trades to list
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Include the monthly performance table
        #[arg(long)]
        monthly: bool,

        /// Skip writing the JSON report
        #[arg(long)]
        no_report: bool,
    },

    /// Show a data summary without running the analysis
    Summary {
        /// Trade history file (.csv, .xlsx, .xls)
        file: PathBuf,

        /// Worksheet name for Excel inputs (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Filter the standardized table and export it
    Export {
        /// Trade history file (.csv, .xlsx, .xls)
        input: PathBuf,

        /// Destination file; format follows the extension (.csv, .xlsx)
        output: PathBuf,

        /// Worksheet name for Excel inputs (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Keep trades on or after this date (YYYY-MM-DD or full timestamp)
        #[arg(long)]
        start: Option<String>,

        /// Keep trades on or before this date
        #[arg(long)]
        end: Option<String>,

        /// Keep trades of this type (Open, Close, Flip, Other, Unknown)
        #[arg(long)]
        trade_type: Option<String>,

        /// Keep trades with at least this size
        #[arg(long)]
        min_size: Option<f64>,

        /// Keep trades with at most this size
        #[arg(long)]
        max_size: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Analyze {
            file,
            sheet,
            output,
            top,
            monthly,
            no_report,
        } => {
            let mut processor = TradeDataProcessor::new();
            let table = processor
                .load(&file, sheet.as_deref())
                .with_context(|| format!("failed to load {}", file.display()))?;

            let analyzer = TradeAnalyzer::new(table);
            print_analysis(&analyzer, top);

            if monthly {
                print_monthly(&analyzer);
            }

            if !no_report {
                let report = Report::generate(&analyzer);
                let path = report
                    .save(&output)
                    .with_context(|| format!("failed to write report to {}", output.display()))?;
                println!("\nReport saved: {}", path.display());
            }
        }

        Commands::Summary { file, sheet } => {
            let mut processor = TradeDataProcessor::new();
            processor
                .load(&file, sheet.as_deref())
                .with_context(|| format!("failed to load {}", file.display()))?;

            let summary = processor.summary()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Export {
            input,
            output,
            sheet,
            start,
            end,
            trade_type,
            min_size,
            max_size,
        } => {
            let format = ExportFormat::from_path(&output)
                .with_context(|| format!("unsupported export extension: {}", output.display()))?;

            let mut processor = TradeDataProcessor::new();
            processor
                .load(&input, sheet.as_deref())
                .with_context(|| format!("failed to load {}", input.display()))?;

            let spec = FilterSpec {
                start_date: start.as_deref().map(parse_cli_date).transpose()?,
                end_date: end.as_deref().map(parse_cli_date).transpose()?,
                trade_type: trade_type
                    .as_deref()
                    .map(|s| TradeType::parse(s).with_context(|| format!("unknown trade type: {s}")))
                    .transpose()?,
                min_size,
                max_size,
            };

            let filtered = processor.filter(&spec)?;
            info!(
                rows = filtered.len(),
                total = processor.data().map(|t| t.len()).unwrap_or(0),
                "filtered trades"
            );

            export_table(&filtered, &output, format)?;
            println!("Exported: {}", output.display());
        }
    }

    Ok(())
}

/// Parse a CLI date argument: a bare day becomes midnight.
fn parse_cli_date(s: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    let date =
        NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date: {s}"))?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

fn print_analysis(analyzer: &TradeAnalyzer, top: usize) {
    println!("\n=== Data Overview ===");
    println!("Total Trades:   {}", analyzer.table().len());
    if let Some((start, end)) = analyzer.table().date_span() {
        println!("From:           {}", start.format("%Y-%m-%d %H:%M:%S"));
        println!("To:             {}", end.format("%Y-%m-%d %H:%M:%S"));
    }

    match analyzer.pnl_statistics() {
        Ok(stats) => {
            println!("\n--- P&L Analysis ---");
            println!("Total P&L:      {:.2}", stats.total_pnl);
            println!("Average P&L:    {:.2}", stats.average_pnl);
            println!("Win Rate:       {:.1}%", stats.win_rate);
            println!("Winning Trades: {}", stats.winning_trades);
            println!("Losing Trades:  {}", stats.losing_trades);
            println!("Average Win:    {:.2}", stats.average_win);
            println!("Average Loss:   {:.2}", stats.average_loss);
            println!("Profit Factor:  {:.2}", stats.profit_factor);
        }
        Err(e) => println!("\n--- P&L Analysis ---\n{e}"),
    }

    match analyzer.drawdown() {
        Ok(stats) => {
            println!("\n--- Drawdown ---");
            println!(
                "Max Drawdown:   {:.2} ({:.1}%)",
                stats.max_drawdown_amount, stats.max_drawdown_percentage
            );
            println!("Current:        {:.2}", stats.current_drawdown);
            println!("Peak Value:     {:.2}", stats.peak_value);
            println!("Longest Period: {} trades", stats.longest_drawdown_period);
        }
        Err(e) => println!("\n--- Drawdown ---\n{e}"),
    }

    match analyzer.risk_metrics() {
        Ok(stats) => {
            println!("\n--- Risk Metrics ---");
            println!("Annualized Return:     {:.2}", stats.annualized_return);
            println!("Annualized Volatility: {:.2}", stats.annualized_volatility);
            println!("Sharpe Ratio:          {:.2}", stats.sharpe_ratio);
            println!("Calmar Ratio:          {:.2}", stats.calmar_ratio);
            println!("VaR 95%:               {:.2}", stats.var_95);
            println!("CVaR 95%:              {:.2}", stats.cvar_95);
        }
        Err(e) => println!("\n--- Risk Metrics ---\n{e}"),
    }

    match analyzer.trading_frequency() {
        Ok(stats) => {
            println!("\n--- Trading Frequency ---");
            println!("Trading Days:   {}", stats.total_trading_days);
            println!("Avg Daily:      {:.2}", stats.average_daily_trades);
            println!("Max Daily:      {}", stats.max_daily_trades);
            if let Some(hour) = stats.most_active_hour {
                println!("Busiest Hour:   {hour:02}:00");
            }
            if let Some(day) = &stats.most_active_day {
                println!("Busiest Day:    {day}");
            }
        }
        Err(e) => println!("\n--- Trading Frequency ---\n{e}"),
    }

    match analyzer.position_changes() {
        Ok(stats) => {
            println!("\n--- Position Changes ---");
            println!("Long Operations:   {}", stats.long_operations);
            println!("Short Operations:  {}", stats.short_operations);
            println!("Direction Changes: {}", stats.direction_changes);
        }
        Err(e) => println!("\n--- Position Changes ---\n{e}"),
    }

    if let Ok(trades) = analyzer.best_worst_trades(top) {
        println!("\n--- Top {top} Trades ---");
        for trade in &trades.best_trades {
            println!(
                "  {} {:<16} {:>10.2}",
                trade.date.as_deref().unwrap_or("-"),
                trade.side.as_deref().unwrap_or("-"),
                trade.closed_pnl
            );
        }
        println!("\n--- Bottom {top} Trades ---");
        for trade in &trades.worst_trades {
            println!(
                "  {} {:<16} {:>10.2}",
                trade.date.as_deref().unwrap_or("-"),
                trade.side.as_deref().unwrap_or("-"),
                trade.closed_pnl
            );
        }
    }
}

fn print_monthly(analyzer: &TradeAnalyzer) {
    let months = analyzer.monthly_performance();
    if months.is_empty() {
        println!("\nNo monthly performance data available.");
        return;
    }

    println!("\n--- Monthly Performance ---");
    println!(
        "{:<8} {:>10} {:>7} {:>10} {:>12} {:>12}",
        "MONTH", "PNL", "TRADES", "MEAN", "VALUE", "CUMULATIVE"
    );
    for month in months {
        println!(
            "{:<8} {:>10.2} {:>7} {:>10.2} {:>12.2} {:>12.2}",
            month.month,
            month.pnl_sum,
            month.trade_count,
            month.pnl_mean,
            month.trade_value_sum,
            month.cumulative_pnl
        );
    }
}
