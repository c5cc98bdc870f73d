use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use trade_journal::config::Config;
use trade_journal::journal::Journal;
use trade_journal::models::{Bias, Direction, Trade, TradeForm, TradeResult};
use trade_journal::price_source::import_csv;
use trade_journal::store::ItemInsert;

/// Discretionary trade journal
#[derive(Parser)]
#[command(name = "trade-journal", about = "Log trades, chart them and review win-rates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a trade.
    Add(AddArgs),
    /// List recent trades.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        oldest_first: bool,
    },
    /// Show one trade with its conditions.
    Show { id: i64 },
    /// Set the outcome of a trade.
    Close {
        id: i64,
        #[arg(long)]
        result: TradeResult,
        #[arg(long)]
        exit_price: Option<f64>,
    },
    /// Win-rate by session and by session/condition.
    Stats,
    /// Manage checklist conditions.
    Checklist {
        #[command(subcommand)]
        action: ChecklistAction,
    },
    /// Import one-minute bars for a symbol.
    ImportCsv {
        file: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// Render the chart for one trade.
    Chart { id: i64 },
    /// Re-render charts for recent trades.
    RegenCharts {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(clap::Args)]
struct AddArgs {
    #[arg(long)]
    symbol: String,
    #[arg(long)]
    direction: Direction,
    /// Wall-clock entry time in the journal timezone, e.g. "2024-01-15 08:30".
    #[arg(long, value_parser = parse_entry_time)]
    entry: NaiveDateTime,
    #[arg(long)]
    rr: f64,
    #[arg(long)]
    h4: Bias,
    #[arg(long)]
    h1: Bias,
    #[arg(long)]
    m15: Bias,
    #[arg(long, default_value = "OPEN")]
    result: TradeResult,
    #[arg(long, default_value = "")]
    notes: String,
    #[arg(long)]
    entry_price: Option<f64>,
    #[arg(long)]
    stop_price: Option<f64>,
    #[arg(long)]
    exit_price: Option<f64>,
    /// Checked condition label; repeat for several.
    #[arg(long = "condition")]
    conditions: Vec<String>,
    /// Render the chart right after saving.
    #[arg(long)]
    chart: bool,
}

#[derive(Subcommand)]
enum ChecklistAction {
    List,
    Add { label: String },
    Delete { id: i64 },
}

fn parse_entry_time(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
        .ok_or_else(|| format!("expected YYYY-MM-DD HH:MM, got {:?}", raw))
}

fn print_trade(t: &Trade) {
    println!(
        "#{:<4} {} {:<8} {:<4} {:<8} rr {:<5} mtf {} {:<4} {}",
        t.id,
        t.entry_time.format("%Y-%m-%d %H:%M"),
        t.symbol,
        t.direction,
        t.session,
        t.rr,
        t.mtf_score,
        t.result,
        t.notes
    );
}

fn fmt_price(p: Option<f64>) -> String {
    p.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    if let Command::ImportCsv { file, symbol } = &cli.command {
        let summary = import_csv(file, symbol, &cfg.data_dir, cfg.timezone)
            .with_context(|| format!("Failed to import {}", file.display()))?;
        println!(
            "{}: {} rows imported, {} stored ({} .. {}) in {}",
            summary.symbol,
            summary.imported,
            summary.total,
            summary.first,
            summary.last,
            summary.path.display()
        );
        return Ok(());
    }

    let mut journal = Journal::open(cfg).context("Failed to open journal")?;
    info!("Journal ready at {}", journal.config().db_path.display());

    match cli.command {
        Command::Add(args) => {
            let form = TradeForm {
                symbol: args.symbol,
                direction: args.direction,
                entry_time: args.entry,
                rr: args.rr,
                h4: args.h4,
                h1: args.h1,
                m15: args.m15,
                result: args.result,
                notes: args.notes,
                entry_price: args.entry_price,
                stop_price: args.stop_price,
                exit_price: args.exit_price,
                conditions: args.conditions,
            };
            let trade = journal.log_trade(form)?;
            print_trade(&trade);
            if args.chart {
                // The trade is already saved; a missing chart is not fatal.
                match journal.chart_trade(trade.id).await {
                    Ok(path) => println!("chart: {}", path.display()),
                    Err(e) => warn!("Chart for trade #{} not rendered: {}", trade.id, e),
                }
            }
        }
        Command::List {
            limit,
            oldest_first,
        } => {
            for t in journal.store().list_trades(limit, !oldest_first)? {
                print_trade(&t);
            }
        }
        Command::Show { id } => {
            let t = journal.store().get_trade(id)?;
            print_trade(&t);
            println!("  bias     H4 {} / H1 {} / M15 {}", t.h4, t.h1, t.m15);
            println!(
                "  prices   entry {} stop {} exit {} target {}",
                fmt_price(t.entry_price),
                fmt_price(t.stop_price),
                fmt_price(t.exit_price),
                fmt_price(t.target_price())
            );
            for item in journal.store().trade_conditions(id)? {
                println!("  [x] {}", item.label);
            }
        }
        Command::Close {
            id,
            result,
            exit_price,
        } => {
            journal.store().update_outcome(id, result, exit_price)?;
            print_trade(&journal.store().get_trade(id)?);
        }
        Command::Stats => {
            println!("Win-rate by session");
            for row in journal.session_report()? {
                println!(
                    "  {:<8} {:>5.1}%  ({} trades)",
                    row.session,
                    row.winrate * 100.0,
                    row.trade_count
                );
            }
            println!(
                "Best conditions (min {} trades)",
                journal.config().min_condition_trades
            );
            for row in journal.condition_report()? {
                println!(
                    "  {:<8} {:<30} {:>5.1}%  ({} trades)",
                    row.session,
                    row.label,
                    row.winrate * 100.0,
                    row.trade_count
                );
            }
        }
        Command::Checklist { action } => match action {
            ChecklistAction::List => {
                for item in journal.store().list_checklist_items()? {
                    println!("{:<4} {:<24} {}", item.id, item.key, item.label);
                }
            }
            ChecklistAction::Add { label } => match journal.store().add_checklist_item(&label)? {
                ItemInsert::Created(item) => println!("added #{} {}", item.id, item.label),
                ItemInsert::Existing(item) => {
                    println!("already exists as #{} {}", item.id, item.label)
                }
            },
            ChecklistAction::Delete { id } => {
                journal.store().delete_checklist_item(id)?;
                println!("deleted #{}", id);
            }
        },
        Command::Chart { id } => {
            let path = journal.chart_trade(id).await?;
            println!("{}", path.display());
        }
        Command::RegenCharts { limit } => {
            let tally = journal.regenerate_charts(limit).await?;
            println!("{} charts written, {} failed", tally.ok, tally.failed);
        }
        Command::ImportCsv { .. } => {}
    }

    Ok(())
}
