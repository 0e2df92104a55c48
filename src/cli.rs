//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::Receiver;

use crate::adapters::channel_events::{ChannelEvents, FanoutEvents};
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::paper_exchange::PaperExchange;
use crate::adapters::tracing_events::TracingEvents;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig};
use crate::domain::candle::{format_timestamp, Candle};
use crate::domain::config_validation::{
    parse_time, read_double, read_int, require_string, strategy_kind, strategy_params,
    validate_backtest_config, validate_live_config, validate_market_config,
    validate_strategy_config,
};
use crate::domain::error::EngineError;
use crate::domain::event::EngineEvent;
use crate::domain::live::LiveConfig;
use crate::domain::manager::TradeSettings;
use crate::domain::metrics::BacktestResult;
use crate::domain::risk::RiskParams;
use crate::domain::strategy::build_strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::event_port::EventPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "stratbot", about = "Single-position crypto strategy bot and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a strategy over historical candles
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// trend_following, mean_reversion or breakout
        #[arg(short, long)]
        strategy: Option<String>,
        /// Window start (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: Option<String>,
        /// Window end, exclusive
        #[arg(long)]
        end: Option<String>,
        /// CSV report path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JSON result path
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Trade against the paper exchange on a fixed tick interval
    Live {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        strategy: Option<String>,
        /// Stop after this many ticks instead of waiting for Ctrl-C
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Market section of the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub symbol: String,
    pub timeframe: String,
    pub data_path: PathBuf,
    pub leverage: u32,
    pub quote_balance: f64,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            strategy,
            start,
            end,
            output,
            json,
        } => run_backtest(
            &config,
            &Overrides {
                symbol,
                strategy,
                start,
                end,
            },
            output.as_deref(),
            json.as_deref(),
        ),
        Command::Live {
            config,
            symbol,
            strategy,
            ticks,
        } => run_live(
            &config,
            &Overrides {
                symbol,
                strategy,
                ..Overrides::default()
            },
            ticks,
        ),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl Overrides {
    pub fn apply(&self, adapter: &mut FileConfigAdapter) {
        if let Some(symbol) = &self.symbol {
            adapter.set("market", "symbol", symbol);
        }
        if let Some(kind) = &self.strategy {
            adapter.set("strategy", "kind", kind);
        }
        if let Some(start) = &self.start {
            adapter.set("backtest", "start_date", start);
        }
        if let Some(end) = &self.end {
            adapter.set("backtest", "end_date", end);
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = EngineError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: EngineError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn build_market_settings(adapter: &dyn ConfigPort) -> Result<MarketSettings, EngineError> {
    Ok(MarketSettings {
        symbol: require_string(adapter, "market", "symbol")?,
        timeframe: adapter
            .get_string("market", "timeframe")
            .unwrap_or_else(|| "1m".to_string()),
        data_path: PathBuf::from(require_string(adapter, "market", "data_path")?),
        leverage: read_int(adapter, "market", "leverage", 1)?.clamp(1, i64::from(u32::MAX)) as u32,
        quote_balance: read_double(adapter, "market", "quote_balance", 10_000.0)?,
    })
}

pub fn build_risk(adapter: &dyn ConfigPort) -> Result<RiskParams, EngineError> {
    Ok(RiskParams {
        stop_loss: read_double(adapter, "risk", "stop_loss", 0.0)?,
        take_profit: read_double(adapter, "risk", "take_profit", 0.0)?,
        trailing_stop: read_double(adapter, "risk", "trailing_stop", 0.0)?,
    })
}

pub fn build_trade_settings(
    adapter: &dyn ConfigPort,
    market: &MarketSettings,
) -> Result<TradeSettings, EngineError> {
    Ok(TradeSettings {
        symbol: market.symbol.clone(),
        position_size: read_double(adapter, "strategy", "position_size", 100.0)?,
        risk: build_risk(adapter)?,
    })
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    market: &MarketSettings,
) -> Result<BacktestConfig, EngineError> {
    let trade = build_trade_settings(adapter, market)?;
    let start = require_string(adapter, "backtest", "start_date")?;
    let end = require_string(adapter, "backtest", "end_date")?;

    Ok(BacktestConfig {
        symbol: trade.symbol,
        timeframe: market.timeframe.clone(),
        start_time: parse_time(&start, "backtest", "start_date")?,
        end_time: parse_time(&end, "backtest", "end_date")?,
        page_size: read_int(adapter, "backtest", "page_size", 1000)?.max(1) as usize,
        initial_balance: read_double(adapter, "backtest", "initial_balance", trade.position_size)?,
        position_size: trade.position_size,
        risk: trade.risk,
    })
}

pub fn build_live_config(
    adapter: &dyn ConfigPort,
    market: &MarketSettings,
    max_ticks: Option<u64>,
) -> Result<LiveConfig, EngineError> {
    let interval_secs = read_int(adapter, "live", "interval_secs", 5)?.max(1) as u64;
    Ok(LiveConfig {
        timeframe: market.timeframe.clone(),
        leverage: market.leverage,
        interval: std::time::Duration::from_secs(interval_secs),
        history_limit: read_int(adapter, "live", "history_limit", 100)?.max(1) as usize,
        max_ticks,
    })
}

fn load_market_data(market: &MarketSettings) -> Result<Vec<Candle>, EngineError> {
    let candles = CsvAdapter::load(&market.data_path)?;
    if candles.is_empty() {
        return Err(EngineError::NoData {
            symbol: market.symbol.clone(),
        });
    }
    Ok(candles)
}

fn run_backtest(
    config_path: &Path,
    overrides: &Overrides,
    output_path: Option<&Path>,
    json_path: Option<&Path>,
) -> ExitCode {
    // Stage 1: Load config and apply overrides
    eprintln!("Loading config from {}", config_path.display());
    let mut adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    overrides.apply(&mut adapter);

    // Stage 2: Validate
    let validation = validate_market_config(&adapter)
        .and_then(|_| validate_strategy_config(&adapter))
        .and_then(|_| validate_backtest_config(&adapter));
    if let Err(e) = validation {
        return fail(e);
    }

    match backtest_pipeline(&adapter, output_path, json_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn backtest_pipeline(
    adapter: &FileConfigAdapter,
    output_path: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<(), EngineError> {
    // Stage 3: Build settings and strategy
    let market = build_market_settings(adapter)?;
    let bt_config = build_backtest_config(adapter, &market)?;
    let mut strategy = build_strategy(strategy_kind(adapter)?, &strategy_params(adapter)?);
    eprintln!("Strategy: {}", strategy.name());

    // Stage 4: Load candles into the paper exchange
    let candles = load_market_data(&market)?;
    eprintln!(
        "Loaded {} candles from {}",
        candles.len(),
        market.data_path.display()
    );
    let exchange = PaperExchange::new(&market.symbol, candles, market.quote_balance);

    // Stage 5: Replay
    eprintln!(
        "Running backtest: {} {} to {}",
        bt_config.symbol,
        format_timestamp(bt_config.start_time),
        format_timestamp(bt_config.end_time),
    );
    let (progress, progress_rx) = ChannelEvents::pair();
    let reporter = std::thread::spawn(move || report_progress(progress_rx));
    let outcome = {
        let tracing_sink = TracingEvents;
        let sinks: Vec<&dyn EventPort> = vec![&tracing_sink, &progress];
        let events = FanoutEvents::new(sinks);
        backtest_engine::run_backtest(&exchange, strategy.as_mut(), &bt_config, &events)
    };
    drop(progress);
    if reporter.join().is_err() {
        tracing::warn!("progress reporter panicked");
    }
    let result = outcome?;

    // Stage 6: Console summary
    print_summary(&result, &strategy.name());

    // Stage 7: Reports
    if let Some(path) = output_path {
        CsvReportAdapter.write(&result, &strategy.name(), &path.display().to_string())?;
        eprintln!("\nReport written to: {}", path.display());
    }
    if let Some(path) = json_path {
        JsonReportAdapter.write(&result, &strategy.name(), &path.display().to_string())?;
        eprintln!("Result written to: {}", path.display());
    }
    Ok(())
}

/// Print progress in steps of ten percent until the sender is dropped.
fn report_progress(rx: Receiver<EngineEvent>) {
    let mut last = None;
    for event in rx {
        if let EngineEvent::BacktestProgress { percent } = event {
            if percent % 10 == 0 && last != Some(percent) {
                eprintln!("Progress: {}%", percent);
            }
            last = Some(percent);
        }
    }
}

fn fmt_profit_factor(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.2}", value)
    }
}

pub fn print_summary(result: &BacktestResult, strategy_name: &str) {
    let stats = &result.stats;
    eprintln!("\n=== {} Results ===", strategy_name);
    eprintln!("Initial Balance:  {:.2}", result.initial_balance);
    eprintln!("Final Balance:    {:.2}", result.final_balance);
    eprintln!("Total Profit:     {:.2}", result.total_profit);
    eprintln!("Profit:           {:.2}%", result.profit_percentage);
    eprintln!("Max Drawdown:     -{:.2}%", result.max_drawdown);
    eprintln!("Total Trades:     {}", result.total_trades());
    eprintln!("Win Rate:         {:.1}%", result.win_rate);
    eprintln!("Profit Factor:    {}", fmt_profit_factor(result.profit_factor));
    eprintln!(
        "Won/Lost/Even:    {}/{}/{}",
        stats.trades_won, stats.trades_lost, stats.trades_breakeven
    );
    eprintln!("Avg Win:          {:.2}", stats.avg_win);
    eprintln!("Avg Loss:         {:.2}", stats.avg_loss);
    eprintln!("Largest Win:      {:.2}", stats.largest_win);
    eprintln!("Largest Loss:     {:.2}", stats.largest_loss);
    eprintln!("Avg Duration:     {:.1} min", stats.avg_trade_duration);
}

fn run_live(config_path: &Path, overrides: &Overrides, ticks: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let mut adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    overrides.apply(&mut adapter);

    let validation = validate_market_config(&adapter)
        .and_then(|_| validate_strategy_config(&adapter))
        .and_then(|_| validate_live_config(&adapter));
    if let Err(e) = validation {
        return fail(e);
    }

    match live_pipeline(&adapter, ticks) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

#[cfg(feature = "live")]
fn live_pipeline(adapter: &FileConfigAdapter, ticks: Option<u64>) -> Result<(), EngineError> {
    use crate::domain::live::LiveSession;
    use crate::ports::market_port::MarketPort;

    let market = build_market_settings(adapter)?;
    let settings = build_trade_settings(adapter, &market)?;
    let live_config = build_live_config(adapter, &market, ticks)?;
    let strategy = build_strategy(strategy_kind(adapter)?, &strategy_params(adapter)?);

    let candles = load_market_data(&market)?;
    let warmup = live_config.history_limit.min(candles.len());
    let exchange = PaperExchange::stepping(&market.symbol, candles, market.quote_balance, warmup);
    eprintln!(
        "Paper trading {} on {} every {}s (Ctrl-C to stop)",
        strategy.name(),
        market.symbol,
        live_config.interval.as_secs()
    );

    let events = TracingEvents;
    let mut session = LiveSession::new(&settings, live_config, strategy, &exchange, &events);
    session.start()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(session.run(async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }));

    if session.position().is_some() {
        session.close_position();
    }

    let balances = exchange.fetch_balance()?;
    if let Some(balance) = balances.get(exchange.quote_currency()) {
        eprintln!(
            "\nTicks: {}  Balance: {:.2} {} (free {:.2})",
            session.ticks(),
            balance.total,
            exchange.quote_currency(),
            balance.free
        );
    }
    Ok(())
}

#[cfg(not(feature = "live"))]
fn live_pipeline(adapter: &FileConfigAdapter, ticks: Option<u64>) -> Result<(), EngineError> {
    let _ = (adapter, ticks);
    Err(EngineError::invalid(
        "live",
        "enabled",
        "stratbot was built without the live feature",
    ))
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_market_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        return fail(e);
    }

    let kind = match strategy_kind(&adapter) {
        Ok(k) => k,
        Err(e) => return fail(e),
    };
    eprintln!("\nStrategy:  {} ({})", kind.label(), kind);
    if let Ok(market) = build_market_settings(&adapter) {
        eprintln!("Market:    {} {}", market.symbol, market.timeframe);
    }

    let has_backtest = adapter.get_string("backtest", "start_date").is_some()
        || adapter.get_string("backtest", "end_date").is_some();
    if has_backtest {
        if let Err(e) = validate_backtest_config(&adapter) {
            return fail(e);
        }
        eprintln!("Backtest:  ok");
    }

    if let Err(e) = validate_live_config(&adapter) {
        return fail(e);
    }
    eprintln!("Live:      ok");

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
