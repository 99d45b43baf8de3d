//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the dipper trading bot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::jupiter::{JupiterClient, JupiterConfig};
use crate::adapters::market_data::{CoinGeckoClient, CoinGeckoConfig};
use crate::adapters::solana::{SolanaClient, WalletManager};
use crate::application::{EngineConfig, PipelineConfig, SwapPipeline, TradingEngine};
use crate::config::{load_config, Config};
use crate::domain::{from_base_units, to_base_units, Asset, StateStore, TradeDirection};
use crate::ports::{SwapApi, SwapRequest};
use crate::strategy::{rules, StrategyParams};

/// Dipper - Buy-the-dip / take-profit bot for SOL
#[derive(Parser, Debug)]
#[command(
    name = "dipper-bot",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Buy-the-dip / take-profit trading bot for SOL via Jupiter",
    long_about = "Dipper buys SOL with USDC after a configured 24h drawdown and sells \
                  the position back at a fixed profit target, polling spot prices and \
                  routing swaps through the Jupiter aggregator."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the trading loop
    Run(RunCmd),

    /// Show position, strategy parameters, and wallet balance
    Status(StatusCmd),

    /// Get a quote for a buy or sell without executing
    Quote(QuoteCmd),
}

/// Start trading loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/bot.toml")]
    pub config: PathBuf,

    /// Force simulation regardless of config
    #[arg(long, conflicts_with = "live")]
    pub dry_run: bool,

    /// Enable live trading (the config defaults to dry-run)
    #[arg(long)]
    pub live: bool,

    /// Override RPC URL
    #[arg(long, value_name = "URL")]
    pub rpc_url: Option<String>,

    /// Override keypair path
    #[arg(long, value_name = "FILE")]
    pub keypair: Option<PathBuf>,
}

/// Check bot status
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/bot.toml")]
    pub config: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, value_name = "FORMAT", default_value = "text")]
    pub format: String,
}

/// Get swap quote
#[derive(Parser, Debug)]
pub struct QuoteCmd {
    /// Trade direction: buy (USDC -> SOL) or sell (SOL -> USDC)
    #[arg(value_name = "DIRECTION")]
    pub direction: String,

    /// Amount of the input asset to swap
    #[arg(value_name = "AMOUNT")]
    pub amount: f64,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/bot.toml")]
    pub config: PathBuf,

    /// Slippage tolerance in basis points (defaults to the configured value)
    #[arg(long, value_name = "BPS")]
    pub slippage: Option<u16>,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    // Initialize logging based on flags
    init_logging(app.verbose, app.debug)?;

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Status(cmd) => status_command(cmd).await,
        Command::Quote(cmd) => quote_command(cmd).await,
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

/// Load config from the given path, falling back to defaults when the
/// file does not exist
fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path).with_context(|| format!("loading config from {}", path.display()))
    } else {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        Ok(Config::default())
    }
}

fn apply_run_overrides(config: &mut Config, cmd: &RunCmd) {
    if let Some(ref url) = cmd.rpc_url {
        config.solana.rpc_url = url.clone();
    }
    if let Some(ref keypair) = cmd.keypair {
        // The CLI keypair replaces any configured secret outright
        config.solana.keypair_path = Some(keypair.display().to_string());
        config.solana.secret_base58 = None;
    }
    if cmd.live {
        config.engine.dry_run = false;
    }
    if cmd.dry_run {
        config.engine.dry_run = true;
    }
}

/// Resolve the signing wallet. Live mode requires credentials; dry-run
/// falls back to an ephemeral wallet that never signs anything.
fn build_wallet(config: &Config, dry_run: bool) -> Result<WalletManager> {
    if !dry_run {
        let source = config.solana.credential_source()?;
        return WalletManager::from_source(&source).context("loading wallet");
    }

    match config.solana.credential_source_opt()? {
        Some(source) => WalletManager::from_source(&source).context("loading wallet"),
        None => {
            tracing::info!("No signing credentials configured, using an ephemeral wallet");
            Ok(WalletManager::new_random())
        }
    }
}

/// Handle run command
async fn run_command(cmd: RunCmd) -> Result<()> {
    let mut config = load_config_or_default(&cmd.config)?;
    apply_run_overrides(&mut config, &cmd);

    let dry_run = config.engine.dry_run;
    if dry_run {
        tracing::info!("Running in DRY RUN mode - executions are simulated");
    } else {
        tracing::warn!("LIVE trading enabled - real funds at risk");
    }

    let wallet = build_wallet(&config, dry_run)?;
    tracing::info!(wallet = %wallet.public_key(), "Wallet loaded");

    let market = CoinGeckoClient::with_config(CoinGeckoConfig {
        api_base_url: config.market_data.api_base_url.clone(),
        ..CoinGeckoConfig::default()
    })
    .context("creating market data client")?;

    let jupiter = JupiterClient::with_config(JupiterConfig {
        api_base_url: config.jupiter.api_base_url.clone(),
        api_key: config.jupiter.get_api_key(),
        ..JupiterConfig::default()
    })
    .context("creating swap client")?;

    let solana = SolanaClient::new(config.solana.get_rpc_url());
    let store = StateStore::new(config.engine.expanded_data_dir());

    let pipeline = SwapPipeline::new(
        jupiter,
        solana.clone(),
        Arc::new(wallet),
        store.clone(),
        PipelineConfig {
            dry_run,
            max_slippage_bps: config.trading.max_slippage_bps,
            max_price_impact_pct: config.trading.max_price_impact_pct,
            confirm_timeout: Duration::from_secs(config.engine.confirm_timeout_secs),
        },
    );

    let engine = Arc::new(TradingEngine::new(
        Arc::new(market),
        Arc::new(pipeline),
        Arc::new(solana),
        store,
        StrategyParams::from(&config),
        EngineConfig {
            poll_interval: Duration::from_secs(config.market_data.poll_interval_secs),
            confirm_timeout: Duration::from_secs(config.engine.confirm_timeout_secs),
            dry_run,
        },
    )?);

    let shutdown_engine = Arc::clone(&engine);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown_engine.stop();
        }
    });

    engine.run().await?;
    Ok(())
}

/// Handle quote command
async fn quote_command(cmd: QuoteCmd) -> Result<()> {
    let config = load_config_or_default(&cmd.config)?;

    let direction = parse_direction(&cmd.direction)?;
    let amount = Decimal::try_from(cmd.amount).context("invalid amount")?;
    let input = direction.input_asset();
    let output = direction.output_asset();
    let base_units = to_base_units(amount, input)?;
    let slippage_bps = cmd.slippage.unwrap_or(config.trading.max_slippage_bps);

    let jupiter = JupiterClient::with_config(JupiterConfig {
        api_base_url: config.jupiter.api_base_url.clone(),
        api_key: config.jupiter.get_api_key(),
        ..JupiterConfig::default()
    })
    .context("creating swap client")?;

    let request = SwapRequest::new(direction, base_units, slippage_bps);
    let quote = jupiter.get_quote(&request).await.context("fetching quote")?;
    let summary = quote.summary();

    println!(
        "Quote: {} {} {} -> {}",
        direction,
        amount,
        input.symbol(),
        output.symbol()
    );
    println!(
        "  Expected out:      {} {}",
        from_base_units(quote.out_amount, output),
        output.symbol()
    );
    println!(
        "  Minimum out:       {} {}",
        from_base_units(quote.min_out_amount, output),
        output.symbol()
    );
    println!("  Implied SOL price: {} USDC", summary.sol_price());
    println!("  Price impact:      {:.4}%", quote.price_impact_pct);
    println!("  Slippage:          {} bps", slippage_bps);

    Ok(())
}

fn parse_direction(raw: &str) -> Result<TradeDirection> {
    match raw.to_ascii_lowercase().as_str() {
        "buy" => Ok(TradeDirection::Buy),
        "sell" => Ok(TradeDirection::Sell),
        other => bail!("direction must be 'buy' or 'sell', got '{other}'"),
    }
}

/// What the status command reports
#[derive(Debug, Serialize)]
struct StatusReport {
    dry_run: bool,
    position_open: bool,
    entry_price: Option<Decimal>,
    entry_quantity: Option<Decimal>,
    sell_target_price: Option<Decimal>,
    simulated_position: Option<bool>,
    pending_trade_signature: Option<String>,
    buy_drop_pct: Decimal,
    take_profit_pct: Decimal,
    trade_size: Decimal,
    wallet: Option<String>,
    sol_balance: Option<Decimal>,
}

/// Handle status command
async fn status_command(cmd: StatusCmd) -> Result<()> {
    let config = load_config_or_default(&cmd.config)?;
    let store = StateStore::new(config.engine.expanded_data_dir());

    let position = store.load_position().context("reading position file")?;
    let pending = store.load_pending().context("reading pending-trade file")?;
    let params = StrategyParams::from(&config);

    let mut report = StatusReport {
        dry_run: config.engine.dry_run,
        position_open: position.is_some(),
        entry_price: position.as_ref().map(|p| p.entry_price),
        entry_quantity: position.as_ref().map(|p| p.entry_quantity),
        sell_target_price: position
            .as_ref()
            .map(|p| rules::sell_target_price(p.entry_price, params.take_profit_pct)),
        simulated_position: position.as_ref().map(|p| p.simulated),
        pending_trade_signature: pending.map(|t| t.signature),
        buy_drop_pct: params.buy_drop_pct,
        take_profit_pct: params.take_profit_pct,
        trade_size: params.trade_size,
        wallet: None,
        sol_balance: None,
    };

    // Balance lookup is best-effort: status still renders without
    // credentials or with the RPC down.
    if let Ok(Some(source)) = config.solana.credential_source_opt() {
        if let Ok(wallet) = WalletManager::from_source(&source) {
            let address = wallet.public_key();
            let solana = SolanaClient::new(config.solana.get_rpc_url());
            match solana.get_balance(&address).await {
                Ok(lamports) => {
                    report.sol_balance = Some(from_base_units(lamports, Asset::Sol));
                }
                Err(e) => tracing::warn!(error = %e, "Balance lookup failed"),
            }
            report.wallet = Some(address);
        }
    }

    match cmd.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_status_text(&report),
    }

    Ok(())
}

fn print_status_text(report: &StatusReport) {
    println!("Dipper status");
    println!(
        "  Mode:            {}",
        if report.dry_run { "dry-run" } else { "live" }
    );

    match (report.entry_price, report.entry_quantity) {
        (Some(price), Some(quantity)) => {
            println!("  Position:        HOLDING {} SOL @ {} USDC", quantity, price);
            if let Some(target) = report.sell_target_price {
                println!("  Sell target:     {} USDC", target);
            }
            if report.simulated_position == Some(true) {
                println!("  (simulated position)");
            }
        }
        _ => println!("  Position:        FLAT"),
    }

    if let Some(ref signature) = report.pending_trade_signature {
        println!("  In-flight trade: {}", signature);
    }

    println!("  Buy trigger:     24h change <= -{}%", report.buy_drop_pct);
    println!("  Take profit:     +{}% over entry", report.take_profit_pct);
    println!("  Trade size:      {} USDC", report.trade_size);

    if let Some(ref wallet) = report.wallet {
        println!("  Wallet:          {}", wallet);
    }
    if let Some(balance) = report.sol_balance {
        println!("  SOL balance:     {}", balance);
    }
}
