use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pulse_bot::config;
use pulse_bot::core::controller::CycleController;
use pulse_bot::core::ledger::TradeLedger;
use pulse_bot::core::reconciler::Reconciler;
use pulse_bot::exchange::binance::BinanceFuturesGateway;
use pulse_bot::exchange::credentials::load_credentials;
use pulse_bot::exchange::paper::PaperGateway;
use pulse_bot::exchange::ExchangeGateway;
use pulse_bot::logging;
use pulse_bot::storage::StateStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    // Determine config directory — default to `./config`.
    let config_dir = std::env::var("BOT_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    // Load and validate configuration.
    let config = config::load_config(&config_dir)?;

    // Initialize tracing — hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    info!(
        symbols = ?config.trading.symbols,
        timeframe = %config.trading.timeframe,
        mode = ?config.trading.mode,
        paper = config.exchange.paper,
        sandbox = config.exchange.sandbox,
        "pulse bot starting"
    );

    // -----------------------------------------------------------------------
    // Exchange gateway
    // -----------------------------------------------------------------------

    let credentials = load_credentials(config.exchange.paper)
        .await
        .context("failed to load API credentials")?;

    let binance: Arc<dyn ExchangeGateway> =
        Arc::new(BinanceFuturesGateway::new(&config.exchange, credentials));

    let gateway: Arc<dyn ExchangeGateway> = if config.exchange.paper {
        info!(
            starting_balance = %config.exchange.paper_starting_balance,
            slippage_bps = config.exchange.paper_slippage_bps,
            "paper trading enabled — orders are simulated"
        );
        Arc::new(PaperGateway::new(binance, &config.exchange))
    } else {
        binance
    };

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    let store = Arc::new(
        StateStore::open(Path::new(&config.app.state_dir), &config.trading.symbols)
            .context("failed to open state store")?,
    );
    let ledger = Arc::new(
        TradeLedger::open(Path::new(&config.app.ledger_dir))
            .context("failed to open trade ledger")?,
    );

    info!("state store and ledger initialized");

    // -----------------------------------------------------------------------
    // Runtime actors
    // -----------------------------------------------------------------------

    let shutdown = CancellationToken::new();

    let reconciler = Reconciler::new(
        gateway.clone(),
        store.clone(),
        ledger.clone(),
        config.trading.symbols.clone(),
        Duration::from_secs(config.trading.sync_interval_seconds),
        config.risk.forced_exit,
        config.exchange.quote_asset.clone(),
        shutdown.clone(),
    );

    let controller = CycleController::new(
        gateway.clone(),
        store.clone(),
        ledger.clone(),
        &config,
        shutdown.clone(),
    );

    info!("spawning runtime tasks");

    let reconciler_handle = tokio::spawn(async move { reconciler.run().await });
    let controller_handle = tokio::spawn(async move { controller.run().await });

    info!("all tasks running — press Ctrl+C to shutdown");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("shutdown signal received, stopping gracefully...");
    shutdown.cancel();

    let (reconciler_res, controller_res) = tokio::join!(reconciler_handle, controller_handle);
    if let Err(e) = reconciler_res {
        error!(error = %e, "reconciler task panicked");
    }
    if let Err(e) = controller_res {
        error!(error = %e, "cycle controller task panicked");
    }

    info!("shutdown complete");
    Ok(())
}
