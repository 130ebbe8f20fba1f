//! Athlete stock market server
//!
//! # Architecture
//! - **ledger**: accounts, positions, transactions, trade application
//! - **engine**: scheduled price ticks and snapshot broadcasts
//! - **broadcast**: subscriber hub and WebSocket sessions
//! - **analytics**: trending / volatility / outlook rankings
//! - **oracle**: next-price generators
//! - **infrastructure**: logging, metrics, config, api

use anyhow::Context;
use ballstreet::analytics::MarketAnalytics;
use ballstreet::broadcast::BroadcastHub;
use ballstreet::engine::PriceEngine;
use ballstreet::infrastructure::logging::init_logging;
use ballstreet::infrastructure::metrics::MetricsCollector;
use ballstreet::infrastructure::{start_server, AppState};
use ballstreet::ledger::{seed_ledger, Journal, JsonlJournal, LedgerStore, NullJournal, TradeProcessor};
use ballstreet::oracle::build_oracle;
use ballstreet::{log_main, MarketConfig, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Main application state
pub struct MarketApp {
    config: MarketConfig,
    cancel: CancellationToken,
}

impl MarketApp {
    pub fn new(config: MarketConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Run until SIGINT or until the API server stops
    pub async fn run(&self) -> Result<()> {
        log_main!(Level::INFO, "Starting market server...");

        // 1. Ledger
        let metrics = Arc::new(MetricsCollector::new());
        let journal: Arc<dyn Journal> = match &self.config.ledger.journal_dir {
            Some(dir) => {
                let journal = JsonlJournal::open(dir)?;
                log_main!(Level::INFO, dir = %journal.dir().display(), "transaction journal opened");
                Arc::new(journal)
            }
            None => Arc::new(NullJournal),
        };
        let ledger = Arc::new(LedgerStore::new(journal));

        let mut rng = match self.config.engine.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seeded = seed_ledger(&ledger, &self.config.roster, &self.config.ledger, &mut rng)?;
        log_main!(
            Level::INFO,
            instruments = seeded.instruments,
            accounts = seeded.accounts,
            generated = seeded.generated,
            "roster seeded"
        );

        // 2. Collaborators
        let oracle = build_oracle(&self.config.engine)?;
        let hub = Arc::new(BroadcastHub::new(self.config.hub.channel_capacity, metrics.clone()));
        let trades = TradeProcessor::new(ledger.clone(), metrics.clone());
        let analytics = Arc::new(MarketAnalytics::new(ledger.clone(), self.config.analytics.clone()));

        // 3. Price engine
        let engine = Arc::new(PriceEngine::new(
            ledger.clone(),
            oracle,
            hub.clone(),
            metrics.clone(),
            self.config.engine.clone(),
        ));
        let engine_handle = engine.spawn(self.cancel.clone());

        // 4. API server
        let state = AppState {
            ledger,
            trades,
            analytics,
            hub: hub.clone(),
            metrics,
        };
        let api_config = self.config.api.clone();
        let server_cancel = self.cancel.clone();
        let mut server_handle =
            tokio::spawn(async move { start_server(state, &api_config, server_cancel).await });

        // 5. Shutdown signal
        let server_result = tokio::select! {
            _ = signal::ctrl_c() => {
                log_main!(Level::INFO, "received SIGINT, shutting down");
                None
            }
            _ = self.cancel.cancelled() => {
                log_main!(Level::INFO, "cancellation token triggered");
                None
            }
            result = &mut server_handle => Some(result),
        };

        self.cancel.cancel();
        let closed = hub.close_all();

        let engine_failures = match engine_handle.await {
            Ok(failures) => failures,
            Err(e) => {
                tracing::error!(target: "error", "price engine task ended abnormally: {}", e);
                0
            }
        };
        let server_result = match server_result {
            Some(result) => result,
            None => server_handle.await,
        };

        log_main!(Level::INFO, closed, engine_failures, "market server stopped");

        server_result.map_err(|e| ballstreet::MarketError::Server(e.to_string()))?
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MarketConfig::load().context("failed to load configuration")?;

    // Keep guards alive so buffered log lines are flushed on exit
    let _guards = match init_logging(&config.logging) {
        Ok(guards) => guards,
        Err(e) => {
            let _ = tracing_subscriber::fmt().try_init();
            tracing::warn!("file logging unavailable, console only: {}", e);
            Vec::new()
        }
    };

    let app = MarketApp::new(config);
    app.run().await?;

    Ok(())
}
