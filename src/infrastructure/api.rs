//! API Server
//!
//! REST routes over the ledger and analytics, the price WebSocket and the
//! frontend static files.

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::Level;

use crate::analytics::{MarketAnalytics, OutlookEntry, TrendingEntry, VolatilityEntry};
use crate::broadcast::{run_price_session, BroadcastHub};
use crate::core::{AccountId, Instrument, InstrumentId, Side};
use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::metrics::{MetricsCollector, MetricsSnapshot};
use crate::ledger::{Holding, LedgerStore, Portfolio, Position, TradeError, TradeOutcome, TradeProcessor, Transaction};
use crate::{log_api, MarketError};

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentDto {
    pub id: InstrumentId,
    pub name: String,
    pub team: String,
    pub position: String,
    pub current_price: f64,
    /// Prior prices, oldest first
    pub price_history: Vec<f64>,
    pub last_updated: String,
}

impl From<Instrument> for InstrumentDto {
    fn from(inst: Instrument) -> Self {
        Self {
            id: inst.id,
            current_price: inst.current_price(),
            price_history: inst.history().to_vec(),
            last_updated: rfc3339(inst.last_updated()),
            name: inst.name,
            team: inst.team,
            position: inst.position,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub instrument_id: InstrumentId,
    pub shares: f64,
    pub average_buy_price: f64,
    pub last_updated: String,
}

impl From<Position> for PositionDto {
    fn from(p: Position) -> Self {
        Self {
            instrument_id: p.instrument_id,
            shares: p.shares,
            average_buy_price: p.average_buy_price,
            last_updated: rfc3339(p.last_updated),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingDto {
    pub instrument_id: InstrumentId,
    pub instrument_name: String,
    pub shares: f64,
    pub average_buy_price: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
}

impl From<Holding> for HoldingDto {
    fn from(h: Holding) -> Self {
        Self {
            instrument_id: h.position.instrument_id,
            instrument_name: h.instrument_name,
            shares: h.position.shares,
            average_buy_price: h.position.average_buy_price,
            current_price: h.current_price,
            market_value: h.market_value,
            unrealized_pnl: h.unrealized_pnl,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDto {
    pub account_id: AccountId,
    pub name: String,
    pub balance: f64,
    /// Balance plus market value of all holdings
    pub equity: f64,
    pub holdings: Vec<HoldingDto>,
}

impl From<Portfolio> for PortfolioDto {
    fn from(p: Portfolio) -> Self {
        Self {
            equity: p.equity(),
            account_id: p.account.id,
            name: p.account.name,
            balance: p.account.balance,
            holdings: p.holdings.into_iter().map(HoldingDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: u64,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub shares: f64,
    pub price_per_share: f64,
    pub total_amount: f64,
    pub timestamp: String,
}

impl From<Transaction> for TransactionDto {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id.as_raw(),
            account_id: tx.account_id,
            instrument_id: tx.instrument_id,
            side: tx.side,
            shares: tx.shares,
            price_per_share: tx.price_per_share,
            total_amount: tx.total_amount,
            timestamp: rfc3339(tx.timestamp),
        }
    }
}

/// Body of `POST /api/trade`
#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    #[serde(alias = "accountId")]
    pub account_id: AccountId,
    #[serde(alias = "instrumentId")]
    pub instrument_id: InstrumentId,
    /// "BUY" / "SELL", case-insensitive
    pub side: String,
    pub shares: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResponseDto {
    pub transaction: TransactionDto,
    pub balance: f64,
    /// `None` when the trade closed the position
    pub position: Option<PositionDto>,
}

impl From<TradeOutcome> for TradeResponseDto {
    fn from(outcome: TradeOutcome) -> Self {
        Self {
            transaction: outcome.transaction.into(),
            balance: outcome.balance,
            position: outcome.position.map(PositionDto::from),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    pub instruments: usize,
    pub accounts: usize,
    pub subscribers: usize,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorDto {
    error: String,
}

/// Handler error mapped onto an HTTP status
#[derive(Debug)]
pub enum ApiError {
    Trade(TradeError),
    NotFound(String),
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Trade(TradeError::NotFound(_)) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Trade(TradeError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Trade(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<TradeError> for ApiError {
    fn from(e: TradeError) -> Self {
        ApiError::Trade(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            ApiError::Trade(e) => e.to_string(),
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => msg,
        };
        (status, Json(ErrorDto { error })).into_response()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerStore>,
    pub trades: TradeProcessor,
    pub analytics: Arc<MarketAnalytics>,
    pub hub: Arc<BroadcastHub>,
    pub metrics: Arc<MetricsCollector>,
}

/// Build the API router. Static files are served from `static_path` when given.
pub fn router(state: AppState, static_path: Option<&std::path::Path>) -> Router {
    let api = Router::new()
        .route("/api/instruments", get(list_instruments))
        .route("/api/instruments/:id", get(get_instrument))
        .route("/api/accounts/:id/portfolio", get(get_portfolio))
        .route("/api/accounts/:id/transactions", get(get_transactions))
        .route("/api/trade", post(submit_trade))
        .route("/api/market/trending", get(get_trending))
        .route("/api/market/volatility", get(get_volatility))
        .route("/api/market/outlook", get(get_outlook))
        .route("/api/status", get(get_status))
        .route("/ws/prices", get(ws_prices));

    let api = match static_path {
        Some(path) => api.fallback_service(ServeDir::new(path)),
        None => api,
    };

    api.layer(CorsLayer::permissive()).with_state(state)
}

/// Start the API server; returns once `cancel` fires and connections drain
pub async fn start_server(
    state: AppState,
    config: &ApiConfig,
    cancel: CancellationToken,
) -> Result<(), MarketError> {
    let app = router(state, Some(config.static_path.as_path()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log_api!(Level::INFO, %addr, "API Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| MarketError::Server(e.to_string()))?;

    log_api!(Level::INFO, "API Server stopped");
    Ok(())
}

async fn list_instruments(State(state): State<AppState>) -> Json<Vec<InstrumentDto>> {
    Json(
        state
            .ledger
            .instruments()
            .into_iter()
            .map(InstrumentDto::from)
            .collect(),
    )
}

async fn get_instrument(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<InstrumentDto>, ApiError> {
    let id = InstrumentId::from_raw(id);
    state
        .ledger
        .instrument(id)
        .map(|inst| Json(inst.into()))
        .ok_or_else(|| ApiError::NotFound(format!("{} not found", id)))
}

async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<PortfolioDto>, ApiError> {
    let id = AccountId::from_raw(id);
    state
        .ledger
        .portfolio(id)
        .map(|p| Json(p.into()))
        .ok_or_else(|| ApiError::NotFound(format!("{} not found", id)))
}

async fn get_transactions(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<TransactionDto>>, ApiError> {
    let id = AccountId::from_raw(id);
    state
        .ledger
        .transactions(id)
        .map(|txs| Json(txs.into_iter().map(TransactionDto::from).collect()))
        .ok_or_else(|| ApiError::NotFound(format!("{} not found", id)))
}

async fn submit_trade(
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<TradeResponseDto>, ApiError> {
    let side: Side = request.side.parse().map_err(ApiError::BadRequest)?;
    let outcome = state
        .trades
        .submit_trade(request.account_id, request.instrument_id, side, request.shares)?;
    Ok(Json(outcome.into()))
}

async fn get_trending(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<TrendingEntry>> {
    let limit = query.limit.unwrap_or_else(|| state.analytics.default_limit());
    Json(state.analytics.trending(limit))
}

async fn get_volatility(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<VolatilityEntry>> {
    let limit = query.limit.unwrap_or_else(|| state.analytics.default_limit());
    Json(state.analytics.volatility(limit))
}

async fn get_outlook(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<OutlookEntry>> {
    let limit = query.limit.unwrap_or_else(|| state.analytics.default_limit());
    Json(state.analytics.outlook(limit))
}

async fn get_status(State(state): State<AppState>) -> Json<StatusDto> {
    Json(StatusDto {
        instruments: state.ledger.instrument_count(),
        accounts: state.ledger.account_count(),
        subscribers: state.hub.subscriber_count(),
        metrics: state.metrics.snapshot(),
    })
}

/// `GET /ws/prices`: push `{name: price}` snapshots until either side closes
async fn ws_prices(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| async move {
        let end = run_price_session(socket, hub).await;
        log_api!(Level::DEBUG, ?end, "price websocket closed");
    })
}
