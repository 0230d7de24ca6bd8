//! API Server (presentation boundary)
//!
//! Read endpoints serve the latest `DeskSnapshot`; write endpoints forward a
//! `DeskCommand` to the cycle task. The server never touches engine state.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::analytics::fixed_income::{Bands, NoteRow};
use crate::analytics::option_chain::{ChainParams, ChainRow, IvScale, SideQuote};
use crate::analytics::reference::PriceChange;
use crate::core::symbol::{clean_symbol, parse_input_tickers};
use crate::engine::{DeskCommand, DeskSnapshot, OptionUniverse};
use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::metrics::MetricsSnapshot;
use crate::infrastructure::persistence::PanelSettings;
use crate::infrastructure::reference_cache::ReferenceQuote;
use crate::{log_api, DeskError};

/// Desk status: connection, headline prices and counters
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    pub connected: bool,
    pub generated_at: Option<String>,
    pub subscriptions: usize,
    pub underlying: PriceChange,
    pub mep: PriceChange,
    pub reference: ReferenceQuote,
    pub bands: Option<Bands>,
    pub metrics: MetricsSnapshot,
}

/// One side of a chain row with IV cell colours
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SideQuoteDto {
    pub symbol: String,
    pub label: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub bid_iv: Option<f64>,
    pub ask_iv: Option<f64>,
    pub bid_iv_color: Option<String>,
    pub ask_iv_color: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRowDto {
    pub strike: f64,
    pub call: Option<SideQuoteDto>,
    pub put: Option<SideQuoteDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsDto {
    pub params: ChainParams,
    pub universe: OptionUniverse,
    pub selection: PanelSettings,
    pub iv_scale: IvScale,
    pub rows: Vec<ChainRowDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesDto {
    pub mep: PriceChange,
    pub reference: ReferenceQuote,
    pub bands: Option<Bands>,
    pub rows: Vec<NoteRow>,
}

/// Body of `PUT /api/selection`
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub calls: Vec<String>,
    #[serde(default)]
    pub puts: Vec<String>,
}

/// Acknowledgement for queued commands
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AcceptedDto {
    pub accepted: usize,
}

impl SideQuoteDto {
    fn from_side(side: &SideQuote, scale: &IvScale) -> Self {
        Self {
            symbol: side.symbol.clone(),
            label: clean_symbol(&side.symbol),
            bid: side.bid,
            ask: side.ask,
            bid_iv: side.bid_iv,
            ask_iv: side.ask_iv,
            bid_iv_color: side.bid_iv.map(|v| scale.color(v)),
            ask_iv_color: side.ask_iv.map(|v| scale.color(v)),
        }
    }
}

impl ChainRowDto {
    fn from_row(row: &ChainRow, scale: &IvScale) -> Self {
        Self {
            strike: row.strike.as_f64(),
            call: row.call.as_ref().map(|s| SideQuoteDto::from_side(s, scale)),
            put: row.put.as_ref().map(|s| SideQuoteDto::from_side(s, scale)),
        }
    }
}

impl From<&DeskSnapshot> for StatusDto {
    fn from(snapshot: &DeskSnapshot) -> Self {
        Self {
            connected: snapshot.connected,
            generated_at: snapshot
                .generated_at
                .and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok()),
            subscriptions: snapshot.subscriptions.len(),
            underlying: snapshot.underlying,
            mep: snapshot.mep,
            reference: snapshot.reference,
            bands: snapshot.bands,
            metrics: snapshot.metrics,
        }
    }
}

impl From<&DeskSnapshot> for OptionsDto {
    fn from(snapshot: &DeskSnapshot) -> Self {
        let scale = snapshot.chain.iv_scale;
        Self {
            params: snapshot.chain_params,
            universe: snapshot.universe.clone(),
            selection: snapshot.selection.clone(),
            iv_scale: scale,
            rows: snapshot
                .chain
                .rows
                .iter()
                .map(|row| ChainRowDto::from_row(row, &scale))
                .collect(),
        }
    }
}

impl From<&DeskSnapshot> for NotesDto {
    fn from(snapshot: &DeskSnapshot) -> Self {
        Self {
            mep: snapshot.mep,
            reference: snapshot.reference,
            bands: snapshot.bands,
            rows: snapshot.notes.clone(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<RwLock<DeskSnapshot>>,
    pub commands: mpsc::Sender<DeskCommand>,
}

/// Build the router over shared state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/options", get(get_options))
        .route("/api/notes", get(get_notes))
        .route(
            "/api/subscriptions",
            get(get_subscriptions)
                .post(post_subscriptions)
                .delete(delete_subscriptions),
        )
        .route("/api/selection", put(put_selection))
        .route("/api/chain/params", put(put_chain_params))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(state: AppState, config: &ApiConfig) -> Result<(), DeskError> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    log_api!(tracing::Level::INFO, "API Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn send_command(state: &AppState, command: DeskCommand) -> Result<(), StatusCode> {
    state.commands.send(command).await.map_err(|_| {
        log_api!(tracing::Level::ERROR, "Command channel closed");
        StatusCode::SERVICE_UNAVAILABLE
    })
}

/// Handler for GET /api/status
async fn get_status(State(state): State<AppState>) -> Json<StatusDto> {
    Json(StatusDto::from(&*state.snapshot.read()))
}

/// Handler for GET /api/options
async fn get_options(State(state): State<AppState>) -> Json<OptionsDto> {
    Json(OptionsDto::from(&*state.snapshot.read()))
}

/// Handler for GET /api/notes
async fn get_notes(State(state): State<AppState>) -> Json<NotesDto> {
    Json(NotesDto::from(&*state.snapshot.read()))
}

async fn get_subscriptions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.snapshot.read().subscriptions.clone())
}

/// Handler for POST /api/subscriptions
/// Body is plain text: symbols separated by commas and/or newlines
async fn post_subscriptions(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<AcceptedDto>), StatusCode> {
    let symbols = parse_input_tickers(&body);
    if symbols.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let accepted = symbols.len();
    log_api!(tracing::Level::INFO, "Subscribe request for {} symbols", accepted);
    send_command(&state, DeskCommand::Subscribe(symbols)).await?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedDto { accepted })))
}

async fn delete_subscriptions(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    log_api!(tracing::Level::INFO, "Unsubscribe-all request");
    send_command(&state, DeskCommand::UnsubscribeAll).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn put_selection(
    State(state): State<AppState>,
    Json(request): Json<SelectionRequest>,
) -> Result<StatusCode, StatusCode> {
    send_command(
        &state,
        DeskCommand::SetSelection {
            calls: request.calls,
            puts: request.puts,
        },
    )
    .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn put_chain_params(
    State(state): State<AppState>,
    Json(params): Json<ChainParams>,
) -> Result<StatusCode, StatusCode> {
    if !(params.risk_free_rate_pct.is_finite() && params.dividend_yield_pct.is_finite()) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    send_command(&state, DeskCommand::SetChainParams(params)).await?;
    Ok(StatusCode::ACCEPTED)
}
