//! JSON routes over one shared [`Ledger`]. Handlers only translate between
//! HTTP and ledger calls; every ledger call runs on the blocking pool since
//! mining holds the ledger's write lock for as long as the nonce search takes.

use crate::constants::{BLOCKS_PER_PAGE, MAX_BLOCKS_PER_REQUEST};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use blocksmith_core::{
    Block, ChainViolation, Decimal, Ledger, LedgerError, Rejection, Transaction, Wallet,
    WalletError,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Ledger>,
    /// Node-held wallets by address. Private keys never leave this map.
    wallets: Arc<RwLock<HashMap<String, Wallet>>>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            wallets: Arc::default(),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Ledger) -> T + Send + 'static,
        T: Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chain", get(chain))
        .route("/chain/head", get(head))
        .route("/chain/validate", get(validate))
        .route("/blocks", post(import_block))
        .route("/blocks/{index}", get(block_at))
        .route("/tx", post(import_tx))
        .route("/tx/draft", post(submit_draft))
        .route("/mempool", get(mempool))
        .route("/mine", post(mine))
        .route("/balance/{address}", get(balance))
        .route("/wallets", post(create_wallet))
        .route("/wallets/{address}/transfer", post(transfer))
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Rejected(Rejection),
    Integrity(ChainViolation),
    Cancelled,
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, detail) = match self {
            ApiError::Rejected(r) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                r.to_string(),
                serde_json::to_value(&r).ok(),
            ),
            ApiError::Integrity(v) => (StatusCode::CONFLICT, v.to_string(), serde_json::to_value(v).ok()),
            ApiError::Cancelled => (StatusCode::CONFLICT, "mining was cancelled".to_string(), None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };
        (status, Json(ErrorResponse { error, detail })).into_response()
    }
}

impl From<Rejection> for ApiError {
    fn from(r: Rejection) -> Self {
        ApiError::Rejected(r)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(r) => ApiError::Rejected(r),
            LedgerError::Integrity(v) => ApiError::Integrity(v),
            LedgerError::MiningCancelled => ApiError::Cancelled,
            LedgerError::Config(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::KeyGeneration(msg) => ApiError::Internal(msg),
            mismatch @ WalletError::SignatureMismatch { .. } => ApiError::BadRequest(mismatch.to_string()),
        }
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Deserialize)]
struct ChainPage {
    from: Option<usize>,
    limit: Option<usize>,
}

async fn chain(State(state): State<AppState>, Query(page): Query<ChainPage>) -> Result<Json<Vec<Block>>, ApiError> {
    let from = page.from.unwrap_or(0);
    let limit = page.limit.unwrap_or(BLOCKS_PER_PAGE).min(MAX_BLOCKS_PER_REQUEST);
    let blocks = state
        .run(move |ledger| ledger.chain().into_iter().skip(from).take(limit).collect())
        .await?;
    Ok(Json(blocks))
}

#[derive(Serialize)]
struct Head {
    height: u64,
    hash: String,
}

async fn head(State(state): State<AppState>) -> Result<Json<Head>, ApiError> {
    let tip = state.run(Ledger::latest_block).await?;
    Ok(Json(Head {
        height: tip.index(),
        hash: tip.hash().to_string(),
    }))
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    violation: Option<ChainViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn validate(State(state): State<AppState>) -> Result<Json<ValidationReport>, ApiError> {
    let report = match state.run(Ledger::validate_chain).await? {
        Ok(()) => ValidationReport {
            valid: true,
            violation: None,
            message: None,
        },
        Err(v) => ValidationReport {
            valid: false,
            message: Some(v.to_string()),
            violation: Some(v),
        },
    };
    Ok(Json(report))
}

async fn block_at(State(state): State<AppState>, Path(index): Path<usize>) -> Result<Json<Block>, ApiError> {
    state
        .run(move |ledger| ledger.block(index))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no block at index {index}")))
}

async fn import_block(State(state): State<AppState>, Json(block): Json<Block>) -> Result<Json<Head>, ApiError> {
    let hash = block.hash().to_string();
    let height = block.index();
    state.run(move |ledger| ledger.import_block(block)).await??;
    Ok(Json(Head { height, hash }))
}

#[derive(Debug, Serialize)]
struct Accepted {
    accepted: bool,
    transaction: Transaction,
}

/// A complete transaction from elsewhere. It is taken exactly as sent and
/// goes through [`Ledger::import_transaction`]; anything that does not parse
/// as a transaction is refused.
async fn import_tx(State(state): State<AppState>, body: Bytes) -> Result<Json<Accepted>, ApiError> {
    let tx: Transaction = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed transaction: {e}")))?;
    let transaction = tx.clone();
    state.run(move |ledger| ledger.import_transaction(tx)).await??;
    Ok(Json(Accepted {
        accepted: true,
        transaction,
    }))
}

/// A bare transfer, stamped and hashed here.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Draft {
    sender: String,
    recipient: String,
    amount: Decimal,
}

async fn submit_draft(State(state): State<AppState>, Json(draft): Json<Draft>) -> Result<Json<Accepted>, ApiError> {
    let tx = Transaction::new(draft.sender, draft.recipient, draft.amount);
    let transaction = tx.clone();
    state.run(move |ledger| ledger.submit_transaction(tx)).await??;
    Ok(Json(Accepted {
        accepted: true,
        transaction,
    }))
}

async fn mempool(State(state): State<AppState>) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.run(Ledger::mempool).await?))
}

#[derive(Deserialize)]
struct MineRequest {
    miner: String,
}

async fn mine(State(state): State<AppState>, Json(req): Json<MineRequest>) -> Result<Json<Block>, ApiError> {
    let block = state
        .run(move |ledger| ledger.mine_pending_transactions(&req.miner))
        .await??;
    Ok(Json(block))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Balance {
    address: String,
    confirmed: Decimal,
    pending_outgoing: Decimal,
    available: Decimal,
    display: String,
}

async fn balance(State(state): State<AppState>, Path(address): Path<String>) -> Result<Json<Balance>, ApiError> {
    let balance = state
        .run(move |ledger| {
            let confirmed = ledger.balance(&address);
            let pending_outgoing = ledger.pending_outgoing(&address);
            Balance {
                display: ledger.config().format_amount(confirmed),
                available: confirmed - pending_outgoing,
                address,
                confirmed,
                pending_outgoing,
            }
        })
        .await?;
    Ok(Json(balance))
}

#[derive(Serialize)]
struct WalletCreated {
    address: String,
}

async fn create_wallet(State(state): State<AppState>) -> Result<Json<WalletCreated>, ApiError> {
    let wallet = Wallet::generate()?;
    let address = wallet.address().to_string();
    state.wallets.write().insert(address.clone(), wallet);
    info!(%address, "created node-held wallet");
    Ok(Json(WalletCreated { address }))
}

#[derive(Deserialize)]
struct TransferRequest {
    to: String,
    amount: Decimal,
}

async fn transfer(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<Accepted>, ApiError> {
    let mut tx = Transaction::new(address.as_str(), req.to, req.amount);
    {
        let wallets = state.wallets.read();
        let wallet = wallets
            .get(&address)
            .ok_or_else(|| ApiError::NotFound(format!("no wallet held for {address}")))?;
        wallet.sign(&mut tx)?;
    }
    let transaction = tx.clone();
    state.run(move |ledger| ledger.submit_transaction(tx)).await??;
    Ok(Json(Accepted {
        accepted: true,
        transaction,
    }))
}
