//! HTTP API: router, handlers, and wire types.
//!
//! All endpoints share application state through axum's `State` extractor.
//!
//! | Method | Path        | Auth | Description                        |
//! |--------|-------------|------|------------------------------------|
//! | POST   | `/register` | no   | Create an account                  |
//! | POST   | `/fund`     | yes  | Deposit funds                      |
//! | POST   | `/pay`      | yes  | Transfer funds to another user     |
//! | GET    | `/bal`      | yes  | Balance, optionally converted      |
//! | GET    | `/stmt`     | yes  | Transaction history, newest first  |
//! | POST   | `/product`  | yes  | Add a catalog product              |
//! | GET    | `/product`  | no   | List catalog products              |
//! | POST   | `/buy`      | yes  | Purchase a product                 |
//! | GET    | `/health`   | no   | Liveness probe                     |

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use walletd_auth::{hash_password, AuthGate, Credentials};
use walletd_common::{Amount, Currency, ProductId, Username, WalletError};
use walletd_engine::TransferEngine;
use walletd_fx::{FxError, FxService};
use walletd_store::{Account, AccountStore, LedgerStore, ProductStore};

/// Shared application state available to all request handlers.
///
/// Cheap to clone: store views are handles and the rest is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Authentication gate fronting every authenticated route.
    pub gate: AuthGate,
    /// The transfer engine for balance-affecting operations.
    pub engine: Arc<TransferEngine>,
    /// Account store, used for registration.
    pub accounts: AccountStore,
    /// Ledger store, queried directly by read-only history requests.
    pub ledger: LedgerStore,
    /// Product catalog.
    pub catalog: Arc<ProductStore>,
    /// Currency conversion collaborator.
    pub fx: Arc<FxService>,
}

/// Builds the axum [`Router`] with all API routes and request tracing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/fund", post(fund))
        .route("/pay", post(pay))
        .route("/bal", get(bal))
        .route("/stmt", get(stmt))
        .route("/product", post(add_product).get(list_products))
        .route("/buy", post(buy))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct FundRequest {
    pub amt: i64,
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub to: String,
    pub amt: i64,
}

#[derive(Debug, Deserialize)]
pub struct BalQuery {
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub product_id: u64,
}

/// One row of a user's statement, newest first.
#[derive(Debug, Serialize)]
pub struct StatementEntry {
    pub kind: walletd_common::EntryKind,
    pub amt: i64,
    pub updated_bal: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: u64,
    pub name: String,
    pub price: i64,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Wrapper that maps domain errors onto HTTP responses.
pub struct ApiError(WalletError);

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        Self(e)
    }
}

impl From<FxError> for ApiError {
    fn from(e: FxError) -> Self {
        match e {
            FxError::RateNotAvailable(_) => {
                Self(WalletError::InvalidInput("Invalid currency".to_string()))
            }
            FxError::Provider(msg) => Self(WalletError::ExternalServiceFailure(msg)),
        }
    }
}

impl From<walletd_auth::hash::HashError> for ApiError {
    fn from(e: walletd_auth::hash::HashError) -> Self {
        Self(WalletError::PersistenceFailure(e.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            WalletError::Unauthorized => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            WalletError::InvalidInput(_)
            | WalletError::InsufficientFunds { .. }
            | WalletError::NotFound(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            // Transient and internal failures are opaque to the caller.
            WalletError::ConflictRetryable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service busy, please retry".to_string(),
            ),
            WalletError::ExternalServiceFailure(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Currency conversion failed".to_string(),
            ),
            WalletError::PersistenceFailure(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(code = self.0.error_code(), error = %self.0, "request failed");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Extract Basic credentials once and authenticate against the gate.
///
/// A missing or malformed header fails the same way as a bad password.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Account, ApiError> {
    let credentials = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(Credentials::from_basic_header)
        .ok_or(WalletError::Unauthorized)?;
    Ok(state.gate.authenticate(&credentials)?)
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let username = Username::new(req.username);
    if !username.is_valid() || req.password.is_empty() {
        return Err(WalletError::InvalidInput(
            "user exists or invalid input".to_string(),
        )
        .into());
    }

    let credential_hash = hash_password(&req.password)?;
    state.accounts.register(username, credential_hash)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered" })),
    )
        .into_response())
}

async fn fund(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FundRequest>,
) -> Result<Response, ApiError> {
    let account = authenticate(&state, &headers)?;
    let amount = Amount::new(req.amt)?;

    let outcome = state.engine.fund(&account, amount).await?;
    Ok(Json(json!({ "balance": outcome.balance })).into_response())
}

async fn pay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PayRequest>,
) -> Result<Response, ApiError> {
    let account = authenticate(&state, &headers)?;
    let amount = Amount::new(req.amt)?;
    let to = Username::new(req.to);

    let outcome = state.engine.pay(&account, &to, amount).await?;
    Ok(Json(json!({ "balance": outcome.balance })).into_response())
}

async fn bal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BalQuery>,
) -> Result<Response, ApiError> {
    let account = authenticate(&state, &headers)?;

    let currency = match query.currency {
        None => {
            return Ok(Json(json!({
                "balance": account.balance,
                "currency": Currency::inr().code(),
            }))
            .into_response());
        }
        Some(code) => Currency::new(code),
    };

    if !currency.is_valid() {
        return Err(WalletError::InvalidInput("Invalid currency".to_string()).into());
    }

    let converted = state.fx.convert_balance(account.balance, &currency).await?;
    let converted = converted.to_f64().ok_or_else(|| {
        WalletError::ExternalServiceFailure("unrepresentable conversion result".to_string())
    })?;

    Ok(Json(json!({
        "balance": converted,
        "currency": currency.code(),
    }))
    .into_response())
}

async fn stmt(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<StatementEntry>>, ApiError> {
    let account = authenticate(&state, &headers)?;

    let entries = state
        .ledger
        .list_by_user(&account.username)
        .into_iter()
        .map(|record| StatementEntry {
            kind: record.kind,
            amt: record.amount.minor_units(),
            updated_bal: record.resulting_balance,
            timestamp: record.timestamp,
        })
        .collect();

    Ok(Json(entries))
}

async fn add_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProductRequest>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;

    if req.name.is_empty() {
        return Err(WalletError::InvalidInput("product name is required".to_string()).into());
    }
    let price = Amount::new(req.price)?;

    let product = state.catalog.insert(req.name, price, req.description);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": product.id, "message": "Product added" })),
    )
        .into_response())
}

async fn list_products(State(state): State<AppState>) -> Json<Vec<ProductResponse>> {
    let products = state
        .catalog
        .list()
        .into_iter()
        .map(|p| ProductResponse {
            id: p.id.get(),
            name: p.name,
            price: p.price.minor_units(),
            description: p.description,
        })
        .collect();
    Json(products)
}

async fn buy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BuyRequest>,
) -> Result<Response, ApiError> {
    let account = authenticate(&state, &headers)?;

    let outcome = state
        .engine
        .purchase(&account, ProductId::new(req.product_id))
        .await?;

    Ok(Json(json!({
        "message": "Product purchased",
        "balance": outcome.balance,
    }))
    .into_response())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
