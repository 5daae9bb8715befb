//! Shared handler state, error mapping and operational endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use basket_core::config::{AppConfig, MiningConfig};
use basket_core::{BasketError, TransactionStore};
use basket_mining::RuleCache;
use basket_reporting::SalesDashboard;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Arc<TransactionStore>>>,
    pub cache: Arc<RuleCache>,
    pub dashboard: Arc<SalesDashboard>,
    pub mining: MiningConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &AppConfig, store: TransactionStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(Arc::new(store))),
            cache: Arc::new(RuleCache::new(config.cache.max_entries)),
            dashboard: Arc::new(SalesDashboard::default()),
            mining: config.mining.clone(),
            start_time: Instant::now(),
        }
    }

    /// The snapshot requests should read. Cheap: clones the `Arc`.
    pub fn current_store(&self) -> Arc<TransactionStore> {
        self.store.read().clone()
    }

    /// Swap in a new snapshot and drop cache entries for older ones.
    /// Returns the number of cache entries removed.
    pub fn replace_store(&self, store: TransactionStore) -> usize {
        let store = Arc::new(store);
        let snapshot = store.snapshot().clone();
        *self.store.write() = store;
        let removed = self.cache.invalidate_except(&snapshot);
        info!(snapshot = snapshot.short(), invalidated = removed, "Transaction snapshot replaced");
        removed
    }
}

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Map a domain error onto a status code and JSON body.
pub fn error_response(err: &BasketError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        BasketError::InvalidParameter(_)
        | BasketError::SchemaMismatch { .. }
        | BasketError::Serialization(_) => StatusCode::BAD_REQUEST,
        BasketError::EmptyDataset(_) | BasketError::MiningAborted(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if err.is_client_error() {
        warn!(error = %err, code = err.code(), "Request rejected");
        metrics::counter!("api.validation_errors").increment(1);
        err.to_string()
    } else {
        error!(error = %err, "Request failed");
        metrics::counter!("api.errors").increment(1);
        "Internal processing error".to_string()
    };

    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
            message,
        }),
    )
}

/// Run blocking work off the async executor, folding a panicked task into
/// an internal error.
pub async fn run_blocking<T, F>(work: F) -> Result<T, BasketError>
where
    F: FnOnce() -> Result<T, BasketError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BasketError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

/// GET /health: Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.current_store();
    Json(HealthResponse {
        status: "healthy".to_string(),
        snapshot: store.snapshot().to_string(),
        transaction_lines: store.len(),
        cached_reports: state.cache.len(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: Readiness check.
/// Returns 200 only once a non-empty snapshot is loaded.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.current_store().is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// GET /live: Liveness check.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub snapshot: String,
    pub transaction_lines: usize,
    pub cached_reports: usize,
    pub uptime_secs: u64,
}
