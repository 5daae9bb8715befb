//! Snapshot replacement endpoint.

use crate::rest::{error_response, run_blocking, ApiResult, AppState};
use axum::extract::State;
use axum::Json;
use basket_core::{RawTransactionRecord, SnapshotId, TransactionStore};
use serde::Serialize;

/// PUT /v1/transactions: Replace the snapshot with a new set of raw records.
///
/// The body is validated as a whole; a single bad row rejects the upload
/// and the previous snapshot stays in place.
pub async fn handle_replace_transactions(
    State(state): State<AppState>,
    Json(records): Json<Vec<RawTransactionRecord>>,
) -> ApiResult<ReplaceResponse> {
    let store = run_blocking(move || TransactionStore::from_records(records))
        .await
        .map_err(|e| error_response(&e))?;

    let snapshot = store.snapshot().clone();
    let transaction_lines = store.len();
    let invalidated_reports = state.replace_store(store);
    metrics::counter!("api.snapshot_replacements").increment(1);

    Ok(Json(ReplaceResponse {
        snapshot,
        transaction_lines,
        invalidated_reports,
    }))
}

#[derive(Serialize)]
pub struct ReplaceResponse {
    pub snapshot: SnapshotId,
    pub transaction_lines: usize,
    pub invalidated_reports: usize,
}
