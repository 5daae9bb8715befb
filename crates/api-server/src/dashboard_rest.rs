//! Sales dashboard endpoints.

use crate::rest::{error_response, ApiResult, AppState, ErrorResponse};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use basket_core::BasketError;
use basket_reporting::{IntradayTrend, SalesOverview};
use chrono::NaiveDate;
use serde::Deserialize;

/// GET /v1/dashboard: KPIs, trends, distributions and best sellers.
pub async fn handle_dashboard(State(state): State<AppState>) -> Json<SalesOverview> {
    let store = state.current_store();
    metrics::counter!("api.dashboard").increment(1);
    Json(state.dashboard.overview(&store))
}

#[derive(Debug, Deserialize)]
pub struct IntradayQuery {
    pub date: String,
}

/// GET /v1/dashboard/intraday?date=YYYY-MM-DD: Units sold through one day.
pub async fn handle_intraday(
    State(state): State<AppState>,
    Query(query): Query<IntradayQuery>,
) -> ApiResult<IntradayTrend> {
    let date = NaiveDate::parse_from_str(query.date.trim(), "%Y-%m-%d").map_err(|_| {
        error_response(&BasketError::InvalidParameter(format!(
            "date must be YYYY-MM-DD, got '{}'",
            query.date
        )))
    })?;

    let store = state.current_store();
    state.dashboard.intraday(&store, date).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no_transactions".to_string(),
                message: format!("no transactions on {date}"),
            }),
        )
    })
}
