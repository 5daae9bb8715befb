//! Frequent itemset, association rule and recommendation endpoints.

use crate::rest::{error_response, run_blocking, ApiResult, AppState};
use axum::extract::{Query, State};
use axum::Json;
use basket_core::config::MiningConfig;
use basket_core::{BasketError, BasketResult, RuleMetric, SnapshotId};
use basket_mining::{
    AssociationRule, FrequentItemset, MiningParams, MiningReport, MiningStatus,
    RecommendationItem, RecommendationQuery, RecommendationStatus, Recommender,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Query-string overrides of the configured mining parameters.
#[derive(Debug, Default, Deserialize)]
pub struct MiningQuery {
    pub min_support: Option<f64>,
    pub metric: Option<String>,
    pub min_threshold: Option<f64>,
    pub max_len: Option<usize>,
}

impl MiningQuery {
    fn params(&self, defaults: &MiningConfig) -> BasketResult<MiningParams> {
        overrides(
            defaults,
            self.min_support,
            self.metric.as_deref(),
            self.min_threshold,
            self.max_len,
        )
    }
}

fn overrides(
    defaults: &MiningConfig,
    min_support: Option<f64>,
    metric: Option<&str>,
    min_threshold: Option<f64>,
    max_len: Option<usize>,
) -> BasketResult<MiningParams> {
    let mut params = MiningParams::from_config(defaults);
    if let Some(min_support) = min_support {
        params.min_support = min_support;
    }
    if let Some(metric) = metric {
        params.metric = metric.parse::<RuleMetric>()?;
    }
    if let Some(min_threshold) = min_threshold {
        params.min_threshold = min_threshold;
    }
    if max_len.is_some() {
        params.max_len = max_len;
    }
    params.validate()?;
    Ok(params)
}

/// Mine (or fetch from cache) the report for the current snapshot.
async fn mine(state: &AppState, params: MiningParams) -> BasketResult<Arc<MiningReport>> {
    let store = state.current_store();
    let cache = state.cache.clone();
    run_blocking(move || cache.get_or_mine(&store, &params)).await
}

/// GET /v1/itemsets: Frequent itemsets of the current snapshot.
pub async fn handle_itemsets(
    State(state): State<AppState>,
    Query(query): Query<MiningQuery>,
) -> ApiResult<ItemsetsResponse> {
    let params = query.params(&state.mining).map_err(|e| error_response(&e))?;
    let report = mine(&state, params).await.map_err(|e| error_response(&e))?;
    metrics::counter!("api.itemsets").increment(1);

    Ok(Json(ItemsetsResponse {
        snapshot: report.snapshot.clone(),
        status: report.status,
        params: report.params.clone(),
        basket_count: report.basket_count,
        product_count: report.product_count,
        itemsets: report.itemsets.clone(),
        elapsed_ms: report.elapsed_ms,
    }))
}

/// GET /v1/rules: Association rules of the current snapshot.
pub async fn handle_rules(
    State(state): State<AppState>,
    Query(query): Query<MiningQuery>,
) -> ApiResult<RulesResponse> {
    let params = query.params(&state.mining).map_err(|e| error_response(&e))?;
    let report = mine(&state, params).await.map_err(|e| error_response(&e))?;
    metrics::counter!("api.rules").increment(1);

    Ok(Json(RulesResponse {
        snapshot: report.snapshot.clone(),
        status: report.status,
        params: report.params.clone(),
        basket_count: report.basket_count,
        rules: report.rules.clone(),
        elapsed_ms: report.elapsed_ms,
    }))
}

/// POST /v1/recommendations: Products to suggest alongside a basket.
pub async fn handle_recommendations(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> ApiResult<RecommendationResponse> {
    let request_id = Uuid::new_v4();
    let (query, recommender, params) = request
        .resolve(&state.mining)
        .map_err(|e| error_response(&e))?;

    let report = mine(&state, params).await.map_err(|e| error_response(&e))?;
    let result = report.recommend(&query, &recommender);
    debug!(
        request_id = %request_id,
        products = query.products().len(),
        recommended = result.items.len(),
        "Recommendation served"
    );
    metrics::counter!("api.recommendations").increment(1);

    Ok(Json(RecommendationResponse {
        request_id,
        snapshot: report.snapshot.clone(),
        mining_status: report.status,
        status: result.status,
        matched_rules: result.matched_rules,
        items: result.items,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationRequest {
    /// Selected products.
    pub products: Option<Vec<String>>,
    /// Comma-separated alternative to `products`.
    pub text: Option<String>,
    pub top_n: Option<usize>,
    pub min_support: Option<f64>,
    pub metric: Option<String>,
    pub min_threshold: Option<f64>,
    pub max_len: Option<usize>,
}

impl RecommendationRequest {
    fn resolve(
        &self,
        defaults: &MiningConfig,
    ) -> BasketResult<(RecommendationQuery, Recommender, MiningParams)> {
        let query = match (&self.products, &self.text) {
            (Some(products), _) => RecommendationQuery::new(products.iter())?,
            (None, Some(text)) => RecommendationQuery::parse(text)?,
            (None, None) => {
                return Err(BasketError::InvalidParameter(
                    "either 'products' or 'text' is required".to_string(),
                ))
            }
        };
        let recommender = Recommender::new(self.top_n.unwrap_or(defaults.top_n))?;
        let params = overrides(
            defaults,
            self.min_support,
            self.metric.as_deref(),
            self.min_threshold,
            self.max_len,
        )?;
        Ok((query, recommender, params))
    }
}

#[derive(Serialize)]
pub struct ItemsetsResponse {
    pub snapshot: SnapshotId,
    pub status: MiningStatus,
    pub params: MiningParams,
    pub basket_count: usize,
    pub product_count: usize,
    pub itemsets: Vec<FrequentItemset>,
    pub elapsed_ms: u64,
}

#[derive(Serialize)]
pub struct RulesResponse {
    pub snapshot: SnapshotId,
    pub status: MiningStatus,
    pub params: MiningParams,
    pub basket_count: usize,
    pub rules: Vec<AssociationRule>,
    pub elapsed_ms: u64,
}

#[derive(Serialize)]
pub struct RecommendationResponse {
    pub request_id: Uuid,
    pub snapshot: SnapshotId,
    pub mining_status: MiningStatus,
    pub status: RecommendationStatus,
    pub matched_rules: usize,
    pub items: Vec<RecommendationItem>,
}
