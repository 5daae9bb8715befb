//! Basket builder → Apriori → rule generator, as one validated batch run.

use crate::apriori::{validate_min_support, FrequentItemset, FrequentItemsetMiner};
use crate::basket::BasketBuilder;
use crate::recommender::{RecommendationQuery, RecommendationResult, Recommender};
use crate::rules::{AssociationRule, RuleGenerator};
use basket_core::config::MiningConfig;
use basket_core::{BasketError, BasketResult, RuleMetric, SnapshotId, TransactionStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Parameters of one mining run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningParams {
    pub min_support: f64,
    pub metric: RuleMetric,
    pub min_threshold: f64,
    pub max_len: Option<usize>,
    pub max_candidates: Option<usize>,
    pub cancellation_marker: String,
}

impl MiningParams {
    pub fn from_config(config: &MiningConfig) -> Self {
        Self {
            min_support: config.min_support,
            metric: config.metric,
            min_threshold: config.min_threshold,
            max_len: config.max_len,
            max_candidates: config.max_candidates,
            cancellation_marker: config.cancellation_marker.clone(),
        }
    }

    /// Reject out-of-range values before any computation starts.
    pub fn validate(&self) -> BasketResult<()> {
        validate_min_support(self.min_support)?;
        if !self.min_threshold.is_finite() {
            return Err(BasketError::InvalidParameter(format!(
                "min_threshold must be finite, got {}",
                self.min_threshold
            )));
        }
        if self.max_len == Some(0) {
            return Err(BasketError::InvalidParameter(
                "max_len must be at least 1".to_string(),
            ));
        }
        if self.max_candidates == Some(0) {
            return Err(BasketError::InvalidParameter(
                "max_candidates must be at least 1".to_string(),
            ));
        }
        if self.cancellation_marker.is_empty() {
            return Err(BasketError::InvalidParameter(
                "cancellation marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MiningParams {
    fn default() -> Self {
        Self::from_config(&MiningConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningStatus {
    RulesFound,
    /// Itemsets were frequent but no rule met the threshold.
    NoRules,
    NoFrequentItemsets,
}

/// Output of one run, consumed by the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningReport {
    pub snapshot: SnapshotId,
    pub params: MiningParams,
    pub basket_count: usize,
    pub product_count: usize,
    pub itemsets: Vec<FrequentItemset>,
    pub rules: Vec<AssociationRule>,
    pub status: MiningStatus,
    pub elapsed_ms: u64,
    pub generated_at: DateTime<Utc>,
}

impl MiningReport {
    pub fn recommend(
        &self,
        query: &RecommendationQuery,
        recommender: &Recommender,
    ) -> RecommendationResult {
        recommender.recommend(query, &self.rules)
    }
}

#[derive(Debug, Clone)]
pub struct MiningPipeline {
    params: MiningParams,
    builder: BasketBuilder,
    miner: FrequentItemsetMiner,
    generator: RuleGenerator,
}

impl MiningPipeline {
    pub fn new(params: MiningParams) -> BasketResult<Self> {
        params.validate()?;
        let builder = BasketBuilder::new(params.cancellation_marker.clone())?;
        let miner = FrequentItemsetMiner::new(params.min_support)?
            .with_max_len(params.max_len)?
            .with_max_candidates(params.max_candidates)?;
        let generator = RuleGenerator::new(params.metric, params.min_threshold)?;
        Ok(Self {
            params,
            builder,
            miner,
            generator,
        })
    }

    pub fn params(&self) -> &MiningParams {
        &self.params
    }

    pub fn run(&self, store: &TransactionStore) -> BasketResult<MiningReport> {
        let started = Instant::now();
        metrics::counter!("mining.runs").increment(1);

        let matrix = self.builder.build(store.lines())?;
        let frequent = self.miner.mine(&matrix)?;
        let rules = self.generator.generate(&frequent)?;

        let status = if frequent.is_empty() {
            MiningStatus::NoFrequentItemsets
        } else if rules.is_empty() {
            MiningStatus::NoRules
        } else {
            MiningStatus::RulesFound
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        metrics::histogram!("mining.duration_ms").record(elapsed_ms as f64);

        info!(
            snapshot = store.snapshot().short(),
            baskets = matrix.basket_count(),
            products = matrix.product_count(),
            itemsets = frequent.len(),
            rules = rules.len(),
            min_support = self.params.min_support,
            metric = %self.params.metric,
            min_threshold = self.params.min_threshold,
            elapsed_ms = elapsed_ms,
            "Mining run complete"
        );

        Ok(MiningReport {
            snapshot: store.snapshot().clone(),
            params: self.params.clone(),
            basket_count: matrix.basket_count(),
            product_count: matrix.product_count(),
            itemsets: frequent.to_table(),
            rules,
            status,
            elapsed_ms,
            generated_at: Utc::now(),
        })
    }
}
