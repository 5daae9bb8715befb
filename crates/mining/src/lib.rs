#![warn(clippy::unwrap_used)]

//! Market-basket mining: incidence matrix construction, Apriori frequent
//! itemsets, association rules and rule-based recommendations.

pub mod apriori;
pub mod basket;
pub mod cache;
pub mod itemset;
pub mod pipeline;
pub mod recommender;
pub mod rules;

pub use apriori::{FrequentItemset, FrequentItemsetMiner, FrequentItemsets};
pub use basket::{Basket, BasketBuilder, IncidenceMatrix};
pub use cache::{CacheKey, RuleCache};
pub use itemset::ItemSet;
pub use pipeline::{MiningParams, MiningPipeline, MiningReport, MiningStatus};
pub use recommender::{
    RecommendationItem, RecommendationQuery, RecommendationResult, RecommendationStatus,
    Recommender,
};
pub use rules::{AssociationRule, RuleGenerator};
