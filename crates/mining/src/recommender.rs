//! Rule-based product recommendations for a partial basket.

use crate::rules::AssociationRule;
use basket_core::{BasketError, BasketResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Products a customer already has in the basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationQuery {
    products: BTreeSet<String>,
}

impl RecommendationQuery {
    pub fn new<I, S>(products: I) -> BasketResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let products: BTreeSet<String> = products
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if products.is_empty() {
            return Err(BasketError::InvalidParameter(
                "recommendation query must name at least one product".to_string(),
            ));
        }
        Ok(Self { products })
    }

    /// Parse comma-separated free text, e.g. `"Kopi Bubuk, Gula Pasir"`.
    pub fn parse(text: &str) -> BasketResult<Self> {
        Self::new(text.split(','))
    }

    pub fn products(&self) -> &BTreeSet<String> {
        &self.products
    }

    pub fn contains(&self, product: &str) -> bool {
        self.products.contains(product)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub product_id: String,
    /// Confidence summed over every matching rule.
    pub score: f64,
    /// Number of matching rules that named this product.
    pub supporting_rules: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Recommended,
    /// No rule antecedent shares a product with the query.
    NoMatchingRules,
    /// Rules matched, but every consequent was already in the query.
    AllCandidatesExcluded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub items: Vec<RecommendationItem>,
    pub status: RecommendationStatus,
    pub matched_rules: usize,
}

impl RecommendationResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Recommender {
    top_n: usize,
}

impl Recommender {
    pub fn new(top_n: usize) -> BasketResult<Self> {
        if top_n == 0 {
            return Err(BasketError::InvalidParameter(
                "top_n must be at least 1".to_string(),
            ));
        }
        Ok(Self { top_n })
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Score every consequent product of the rules whose antecedent shares at
    /// least one product with the query, then rank.
    pub fn recommend(
        &self,
        query: &RecommendationQuery,
        rules: &[AssociationRule],
    ) -> RecommendationResult {
        let mut candidate_scores: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        let mut matched_rules = 0usize;

        for rule in rules {
            if !rule.antecedent.intersects(query.products()) {
                continue;
            }
            matched_rules += 1;
            for product in rule.consequent.iter() {
                let entry = candidate_scores.entry(product.as_str()).or_insert((0.0, 0));
                entry.0 += rule.confidence;
                entry.1 += 1;
            }
        }

        let mut items: Vec<RecommendationItem> = candidate_scores
            .into_iter()
            .filter(|(product, _)| !query.contains(product))
            .map(|(product, (score, supporting_rules))| RecommendationItem {
                product_id: product.to_string(),
                score,
                supporting_rules,
            })
            .collect();

        items.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        items.truncate(self.top_n);

        let status = if matched_rules == 0 {
            RecommendationStatus::NoMatchingRules
        } else if items.is_empty() {
            RecommendationStatus::AllCandidatesExcluded
        } else {
            RecommendationStatus::Recommended
        };

        debug!(
            query_size = query.products().len(),
            matched_rules = matched_rules,
            returned = items.len(),
            status = ?status,
            "Recommendations ranked"
        );

        RecommendationResult {
            items,
            status,
            matched_rules,
        }
    }
}

impl Default for Recommender {
    fn default() -> Self {
        Self { top_n: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itemset::ItemSet;

    fn rule(a: &[&str], c: &[&str], confidence: f64) -> AssociationRule {
        AssociationRule {
            antecedent: ItemSet::new(a.iter().copied()).unwrap(),
            consequent: ItemSet::new(c.iter().copied()).unwrap(),
            antecedent_support: 0.5,
            consequent_support: 0.5,
            support: 0.25,
            confidence,
            lift: 1.0,
            leverage: 0.0,
            conviction: None,
        }
    }

    #[test]
    fn test_worked_example_recommendation() {
        let rules = vec![rule(&["A"], &["B"], 0.5 / 0.75)];
        let query = RecommendationQuery::parse("A").unwrap();
        let result = Recommender::default().recommend(&query, &rules);
        assert_eq!(result.status, RecommendationStatus::Recommended);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].product_id, "B");
        assert!((result.items[0].score - 0.6667).abs() < 1e-3);
    }

    #[test]
    fn test_scores_accumulate_across_rules() {
        let rules = vec![
            rule(&["Kopi"], &["Gula"], 0.6),
            rule(&["Teh"], &["Gula"], 0.3),
            rule(&["Kopi"], &["Susu"], 0.7),
        ];
        let query = RecommendationQuery::new(["Kopi", "Teh"]).unwrap();
        let result = Recommender::default().recommend(&query, &rules);
        assert_eq!(result.matched_rules, 3);
        assert_eq!(result.items[0].product_id, "Gula");
        assert!((result.items[0].score - 0.9).abs() < 1e-12);
        assert_eq!(result.items[0].supporting_rules, 2);
        assert_eq!(result.items[1].product_id, "Susu");
    }

    #[test]
    fn test_partial_antecedent_match_is_enough() {
        let rules = vec![rule(&["A", "B"], &["C"], 0.8)];
        let query = RecommendationQuery::parse("B").unwrap();
        let result = Recommender::default().recommend(&query, &rules);
        assert_eq!(result.items[0].product_id, "C");
    }

    #[test]
    fn test_query_products_are_never_recommended() {
        let rules = vec![rule(&["A"], &["B", "C"], 0.9), rule(&["C"], &["A"], 0.9)];
        let query = RecommendationQuery::parse("A, C").unwrap();
        let result = Recommender::default().recommend(&query, &rules);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].product_id, "B");
    }

    #[test]
    fn test_all_candidates_excluded_status() {
        let rules = vec![rule(&["A"], &["B"], 0.9)];
        let query = RecommendationQuery::parse("A,B").unwrap();
        let result = Recommender::default().recommend(&query, &rules);
        assert!(result.is_empty());
        assert_eq!(result.status, RecommendationStatus::AllCandidatesExcluded);
    }

    #[test]
    fn test_no_matching_rules_status() {
        let rules = vec![rule(&["A"], &["B"], 0.9)];
        let query = RecommendationQuery::parse("Z").unwrap();
        let result = Recommender::default().recommend(&query, &rules);
        assert!(result.is_empty());
        assert_eq!(result.status, RecommendationStatus::NoMatchingRules);
        assert_eq!(result.matched_rules, 0);
    }

    #[test]
    fn test_ties_broken_by_product_id_and_truncated() {
        let rules = vec![
            rule(&["A"], &["D"], 0.5),
            rule(&["A"], &["B"], 0.5),
            rule(&["A"], &["C"], 0.5),
            rule(&["A"], &["E"], 0.4),
        ];
        let query = RecommendationQuery::parse("A").unwrap();
        let result = Recommender::default().recommend(&query, &rules);
        let ids: Vec<_> = result.items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C", "D"]);

        let result = Recommender::new(10).unwrap().recommend(&query, &rules);
        assert_eq!(result.items.len(), 4);
    }

    #[test]
    fn test_deterministic_output() {
        let rules = vec![
            rule(&["A"], &["B"], 0.3),
            rule(&["A"], &["C"], 0.3),
            rule(&["B"], &["C"], 0.2),
        ];
        let query = RecommendationQuery::parse("A, B").unwrap();
        let recommender = Recommender::default();
        assert_eq!(
            recommender.recommend(&query, &rules),
            recommender.recommend(&query, &rules)
        );
    }

    #[test]
    fn test_query_parsing() {
        let query = RecommendationQuery::parse(" Kopi Bubuk , ,Gula Pasir,Kopi Bubuk").unwrap();
        assert_eq!(query.products().len(), 2);
        assert!(query.contains("Kopi Bubuk"));
        assert!(query.contains("Gula Pasir"));
        assert!(RecommendationQuery::parse(" , ").is_err());
        assert!(RecommendationQuery::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_zero_top_n_rejected() {
        assert!(matches!(
            Recommender::new(0),
            Err(BasketError::InvalidParameter(_))
        ));
    }
}
