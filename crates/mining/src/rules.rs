//! Association rule generation from mined itemsets.

use crate::apriori::FrequentItemsets;
use crate::itemset::ItemSet;
use basket_core::{BasketError, BasketResult, RuleMetric};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Directional rule `antecedent -> consequent`, both halves of one frequent
/// itemset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: ItemSet,
    pub consequent: ItemSet,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    /// Support of antecedent ∪ consequent.
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    pub leverage: f64,
    /// `None` when confidence is 1 (unbounded conviction).
    pub conviction: Option<f64>,
}

impl AssociationRule {
    fn from_supports(
        antecedent: ItemSet,
        consequent: ItemSet,
        support: f64,
        antecedent_support: f64,
        consequent_support: f64,
    ) -> Self {
        let confidence = support / antecedent_support;
        let lift = confidence / consequent_support;
        let leverage = support - antecedent_support * consequent_support;
        let conviction = if (1.0 - confidence).abs() < 1e-12 {
            None
        } else {
            Some((1.0 - consequent_support) / (1.0 - confidence))
        };
        Self {
            antecedent,
            consequent,
            antecedent_support,
            consequent_support,
            support,
            confidence,
            lift,
            leverage,
            conviction,
        }
    }

    pub fn metric(&self, metric: RuleMetric) -> f64 {
        match metric {
            RuleMetric::Support => self.support,
            RuleMetric::Confidence => self.confidence,
            RuleMetric::Lift => self.lift,
            RuleMetric::Leverage => self.leverage,
            RuleMetric::Conviction => self.conviction.unwrap_or(f64::INFINITY),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleGenerator {
    metric: RuleMetric,
    min_threshold: f64,
}

impl RuleGenerator {
    pub fn new(metric: RuleMetric, min_threshold: f64) -> BasketResult<Self> {
        if !min_threshold.is_finite() {
            return Err(BasketError::InvalidParameter(format!(
                "min_threshold must be finite, got {min_threshold}"
            )));
        }
        Ok(Self {
            metric,
            min_threshold,
        })
    }

    pub fn metric(&self) -> RuleMetric {
        self.metric
    }

    pub fn min_threshold(&self) -> f64 {
        self.min_threshold
    }

    /// Enumerate every antecedent/consequent split of every frequent itemset
    /// with two or more products and keep the rules meeting the threshold.
    ///
    /// Sorted by lift descending, then antecedent, then consequent.
    pub fn generate(&self, frequent: &FrequentItemsets) -> BasketResult<Vec<AssociationRule>> {
        let mut rules = Vec::new();
        let mut considered = 0usize;

        for (itemset, stats) in frequent.iter().filter(|(s, _)| s.len() >= 2) {
            for antecedent in itemset.proper_subsets() {
                let Some(consequent) = itemset.difference(&antecedent) else {
                    continue;
                };
                let antecedent_support = subset_support(frequent, &antecedent, itemset)?;
                let consequent_support = subset_support(frequent, &consequent, itemset)?;
                considered += 1;

                let rule = AssociationRule::from_supports(
                    antecedent,
                    consequent,
                    stats.support,
                    antecedent_support,
                    consequent_support,
                );
                if rule.metric(self.metric) >= self.min_threshold {
                    rules.push(rule);
                }
            }
        }

        rules.sort_by(|a, b| {
            b.lift
                .partial_cmp(&a.lift)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.antecedent.cmp(&b.antecedent))
                .then_with(|| a.consequent.cmp(&b.consequent))
        });

        debug!(
            metric = %self.metric,
            min_threshold = self.min_threshold,
            considered = considered,
            kept = rules.len(),
            "Association rules generated"
        );

        Ok(rules)
    }
}

/// Subsets of a frequent itemset are frequent themselves, so a miss here
/// means the itemset map was not produced by a level-wise miner.
fn subset_support(
    frequent: &FrequentItemsets,
    subset: &ItemSet,
    parent: &ItemSet,
) -> BasketResult<f64> {
    frequent.support(subset).ok_or_else(|| {
        BasketError::Internal(anyhow::anyhow!(
            "support of {subset} missing although its superset {parent} is frequent"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apriori::FrequentItemsetMiner;
    use crate::basket::tests::four_basket_lines;
    use crate::basket::BasketBuilder;

    fn set(items: &[&str]) -> ItemSet {
        ItemSet::new(items.iter().copied()).unwrap()
    }

    fn mined(min_support: f64) -> FrequentItemsets {
        let matrix = BasketBuilder::default().build(&four_basket_lines()).unwrap();
        FrequentItemsetMiner::new(min_support)
            .unwrap()
            .mine(&matrix)
            .unwrap()
    }

    fn find<'a>(
        rules: &'a [AssociationRule],
        a: &[&str],
        c: &[&str],
    ) -> Option<&'a AssociationRule> {
        rules
            .iter()
            .find(|r| r.antecedent == set(a) && r.consequent == set(c))
    }

    #[test]
    fn test_worked_example_rule() {
        let rules = RuleGenerator::new(RuleMetric::Lift, 0.7)
            .unwrap()
            .generate(&mined(0.5))
            .unwrap();
        let rule = find(&rules, &["A"], &["B"]).expect("A -> B");
        assert!((rule.support - 0.5).abs() < 1e-9);
        assert!((rule.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert!((rule.lift - (2.0 / 3.0) / 0.75).abs() < 1e-9);
        assert!((rule.leverage - (0.5 - 0.75 * 0.75)).abs() < 1e-9);
        let conviction = rule.conviction.unwrap();
        assert!((conviction - 0.25 / (1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_lift_threshold_filters() {
        // {A}->{B} and {B}->{A} have lift 0.889; {B}->{C} and {C}->{B} have lift 1.333
        let rules = RuleGenerator::new(RuleMetric::Lift, 1.0)
            .unwrap()
            .generate(&mined(0.5))
            .unwrap();
        assert_eq!(rules.len(), 2);
        assert!(find(&rules, &["B"], &["C"]).is_some());
        assert!(find(&rules, &["C"], &["B"]).is_some());
        assert!(find(&rules, &["A"], &["B"]).is_none());
    }

    #[test]
    fn test_confidence_metric_and_unbounded_conviction() {
        let rules = RuleGenerator::new(RuleMetric::Confidence, 1.0)
            .unwrap()
            .generate(&mined(0.5))
            .unwrap();
        // Every basket holding C also holds B
        let rule = find(&rules, &["C"], &["B"]).expect("C -> B");
        assert!((rule.confidence - 1.0).abs() < 1e-12);
        assert!(rule.conviction.is_none());
        assert_eq!(rule.metric(RuleMetric::Conviction), f64::INFINITY);
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_three_item_itemset_yields_six_rules() {
        let rules = RuleGenerator::new(RuleMetric::Support, 0.0)
            .unwrap()
            .generate(&mined(0.0001))
            .unwrap();
        let from_triple = rules
            .iter()
            .filter(|r| r.antecedent.len() + r.consequent.len() == 3)
            .count();
        assert_eq!(from_triple, 6);
        // three pairs contribute two rules each
        assert_eq!(rules.len(), 12);
    }

    #[test]
    fn test_rules_are_disjoint_and_consistent() {
        let frequent = mined(0.0001);
        let rules = RuleGenerator::new(RuleMetric::Lift, 0.0)
            .unwrap()
            .generate(&frequent)
            .unwrap();
        for rule in &rules {
            assert!(rule.antecedent.is_disjoint(&rule.consequent));
            let union = rule.antecedent.union(&rule.consequent);
            let s = frequent.support(&union).unwrap();
            let sa = frequent.support(&rule.antecedent).unwrap();
            let sc = frequent.support(&rule.consequent).unwrap();
            assert!((rule.confidence - s / sa).abs() < 1e-9);
            assert!((rule.lift - rule.confidence / sc).abs() < 1e-9);
        }
        assert!(rules.windows(2).all(|w| w[0].lift >= w[1].lift));
    }

    #[test]
    fn test_empty_rules_is_valid_outcome() {
        let rules = RuleGenerator::new(RuleMetric::Lift, 100.0)
            .unwrap()
            .generate(&mined(0.5))
            .unwrap();
        assert!(rules.is_empty());
        let none = RuleGenerator::new(RuleMetric::Lift, 0.0)
            .unwrap()
            .generate(&FrequentItemsets::default())
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        assert!(matches!(
            RuleGenerator::new(RuleMetric::Lift, f64::NAN),
            Err(BasketError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rule_serializes_unbounded_conviction_as_null() {
        let rules = RuleGenerator::new(RuleMetric::Confidence, 1.0)
            .unwrap()
            .generate(&mined(0.5))
            .unwrap();
        let json = serde_json::to_value(&rules[0]).unwrap();
        assert!(json["conviction"].is_null());
        assert_eq!(json["antecedent"], serde_json::json!(["C"]));
    }
}
