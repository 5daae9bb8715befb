//! Level-wise frequent itemset mining (Apriori).
//!
//! Level k+1 candidates are built only by extending frequent k-itemsets
//! that share a (k-1)-prefix, and a candidate survives pruning only if all
//! of its k-subsets are frequent. Support is counted by intersecting the
//! parents' tidsets.

use crate::basket::{intersect_sorted, IncidenceMatrix};
use crate::itemset::ItemSet;
use basket_core::{BasketError, BasketResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::debug;

/// Tolerance applied when converting a support fraction into a basket count,
/// so that e.g. 2/4 >= 0.5 holds despite rounding.
const SUPPORT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemsetStats {
    pub count: usize,
    pub support: f64,
}

/// Row of the frequent-itemset table handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentItemset {
    pub items: ItemSet,
    pub support: f64,
    pub count: usize,
}

/// Every itemset whose support met the threshold, keyed by the set.
#[derive(Debug, Clone, Default)]
pub struct FrequentItemsets {
    basket_count: usize,
    itemsets: BTreeMap<ItemSet, ItemsetStats>,
}

impl FrequentItemsets {
    pub fn basket_count(&self) -> usize {
        self.basket_count
    }

    pub fn len(&self) -> usize {
        self.itemsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itemsets.is_empty()
    }

    pub fn get(&self, items: &ItemSet) -> Option<&ItemsetStats> {
        self.itemsets.get(items)
    }

    pub fn support(&self, items: &ItemSet) -> Option<f64> {
        self.itemsets.get(items).map(|s| s.support)
    }

    pub fn contains(&self, items: &ItemSet) -> bool {
        self.itemsets.contains_key(items)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemSet, &ItemsetStats)> {
        self.itemsets.iter()
    }

    pub fn of_size(&self, k: usize) -> impl Iterator<Item = (&ItemSet, &ItemsetStats)> {
        self.itemsets.iter().filter(move |(s, _)| s.len() == k)
    }

    /// Size of the largest frequent itemset, 0 when empty.
    pub fn max_len(&self) -> usize {
        self.itemsets.keys().map(ItemSet::len).max().unwrap_or(0)
    }

    /// Flattened table, highest support first, then by itemset.
    pub fn to_table(&self) -> Vec<FrequentItemset> {
        let mut table: Vec<FrequentItemset> = self
            .itemsets
            .iter()
            .map(|(items, stats)| FrequentItemset {
                items: items.clone(),
                support: stats.support,
                count: stats.count,
            })
            .collect();
        table.sort_by(|a, b| {
            b.support
                .partial_cmp(&a.support)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.items.cmp(&b.items))
        });
        table
    }
}

/// Apriori miner with optional bounds against candidate explosion.
#[derive(Debug, Clone)]
pub struct FrequentItemsetMiner {
    min_support: f64,
    max_len: Option<usize>,
    max_candidates: Option<usize>,
}

impl FrequentItemsetMiner {
    pub fn new(min_support: f64) -> BasketResult<Self> {
        validate_min_support(min_support)?;
        Ok(Self {
            min_support,
            max_len: None,
            max_candidates: None,
        })
    }

    /// Stop after itemsets of this size.
    pub fn with_max_len(mut self, max_len: Option<usize>) -> BasketResult<Self> {
        if max_len == Some(0) {
            return Err(BasketError::InvalidParameter(
                "max_len must be at least 1".to_string(),
            ));
        }
        self.max_len = max_len;
        Ok(self)
    }

    /// Abort with `MiningAborted` once more than this many candidates
    /// have been counted.
    pub fn with_max_candidates(mut self, max_candidates: Option<usize>) -> BasketResult<Self> {
        if max_candidates == Some(0) {
            return Err(BasketError::InvalidParameter(
                "max_candidates must be at least 1".to_string(),
            ));
        }
        self.max_candidates = max_candidates;
        Ok(self)
    }

    pub fn min_support(&self) -> f64 {
        self.min_support
    }

    /// Minimum number of baskets an itemset must appear in.
    pub fn min_count(&self, basket_count: usize) -> usize {
        let threshold = self.min_support * basket_count as f64;
        ((threshold - SUPPORT_EPSILON).ceil().max(1.0)) as usize
    }

    pub fn mine(&self, matrix: &IncidenceMatrix) -> BasketResult<FrequentItemsets> {
        let n = matrix.basket_count();
        if n == 0 {
            return Err(BasketError::EmptyDataset(
                "cannot mine itemsets over zero baskets".to_string(),
            ));
        }
        let started = Instant::now();
        let min_count = self.min_count(n);
        let mut counted = 0usize;
        let mut result = FrequentItemsets {
            basket_count: n,
            itemsets: BTreeMap::new(),
        };

        // Level 1: single products.
        let mut level: Vec<(ItemSet, Vec<usize>)> = Vec::new();
        for product in matrix.products() {
            self.charge(&mut counted, 1)?;
            let tids = matrix.tidset(product);
            if tids.len() >= min_count {
                level.push((ItemSet::singleton(product.clone()), tids.to_vec()));
            }
        }

        let mut k = 1;
        while !level.is_empty() {
            debug!(level = k, frequent = level.len(), "Apriori level complete");
            for (items, tids) in &level {
                result.itemsets.insert(
                    items.clone(),
                    ItemsetStats {
                        count: tids.len(),
                        support: tids.len() as f64 / n as f64,
                    },
                );
            }
            if self.max_len.is_some_and(|max| k >= max) {
                break;
            }
            level = self.next_level(&level, min_count, &mut counted)?;
            k += 1;
        }

        metrics::counter!("mining.candidates").increment(counted as u64);
        debug!(
            baskets = n,
            min_count = min_count,
            candidates = counted,
            frequent = result.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Frequent itemsets mined"
        );

        Ok(result)
    }

    /// Join step, subset pruning, then support counting.
    fn next_level(
        &self,
        level: &[(ItemSet, Vec<usize>)],
        min_count: usize,
        counted: &mut usize,
    ) -> BasketResult<Vec<(ItemSet, Vec<usize>)>> {
        let known: HashSet<&ItemSet> = level.iter().map(|(s, _)| s).collect();
        let mut next = Vec::new();

        for (i, (a, a_tids)) in level.iter().enumerate() {
            let prefix = &a.items()[..a.len() - 1];
            for (b, b_tids) in &level[i + 1..] {
                // Level is sorted, so sets sharing a prefix are contiguous.
                if &b.items()[..b.len() - 1] != prefix {
                    break;
                }
                let mut items = a.items().to_vec();
                items.push(b.items()[b.len() - 1].clone());
                let candidate = ItemSet::from_sorted(items);

                if !candidate
                    .subsets_of_size(candidate.len() - 1)
                    .iter()
                    .all(|s| known.contains(s))
                {
                    continue;
                }

                self.charge(counted, 1)?;
                let tids = intersect_sorted(a_tids, b_tids);
                if tids.len() >= min_count {
                    next.push((candidate, tids));
                }
            }
        }

        next.sort_by(|x, y| x.0.cmp(&y.0));
        Ok(next)
    }

    fn charge(&self, counted: &mut usize, n: usize) -> BasketResult<()> {
        *counted += n;
        match self.max_candidates {
            Some(max) if *counted > max => {
                metrics::counter!("mining.aborted").increment(1);
                Err(BasketError::MiningAborted(format!(
                    "candidate budget of {max} exceeded at min_support {}; \
                     raise min_support or set max_len",
                    self.min_support
                )))
            }
            _ => Ok(()),
        }
    }
}

pub fn validate_min_support(min_support: f64) -> BasketResult<()> {
    if !min_support.is_finite() || min_support <= 0.0 || min_support > 1.0 {
        return Err(BasketError::InvalidParameter(format!(
            "min_support must be in (0, 1], got {min_support}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::tests::{four_basket_lines, line};
    use crate::basket::BasketBuilder;

    fn set(items: &[&str]) -> ItemSet {
        ItemSet::new(items.iter().copied()).unwrap()
    }

    fn four_baskets() -> IncidenceMatrix {
        BasketBuilder::default().build(&four_basket_lines()).unwrap()
    }

    #[test]
    fn test_worked_example_supports() {
        let frequent = FrequentItemsetMiner::new(0.5)
            .unwrap()
            .mine(&four_baskets())
            .unwrap();

        assert_eq!(frequent.basket_count(), 4);
        assert!((frequent.support(&set(&["A"])).unwrap() - 0.75).abs() < 1e-9);
        assert!((frequent.support(&set(&["B"])).unwrap() - 0.75).abs() < 1e-9);
        assert!((frequent.support(&set(&["C"])).unwrap() - 0.5).abs() < 1e-9);
        assert!((frequent.support(&set(&["A", "B"])).unwrap() - 0.5).abs() < 1e-9);
        assert!((frequent.support(&set(&["B", "C"])).unwrap() - 0.5).abs() < 1e-9);
        // {A,C} and {A,B,C} appear in a single basket only
        assert!(!frequent.contains(&set(&["A", "C"])));
        assert!(!frequent.contains(&set(&["A", "B", "C"])));
        assert_eq!(frequent.len(), 5);
        assert_eq!(frequent.max_len(), 2);
    }

    #[test]
    fn test_low_support_means_at_least_one_basket() {
        let frequent = FrequentItemsetMiner::new(0.0001)
            .unwrap()
            .mine(&four_baskets())
            .unwrap();
        assert!(frequent.contains(&set(&["A", "B", "C"])));
        // 3 singles, 3 pairs, 1 triple
        assert_eq!(frequent.len(), 7);
        assert_eq!(frequent.of_size(2).count(), 3);
    }

    #[test]
    fn test_full_support_only_keeps_universal_items() {
        let lines = vec![
            line(Some("1"), "Gula", 1),
            line(Some("1"), "Kopi", 1),
            line(Some("2"), "Gula", 1),
        ];
        let matrix = BasketBuilder::default().build(&lines).unwrap();
        let frequent = FrequentItemsetMiner::new(1.0).unwrap().mine(&matrix).unwrap();
        assert_eq!(frequent.len(), 1);
        assert!(frequent.contains(&set(&["Gula"])));
    }

    #[test]
    fn test_invalid_min_support() {
        for bad in [1.5, 0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                FrequentItemsetMiner::new(bad),
                Err(BasketError::InvalidParameter(_))
            ));
        }
        assert!(FrequentItemsetMiner::new(1.0).is_ok());
    }

    #[test]
    fn test_min_count_rounding() {
        let miner = FrequentItemsetMiner::new(0.5).unwrap();
        assert_eq!(miner.min_count(4), 2);
        assert_eq!(miner.min_count(5), 3);
        let miner = FrequentItemsetMiner::new(0.3).unwrap();
        assert_eq!(miner.min_count(10), 3);
        let miner = FrequentItemsetMiner::new(0.01).unwrap();
        assert_eq!(miner.min_count(4), 1);
    }

    #[test]
    fn test_max_len_bounds_itemset_size() {
        let frequent = FrequentItemsetMiner::new(0.0001)
            .unwrap()
            .with_max_len(Some(1))
            .unwrap()
            .mine(&four_baskets())
            .unwrap();
        assert_eq!(frequent.max_len(), 1);
        assert_eq!(frequent.len(), 3);
        assert!(FrequentItemsetMiner::new(0.5)
            .unwrap()
            .with_max_len(Some(0))
            .is_err());
    }

    #[test]
    fn test_candidate_budget_aborts() {
        let result = FrequentItemsetMiner::new(0.0001)
            .unwrap()
            .with_max_candidates(Some(4))
            .unwrap()
            .mine(&four_baskets());
        assert!(matches!(result, Err(BasketError::MiningAborted(_))));

        // 3 singles + 3 pairs + 1 triple fits exactly
        let ok = FrequentItemsetMiner::new(0.0001)
            .unwrap()
            .with_max_candidates(Some(7))
            .unwrap()
            .mine(&four_baskets());
        assert!(ok.is_ok());
    }

    #[test]
    fn test_no_frequent_itemsets_is_not_an_error() {
        let lines = vec![
            line(Some("1"), "A", 1),
            line(Some("2"), "B", 1),
            line(Some("3"), "C", 1),
        ];
        let matrix = BasketBuilder::default().build(&lines).unwrap();
        let frequent = FrequentItemsetMiner::new(0.5).unwrap().mine(&matrix).unwrap();
        assert!(frequent.is_empty());
        assert!(frequent.to_table().is_empty());
    }

    #[test]
    fn test_table_is_sorted_by_support() {
        let frequent = FrequentItemsetMiner::new(0.5)
            .unwrap()
            .mine(&four_baskets())
            .unwrap();
        let table = frequent.to_table();
        assert_eq!(table[0].items, set(&["A"]));
        assert_eq!(table[1].items, set(&["B"]));
        assert!(table.windows(2).all(|w| w[0].support >= w[1].support));
    }
}
