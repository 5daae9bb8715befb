//! Sorted, duplicate-free product sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A non-empty set of distinct product ids, kept sorted so that equal sets
/// compare, hash and serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ItemSet(Vec<String>);

impl ItemSet {
    /// Build from any collection of product ids. Returns `None` when empty.
    pub fn new<I, S>(items: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<String> = items.into_iter().map(Into::into).collect();
        items.sort();
        items.dedup();
        if items.is_empty() {
            None
        } else {
            Some(Self(items))
        }
    }

    pub fn singleton(item: impl Into<String>) -> Self {
        Self(vec![item.into()])
    }

    /// Caller guarantees `items` is sorted, deduplicated and non-empty.
    pub(crate) fn from_sorted(items: Vec<String>) -> Self {
        debug_assert!(!items.is_empty());
        debug_assert!(items.windows(2).all(|w| w[0] < w[1]));
        Self(items)
    }

    pub fn items(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.0.binary_search_by(|p| p.as_str().cmp(item)).is_ok()
    }

    pub fn is_subset(&self, other: &ItemSet) -> bool {
        self.0.iter().all(|item| other.contains(item))
    }

    pub fn is_disjoint(&self, other: &ItemSet) -> bool {
        !self.0.iter().any(|item| other.contains(item))
    }

    /// True when at least one product of this set is in `products`.
    pub fn intersects(&self, products: &BTreeSet<String>) -> bool {
        self.0.iter().any(|item| products.contains(item))
    }

    pub fn union(&self, other: &ItemSet) -> ItemSet {
        let merged: BTreeSet<&String> = self.0.iter().chain(other.0.iter()).collect();
        ItemSet(merged.into_iter().cloned().collect())
    }

    /// Products of `self` not in `other`; `None` when nothing remains.
    pub fn difference(&self, other: &ItemSet) -> Option<ItemSet> {
        let rest: Vec<String> = self
            .0
            .iter()
            .filter(|item| !other.contains(item))
            .cloned()
            .collect();
        if rest.is_empty() {
            None
        } else {
            Some(ItemSet(rest))
        }
    }

    /// All subsets with exactly `k` products, in lexicographic order.
    pub fn subsets_of_size(&self, k: usize) -> Vec<ItemSet> {
        combinations(self.0.len(), k)
            .into_iter()
            .map(|idx| ItemSet(idx.into_iter().map(|i| self.0[i].clone()).collect()))
            .collect()
    }

    /// Every non-empty subset other than the set itself, smallest first.
    pub fn proper_subsets(&self) -> Vec<ItemSet> {
        (1..self.0.len())
            .flat_map(|k| self.subsets_of_size(k))
            .collect()
    }
}

impl TryFrom<Vec<String>> for ItemSet {
    type Error = String;

    fn try_from(items: Vec<String>) -> Result<Self, Self::Error> {
        ItemSet::new(items).ok_or_else(|| "item set must not be empty".to_string())
    }
}

impl From<ItemSet> for Vec<String> {
    fn from(set: ItemSet) -> Self {
        set.0
    }
}

impl fmt::Display for ItemSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.join(", "))
    }
}

/// Index combinations of `k` out of `n`, lexicographic.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        // Rightmost position that can still advance.
        let mut i = k;
        while i > 0 && idx[i - 1] == n - k + (i - 1) {
            i -= 1;
        }
        if i == 0 {
            return out;
        }
        idx[i - 1] += 1;
        for j in i..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}
