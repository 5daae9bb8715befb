//! Basket builder: turns till lines into a sparse invoice × product
//! incidence matrix.

use crate::itemset::ItemSet;
use basket_core::{BasketError, BasketResult, TransactionLine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Distinct products bought on one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub invoice_id: String,
    pub products: BTreeSet<String>,
}

/// Sparse binary incidence matrix.
///
/// Rows are baskets (non-empty by construction), columns are every product
/// seen on a surviving line. Each product also carries its tidset: the
/// ascending indices of the baskets containing it.
#[derive(Debug, Clone)]
pub struct IncidenceMatrix {
    baskets: Vec<Basket>,
    tidsets: BTreeMap<String, Vec<usize>>,
}

impl IncidenceMatrix {
    pub fn basket_count(&self) -> usize {
        self.baskets.len()
    }

    pub fn product_count(&self) -> usize {
        self.tidsets.len()
    }

    pub fn baskets(&self) -> &[Basket] {
        &self.baskets
    }

    /// Column universe in ascending order.
    pub fn products(&self) -> impl Iterator<Item = &String> {
        self.tidsets.keys()
    }

    pub fn tidset(&self, product: &str) -> &[usize] {
        self.tidsets.get(product).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, invoice_id: &str, product: &str) -> bool {
        self.baskets
            .iter()
            .any(|b| b.invoice_id == invoice_id && b.products.contains(product))
    }

    /// Every (invoice, product) cell set to 1. Order-independent view used to
    /// compare two builds.
    pub fn entries(&self) -> BTreeSet<(String, String)> {
        self.baskets
            .iter()
            .flat_map(|b| {
                b.products
                    .iter()
                    .map(move |p| (b.invoice_id.clone(), p.clone()))
            })
            .collect()
    }

    /// Number of baskets containing every product of `items`.
    pub fn support_count(&self, items: &ItemSet) -> usize {
        let mut iter = items.iter();
        let Some(first) = iter.next() else {
            return 0;
        };
        let mut tids = self.tidset(first).to_vec();
        for item in iter {
            if tids.is_empty() {
                break;
            }
            tids = intersect_sorted(&tids, self.tidset(item));
        }
        tids.len()
    }

    /// Fraction of baskets containing every product of `items`.
    pub fn support(&self, items: &ItemSet) -> f64 {
        if self.baskets.is_empty() {
            return 0.0;
        }
        self.support_count(items) as f64 / self.baskets.len() as f64
    }
}

/// Intersection of two ascending index lists.
pub(crate) fn intersect_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Builds the incidence matrix, dropping unattributed and cancelled invoices.
#[derive(Debug, Clone)]
pub struct BasketBuilder {
    cancellation_marker: String,
}

impl BasketBuilder {
    pub fn new(cancellation_marker: impl Into<String>) -> BasketResult<Self> {
        let cancellation_marker = cancellation_marker.into();
        if cancellation_marker.is_empty() {
            return Err(BasketError::InvalidParameter(
                "cancellation marker must not be empty".to_string(),
            ));
        }
        Ok(Self {
            cancellation_marker,
        })
    }

    pub fn cancellation_marker(&self) -> &str {
        &self.cancellation_marker
    }

    pub fn build(&self, lines: &[TransactionLine]) -> BasketResult<IncidenceMatrix> {
        let mut missing_invoice = 0usize;
        let mut cancelled = 0usize;
        // invoice -> product -> net quantity
        let mut net: BTreeMap<&str, BTreeMap<&str, i64>> = BTreeMap::new();

        for line in lines {
            let Some(invoice_id) = line.invoice_id.as_deref() else {
                missing_invoice += 1;
                continue;
            };
            if line.is_cancelled(&self.cancellation_marker) {
                cancelled += 1;
                continue;
            }
            let qty = net
                .entry(invoice_id)
                .or_default()
                .entry(line.product_id.as_str())
                .or_insert(0);
            *qty = qty.saturating_add(line.quantity);
        }

        let mut tidsets: BTreeMap<String, Vec<usize>> = net
            .values()
            .flat_map(|products| products.keys())
            .map(|p| (p.to_string(), Vec::new()))
            .collect();

        let mut baskets = Vec::with_capacity(net.len());
        for (invoice_id, products) in &net {
            let present: BTreeSet<String> = products
                .iter()
                .filter(|(_, qty)| **qty > 0)
                .map(|(p, _)| p.to_string())
                .collect();
            if present.is_empty() {
                continue;
            }
            let row = baskets.len();
            for product in &present {
                if let Some(tids) = tidsets.get_mut(product) {
                    tids.push(row);
                }
            }
            baskets.push(Basket {
                invoice_id: invoice_id.to_string(),
                products: present,
            });
        }

        if baskets.is_empty() {
            return Err(BasketError::EmptyDataset(format!(
                "no baskets survived filtering ({} lines, {} cancelled, {} without invoice id)",
                lines.len(),
                cancelled,
                missing_invoice
            )));
        }

        debug!(
            baskets = baskets.len(),
            products = tidsets.len(),
            cancelled = cancelled,
            missing_invoice = missing_invoice,
            "Incidence matrix built"
        );

        Ok(IncidenceMatrix { baskets, tidsets })
    }
}

impl Default for BasketBuilder {
    fn default() -> Self {
        Self {
            cancellation_marker: "C".to_string(),
        }
    }
}
