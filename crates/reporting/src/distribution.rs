//! Category and product-type breakdowns, best sellers.

use basket_core::TransactionLine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSlice {
    pub label: String,
    pub count: u64,
    /// Fraction of all lines, 0.0 when there are none.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVolume {
    pub product_id: String,
    pub quantity: i64,
    pub revenue: f64,
}

pub fn category_distribution(lines: &[TransactionLine]) -> Vec<DistributionSlice> {
    distribution(lines, |l| l.category.as_str())
}

pub fn product_type_distribution(lines: &[TransactionLine]) -> Vec<DistributionSlice> {
    distribution(lines, |l| l.product_type.as_str())
}

/// Line counts per label, most frequent first, ties by label.
fn distribution<'a, F>(lines: &'a [TransactionLine], label: F) -> Vec<DistributionSlice>
where
    F: Fn(&'a TransactionLine) -> &'a str,
{
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for line in lines {
        *counts.entry(label(line)).or_insert(0) += 1;
    }

    let total = lines.len() as f64;
    let mut slices: Vec<DistributionSlice> = counts
        .into_iter()
        .map(|(label, count)| DistributionSlice {
            label: label.to_string(),
            count,
            share: if total > 0.0 { count as f64 / total } else { 0.0 },
        })
        .collect();
    slices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    slices
}

/// The `n` products with the highest summed quantity, ties by product id.
pub fn top_products(lines: &[TransactionLine], n: usize) -> Vec<ProductVolume> {
    let mut totals: BTreeMap<&str, (i64, f64)> = BTreeMap::new();
    for line in lines {
        let entry = totals.entry(line.product_id.as_str()).or_insert((0, 0.0));
        entry.0 = entry.0.saturating_add(line.quantity);
        entry.1 += line.revenue;
    }

    let mut volumes: Vec<ProductVolume> = totals
        .into_iter()
        .map(|(product_id, (quantity, revenue))| ProductVolume {
            product_id: product_id.to_string(),
            quantity,
            revenue,
        })
        .collect();
    volumes.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    volumes.truncate(n);
    volumes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn line(product: &str, category: &str, product_type: &str, qty: i64) -> TransactionLine {
        TransactionLine {
            invoice_id: Some("1".to_string()),
            product_id: product.to_string(),
            quantity: qty,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            revenue: qty as f64 * 1000.0,
            category: category.to_string(),
            product_type: product_type.to_string(),
        }
    }

    #[test]
    fn test_distribution_orders_by_count_then_label() {
        let lines = vec![
            line("Roti", "Bakery", "Bread", 1),
            line("Susu", "Dairy", "Milk", 1),
            line("Keju", "Dairy", "Cheese", 1),
            line("Kopi", "Beverage", "Coffee", 1),
        ];
        let categories = category_distribution(&lines);
        let labels: Vec<&str> = categories.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Dairy", "Bakery", "Beverage"]);
        assert_eq!(categories[0].count, 2);
        assert!((categories[0].share - 0.5).abs() < 1e-12);

        let types = product_type_distribution(&lines);
        assert_eq!(types.len(), 4);
        assert_eq!(types[0].label, "Bread");
    }

    #[test]
    fn test_empty_distribution() {
        assert!(category_distribution(&[]).is_empty());
        assert!(top_products(&[], 10).is_empty());
    }

    #[test]
    fn test_top_products_sums_quantity() {
        let lines = vec![
            line("Roti", "Bakery", "Bread", 2),
            line("Susu", "Dairy", "Milk", 1),
            line("Roti", "Bakery", "Bread", 3),
            line("Keju", "Dairy", "Cheese", 1),
            line("Kopi", "Beverage", "Coffee", 4),
        ];
        let top = top_products(&lines, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].product_id, "Roti");
        assert_eq!(top[0].quantity, 5);
        assert_eq!(top[0].revenue, 5000.0);
        assert_eq!(top[1].product_id, "Kopi");
        // Keju and Susu tie on 1, Keju sorts first
        assert_eq!(top[2].product_id, "Keju");
    }
}
