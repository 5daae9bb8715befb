//! Store sales dashboard: KPI totals plus the trend and distribution panels.

use crate::distribution::{self, DistributionSlice, ProductVolume};
use crate::trends::{self, DailyPoint, TimeSeriesPoint};
use basket_core::{SnapshotId, TransactionStore};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesKpis {
    pub total_quantity: i64,
    pub total_revenue: f64,
    /// Lines carrying an invoice id.
    pub transaction_count: u64,
    pub unique_products: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOverview {
    pub snapshot: SnapshotId,
    pub kpis: SalesKpis,
    pub date_range: Option<DateRange>,
    pub daily_revenue: Vec<DailyPoint>,
    pub daily_quantity: Vec<DailyPoint>,
    pub category_distribution: Vec<DistributionSlice>,
    pub product_type_distribution: Vec<DistributionSlice>,
    pub top_products: Vec<ProductVolume>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntradayTrend {
    pub date: NaiveDate,
    pub points: Vec<TimeSeriesPoint>,
}

pub struct SalesDashboard {
    top_products: usize,
}

impl SalesDashboard {
    pub fn new(top_products: usize) -> Self {
        Self { top_products }
    }

    pub fn kpis(&self, store: &TransactionStore) -> SalesKpis {
        let lines = store.lines();
        let total_quantity = lines
            .iter()
            .fold(0i64, |acc, l| acc.saturating_add(l.quantity));
        let total_revenue: f64 = lines.iter().map(|l| l.revenue).sum();
        let transaction_count = lines.iter().filter(|l| l.invoice_id.is_some()).count() as u64;
        let unique_products = lines
            .iter()
            .map(|l| l.product_id.as_str())
            .collect::<HashSet<_>>()
            .len() as u64;

        SalesKpis {
            total_quantity,
            total_revenue,
            transaction_count,
            unique_products,
        }
    }

    pub fn overview(&self, store: &TransactionStore) -> SalesOverview {
        let lines = store.lines();
        let overview = SalesOverview {
            snapshot: store.snapshot().clone(),
            kpis: self.kpis(store),
            date_range: store
                .date_range()
                .map(|(first, last)| DateRange { first, last }),
            daily_revenue: trends::daily_revenue(lines),
            daily_quantity: trends::daily_quantity(lines),
            category_distribution: distribution::category_distribution(lines),
            product_type_distribution: distribution::product_type_distribution(lines),
            top_products: distribution::top_products(lines, self.top_products),
            generated_at: Utc::now(),
        };
        debug!(
            snapshot = store.snapshot().short(),
            days = overview.daily_revenue.len(),
            "Dashboard overview computed"
        );
        overview
    }

    /// Intraday quantity for `date`, `None` when the store sold nothing that day.
    pub fn intraday(&self, store: &TransactionStore, date: NaiveDate) -> Option<IntradayTrend> {
        trends::intraday_quantity(store.lines(), date).map(|points| IntradayTrend { date, points })
    }
}

impl Default for SalesDashboard {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::TransactionLine;

    fn line(
        invoice: Option<&str>,
        product: &str,
        qty: i64,
        revenue: f64,
        day: u32,
    ) -> TransactionLine {
        TransactionLine {
            invoice_id: invoice.map(str::to_string),
            product_id: product.to_string(),
            quantity: qty,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap(),
            revenue,
            category: "Dairy".to_string(),
            product_type: "Milk".to_string(),
        }
    }

    fn store() -> TransactionStore {
        TransactionStore::new(vec![
            line(Some("1001"), "Susu Segar 1L", 2, 24000.0, 1),
            line(Some("1001"), "Yogurt", 1, 8000.0, 1),
            line(None, "Susu Segar 1L", 1, 12000.0, 2),
            line(Some("1003"), "Keju", 3, 45000.0, 4),
        ])
        .unwrap()
    }

    #[test]
    fn test_kpis() {
        let kpis = SalesDashboard::default().kpis(&store());
        assert_eq!(kpis.total_quantity, 7);
        assert_eq!(kpis.total_revenue, 89000.0);
        assert_eq!(kpis.transaction_count, 3);
        assert_eq!(kpis.unique_products, 3);
    }

    #[test]
    fn test_overview_panels() {
        let store = store();
        let overview = SalesDashboard::new(2).overview(&store);
        assert_eq!(&overview.snapshot, store.snapshot());
        let range = overview.date_range.unwrap();
        assert_eq!(range.first, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(range.last, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(overview.daily_revenue.len(), 3);
        assert_eq!(overview.daily_quantity[0].value, 3.0);
        assert_eq!(overview.category_distribution[0].count, 4);
        assert_eq!(overview.top_products.len(), 2);
        assert_eq!(overview.top_products[0].product_id, "Keju");
        assert_eq!(overview.top_products[1].product_id, "Susu Segar 1L");
    }

    #[test]
    fn test_empty_store_overview() {
        let store = TransactionStore::new(Vec::new()).unwrap();
        let overview = SalesDashboard::default().overview(&store);
        assert_eq!(overview.kpis.total_quantity, 0);
        assert_eq!(overview.kpis.unique_products, 0);
        assert!(overview.date_range.is_none());
        assert!(overview.daily_revenue.is_empty());
    }

    #[test]
    fn test_intraday() {
        let dashboard = SalesDashboard::default();
        let trend = dashboard
            .intraday(&store(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .unwrap();
        assert_eq!(trend.points.len(), 1);
        assert_eq!(trend.points[0].value, 3.0);
        assert!(dashboard
            .intraday(&store(), NaiveDate::from_ymd_opt(2024, 3, 3).unwrap())
            .is_none());
    }
}
