//! Sales reporting: KPI totals, daily and intraday trends, category
//! distributions and best sellers over a transaction snapshot.

pub mod dashboard;
pub mod distribution;
pub mod trends;

pub use dashboard::{DateRange, IntradayTrend, SalesDashboard, SalesKpis, SalesOverview};
pub use distribution::{DistributionSlice, ProductVolume};
pub use trends::{DailyPoint, TimeSeriesPoint};
