//! Daily and intraday sales trends.

use basket_core::TransactionLine;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Revenue summed per calendar date, ascending.
pub fn daily_revenue(lines: &[TransactionLine]) -> Vec<DailyPoint> {
    daily_sum(lines, |l| l.revenue)
}

/// Units sold per calendar date, ascending. Returns count negatively.
pub fn daily_quantity(lines: &[TransactionLine]) -> Vec<DailyPoint> {
    daily_sum(lines, |l| l.quantity as f64)
}

/// Units sold on `date`, one point per distinct timestamp.
///
/// `None` when nothing was sold that day, so callers can tell "no
/// transactions" apart from a day whose quantities net to zero.
pub fn intraday_quantity(
    lines: &[TransactionLine],
    date: NaiveDate,
) -> Option<Vec<TimeSeriesPoint>> {
    let mut buckets: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    for line in lines.iter().filter(|l| l.date() == date) {
        *buckets.entry(line.timestamp).or_insert(0.0) += line.quantity as f64;
    }
    if buckets.is_empty() {
        return None;
    }
    Some(
        buckets
            .into_iter()
            .map(|(timestamp, value)| TimeSeriesPoint { timestamp, value })
            .collect(),
    )
}

fn daily_sum<F>(lines: &[TransactionLine], value: F) -> Vec<DailyPoint>
where
    F: Fn(&TransactionLine) -> f64,
{
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for line in lines {
        *buckets.entry(line.date()).or_insert(0.0) += value(line);
    }
    buckets
        .into_iter()
        .map(|(date, value)| DailyPoint { date, value })
        .collect()
}
