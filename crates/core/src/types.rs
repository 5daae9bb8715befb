use crate::error::{BasketError, BasketResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One line-item of a point-of-sale sale. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLine {
    /// Invoice identifier. Missing for rows the till could not attribute.
    pub invoice_id: Option<String>,
    pub product_id: String,
    /// Units sold. Returns are recorded as negative quantities.
    pub quantity: i64,
    pub timestamp: NaiveDateTime,
    pub revenue: f64,
    pub category: String,
    pub product_type: String,
}

impl TransactionLine {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// True when the invoice id carries the reversal marker.
    pub fn is_cancelled(&self, marker: &str) -> bool {
        self.invoice_id
            .as_deref()
            .map(|id| id.contains(marker))
            .unwrap_or(false)
    }
}

/// A transaction row as exported by the till, before validation.
///
/// Column names follow the store's export; the canonical field names are
/// accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransactionRecord {
    #[serde(rename = "new_invoice_id", alias = "invoice_id", default)]
    pub invoice_id: Option<serde_json::Value>,
    #[serde(rename = "product_detail", alias = "product_id", default)]
    pub product_id: Option<String>,
    #[serde(rename = "transaction_qty", alias = "quantity", default)]
    pub quantity: Option<f64>,
    #[serde(rename = "transaction_datetime", alias = "timestamp", default)]
    pub timestamp: Option<String>,
    #[serde(rename = "Revenue", alias = "revenue", default)]
    pub revenue: Option<f64>,
    #[serde(rename = "product_category", alias = "category", default)]
    pub category: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse the timestamp formats seen in till exports. A bare date maps to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl RawTransactionRecord {
    /// Convert into a typed line. `row` is the zero-based position in the
    /// source table and is reported on failure.
    pub fn validate(self, row: usize) -> BasketResult<TransactionLine> {
        let mismatch = |field: &'static str, reason: &str| BasketError::SchemaMismatch {
            row,
            field,
            reason: reason.to_string(),
        };

        let invoice_id = match self.invoice_id {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(_) => return Err(mismatch("new_invoice_id", "expected a string or number")),
        };

        let product_id = self
            .product_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| mismatch("product_detail", "missing or empty"))?;

        let quantity = self
            .quantity
            .ok_or_else(|| mismatch("transaction_qty", "missing"))?;
        if !quantity.is_finite() || quantity.fract() != 0.0 {
            return Err(mismatch("transaction_qty", "expected a whole number"));
        }

        let timestamp = self
            .timestamp
            .as_deref()
            .ok_or_else(|| mismatch("transaction_datetime", "missing"))
            .and_then(|raw| {
                parse_timestamp(raw)
                    .ok_or_else(|| mismatch("transaction_datetime", "unrecognised date-time"))
            })?;

        let revenue = self
            .revenue
            .filter(|r| r.is_finite())
            .ok_or_else(|| mismatch("Revenue", "missing or not finite"))?;

        let category = self
            .category
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| mismatch("product_category", "missing or empty"))?;

        let product_type = self
            .product_type
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| mismatch("product_type", "missing or empty"))?;

        Ok(TransactionLine {
            invoice_id,
            product_id,
            quantity: quantity as i64,
            timestamp,
            revenue,
            category,
            product_type,
        })
    }
}

/// Metric used to filter association rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleMetric {
    Support,
    Confidence,
    #[default]
    Lift,
    Leverage,
    Conviction,
}

impl RuleMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleMetric::Support => "support",
            RuleMetric::Confidence => "confidence",
            RuleMetric::Lift => "lift",
            RuleMetric::Leverage => "leverage",
            RuleMetric::Conviction => "conviction",
        }
    }
}

impl fmt::Display for RuleMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleMetric {
    type Err = BasketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "support" => Ok(RuleMetric::Support),
            "confidence" => Ok(RuleMetric::Confidence),
            "lift" => Ok(RuleMetric::Lift),
            "leverage" => Ok(RuleMetric::Leverage),
            "conviction" => Ok(RuleMetric::Conviction),
            other => Err(BasketError::InvalidParameter(format!(
                "unknown rule metric '{other}'"
            ))),
        }
    }
}
