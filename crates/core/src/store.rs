//! Read-only transaction snapshot. The snapshot id is a content fingerprint,
//! so reloading identical data yields the same id.

use crate::error::BasketResult;
use crate::types::{RawTransactionRecord, TransactionLine};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// SHA-256 fingerprint of a transaction snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct TransactionStore {
    lines: Vec<TransactionLine>,
    snapshot: SnapshotId,
    loaded_at: DateTime<Utc>,
}

impl TransactionStore {
    pub fn new(lines: Vec<TransactionLine>) -> BasketResult<Self> {
        let snapshot = fingerprint(&lines)?;
        debug!(lines = lines.len(), snapshot = snapshot.short(), "Transaction snapshot created");
        Ok(Self {
            lines,
            snapshot,
            loaded_at: Utc::now(),
        })
    }

    /// Validate every raw record, failing on the first schema mismatch.
    pub fn from_records(records: Vec<RawTransactionRecord>) -> BasketResult<Self> {
        let lines = records
            .into_iter()
            .enumerate()
            .map(|(row, record)| record.validate(row))
            .collect::<BasketResult<Vec<_>>>()?;
        Self::new(lines)
    }

    /// Load from a JSON array of raw records.
    pub fn from_json_str(json: &str) -> BasketResult<Self> {
        let records: Vec<RawTransactionRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> BasketResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_json_str(&json)?;
        info!(
            path = %path.display(),
            lines = store.len(),
            snapshot = store.snapshot.short(),
            "Transactions loaded"
        );
        Ok(store)
    }

    pub fn lines(&self) -> &[TransactionLine] {
        &self.lines
    }

    pub fn snapshot(&self) -> &SnapshotId {
        &self.snapshot
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// First and last calendar date covered by the snapshot.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.lines.iter().map(|l| l.date()).min()?;
        let last = self.lines.iter().map(|l| l.date()).max()?;
        Some((first, last))
    }
}

fn fingerprint(lines: &[TransactionLine]) -> BasketResult<SnapshotId> {
    let mut hasher = Sha256::new();
    for line in lines {
        let bytes = serde_json::to_vec(line)?;
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(SnapshotId(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BasketError;

    const SAMPLE: &str = r#"[
        {"new_invoice_id": "1001", "product_detail": "Roti Tawar", "transaction_qty": 1,
         "transaction_datetime": "2024-03-01 07:30:00", "Revenue": 15000,
         "product_category": "Bakery", "product_type": "Bread"},
        {"new_invoice_id": "1001", "product_detail": "Susu Segar 1L", "transaction_qty": 2,
         "transaction_datetime": "2024-03-01 07:30:00", "Revenue": 24000,
         "product_category": "Dairy", "product_type": "Milk"},
        {"new_invoice_id": "1002", "product_detail": "Roti Tawar", "transaction_qty": 1,
         "transaction_datetime": "2024-03-03 09:00:00", "Revenue": 15000,
         "product_category": "Bakery", "product_type": "Bread"}
    ]"#;

    #[test]
    fn test_load_from_json() {
        let store = TransactionStore::from_json_str(SAMPLE).unwrap();
        assert_eq!(store.len(), 3);
        assert!(!store.is_empty());
        assert_eq!(store.snapshot().as_str().len(), 64);
        let (first, last) = store.date_range().unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    }

    #[test]
    fn test_snapshot_id_is_content_addressed() {
        let a = TransactionStore::from_json_str(SAMPLE).unwrap();
        let b = TransactionStore::from_json_str(SAMPLE).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());

        let mut lines = a.lines().to_vec();
        lines[0].quantity = 5;
        let c = TransactionStore::new(lines).unwrap();
        assert_ne!(a.snapshot(), c.snapshot());
    }

    #[test]
    fn test_schema_mismatch_reports_row() {
        let json = r#"[
            {"new_invoice_id": "1", "product_detail": "A", "transaction_qty": 1,
             "transaction_datetime": "2024-03-01 07:30:00", "Revenue": 1,
             "product_category": "X", "product_type": "Y"},
            {"new_invoice_id": "2", "transaction_qty": 1,
             "transaction_datetime": "2024-03-01 07:30:00", "Revenue": 1,
             "product_category": "X", "product_type": "Y"}
        ]"#;
        match TransactionStore::from_json_str(json) {
            Err(BasketError::SchemaMismatch { row, field, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(field, "product_detail");
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        assert!(matches!(
            TransactionStore::from_json_str("{not json"),
            Err(BasketError::Serialization(_))
        ));
    }

    #[test]
    fn test_empty_store_has_no_date_range() {
        let store = TransactionStore::new(Vec::new()).unwrap();
        assert!(store.is_empty());
        assert!(store.date_range().is_none());
    }
}
