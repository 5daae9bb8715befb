//! Shared types for the basket analytics workspace: transaction records,
//! the snapshot store, configuration and the error taxonomy.

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use error::{BasketError, BasketResult};
pub use store::{SnapshotId, TransactionStore};
pub use types::{RawTransactionRecord, RuleMetric, TransactionLine};
