use thiserror::Error;

pub type BasketResult<T> = Result<T, BasketError>;

#[derive(Error, Debug)]
pub enum BasketError {
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Schema mismatch at row {row}, field '{field}': {reason}")]
    SchemaMismatch {
        row: usize,
        field: &'static str,
        reason: String,
    },

    #[error("Mining aborted: {0}")]
    MiningAborted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BasketError {
    /// Stable machine-readable code, used in API error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            BasketError::EmptyDataset(_) => "empty_dataset",
            BasketError::InvalidParameter(_) => "invalid_parameter",
            BasketError::SchemaMismatch { .. } => "schema_mismatch",
            BasketError::MiningAborted(_) => "mining_aborted",
            BasketError::Config(_) => "config_error",
            BasketError::Serialization(_) => "serialization_error",
            BasketError::Io(_) => "io_error",
            BasketError::Internal(_) => "internal_error",
        }
    }

    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BasketError::EmptyDataset(_)
                | BasketError::InvalidParameter(_)
                | BasketError::SchemaMismatch { .. }
                | BasketError::MiningAborted(_)
                | BasketError::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_message_names_row_and_field() {
        let err = BasketError::SchemaMismatch {
            row: 7,
            field: "product_detail",
            reason: "missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Schema mismatch at row 7, field 'product_detail': missing"
        );
        assert_eq!(err.code(), "schema_mismatch");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_internal_errors_are_not_client_errors() {
        let err = BasketError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.code(), "internal_error");
        assert!(!err.is_client_error());
    }
}
