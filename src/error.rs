use thiserror::Error;

use crate::dialect::Dialect;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error taxonomy for the storage adapter.
///
/// Invalid-reference errors are raised synchronously, before any backend
/// call. Backend failures pass through with their originating message
/// attached and are never retried. Absence of a row is not an error; the
/// operations represent it as `None`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid table name: {table}")]
    InvalidTable { table: String },

    #[error("Invalid param {name:?}")]
    InvalidParam { name: String },

    #[error("Invalid search field {name:?}")]
    InvalidSearchField { name: String },

    #[error("Invalid sortBy {name:?}")]
    InvalidSortBy { name: String },

    #[error("Invalid groupBy {name:?}")]
    InvalidGroupBy { name: String },

    #[error("Invalid distinct field {name:?}")]
    InvalidDistinct { name: String },

    #[error("Missing required param {name:?}")]
    MissingParam { name: String },

    #[error("No query found for dialect {dialect}")]
    NoQueryForDialect { dialect: Dialect },

    #[error("Missing replacement {name:?}")]
    MissingReplacement { name: String },

    #[error("Corrupt stored value in field {field:?}: {source}")]
    Corrupt {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn invalid_table(table: impl Into<String>) -> Self {
        StoreError::InvalidTable { table: table.into() }
    }

    pub fn invalid_param(name: impl Into<String>) -> Self {
        StoreError::InvalidParam { name: name.into() }
    }

    pub fn missing_param(name: impl Into<String>) -> Self {
        StoreError::MissingParam { name: name.into() }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend { message: message.into() }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend {
            message: err.to_string(),
        }
    }
}
