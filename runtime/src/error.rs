//! Error types for generated persistence code.
//!
//! Every operation a generated table, mapper, query holder or database
//! performs returns [`Result`], so driver failures, type mismatches and
//! missing rows all surface through one [`KabinError`].

use thiserror::Error;

/// Errors raised while executing generated code.
#[derive(Debug, Error)]
pub enum KabinError {
    /// Failure reported by a non-SQLite driver implementation.
    #[error("driver error: {0}")]
    Driver(String),

    /// SQLite operation failure.
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A column holds a value of the wrong storage class.
    #[error("column '{column}' holds {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A non-nullable property read a NULL column.
    #[error("column '{0}' is NULL but the property is not nullable")]
    UnexpectedNull(String),

    /// A single-row query returned no rows.
    #[error("query returned no rows: {0}")]
    NoRows(String),

    /// The result set has no column with this name.
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// An adapter could not convert a stored value.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Schema migrations are not generated.
    #[error("migration from version {from} to {to} is not supported")]
    MigrationUnsupported { from: i64, to: i64 },
}

/// Convenience alias for results with [`KabinError`].
pub type Result<T> = std::result::Result<T, KabinError>;
