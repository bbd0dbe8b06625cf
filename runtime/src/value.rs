//! SQL values and conversions to and from Rust types.

use crate::error::{KabinError, Result};

/// A value in one of SQLite's storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Storage class name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Real(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Borrowing conversion used to bind arguments.
pub trait ToSqlValue {
    fn to_sql_value(&self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(&self) -> SqlValue {
        self.clone()
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Integer(*self)
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Real(*self)
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSqlValue for str {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Blob(self.clone())
    }
}

impl ToSqlValue for [u8] {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, ToSqlValue::to_sql_value)
    }
}

impl<T: ToSqlValue + ?Sized> ToSqlValue for &T {
    fn to_sql_value(&self) -> SqlValue {
        (**self).to_sql_value()
    }
}

/// Conversion from a stored value into one of the native storage types
/// (`i64`, `f64`, `String`, `Vec<u8>`) or an `Option` of one.
pub trait FromSqlValue: Sized {
    /// Storage class expected, used in error messages.
    const EXPECTED: &'static str;

    /// Converts `value`, handing it back unchanged when it does not fit.
    fn from_sql_value(value: SqlValue) -> std::result::Result<Self, SqlValue>;
}

impl FromSqlValue for i64 {
    const EXPECTED: &'static str = "INTEGER";

    fn from_sql_value(value: SqlValue) -> std::result::Result<Self, SqlValue> {
        match value {
            SqlValue::Integer(value) => Ok(value),
            other => Err(other),
        }
    }
}

impl FromSqlValue for f64 {
    const EXPECTED: &'static str = "REAL";

    fn from_sql_value(value: SqlValue) -> std::result::Result<Self, SqlValue> {
        match value {
            SqlValue::Real(value) => Ok(value),
            SqlValue::Integer(value) => Ok(value as f64),
            other => Err(other),
        }
    }
}

impl FromSqlValue for String {
    const EXPECTED: &'static str = "TEXT";

    fn from_sql_value(value: SqlValue) -> std::result::Result<Self, SqlValue> {
        match value {
            SqlValue::Text(value) => Ok(value),
            other => Err(other),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    const EXPECTED: &'static str = "BLOB";

    fn from_sql_value(value: SqlValue) -> std::result::Result<Self, SqlValue> {
        match value {
            SqlValue::Blob(value) => Ok(value),
            other => Err(other),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_sql_value(value: SqlValue) -> std::result::Result<Self, SqlValue> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

/// Converts a value read from `column`, naming the column in errors.
pub fn decode_value<T: FromSqlValue>(column: &str, value: SqlValue) -> Result<T> {
    T::from_sql_value(value).map_err(|rejected| match rejected {
        SqlValue::Null => KabinError::UnexpectedNull(column.to_string()),
        other => KabinError::TypeMismatch {
            column: column.to_string(),
            expected: T::EXPECTED,
            found: other.kind(),
        },
    })
}
