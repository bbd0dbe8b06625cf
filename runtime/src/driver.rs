//! The driver contract generated code is written against.
//!
//! Generated tables, mappers and query holders never talk to a database
//! library directly. They go through [`SqlDriver`], which executes
//! statements, streams rows through a [`SqlCursor`] and runs closures inside
//! a transaction. [`crate::SqliteDriver`] is the bundled implementation.
//!
//! # Examples
//!
//! ```
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> kabin_runtime::Result<()> {
//! use kabin_runtime::{SqlDriver, SqlValue, SqliteDriver, query_list, read};
//!
//! let driver = SqliteDriver::open_in_memory()?;
//! driver.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", &[])?;
//! driver.execute("INSERT INTO users (id, name) VALUES (?, ?)", &[SqlValue::from(1i64), SqlValue::from("ada")])?;
//!
//! let names: Vec<String> = query_list(&driver, "SELECT name FROM users", &[], |cursor| read(cursor, "name"))?;
//! assert_eq!(names, vec!["ada".to_string()]);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! ```

use crate::error::{KabinError, Result};
use crate::value::{FromSqlValue, SqlValue, decode_value};

/// Read access to the current row of a result set.
pub trait SqlCursor {
    /// Index of the named column.
    fn column_index(&self, name: &str) -> Result<usize>;

    /// Name of the column at `index`, if known.
    fn column_name(&self, index: usize) -> Option<&str>;

    fn get_value(&self, index: usize) -> Result<SqlValue>;

    fn is_null(&self, index: usize) -> Result<bool> {
        Ok(self.get_value(index)?.is_null())
    }

    fn get_long(&self, index: usize) -> Result<Option<i64>> {
        read_at(self, index)
    }

    fn get_double(&self, index: usize) -> Result<Option<f64>> {
        read_at(self, index)
    }

    fn get_string(&self, index: usize) -> Result<Option<String>> {
        read_at(self, index)
    }

    fn get_bytes(&self, index: usize) -> Result<Option<Vec<u8>>> {
        read_at(self, index)
    }
}

/// Executes statements on behalf of generated code.
pub trait SqlDriver {
    /// Runs a statement and returns the number of changed rows.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Runs a query, calling `row` once per result row.
    fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
        row: &mut dyn FnMut(&dyn SqlCursor) -> Result<()>,
    ) -> Result<()>;

    /// Runs `body` atomically: every statement it issues is committed when
    /// it returns `Ok` and rolled back when it returns `Err`. Nested calls
    /// are allowed.
    fn transaction(&self, body: &mut dyn FnMut() -> Result<()>) -> Result<()>;
}

/// Reads the named column of the current row.
pub fn read<T: FromSqlValue>(cursor: &dyn SqlCursor, column: &str) -> Result<T> {
    let index = cursor.column_index(column)?;
    let value = cursor.get_value(index)?;
    decode_value(column, value)
}

/// Reads the column at `index` of the current row.
pub fn read_at<T: FromSqlValue>(cursor: &(impl SqlCursor + ?Sized), index: usize) -> Result<T> {
    let value = cursor.get_value(index)?;
    let column = cursor.column_name(index).unwrap_or("?").to_string();
    decode_value(&column, value)
}

/// Reads the named column as a raw [`SqlValue`].
///
/// Generated compounds keep the parent key this way until their relations
/// are loaded.
pub fn read_value(cursor: &dyn SqlCursor, column: &str) -> Result<SqlValue> {
    let index = cursor.column_index(column)?;
    cursor.get_value(index)
}

/// Whether every listed column of the current row is NULL.
///
/// A nullable embedded struct reads as `None` when all of its columns are.
pub fn all_null(cursor: &dyn SqlCursor, columns: &[&str]) -> Result<bool> {
    for column in columns {
        let index = cursor.column_index(column)?;
        if !cursor.is_null(index)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Collects every row through `map`.
pub fn query_list<T>(
    driver: &(impl SqlDriver + ?Sized),
    sql: &str,
    params: &[SqlValue],
    mut map: impl FnMut(&dyn SqlCursor) -> Result<T>,
) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    driver.query(sql, params, &mut |cursor: &dyn SqlCursor| {
        rows.push(map(cursor)?);
        Ok(())
    })?;
    Ok(rows)
}

/// Maps the first row, if any. Further rows are ignored.
pub fn query_optional<T>(
    driver: &(impl SqlDriver + ?Sized),
    sql: &str,
    params: &[SqlValue],
    mut map: impl FnMut(&dyn SqlCursor) -> Result<T>,
) -> Result<Option<T>> {
    let mut first = None;
    driver.query(sql, params, &mut |cursor: &dyn SqlCursor| {
        if first.is_none() {
            first = Some(map(cursor)?);
        }
        Ok(())
    })?;
    Ok(first)
}

/// Maps the first row, failing with [`KabinError::NoRows`] when there is
/// none.
pub fn query_single<T>(
    driver: &(impl SqlDriver + ?Sized),
    sql: &str,
    params: &[SqlValue],
    map: impl FnMut(&dyn SqlCursor) -> Result<T>,
) -> Result<T> {
    let row = query_optional(driver, sql, params, map)?;
    require(row, sql)
}

/// Unwraps a row that must exist.
pub fn require<T>(row: Option<T>, sql: &str) -> Result<T> {
    row.ok_or_else(|| KabinError::NoRows(sql.to_string()))
}

/// Converts a changed-row count into the integer type a DAO declares.
pub fn affected_rows<T: TryFrom<u64>>(count: u64) -> Result<T> {
    T::try_from(count)
        .map_err(|_| KabinError::Conversion(format!("{count} affected rows do not fit the return type")))
}

/// Appends `?, ?, ..` for a list argument. An empty list renders `NULL`,
/// which matches nothing inside `IN (..)`.
pub fn push_placeholders(sql: &mut String, count: usize) {
    if count == 0 {
        sql.push_str("NULL");
        return;
    }
    for index in 0..count {
        if index > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
    }
}

/// Unwraps the result of a DAO function declared without a `Result`
/// return type.
///
/// # Panics
///
/// Panics with the function name and the error when `result` is `Err`.
pub fn unwrap_or_panic<T>(result: Result<T>, function: &str) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("{function} failed: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(Vec<(&'static str, SqlValue)>);

    impl SqlCursor for Row {
        fn column_index(&self, name: &str) -> Result<usize> {
            self.0
                .iter()
                .position(|(column, _)| *column == name)
                .ok_or_else(|| KabinError::ColumnNotFound(name.to_string()))
        }

        fn column_name(&self, index: usize) -> Option<&str> {
            self.0.get(index).map(|(column, _)| *column)
        }

        fn get_value(&self, index: usize) -> Result<SqlValue> {
            Ok(self.0[index].1.clone())
        }
    }

    #[test]
    fn test_all_null_checks_every_column() {
        let row = Row(vec![
            ("loc_lat", SqlValue::Null),
            ("loc_lng", SqlValue::Real(1.5)),
        ]);
        assert!(all_null(&row, &["loc_lat"]).unwrap());
        assert!(!all_null(&row, &["loc_lat", "loc_lng"]).unwrap());
        assert!(matches!(
            all_null(&row, &["missing"]),
            Err(KabinError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_read_value_keeps_storage_class() {
        let row = Row(vec![("id", SqlValue::Integer(7))]);
        assert_eq!(read_value(&row, "id").unwrap(), SqlValue::Integer(7));
        let id: i64 = read(&row, "id").unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn test_push_placeholders() {
        let mut sql = String::from("SELECT * FROM users WHERE id IN (");
        push_placeholders(&mut sql, 3);
        sql.push(')');
        assert_eq!(sql, "SELECT * FROM users WHERE id IN (?, ?, ?)");

        let mut empty = String::new();
        push_placeholders(&mut empty, 0);
        assert_eq!(empty, "NULL");
    }

    #[test]
    fn test_affected_rows_conversion() {
        assert_eq!(affected_rows::<i32>(3).unwrap(), 3);
        assert!(affected_rows::<u8>(300).is_err());
    }

    #[test]
    fn test_require_reports_sql() {
        let error = require::<i64>(None, "SELECT 1").unwrap_err();
        assert!(matches!(error, KabinError::NoRows(sql) if sql == "SELECT 1"));
    }

    #[test]
    #[should_panic(expected = "UserDao::get_user failed")]
    fn test_unwrap_or_panic_names_function() {
        unwrap_or_panic::<()>(Err(KabinError::NoRows("SELECT".to_string())), "UserDao::get_user");
    }
}
