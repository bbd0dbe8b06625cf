//! [`SqlDriver`] implementation over a `rusqlite` connection.

use std::cell::Cell;
use std::path::Path;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, Row, ToSql, params_from_iter};
use tracing::{debug, trace, warn};

use crate::driver::{SqlCursor, SqlDriver};
use crate::error::{KabinError, Result};
use crate::schema::SqlSchema;
use crate::value::SqlValue;

/// A driver over one SQLite connection.
///
/// Foreign key enforcement is switched on when the driver is created.
/// Transactions are implemented with savepoints, so generated code may nest
/// them freely.
///
/// # Examples
///
/// ```
/// use kabin_runtime::{SqlDriver, SqliteDriver};
///
/// let driver = SqliteDriver::open_in_memory().unwrap();
/// driver.execute("CREATE TABLE t (x INTEGER)", &[]).unwrap();
/// let result = driver.transaction(&mut || {
///     driver.execute("INSERT INTO t (x) VALUES (1)", &[])?;
///     Err(kabin_runtime::KabinError::Driver("abort".into()))
/// });
/// assert!(result.is_err());
///
/// let mut count = 0;
/// driver
///     .query("SELECT x FROM t", &[], &mut |_| {
///         count += 1;
///         Ok(())
///     })
///     .unwrap();
/// assert_eq!(count, 0);
/// ```
pub struct SqliteDriver {
    connection: Connection,
    depth: Cell<u32>,
}

impl SqliteDriver {
    /// Wraps an open connection and enables foreign keys.
    pub fn new(connection: Connection) -> Result<Self> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            connection,
            depth: Cell::new(0),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Schema version recorded in the database file (`PRAGMA user_version`).
    pub fn user_version(&self) -> Result<i64> {
        Ok(self
            .connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn set_user_version(&self, version: i64) -> Result<()> {
        self.connection
            .execute_batch(&format!("PRAGMA user_version = {version};"))?;
        Ok(())
    }

    /// Creates the schema on a fresh database or migrates an older one,
    /// then records the schema's version.
    ///
    /// A database at the schema's version is left untouched.
    pub fn create_or_migrate(&self, schema: &dyn SqlSchema) -> Result<()> {
        let current = self.user_version()?;
        let target = schema.version();
        if current == target {
            return Ok(());
        }
        if current == 0 {
            debug!(version = target, "creating schema");
            schema.create(self)?;
        } else {
            debug!(from = current, to = target, "migrating schema");
            schema.migrate(self, current, target)?;
        }
        self.set_user_version(target)
    }
}

impl SqlDriver for SqliteDriver {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        trace!(sql, params = params.len(), "execute");
        let mut statement = self.connection.prepare_cached(sql)?;
        let changed = statement.execute(params_from_iter(params.iter()))?;
        Ok(changed as u64)
    }

    fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
        row: &mut dyn FnMut(&dyn SqlCursor) -> Result<()>,
    ) -> Result<()> {
        trace!(sql, params = params.len(), "query");
        let mut statement = self.connection.prepare_cached(sql)?;
        let mut rows = statement.query(params_from_iter(params.iter()))?;
        while let Some(current) = rows.next()? {
            let cursor: &dyn SqlCursor = &SqliteCursor { row: current };
            row(cursor)?;
        }
        Ok(())
    }

    fn transaction(&self, body: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let depth = self.depth.get();
        let savepoint = format!("kabin_{depth}");
        self.connection
            .execute_batch(&format!("SAVEPOINT {savepoint};"))?;
        self.depth.set(depth + 1);
        let outcome = body();
        self.depth.set(depth);

        match outcome {
            Ok(()) => {
                self.connection
                    .execute_batch(&format!("RELEASE {savepoint};"))?;
                Ok(())
            }
            Err(error) => {
                let rollback = format!("ROLLBACK TO {savepoint}; RELEASE {savepoint};");
                if let Err(rollback_error) = self.connection.execute_batch(&rollback) {
                    warn!(%rollback_error, "failed to roll back savepoint {savepoint}");
                }
                Err(error)
            }
        }
    }
}

struct SqliteCursor<'r, 's> {
    row: &'r Row<'s>,
}

impl SqlCursor for SqliteCursor<'_, '_> {
    fn column_index(&self, name: &str) -> Result<usize> {
        self.row
            .as_ref()
            .column_index(name)
            .map_err(|_| KabinError::ColumnNotFound(name.to_string()))
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.row.as_ref().column_name(index).ok()
    }

    fn get_value(&self, index: usize) -> Result<SqlValue> {
        Ok(match self.row.get_ref(index)? {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(value) => SqlValue::Integer(value),
            ValueRef::Real(value) => SqlValue::Real(value),
            ValueRef::Text(bytes) => SqlValue::Text(
                std::str::from_utf8(bytes)
                    .map_err(|error| KabinError::Conversion(error.to_string()))?
                    .to_string(),
            ),
            ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
        })
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Integer(value) => ValueRef::Integer(*value),
            SqlValue::Real(value) => ValueRef::Real(*value),
            SqlValue::Text(value) => ValueRef::Text(value.as_bytes()),
            SqlValue::Blob(value) => ValueRef::Blob(value),
        }))
    }
}
