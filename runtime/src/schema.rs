//! Traits implemented by generated mappers, schemas and databases.

use std::sync::Arc;

use crate::driver::{SqlCursor, SqlDriver};
use crate::error::Result;

/// Builds an entity from the current row.
pub trait EntityMapper<T> {
    fn map(&self, cursor: &dyn SqlCursor) -> Result<T>;
}

/// The versioned schema of a generated database.
pub trait SqlSchema {
    fn version(&self) -> i64;

    /// Creates every table and index. Safe to run on an existing schema.
    fn create(&self, driver: &dyn SqlDriver) -> Result<()>;

    /// Upgrades a schema created at `old_version` to `new_version`.
    fn migrate(&self, driver: &dyn SqlDriver, old_version: i64, new_version: i64) -> Result<()>;
}

/// A generated database implementation.
pub trait KabinDatabase {
    type Schema: SqlSchema;

    fn driver(&self) -> &Arc<dyn SqlDriver>;

    fn schema(&self) -> &Self::Schema;
}
