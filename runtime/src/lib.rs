//! Runtime support for kabin-generated persistence code.
//!
//! Generated units only depend on this crate. It defines:
//!
//! - **the driver contract**: [`SqlDriver`] (execute, query, transaction),
//!   [`SqlCursor`] and [`SqlValue`];
//! - **conversion**: [`ToSqlValue`] / [`FromSqlValue`] for native storage
//!   types and [`ColumnAdapter`] with the built-in [`IntegerAdapter`],
//!   [`BooleanAdapter`] and [`FloatAdapter`];
//! - **generated-code traits**: [`EntityMapper`], [`SqlSchema`] and
//!   [`KabinDatabase`];
//! - **query helpers** such as [`query_list`] and [`push_placeholders`];
//! - [`SqliteDriver`], a `rusqlite` implementation (feature `sqlite`,
//!   enabled by default).
//!
//! # Quick start
//!
//! ```
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> kabin_runtime::Result<()> {
//! use kabin_runtime::{KabinError, SqlDriver, SqlSchema, SqliteDriver};
//!
//! struct NotesSchema;
//!
//! impl SqlSchema for NotesSchema {
//!     fn version(&self) -> i64 {
//!         1
//!     }
//!
//!     fn create(&self, driver: &dyn SqlDriver) -> kabin_runtime::Result<()> {
//!         driver.execute("CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY)", &[])?;
//!         Ok(())
//!     }
//!
//!     fn migrate(&self, _: &dyn SqlDriver, from: i64, to: i64) -> kabin_runtime::Result<()> {
//!         Err(KabinError::MigrationUnsupported { from, to })
//!     }
//! }
//!
//! let driver = SqliteDriver::open_in_memory()?;
//! driver.create_or_migrate(&NotesSchema)?;
//! assert_eq!(driver.user_version()?, 1);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! ```

mod adapter;
mod driver;
mod error;
mod schema;
#[cfg(feature = "sqlite")]
mod sqlite;
mod value;

pub use adapter::{BooleanAdapter, ColumnAdapter, FloatAdapter, IntegerAdapter};
pub use driver::{
    SqlCursor, SqlDriver, affected_rows, all_null, push_placeholders, query_list,
    query_optional, query_single, read, read_at, read_value, require, unwrap_or_panic,
};
pub use error::{KabinError, Result};
pub use schema::{EntityMapper, KabinDatabase, SqlSchema};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;
pub use value::{FromSqlValue, SqlValue, ToSqlValue, decode_value};
