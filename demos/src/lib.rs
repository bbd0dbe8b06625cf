//! A reading-list schema compiled by kabin at build time.
//!
//! `build.rs` runs the compiler over `compiler/tests/fixtures/library.yaml`,
//! which declares the types in [`model`], [`dao`] and [`db`]; the units it
//! produces are included here as [`generated`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use kabin_demos::dao::UserDao;
//! use kabin_demos::db::AppDatabase;
//! use kabin_demos::generated::AppDatabaseImpl;
//! use kabin_demos::model::User;
//! use kabin_runtime::{KabinDatabase, SqliteDriver};
//!
//! let driver = Arc::new(SqliteDriver::open_in_memory().unwrap());
//! let database = AppDatabaseImpl::new(driver.clone());
//! driver.create_or_migrate(database.schema()).unwrap();
//!
//! database.user_dao().insert(User::new("ada".to_string(), 0, None));
//! assert_eq!(database.user_dao().count(), 1);
//! ```

pub mod dao;
pub mod db;
pub mod model;

/// Units generated from the library schema.
pub mod generated {
    include!(concat!(env!("OUT_DIR"), "/kabin_units.rs"));
}
