//! Rust code generation for kabin databases.
//!
//! [`Compiler`] resolves a declaration set through `kabin-processor` and
//! turns every resolved spec into Rust source units:
//!
//! | Unit | Generated from | Contents |
//! |---|---|---|
//! | `<Entity>Table` | entity | DDL constants, `create`, `drop_table` |
//! | `<Entity>Mapper` | entity | `EntityMapper` reading a row by column name |
//! | `<Dao>Queries` | DAO | one method per query, on the runtime driver |
//! | `<Dao>Impl` | DAO | the user's DAO trait, delegating to the queries |
//! | `<Database>Schema` | database | `SqlSchema` creating every table |
//! | `<Database>Impl` | database | wiring of adapters, mappers and DAOs |
//!
//! Units go to a [`CodeSink`]: [`MemorySink`] keeps them in memory,
//! [`FileSink`] writes one file per unit plus a `mod.rs` and skips files
//! whose contents did not change.
//!
//! # Example
//!
//! ```
//! use kabin_compiler::{Compiler, MemorySink, UnitKind};
//! use kabin_core::*;
//! use kabin_processor::KabinOptions;
//!
//! let note = ClassDeclaration::new("crate::Note")
//!     .with_annotation(AnnotationDeclaration::new("Entity"))
//!     .with_property(
//!         PropertyDeclaration::new("id", TypeRef::new("i64"))
//!             .with_annotation(AnnotationDeclaration::new("PrimaryKey")),
//!     )
//!     .with_property(PropertyDeclaration::new("body", TypeRef::new("String")));
//! let declarations = DeclarationSet::new(vec![note]).unwrap();
//!
//! let options = KabinOptions { format: false, ..KabinOptions::default() };
//! let compilation = Compiler::new(&options, MemorySink::new())?.compile(&declarations)?;
//!
//! let table = compilation.sink.get("crate::generated::NoteTable").unwrap();
//! assert_eq!(table.kind, UnitKind::Table);
//! assert!(table.source.contains("CREATE TABLE IF NOT EXISTS `Note`"));
//! # Ok::<(), kabin_compiler::EmitError>(())
//! ```

mod compiler;
mod emit;
mod error;
mod formatter;
mod generators;
mod manifest;
mod naming;
pub mod sql;
mod unit;

pub use compiler::{Compilation, Compiler};
pub use emit::{CodeSink, FileSink, MemorySink};
pub use error::{EmitError, Result};
pub use manifest::{MANIFEST_FILE, Manifest, UnitRecord};
pub use unit::{GENERATED_HEADER, GeneratedUnit, UnitKind};
