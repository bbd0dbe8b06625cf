//! Declaration loading, spec resolution and generator options.
//!
//! This crate sits between the frozen declaration model of `kabin-core` and
//! the code generators:
//!
//! - [`load_declarations`] reads declaration files (JSON or YAML) into a
//!   [`DeclarationSet`](kabin_core::DeclarationSet).
//! - [`Resolver`] turns declarations into resolved specs, caching each one
//!   so shared entities and DAOs are resolved once.
//! - [`Processor`] runs resolution over a whole set and feeds the results to
//!   a [`SpecHandler`], collecting [`Diagnostics`] on the way.
//! - [`KabinOptions`] holds the user-tunable naming and output settings.
//!
//! # Example
//!
//! ```
//! use kabin_core::*;
//! use kabin_processor::{Processor, parse_query};
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
//! let schema = Processor::new(&declarations).resolve();
//! assert!(schema.is_success());
//! assert_eq!(schema.entities[0].stored_columns().len(), 2);
//!
//! let query = parse_query("SELECT * FROM Note WHERE id = :id").unwrap();
//! assert_eq!(query.bindings, vec!["id".to_string()]);
//! ```

mod config;
mod diagnostics;
mod error;
mod loader;
mod processor;
mod resolver;

pub use config::{KabinOptions, Suffixes};
pub use diagnostics::Diagnostics;
pub use error::{ConfigError, LoadError, Result};
pub use loader::{load_declarations, load_file};
pub use processor::{ProcessReport, Processor, ResolvedSchema, SpecHandler};
pub use resolver::{Resolved, Resolver, parse_query, statement_kind};
