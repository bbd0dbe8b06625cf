//! Annotation vocabulary, declaration model and resolved spec tree.
//!
//! This crate holds the data every other kabin crate agrees on:
//!
//! - [`ClassDeclaration`] and friends: the frozen description of annotated
//!   source declarations the generator consumes.
//! - [`annotations`]: typed records for `@Entity`, `@ColumnInfo`,
//!   `@Database`, `@Query` and the rest of the vocabulary, parsed eagerly
//!   with documented defaults.
//! - [`specs`]: the resolved, immutable spec tree ([`DatabaseSpec`] →
//!   [`EntitySpec`] / [`DaoSpec`] → columns, keys, relations, queries).
//! - [`error`]: the validation / resolution / binding / generation taxonomy
//!   and the [`Diagnostic`] that ties an error to its declaration.
//!
//! # Example
//!
//! ```
//! use kabin_core::*;
//!
//! let user = ClassDeclaration::new("crate::User")
//!     .with_annotation(AnnotationDeclaration::new("Entity").with_argument("tableName", "users"))
//!     .with_property(
//!         PropertyDeclaration::new("id", TypeRef::new("i64"))
//!             .with_annotation(AnnotationDeclaration::new("PrimaryKey")),
//!     );
//!
//! let entity = annotations::find::<annotations::Entity>(&user.annotations)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(entity.table_name, "users");
//!
//! let mapping = ValueMapping::resolve(&user.properties[0].ty, TypeAffinity::Undefined);
//! assert_eq!(mapping, Some(ValueMapping::Native(TypeAffinity::Integer)));
//! ```

pub mod annotations;
mod declaration;
pub mod error;
pub mod specs;

pub use annotations::{
    AnnotationEnum, AnnotationRecord, Collate, ForeignKeyAction, IndexOrder, OnConflictStrategy,
    TypeAffinity,
};
pub use declaration::{
    Annotated, AnnotationDeclaration, AnnotationValue, ClassDeclaration, ClassKind,
    ConstructorDeclaration, DeclarationSet, DeclarationSetError, FunctionDeclaration,
    ParameterDeclaration, PropertyDeclaration, TypeRef, simple_name,
};
pub use error::{
    BindingError, Diagnostic, GenerationError, ResolutionError, SpecError, ValidationError,
};
pub use specs::*;
