//! The resolved spec tree.
//!
//! Specs are immutable once built. Shared nodes (an entity read by several
//! DAOs, a DAO exposed by several getters) are held through [`Arc`] so
//! generators can key caches on the declaration they describe.
//!
//! When serialised, shared nodes nested below their owner are written as
//! their qualified name; the owning [`DatabaseSpec`] carries them in full.

mod adapter;
mod dao;
mod database;
mod entity;
mod relation;

use std::sync::Arc;

use serde::Serializer;

pub use adapter::{
    BuiltinAdapter, ColumnAdapterReference, ValueMapping, list_element, native_affinity,
    storage_type,
};
pub use dao::{
    DaoSpec, EntityOperationSpec, ParameterBinding, ParameterSpec, QueryKind, QuerySpec,
    RawQuerySpec, ReturnShape, ReturnSpec, ReturnWrapping, RowType, SqlSegment, StatementKind,
};
pub use database::{DaoGetterSpec, DatabaseSpec, TypeConverterSpec};
pub use entity::{
    ColumnSpec, ConstructorSpec, EmbeddedSpec, EntityMember, EntitySpec, ForeignKeySpec,
    IgnoreSpec, IndexSpec, PrimaryKeySpec,
};
pub use relation::{
    CompoundRelationSpec, CompoundSpec, JunctionSpec, RelationCardinality, RelationElement,
    RelationSpec,
};

/// A spec node describing one source declaration.
pub trait Declared {
    /// Qualified name of the declaration.
    fn declaration(&self) -> &str;
}

fn serialize_declaration<T: Declared, S: Serializer>(
    value: &Arc<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.declaration())
}
