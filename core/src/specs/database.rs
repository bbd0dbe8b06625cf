//! Database specs.

use std::sync::Arc;

use serde::Serialize;

use super::adapter::ColumnAdapterReference;
use super::dao::DaoSpec;
use super::entity::EntitySpec;
use super::{Declared, serialize_declaration};
use crate::{TypeRef, simple_name};

/// A resolved `@Database` trait.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseSpec {
    pub declaration: String,
    pub version: i64,
    /// Listed entities, unique, in declaration order.
    pub entities: Vec<Arc<EntitySpec>>,
    pub dao_getters: Vec<DaoGetterSpec>,
    pub type_converters: Vec<TypeConverterSpec>,
    /// Every adapter the schema's mappers and queries need, in first-use
    /// order.
    pub adapters: Vec<ColumnAdapterReference>,
}

impl DatabaseSpec {
    pub fn simple_name(&self) -> &str {
        simple_name(&self.declaration)
    }

    pub fn entity(&self, declaration: &str) -> Option<&Arc<EntitySpec>> {
        self.entities
            .iter()
            .find(|entity| entity.declaration == declaration)
    }

    /// The user converter providing `reference`, if one is listed.
    pub fn converter_for(&self, reference: &ColumnAdapterReference) -> Option<&TypeConverterSpec> {
        self.type_converters
            .iter()
            .find(|converter| &converter.reference == reference)
    }
}

impl Declared for DatabaseSpec {
    fn declaration(&self) -> &str {
        &self.declaration
    }
}

/// A parameterless database function returning a DAO.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaoGetterSpec {
    pub function: String,
    #[serde(serialize_with = "serialize_declaration")]
    pub dao: Arc<DaoSpec>,
}

/// A converter type listed in `@TypeConverters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeConverterSpec {
    pub converter: TypeRef,
    pub reference: ColumnAdapterReference,
}
