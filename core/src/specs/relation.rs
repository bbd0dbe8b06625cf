//! Compound types: an entity plus relations loaded alongside it.

use std::sync::Arc;

use serde::Serialize;

use super::adapter::ValueMapping;
use super::entity::{ConstructorSpec, EntitySpec};
use super::{Declared, serialize_declaration};
use crate::{TypeRef, simple_name};

/// A non-entity struct embedding one entity and any number of relations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundSpec {
    pub declaration: String,
    /// The `@Embedded` entity property.
    pub main_property: String,
    #[serde(serialize_with = "serialize_declaration")]
    pub main: Arc<EntitySpec>,
    pub relations: Vec<CompoundRelationSpec>,
    pub constructor: ConstructorSpec,
}

impl CompoundSpec {
    pub fn simple_name(&self) -> &str {
        simple_name(&self.declaration)
    }

    /// Every entity the compound reads, main entity first.
    pub fn entities(&self) -> Vec<&Arc<EntitySpec>> {
        let mut entities = vec![&self.main];
        for relation in &self.relations {
            entities.push(&relation.relation.entity);
            if let Some(junction) = &relation.relation.junction {
                entities.push(&junction.entity);
            }
        }
        entities
    }
}

impl Declared for CompoundSpec {
    fn declaration(&self) -> &str {
        &self.declaration
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundRelationSpec {
    pub property: String,
    pub relation: RelationSpec,
}

/// A derived association matched on column equality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationSpec {
    /// Column of the compound's main entity.
    pub parent_column: String,
    #[serde(serialize_with = "serialize_declaration")]
    pub entity: Arc<EntitySpec>,
    pub entity_table: String,
    /// Column of the related entity.
    pub entity_column: String,
    pub cardinality: RelationCardinality,
    pub junction: Option<JunctionSpec>,
    /// Projected column names; empty selects whole rows.
    pub projection: Vec<String>,
    pub element: RelationElement,
}

impl RelationSpec {
    /// Columns selected from the related table.
    pub fn selected_columns(&self) -> Vec<&str> {
        match &self.element {
            RelationElement::Scalar { column, .. } => vec![column.as_str()],
            RelationElement::Entity => self
                .entity
                .stored_columns()
                .into_iter()
                .map(|column| column.name.as_str())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationCardinality {
    /// `Option<T>`
    One,
    /// `Vec<T>`
    Many,
}

/// What one related row becomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationElement {
    /// The full related entity, read through its mapper.
    Entity,
    /// A single projected column.
    Scalar {
        column: String,
        ty: TypeRef,
        mapping: ValueMapping,
    },
}

/// Link table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JunctionSpec {
    #[serde(serialize_with = "serialize_declaration")]
    pub entity: Arc<EntitySpec>,
    pub table: String,
    /// Junction column holding the parent's key.
    pub parent_column: String,
    /// Junction column holding the related entity's key.
    pub entity_column: String,
}
