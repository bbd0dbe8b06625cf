//! Compound resolution: an entity loaded together with its relations.

use std::sync::Arc;

use kabin_core::annotations::{self, Embedded, Entity, Ignore, Relation};
use kabin_core::{
    ClassDeclaration, CompoundRelationSpec, CompoundSpec, Diagnostic, EntitySpec, JunctionSpec,
    PropertyDeclaration, RelationCardinality, RelationElement, RelationSpec, ResolutionError,
    TypeAffinity, TypeRef, ValidationError, ValueMapping, list_element,
};
use tracing::{debug, instrument};

use super::entity::declared_constructor;
use super::{Resolved, Resolver, parse};

impl<'d> Resolver<'d> {
    /// Whether `declaration` has the shape of a compound: a struct with an
    /// `@Embedded` property typed as an entity.
    pub(super) fn is_compound(&self, declaration: &ClassDeclaration) -> bool {
        !declaration.is_trait()
            && !annotations::is_present::<Entity>(&declaration.annotations)
            && declaration.properties.iter().any(|property| {
                annotations::is_present::<Embedded>(&property.annotations)
                    && self
                        .declarations
                        .resolve(&property.ty)
                        .is_some_and(|target| annotations::is_present::<Entity>(&target.annotations))
            })
    }

    #[instrument(skip_all, fields(compound = %declaration.qualified_name))]
    pub(super) fn resolve_compound(&mut self, declaration: &'d ClassDeclaration) -> Resolved<Arc<CompoundSpec>> {
        let owner = declaration.qualified_name.as_str();
        let invalid = |reason: String| {
            Diagnostic::new(
                owner,
                ValidationError::InvalidCompound {
                    compound: owner.to_string(),
                    reason,
                },
            )
        };
        if declaration.is_trait() {
            return Err(vec![Diagnostic::new(
                owner,
                ValidationError::NotAStruct(owner.to_string()),
            )]);
        }

        let mut diagnostics = Vec::new();
        let mut mains = Vec::new();
        let mut relations = Vec::new();
        let mut required = Vec::new();
        for property in &declaration.properties {
            let anchor = format!("{owner}::{}", property.name);
            if annotations::is_present::<Ignore>(&property.annotations) {
                continue;
            }
            let reported = diagnostics.len();
            let embedded: Option<Embedded> = parse(&anchor, &property.annotations, &mut diagnostics);
            let relation: Option<Relation> = parse(&anchor, &property.annotations, &mut diagnostics);
            if diagnostics.len() > reported {
                continue;
            }
            required.push(property.name.as_str());
            match (embedded, relation) {
                (Some(embedded), None) => {
                    if !embedded.prefix.is_empty() {
                        diagnostics.push(invalid(format!(
                            "embedded entity `{}` cannot take a prefix",
                            property.name
                        )));
                    } else if property.ty.nullable {
                        diagnostics.push(invalid(format!(
                            "embedded entity `{}` cannot be optional",
                            property.name
                        )));
                    } else {
                        mains.push(property);
                    }
                }
                (None, Some(relation)) => relations.push((property, relation)),
                (Some(_), Some(_)) => diagnostics.push(invalid(format!(
                    "`{}` cannot be both @Embedded and @Relation",
                    property.name
                ))),
                (None, None) => diagnostics.push(invalid(format!(
                    "`{}` must be @Embedded, @Relation or @Ignore",
                    property.name
                ))),
            }
        }

        let main_property = match mains.as_slice() {
            [main] => Some(*main),
            _ => {
                diagnostics.push(invalid(format!(
                    "must embed exactly one entity, found {}",
                    mains.len()
                )));
                None
            }
        };
        let main = main_property.and_then(|property| {
            self.dependent_entity(owner, &property.ty, &mut diagnostics)
        });

        let mut resolved = Vec::new();
        if let Some(main) = &main {
            for (property, relation) in relations {
                let anchor = format!("{owner}::{}", property.name);
                if let Some(spec) = self.relation(main, property, relation, &anchor, &mut diagnostics) {
                    resolved.push(CompoundRelationSpec {
                        property: property.name.clone(),
                        relation: spec,
                    });
                }
            }
        }

        let constructor = declared_constructor(declaration, &required, owner, &mut diagnostics);
        match (main_property, main) {
            (Some(main_property), Some(main)) if diagnostics.is_empty() => {
                debug!(relations = resolved.len(), "resolved compound");
                Ok(Arc::new(CompoundSpec {
                    declaration: owner.to_string(),
                    main_property: main_property.name.clone(),
                    main,
                    relations: resolved,
                    constructor,
                }))
            }
            _ => Err(diagnostics),
        }
    }

    fn relation(
        &mut self,
        main: &Arc<EntitySpec>,
        property: &PropertyDeclaration,
        relation: Relation,
        anchor: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<RelationSpec> {
        let (cardinality, element) = if property.ty.nullable {
            (RelationCardinality::One, property.ty.non_null())
        } else if let Some(element) = list_element(&property.ty).filter(|element| !element.nullable) {
            (RelationCardinality::Many, element.clone())
        } else {
            diagnostics.push(Diagnostic::new(
                anchor,
                ValidationError::InvalidRelationType {
                    property: property.name.clone(),
                    found: property.ty.to_rust(),
                },
            ));
            return None;
        };

        let target_type = relation.entity.clone().unwrap_or_else(|| element.clone());
        let target = self.dependent_entity(anchor, &target_type, diagnostics)?;
        let reported = diagnostics.len();
        require_column(main, &relation.parent_column, anchor, diagnostics);
        require_column(&target, &relation.entity_column, anchor, diagnostics);
        for column in &relation.projection {
            require_column(&target, column, anchor, diagnostics);
        }
        if diagnostics.len() > reported {
            return None;
        }

        let element_is_target = self
            .declarations
            .resolve(&element)
            .is_some_and(|declaration| declaration.qualified_name == target.declaration);
        let element_spec = match relation.projection.as_slice() {
            [] if element_is_target => RelationElement::Entity,
            [column] if !element_is_target => {
                let affinity = target
                    .column(column)
                    .and_then(|column| column.affinity())
                    .unwrap_or(TypeAffinity::Undefined);
                match ValueMapping::resolve(&element, affinity) {
                    Some(mapping) => RelationElement::Scalar {
                        column: column.clone(),
                        ty: element.clone(),
                        mapping,
                    },
                    None => {
                        diagnostics.push(Diagnostic::new(
                            anchor,
                            ValidationError::InvalidProjection(property.name.clone()),
                        ));
                        return None;
                    }
                }
            }
            _ => {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    ValidationError::InvalidProjection(property.name.clone()),
                ));
                return None;
            }
        };

        let junction = match &relation.associate_by {
            Some(junction) => Some(self.junction(main, &target, &relation, junction, anchor, diagnostics)?),
            None => None,
        };

        Some(RelationSpec {
            parent_column: relation.parent_column,
            entity_table: target.table_name.clone(),
            entity: target,
            entity_column: relation.entity_column,
            cardinality,
            junction,
            projection: relation.projection,
            element: element_spec,
        })
    }

    fn junction(
        &mut self,
        main: &Arc<EntitySpec>,
        target: &Arc<EntitySpec>,
        relation: &Relation,
        junction: &annotations::Junction,
        anchor: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<JunctionSpec> {
        let entity = self.dependent_entity(anchor, &junction.value, diagnostics)?;
        let parent_column = if junction.parent_column.is_empty() {
            relation.parent_column.clone()
        } else {
            junction.parent_column.clone()
        };
        let entity_column = if junction.entity_column.is_empty() {
            relation.entity_column.clone()
        } else {
            junction.entity_column.clone()
        };

        let reported = diagnostics.len();
        require_column(&entity, &parent_column, anchor, diagnostics);
        require_column(&entity, &entity_column, anchor, diagnostics);
        if diagnostics.len() > reported {
            return None;
        }
        for (side, column) in [(main, &parent_column), (target, &entity_column)] {
            let linked = entity.foreign_keys.iter().any(|foreign_key| {
                foreign_key.entity == side.declaration && foreign_key.child_columns.contains(column)
            });
            if !linked {
                diagnostics.push(Diagnostic::new(
                    anchor,
                    ResolutionError::UnresolvedJunctionForeignKey {
                        junction: entity.declaration.clone(),
                        entity: side.declaration.clone(),
                        column: column.clone(),
                    },
                ));
            }
        }
        if diagnostics.len() > reported {
            return None;
        }
        Some(JunctionSpec {
            table: entity.table_name.clone(),
            entity,
            parent_column,
            entity_column,
        })
    }

    /// Resolves a query row type that names a compound struct.
    pub(super) fn compound_row(
        &mut self,
        ty: &TypeRef,
        anchor: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Arc<CompoundSpec>> {
        let declaration = self.declarations.resolve(ty)?;
        match self.compound(&declaration.qualified_name) {
            Ok(compound) => Some(compound),
            Err(errors) => {
                diagnostics.extend(self.unreported(&declaration.qualified_name, errors));
                diagnostics.push(Diagnostic::new(
                    anchor,
                    ResolutionError::DependencyFailed(declaration.qualified_name.clone()),
                ));
                None
            }
        }
    }
}

fn require_column(entity: &EntitySpec, column: &str, anchor: &str, diagnostics: &mut Vec<Diagnostic>) {
    if entity.column(column).is_none() {
        diagnostics.push(Diagnostic::new(
            anchor,
            ResolutionError::UnresolvedRelationColumn {
                entity: entity.declaration.clone(),
                column: column.to_string(),
            },
        ));
    }
}
