//! `<Entity>Mapper`: builds an entity from the current row.

use kabin_core::{
    ColumnAdapterReference, ConstructorSpec, EntityMember, EntitySpec, GenerationError,
};
use proc_macro2::TokenStream;
use quote::quote;

use super::{Source, adapter_ident, adapter_type, read_expr};
use crate::naming::{Naming, ident, path, rust_type};

type Result<T> = std::result::Result<T, GenerationError>;

pub(crate) struct Mapper {
    pub(crate) tokens: TokenStream,
    /// Adapters the mapper is constructed with, in parameter order.
    pub(crate) adapters: Vec<ColumnAdapterReference>,
}

pub(crate) fn generate(entity: &EntitySpec, naming: &Naming) -> Result<Mapper> {
    let runtime = naming.runtime();
    let name = ident(&naming.mapper(entity))?;
    let entity_type = rust_type(&entity.type_ref())?;
    let doc = format!(" Reads [`{}`] rows.", entity.declaration);

    let adapters: Vec<ColumnAdapterReference> = entity.adapters().into_iter().collect();
    let fields = adapters.iter().map(adapter_ident).collect::<Result<Vec<_>>>()?;
    let types = adapters
        .iter()
        .map(|adapter| adapter_type(runtime, adapter))
        .collect::<Result<Vec<_>>>()?;
    let value = members_expr(
        runtime,
        &entity.declaration,
        &entity.constructor,
        &entity.members,
    )?;

    let tokens = quote! {
        #[doc = #doc]
        pub struct #name {
            #(#fields: #types,)*
        }

        impl #name {
            pub fn new(#(#fields: #types),*) -> Self {
                Self { #(#fields),* }
            }
        }

        impl #runtime::EntityMapper<#entity_type> for #name {
            fn map(&self, cursor: &dyn #runtime::SqlCursor) -> #runtime::Result<#entity_type> {
                Ok(#value)
            }
        }
    };
    Ok(Mapper { tokens, adapters })
}

/// Value of a struct whose stored members are read by column name.
fn members_expr(
    runtime: &TokenStream,
    owner: &str,
    constructor: &ConstructorSpec,
    members: &[EntityMember],
) -> Result<TokenStream> {
    construct(owner, constructor, |parameter| {
        let member = members
            .iter()
            .find(|member| member.property() == parameter)
            .ok_or_else(|| GenerationError::UnmatchedConstructorParameter {
                owner: owner.to_string(),
                parameter: parameter.to_string(),
            })?;
        match member {
            EntityMember::Column(column) => match &column.mapping {
                Some(mapping) if column.is_stored() => Ok(Some(read_expr(
                    runtime,
                    Source::Column(&column.name),
                    &column.ty,
                    mapping,
                )?)),
                _ => Ok(None),
            },
            EntityMember::Embedded(embedded) => {
                let value = members_expr(
                    runtime,
                    &embedded.ty.name,
                    &embedded.constructor,
                    &embedded.members,
                )?;
                if !embedded.is_nullable {
                    return Ok(Some(value));
                }
                let columns: Vec<&str> = embedded
                    .columns()
                    .into_iter()
                    .filter(|column| column.is_stored())
                    .map(|column| column.name.as_str())
                    .collect();
                Ok(Some(quote! {
                    if #runtime::all_null(cursor, &[#(#columns),*])? {
                        None
                    } else {
                        Some(#value)
                    }
                }))
            }
        }
    })
}

/// Calls the constructor of `owner` with one argument per parameter.
///
/// `argument` returns `None` for a property that is not stored; a struct
/// literal fills it with `Default::default()`, a constructor function
/// cannot take it.
pub(crate) fn construct(
    owner: &str,
    constructor: &ConstructorSpec,
    mut argument: impl FnMut(&str) -> Result<Option<TokenStream>>,
) -> Result<TokenStream> {
    let owner_path = path(owner)?;
    match &constructor.function {
        Some(function) => {
            let function = ident(function)?;
            let mut arguments = Vec::new();
            for parameter in &constructor.parameters {
                let value = argument(parameter)?.ok_or_else(|| {
                    GenerationError::UnmatchedConstructorParameter {
                        owner: owner.to_string(),
                        parameter: parameter.clone(),
                    }
                })?;
                arguments.push(value);
            }
            Ok(quote! { #owner_path::#function(#(#arguments),*) })
        }
        None => {
            let mut fields = Vec::new();
            for parameter in &constructor.parameters {
                let field = ident(parameter)?;
                let value = argument(parameter)?
                    .unwrap_or_else(|| quote! { ::core::default::Default::default() });
                fields.push(quote! { #field: #value });
            }
            Ok(quote! { #owner_path { #(#fields),* } })
        }
    }
}

#[cfg(test)]
mod tests {
    use kabin_core::{
        Collate, ColumnSpec, EmbeddedSpec, IgnoreSpec, OnConflictStrategy, PrimaryKeySpec,
        TypeAffinity, TypeRef, ValueMapping,
    };
    use kabin_processor::KabinOptions;

    use super::*;

    fn compact(tokens: &TokenStream) -> String {
        tokens.to_string().chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn column(property: &str, name: &str, ty: TypeRef) -> ColumnSpec {
        ColumnSpec {
            property: property.to_string(),
            mapping: ValueMapping::resolve(&ty, TypeAffinity::Undefined),
            ty,
            name: name.to_string(),
            is_nullable: false,
            default_value: None,
            collate: Collate::Unspecified,
            index: false,
            ignore: None,
            is_primary_key: property == "id",
            embedded_in: None,
        }
    }

    fn note() -> EntitySpec {
        let mut cache = column("cache", "cache", TypeRef::new("String"));
        cache.ignore = Some(IgnoreSpec::Annotation);
        cache.mapping = None;
        let mut lat = column("lat", "loc_lat", TypeRef::new("f64"));
        lat.is_nullable = true;
        lat.embedded_in = Some("location".to_string());
        EntitySpec {
            declaration: "crate::Note".to_string(),
            table_name: "Note".to_string(),
            members: vec![
                EntityMember::Column(column("id", "id", TypeRef::new("i64"))),
                EntityMember::Column(column("pinned", "pinned", TypeRef::new("bool"))),
                EntityMember::Embedded(EmbeddedSpec {
                    property: "location".to_string(),
                    ty: TypeRef::new("crate::Location").into_nullable(),
                    prefix: "loc_".to_string(),
                    is_nullable: true,
                    members: vec![EntityMember::Column(lat)],
                    constructor: ConstructorSpec::struct_literal(vec!["lat".to_string()]),
                }),
                EntityMember::Column(cache),
            ],
            primary_key: PrimaryKeySpec {
                columns: vec!["id".to_string()],
                auto_generate: false,
                on_conflict: OnConflictStrategy::Abort,
            },
            foreign_keys: Vec::new(),
            indices: Vec::new(),
            constructor: ConstructorSpec::struct_literal(vec![
                "id".to_string(),
                "pinned".to_string(),
                "location".to_string(),
                "cache".to_string(),
            ]),
        }
    }

    #[test]
    fn test_mapper_reads_struct_literal() {
        let naming = Naming::new(&KabinOptions::default()).unwrap();
        let mapper = generate(&note(), &naming).unwrap();
        assert_eq!(mapper.adapters.len(), 1);

        let code = compact(&mapper.tokens);
        assert!(code.contains("pubstructNoteMapper{bool_i64_adapter:::std::sync::Arc<dyn::kabin_runtime::ColumnAdapter<bool,i64>>,}"));
        assert!(code.contains("id:::kabin_runtime::read::<i64>(cursor,\"id\")?"));
        assert!(code.contains("pinned:self.bool_i64_adapter.decode(::kabin_runtime::read::<i64>(cursor,\"pinned\")?)?"));
        assert!(code.contains("if::kabin_runtime::all_null(cursor,&[\"loc_lat\"])?{None}else{Some(crate::Location{"));
        assert!(code.contains("cache:::core::default::Default::default()"));
    }

    #[test]
    fn test_constructor_function_keeps_parameter_order() {
        let mut entity = note();
        entity.constructor = ConstructorSpec {
            function: Some("new".to_string()),
            parameters: vec!["pinned".to_string(), "id".to_string()],
        };
        let naming = Naming::new(&KabinOptions::default()).unwrap();
        let code = compact(&generate(&entity, &naming).unwrap().tokens);
        let pinned = code.find("\"pinned\"").unwrap();
        let id = code.find("\"id\"").unwrap();
        assert!(code.contains("crate::Note::new("));
        assert!(pinned < id);
    }

    #[test]
    fn test_constructor_cannot_take_ignored_member() {
        let mut entity = note();
        entity.constructor = ConstructorSpec {
            function: Some("new".to_string()),
            parameters: vec!["cache".to_string()],
        };
        let naming = Naming::new(&KabinOptions::default()).unwrap();
        assert!(matches!(
            generate(&entity, &naming),
            Err(GenerationError::UnmatchedConstructorParameter { parameter, .. }) if parameter == "cache"
        ));
    }
}
