//! Frozen description of annotated source declarations.
//!
//! The generator never inspects live source code. Whatever front end feeds
//! it (a build script, a JSON dump, a test fixture) captures each annotated
//! type once as a [`ClassDeclaration`]: its qualified name, annotations,
//! properties, functions and constructor. Resolution works purely on these
//! records.
//!
//! # Examples
//!
//! ```
//! use kabin_core::*;
//!
//! let user = ClassDeclaration::new("crate::model::User")
//!     .with_annotation(AnnotationDeclaration::new("Entity"))
//!     .with_property(
//!         PropertyDeclaration::new("id", TypeRef::new("i64"))
//!             .with_annotation(AnnotationDeclaration::new("PrimaryKey")),
//!     )
//!     .with_property(PropertyDeclaration::new("spouse_id", TypeRef::new("i64").into_nullable()));
//!
//! let set = DeclarationSet::new(vec![user]).unwrap();
//! assert_eq!(set.get("User").unwrap().qualified_name, "crate::model::User");
//! assert_eq!(set.get("User").unwrap().properties[1].ty.to_rust(), "Option<i64>");
//! ```

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A resolved type as written in Rust source.
///
/// `nullable` stands for an `Option<_>` wrapper; `Option` written out as a
/// generic is folded into the flag by [`TypeRef::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<TypeRef>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            arguments: Vec::new(),
        }
    }

    /// The `()` type, used for functions without a declared return type.
    pub fn unit() -> Self {
        Self::new("()")
    }

    pub fn into_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_argument(mut self, argument: TypeRef) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Same type without the `Option` wrapper.
    pub fn non_null(&self) -> TypeRef {
        TypeRef {
            nullable: false,
            ..self.clone()
        }
    }

    /// Last path segment of the type name (`User` for `crate::model::User`).
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Matches the type name either exactly or by its last path segment.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.simple_name() == name
    }

    pub fn is_unit(&self) -> bool {
        !self.nullable && self.arguments.is_empty() && matches!(self.name.as_str(), "()" | "")
    }

    pub fn first_argument(&self) -> Option<&TypeRef> {
        self.arguments.first()
    }

    /// Folds `Option<T>` spelled as a generic into `T` with `nullable` set,
    /// recursively through every generic argument.
    pub fn normalized(&self) -> TypeRef {
        let arguments: Vec<TypeRef> = self.arguments.iter().map(TypeRef::normalized).collect();
        if is_option_path(&self.name) && arguments.len() == 1 {
            let mut inner = arguments.into_iter().next().unwrap_or_else(TypeRef::unit);
            inner.nullable = true;
            return inner;
        }
        TypeRef {
            name: self.name.clone(),
            nullable: self.nullable,
            arguments,
        }
    }

    /// Renders the type as Rust source.
    pub fn to_rust(&self) -> String {
        let mut rendered = if self.name.is_empty() {
            "()".to_string()
        } else {
            self.name.clone()
        };
        if !self.arguments.is_empty() {
            let arguments: Vec<String> = self.arguments.iter().map(TypeRef::to_rust).collect();
            rendered = format!("{rendered}<{}>", arguments.join(", "));
        }
        if self.nullable {
            rendered = format!("Option<{rendered}>");
        }
        rendered
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rust())
    }
}

fn is_option_path(name: &str) -> bool {
    matches!(name, "Option" | "std::option::Option" | "core::option::Option")
}

/// Last `::` segment of a path.
pub fn simple_name(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Literal argument value carried by an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<AnnotationValue>),
    Class {
        class: TypeRef,
    },
    Enum {
        #[serde(rename = "enum")]
        constant: String,
    },
    Annotation(AnnotationDeclaration),
}

impl AnnotationValue {
    pub fn class(ty: TypeRef) -> Self {
        Self::Class { class: ty }
    }

    pub fn constant(constant: impl Into<String>) -> Self {
        Self::Enum {
            constant: constant.into(),
        }
    }

    /// Short name of the value kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Class { .. } => "class literal",
            Self::Enum { .. } => "enum constant",
            Self::Annotation(_) => "annotation",
        }
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AnnotationValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// An annotation instance with its raw arguments in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub arguments: IndexMap<String, AnnotationValue>,
}

impl AnnotationDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: IndexMap::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<AnnotationValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Annotation names match by their last path segment.
    pub fn is(&self, name: &str) -> bool {
        self.simple_name() == simple_name(name)
    }
}

/// Anything that carries annotations.
pub trait Annotated {
    fn annotations(&self) -> &[AnnotationDeclaration];

    fn annotation(&self, name: &str) -> Option<&AnnotationDeclaration> {
        self.annotations().iter().find(|annotation| annotation.is(name))
    }

    fn has_annotation(&self, name: &str) -> bool {
        self.annotation(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationDeclaration>,
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: AnnotationDeclaration) -> Self {
        self.annotations.push(annotation);
        self
    }
}

impl Annotated for PropertyDeclaration {
    fn annotations(&self) -> &[AnnotationDeclaration] {
        &self.annotations
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

impl ParameterDeclaration {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A function member. Trait functions without a default body are abstract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationDeclaration>,
    #[serde(default = "default_true")]
    pub is_abstract: bool,
}

impl FunctionDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            annotations: Vec::new(),
            is_abstract: true,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.parameters.push(ParameterDeclaration::new(name, ty));
        self
    }

    pub fn returning(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationDeclaration) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn return_type_or_unit(&self) -> TypeRef {
        self.return_type.clone().unwrap_or_else(TypeRef::unit)
    }
}

impl Annotated for FunctionDeclaration {
    fn annotations(&self) -> &[AnnotationDeclaration] {
        &self.annotations
    }
}

/// An associated constructor function such as `User::new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorDeclaration {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Struct,
    Trait,
}

/// A top-level type declaration: an entity or compound struct, a DAO or
/// database trait, or a converter type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub qualified_name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<ConstructorDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<TypeRef>,
}

impl ClassDeclaration {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            kind: ClassKind::Struct,
            annotations: Vec::new(),
            properties: Vec::new(),
            functions: Vec::new(),
            constructor: None,
            supertypes: Vec::new(),
        }
    }

    pub fn new_trait(qualified_name: impl Into<String>) -> Self {
        Self {
            kind: ClassKind::Trait,
            ..Self::new(qualified_name)
        }
    }

    pub fn with_annotation(mut self, annotation: AnnotationDeclaration) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_property(mut self, property: PropertyDeclaration) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_function(mut self, function: FunctionDeclaration) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_constructor(mut self, name: impl Into<String>, parameters: &[&str]) -> Self {
        let parameters = parameters
            .iter()
            .map(|parameter| {
                let ty = self
                    .property(parameter)
                    .map(|property| property.ty.clone())
                    .unwrap_or_else(TypeRef::unit);
                ParameterDeclaration::new(*parameter, ty)
            })
            .collect();
        self.constructor = Some(ConstructorDeclaration {
            name: name.into(),
            parameters,
        });
        self
    }

    pub fn with_supertype(mut self, ty: TypeRef) -> Self {
        self.supertypes.push(ty);
        self
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.qualified_name)
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::new(self.qualified_name.clone())
    }

    pub fn is_trait(&self) -> bool {
        self.kind == ClassKind::Trait
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDeclaration> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Folds spelled-out `Option<T>` generics on every member type.
    fn normalize(&mut self) {
        for property in &mut self.properties {
            property.ty = property.ty.normalized();
        }
        for function in &mut self.functions {
            for parameter in &mut function.parameters {
                parameter.ty = parameter.ty.normalized();
            }
            function.return_type = function.return_type.as_ref().map(TypeRef::normalized);
        }
        if let Some(constructor) = &mut self.constructor {
            for parameter in &mut constructor.parameters {
                parameter.ty = parameter.ty.normalized();
            }
        }
        self.supertypes = self.supertypes.iter().map(TypeRef::normalized).collect();
    }
}

impl Annotated for ClassDeclaration {
    fn annotations(&self) -> &[AnnotationDeclaration] {
        &self.annotations
    }
}

/// Errors raised while assembling a [`DeclarationSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationSetError {
    #[error("duplicate declaration: {0}")]
    Duplicate(String),
    #[error("declaration has an empty qualified name")]
    EmptyName,
}

/// Ordered collection of declarations, unique by qualified name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclarationSet {
    declarations: IndexMap<String, ClassDeclaration>,
    by_simple_name: HashMap<String, Vec<String>>,
}

impl DeclarationSet {
    pub fn new(declarations: Vec<ClassDeclaration>) -> Result<Self, DeclarationSetError> {
        let mut set = Self::default();
        for declaration in declarations {
            set.insert(declaration)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, mut declaration: ClassDeclaration) -> Result<(), DeclarationSetError> {
        if declaration.qualified_name.trim().is_empty() {
            return Err(DeclarationSetError::EmptyName);
        }
        if self.declarations.contains_key(&declaration.qualified_name) {
            return Err(DeclarationSetError::Duplicate(declaration.qualified_name));
        }
        declaration.normalize();
        self.by_simple_name
            .entry(declaration.simple_name().to_string())
            .or_default()
            .push(declaration.qualified_name.clone());
        self.declarations
            .insert(declaration.qualified_name.clone(), declaration);
        Ok(())
    }

    /// Looks a declaration up by exact qualified name, falling back to a
    /// simple name that is unique within the set.
    pub fn get(&self, name: &str) -> Option<&ClassDeclaration> {
        if let Some(declaration) = self.declarations.get(name) {
            return Some(declaration);
        }
        match self.by_simple_name.get(simple_name(name)).map(Vec::as_slice) {
            Some([only]) => self.declarations.get(only),
            _ => None,
        }
    }

    pub fn resolve(&self, ty: &TypeRef) -> Option<&ClassDeclaration> {
        self.get(&ty.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassDeclaration> {
        self.declarations.values()
    }

    /// Declarations carrying the named annotation, in insertion order.
    pub fn annotated_with<'a>(&'a self, annotation: &'a str) -> impl Iterator<Item = &'a ClassDeclaration> + 'a {
        self.iter()
            .filter(move |declaration| declaration.has_annotation(annotation))
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn into_declarations(self) -> Vec<ClassDeclaration> {
        self.declarations.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_renders_nested_generics() {
        let ty = TypeRef::new("Vec")
            .with_argument(TypeRef::new("u8"))
            .into_nullable();
        assert_eq!(ty.to_rust(), "Option<Vec<u8>>");
        assert_eq!(TypeRef::unit().to_rust(), "()");
    }

    #[test]
    fn test_type_ref_normalizes_spelled_out_option() {
        let ty = TypeRef::new("std::option::Option").with_argument(TypeRef::new("String"));
        let normalized = ty.normalized();
        assert_eq!(normalized, TypeRef::new("String").into_nullable());

        let list = TypeRef::new("Vec").with_argument(TypeRef::new("Option").with_argument(TypeRef::new("i32")));
        assert_eq!(list.normalized().to_rust(), "Vec<Option<i32>>");
    }

    #[test]
    fn test_annotation_matches_by_last_segment() {
        let annotation = AnnotationDeclaration::new("kabin::Entity");
        assert!(annotation.is("Entity"));
        assert!(annotation.is("other::Entity"));
        assert!(!annotation.is("Embedded"));
    }

    #[test]
    fn test_annotation_values_deserialize_untagged() {
        let json = r#"{
            "name": "ForeignKey",
            "arguments": {
                "entity": {"class": {"name": "crate::User"}},
                "parentColumns": ["id"],
                "deferred": true,
                "onDelete": {"enum": "CASCADE"},
                "weight": 1.5,
                "depth": 2,
                "nested": {"name": "Index", "arguments": {"columns": ["a"]}}
            }
        }"#;
        let annotation: AnnotationDeclaration = serde_json::from_str(json).unwrap();
        assert_eq!(
            annotation.arguments["entity"],
            AnnotationValue::class(TypeRef::new("crate::User"))
        );
        assert_eq!(
            annotation.arguments["parentColumns"],
            AnnotationValue::Array(vec![AnnotationValue::from("id")])
        );
        assert_eq!(annotation.arguments["deferred"], AnnotationValue::Bool(true));
        assert_eq!(
            annotation.arguments["onDelete"],
            AnnotationValue::constant("CASCADE")
        );
        assert_eq!(annotation.arguments["weight"], AnnotationValue::Float(1.5));
        assert_eq!(annotation.arguments["depth"], AnnotationValue::Integer(2));
        assert!(matches!(
            annotation.arguments["nested"],
            AnnotationValue::Annotation(ref inner) if inner.is("Index")
        ));
    }

    #[test]
    fn test_declaration_set_rejects_duplicates() {
        let result = DeclarationSet::new(vec![
            ClassDeclaration::new("crate::User"),
            ClassDeclaration::new("crate::User"),
        ]);
        assert_eq!(
            result,
            Err(DeclarationSetError::Duplicate("crate::User".to_string()))
        );
    }

    #[test]
    fn test_declaration_set_simple_name_lookup_requires_uniqueness() {
        let set = DeclarationSet::new(vec![
            ClassDeclaration::new("crate::a::User"),
            ClassDeclaration::new("crate::b::User"),
            ClassDeclaration::new("crate::b::Pet"),
        ])
        .unwrap();

        assert!(set.get("User").is_none());
        assert!(set.get("crate::a::User").is_some());
        assert_eq!(set.get("Pet").unwrap().qualified_name, "crate::b::Pet");
        assert_eq!(set.get("other::Pet").unwrap().qualified_name, "crate::b::Pet");
    }

    #[test]
    fn test_declaration_set_normalizes_member_types() {
        let class = ClassDeclaration::new("crate::User").with_property(PropertyDeclaration::new(
            "nickname",
            TypeRef::new("Option").with_argument(TypeRef::new("String")),
        ));
        let set = DeclarationSet::new(vec![class]).unwrap();
        let property = &set.get("crate::User").unwrap().properties[0];
        assert!(property.ty.nullable);
        assert_eq!(property.ty.name, "String");
    }

    #[test]
    fn test_function_deserializes_as_abstract_by_default() {
        let function: FunctionDeclaration =
            serde_json::from_str(r#"{"name": "all_users"}"#).unwrap();
        assert!(function.is_abstract);
        assert_eq!(function.return_type_or_unit(), TypeRef::unit());
    }
}
