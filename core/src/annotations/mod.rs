//! The annotation vocabulary.
//!
//! Each recognised annotation has a typed record with documented defaults.
//! Records are parsed eagerly from raw [`AnnotationDeclaration`]s through
//! [`AnnotationRecord::from_declaration`]: unknown attributes, wrongly typed
//! values and unknown enum constants are rejected up front instead of
//! surfacing later during generation.
//!
//! # Examples
//!
//! ```
//! use kabin_core::annotations::{self, ColumnInfo};
//! use kabin_core::{AnnotationDeclaration, AnnotationValue, TypeAffinity};
//!
//! let raw = AnnotationDeclaration::new("ColumnInfo")
//!     .with_argument("name", "user_name")
//!     .with_argument("typeAffinity", AnnotationValue::constant("TEXT"));
//!
//! let column = annotations::find::<ColumnInfo>(&[raw]).unwrap().unwrap();
//! assert_eq!(column.name, "user_name");
//! assert_eq!(column.type_affinity, TypeAffinity::Text);
//! assert!(!column.index);
//! ```

mod constants;
mod records;

pub use constants::{
    AnnotationEnum, Collate, ForeignKeyAction, IndexOrder, OnConflictStrategy, TypeAffinity,
};
pub use records::*;

use crate::error::ValidationError;
use crate::{AnnotationDeclaration, AnnotationValue, TypeRef};

/// A typed annotation record.
pub trait AnnotationRecord: Sized {
    /// Simple name of the annotation (`Entity`, `ColumnInfo`, ...).
    const NAME: &'static str;

    /// Reads the record's attributes. Attributes left unread are reported
    /// as unknown by [`AnnotationRecord::from_declaration`].
    fn parse(arguments: &mut Arguments<'_>) -> Result<Self, ValidationError>;

    fn from_declaration(annotation: &AnnotationDeclaration) -> Result<Self, ValidationError> {
        if !annotation.is(Self::NAME) {
            return Err(ValidationError::UnexpectedAnnotation {
                expected: Self::NAME.to_string(),
                found: annotation.name.clone(),
            });
        }
        let mut arguments = Arguments::new(annotation);
        let record = Self::parse(&mut arguments)?;
        arguments.finish()?;
        Ok(record)
    }
}

/// Finds and parses the single annotation of type `R`.
///
/// Returns `Ok(None)` when absent and an error when it is repeated or
/// malformed.
pub fn find<R: AnnotationRecord>(
    annotations: &[AnnotationDeclaration],
) -> Result<Option<R>, ValidationError> {
    let mut matching = annotations.iter().filter(|annotation| annotation.is(R::NAME));
    let Some(first) = matching.next() else {
        return Ok(None);
    };
    if matching.next().is_some() {
        return Err(ValidationError::RepeatedAnnotation(R::NAME.to_string()));
    }
    R::from_declaration(first).map(Some)
}

/// Whether an annotation of type `R` is present, without parsing it.
pub fn is_present<R: AnnotationRecord>(annotations: &[AnnotationDeclaration]) -> bool {
    annotations.iter().any(|annotation| annotation.is(R::NAME))
}

/// Cursor over an annotation's raw arguments that remembers which
/// attributes were read.
pub struct Arguments<'a> {
    annotation: &'a AnnotationDeclaration,
    consumed: Vec<&'static str>,
}

impl<'a> Arguments<'a> {
    pub fn new(annotation: &'a AnnotationDeclaration) -> Self {
        Self {
            annotation,
            consumed: Vec::new(),
        }
    }

    fn take(&mut self, name: &'static str) -> Option<&'a AnnotationValue> {
        self.consumed.push(name);
        self.annotation.arguments.get(name)
    }

    fn invalid(&self, attribute: &str, expected: &'static str, found: &AnnotationValue) -> ValidationError {
        ValidationError::InvalidAttributeValue {
            annotation: self.annotation.simple_name().to_string(),
            attribute: attribute.to_string(),
            expected,
            found: found.kind(),
        }
    }

    /// Turns an absent attribute into [`ValidationError::MissingAttribute`].
    pub fn required<T>(&self, name: &str, value: Option<T>) -> Result<T, ValidationError> {
        value.ok_or_else(|| ValidationError::MissingAttribute {
            annotation: self.annotation.simple_name().to_string(),
            attribute: name.to_string(),
        })
    }

    pub fn string(&mut self, name: &'static str) -> Result<Option<String>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(AnnotationValue::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(self.invalid(name, "a string", other)),
        }
    }

    /// A SQL literal: strings pass through, numbers and booleans render.
    pub fn literal(&mut self, name: &'static str) -> Result<Option<String>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(AnnotationValue::String(value)) => Ok(Some(value.clone())),
            Some(AnnotationValue::Integer(value)) => Ok(Some(value.to_string())),
            Some(AnnotationValue::Float(value)) => Ok(Some(value.to_string())),
            Some(AnnotationValue::Bool(value)) => Ok(Some(if *value { "1" } else { "0" }.to_string())),
            Some(other) => Err(self.invalid(name, "a literal", other)),
        }
    }

    pub fn bool(&mut self, name: &'static str) -> Result<Option<bool>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(AnnotationValue::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(self.invalid(name, "a boolean", other)),
        }
    }

    pub fn integer(&mut self, name: &'static str) -> Result<Option<i64>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(AnnotationValue::Integer(value)) => Ok(Some(*value)),
            Some(other) => Err(self.invalid(name, "an integer", other)),
        }
    }

    /// A class literal. A plain string is read as a type path.
    pub fn class(&mut self, name: &'static str) -> Result<Option<TypeRef>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(value) => class_value(value)
                .map(Some)
                .ok_or_else(|| self.invalid(name, "a class literal", value)),
        }
    }

    /// An array of class literals; a single class is accepted as a
    /// one-element array.
    pub fn classes(&mut self, name: &'static str) -> Result<Vec<TypeRef>, ValidationError> {
        self.list(name, "an array of class literals", class_value)
    }

    /// An array of strings; a single string is accepted as a one-element
    /// array.
    pub fn strings(&mut self, name: &'static str) -> Result<Vec<String>, ValidationError> {
        self.list(name, "an array of strings", |value| match value {
            AnnotationValue::String(value) => Some(value.clone()),
            _ => None,
        })
    }

    /// An enum constant, written as an enum literal or a plain string.
    pub fn constant<E: AnnotationEnum>(&mut self, name: &'static str) -> Result<Option<E>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(value) => self.parse_constant(name, value).map(Some),
        }
    }

    pub fn constants<E: AnnotationEnum>(&mut self, name: &'static str) -> Result<Vec<E>, ValidationError> {
        match self.take(name) {
            None => Ok(Vec::new()),
            Some(AnnotationValue::Array(values)) => values
                .iter()
                .map(|value| self.parse_constant(name, value))
                .collect(),
            Some(value) => Ok(vec![self.parse_constant(name, value)?]),
        }
    }

    fn parse_constant<E: AnnotationEnum>(&self, name: &str, value: &AnnotationValue) -> Result<E, ValidationError> {
        let constant = match value {
            AnnotationValue::Enum { constant } | AnnotationValue::String(constant) => constant,
            other => return Err(self.invalid(name, "an enum constant", other)),
        };
        E::from_constant(constant).ok_or_else(|| ValidationError::UnknownConstant {
            kind: E::KIND,
            value: constant.clone(),
            expected: E::CONSTANTS.join(", "),
        })
    }

    /// Nested annotations of type `R`; a single annotation is accepted as
    /// a one-element array.
    pub fn nested_list<R: AnnotationRecord>(&mut self, name: &'static str) -> Result<Vec<R>, ValidationError> {
        match self.take(name) {
            None => Ok(Vec::new()),
            Some(AnnotationValue::Array(values)) => values
                .iter()
                .map(|value| self.parse_nested(name, value))
                .collect(),
            Some(value) => Ok(vec![self.parse_nested(name, value)?]),
        }
    }

    pub fn nested<R: AnnotationRecord>(&mut self, name: &'static str) -> Result<Option<R>, ValidationError> {
        match self.take(name) {
            None => Ok(None),
            Some(value) => self.parse_nested(name, value).map(Some),
        }
    }

    fn parse_nested<R: AnnotationRecord>(&self, name: &str, value: &AnnotationValue) -> Result<R, ValidationError> {
        match value {
            AnnotationValue::Annotation(annotation) => R::from_declaration(annotation),
            other => Err(self.invalid(name, "a nested annotation", other)),
        }
    }

    fn list<T>(
        &mut self,
        name: &'static str,
        expected: &'static str,
        item: impl Fn(&AnnotationValue) -> Option<T>,
    ) -> Result<Vec<T>, ValidationError> {
        match self.take(name) {
            None => Ok(Vec::new()),
            Some(AnnotationValue::Array(values)) => values
                .iter()
                .map(|value| item(value).ok_or_else(|| self.invalid(name, expected, value)))
                .collect(),
            Some(value) => item(value)
                .map(|single| vec![single])
                .ok_or_else(|| self.invalid(name, expected, value)),
        }
    }

    /// Rejects every attribute the record did not read.
    pub fn finish(self) -> Result<(), ValidationError> {
        match self
            .annotation
            .arguments
            .keys()
            .find(|key| !self.consumed.contains(&key.as_str()))
        {
            Some(unknown) => Err(ValidationError::UnknownAttribute {
                annotation: self.annotation.simple_name().to_string(),
                attribute: unknown.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn class_value(value: &AnnotationValue) -> Option<TypeRef> {
    match value {
        AnnotationValue::Class { class } => Some(class.normalized()),
        AnnotationValue::String(path) if !path.trim().is_empty() => Some(TypeRef::new(path.trim())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_rejects_repeated_annotation() {
        let annotations = vec![
            AnnotationDeclaration::new("Embedded"),
            AnnotationDeclaration::new("kabin::Embedded"),
        ];
        assert_eq!(
            find::<Embedded>(&annotations),
            Err(ValidationError::RepeatedAnnotation("Embedded".to_string()))
        );
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let annotation = AnnotationDeclaration::new("PrimaryKey").with_argument("autoIncrement", true);
        assert_eq!(
            PrimaryKey::from_declaration(&annotation),
            Err(ValidationError::UnknownAttribute {
                annotation: "PrimaryKey".to_string(),
                attribute: "autoIncrement".to_string(),
            })
        );
    }

    #[test]
    fn test_wrong_value_kind_is_rejected() {
        let annotation = AnnotationDeclaration::new("Index").with_argument("unique", "yes");
        assert_eq!(
            Index::from_declaration(&annotation),
            Err(ValidationError::InvalidAttributeValue {
                annotation: "Index".to_string(),
                attribute: "unique".to_string(),
                expected: "a boolean",
                found: "string",
            })
        );
    }

    #[test]
    fn test_unknown_constant_lists_expected_values() {
        let annotation = AnnotationDeclaration::new("Insert")
            .with_argument("onConflict", AnnotationValue::constant("OVERWRITE"));
        let error = Insert::from_declaration(&annotation).unwrap_err();
        assert_eq!(
            error,
            ValidationError::UnknownConstant {
                kind: "OnConflictStrategy",
                value: "OVERWRITE".to_string(),
                expected: "ABORT, REPLACE, IGNORE, ROLLBACK, FAIL".to_string(),
            }
        );
    }

    #[test]
    fn test_single_values_are_accepted_for_arrays() {
        let annotation = AnnotationDeclaration::new("Index").with_argument("columns", "name");
        let index = Index::from_declaration(&annotation).unwrap();
        assert_eq!(index.columns, vec!["name".to_string()]);
    }

    #[test]
    fn test_is_present_does_not_parse() {
        let annotations = vec![AnnotationDeclaration::new("Ignore").with_argument("bogus", true)];
        assert!(is_present::<Ignore>(&annotations));
        assert!(find::<Ignore>(&annotations).is_err());
    }
}
