//! Error taxonomy shared by resolution and generation.
//!
//! Errors fall into four families:
//!
//! - [`ValidationError`]: a malformed, missing or unknown annotation attribute.
//! - [`ResolutionError`]: a type, column or cross reference that does not
//!   resolve, or an entity without exactly one primary key.
//! - [`BindingError`]: query parameters and SQL placeholders disagree.
//! - [`GenerationError`]: an invariant broken while composing output.
//!
//! [`SpecError`] wraps the four, and a [`Diagnostic`] ties one of them to
//! the declaration it was raised for.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Malformed or missing annotation attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("@{annotation} has no attribute `{attribute}`")]
    UnknownAttribute { annotation: String, attribute: String },

    #[error("@{annotation} requires attribute `{attribute}`")]
    MissingAttribute { annotation: String, attribute: String },

    #[error("attribute `{attribute}` of @{annotation} expects {expected}, found {found}")]
    InvalidAttributeValue {
        annotation: String,
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{value}` is not a {kind} constant (expected one of: {expected})")]
    UnknownConstant {
        kind: &'static str,
        value: String,
        expected: String,
    },

    #[error("@{0} may only be declared once")]
    RepeatedAnnotation(String),

    #[error("expected @{expected}, found @{found}")]
    UnexpectedAnnotation { expected: String, found: String },

    #[error("{0} is missing the @{1} annotation")]
    MissingAnnotation(String, &'static str),

    #[error("`{0}` must be a trait")]
    NotATrait(String),

    #[error("`{0}` must be a struct")]
    NotAStruct(String),

    #[error("database version must be at least 1, found {0}")]
    InvalidDatabaseVersion(i64),

    #[error("@Database must list at least one entity")]
    EmptyDatabaseEntities,

    #[error("foreign key to `{0}` needs the same non-empty number of parent and child columns")]
    ForeignKeyColumnMismatch(String),

    #[error("@Index must list at least one column")]
    EmptyIndexColumns,

    #[error("index `{index}` lists {orders} orders for {columns} columns")]
    IndexOrderMismatch {
        index: String,
        columns: usize,
        orders: usize,
    },

    #[error("auto-generated primary key `{0}` must be a single INTEGER column")]
    InvalidAutoGenerate(String),

    #[error("`{0}` is listed in ignoredColumns but is not a property")]
    UnknownIgnoredColumn(String),

    #[error("property `{0}` cannot be both a primary key and ignored")]
    IgnoredPrimaryKey(String),

    #[error("`{0}` must carry exactly one of @Query, @Insert, @Update or @Delete")]
    MissingQueryAnnotation(String),

    #[error("`{function}` carries conflicting query annotations: {annotations}")]
    ConflictingQueryAnnotations {
        function: String,
        annotations: String,
    },

    #[error("@Query on `{0}` has empty SQL")]
    EmptyQuery(String),

    #[error("`{0}` must take exactly one entity parameter")]
    EntityParameterCount(String),

    #[error("`{function}` returns `{found}`, but {expected}")]
    ReturnTypeMismatch {
        function: String,
        expected: &'static str,
        found: String,
    },

    #[error("database getter `{0}` must not take parameters")]
    GetterWithParameters(String),

    #[error("compound `{compound}`: {reason}")]
    InvalidCompound { compound: String, reason: String },

    #[error("relation `{property}` must be typed Option<_> or Vec<_>, found `{found}`")]
    InvalidRelationType { property: String, found: String },

    #[error("relation `{0}` must read the entity itself or project exactly one column into a scalar")]
    InvalidProjection(String),
}

/// Unresolved references and primary-key ambiguity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("type `{0}` does not resolve to a known declaration")]
    UnresolvedType(String),

    #[error("cannot infer a type affinity for `{property}` of type `{ty}`; declare typeAffinity")]
    UnresolvedAffinity { property: String, ty: String },

    #[error("entity `{entity}` must declare exactly one primary key, found {found}")]
    AmbiguousOrMissingPrimaryKey { entity: String, found: usize },

    #[error("primary key column `{0}` is not a column of the entity")]
    UnresolvedPrimaryKeyColumn(String),

    #[error("column name `{0}` is declared more than once")]
    DuplicateColumn(String),

    #[error("index `{0}` is declared more than once with different definitions")]
    DuplicateIndex(String),

    #[error("cyclic embedding: {0}")]
    CyclicEmbedding(String),

    #[error("`{0}` is not an @Entity")]
    NotAnEntity(String),

    #[error("`{0}` is not a @Dao")]
    NotADao(String),

    #[error("foreign key target `{0}` is not an @Entity")]
    UnresolvedForeignKeyTarget(String),

    #[error("column `{column}` does not exist in table `{table}`")]
    UnresolvedColumn { table: String, column: String },

    #[error("index `{index}` references unknown column `{column}`")]
    UnresolvedIndexColumn { index: String, column: String },

    #[error("relation column `{column}` does not exist on `{entity}`")]
    UnresolvedRelationColumn { entity: String, column: String },

    #[error("junction `{junction}` has no foreign key to `{entity}` on column `{column}`")]
    UnresolvedJunctionForeignKey {
        junction: String,
        entity: String,
        column: String,
    },

    #[error("entity `{0}` is used but not listed in @Database entities")]
    EntityNotInDatabase(String),

    #[error("no type converter maps `{source_type}` to {affinity}")]
    MissingTypeConverter { source_type: String, affinity: String },

    #[error("type converter `{converter}` is invalid: {reason}")]
    InvalidTypeConverter { converter: String, reason: String },

    #[error("parameter `{parameter}` of type `{ty}` cannot be bound to SQL")]
    UnsupportedParameterType { parameter: String, ty: String },

    #[error("return type `{0}` cannot be read from a row")]
    UnsupportedReturnType(String),

    #[error("`{0}` failed to resolve")]
    DependencyFailed(String),
}

/// Query parameter and placeholder mismatches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("placeholder `:{0}` has no matching parameter")]
    UnboundQueryParameter(String),

    #[error("parameter `{0}` is not used by the query")]
    UnusedQueryParameter(String),

    #[error("anonymous placeholder at byte {0}; use `:name` placeholders")]
    AnonymousPlaceholder(usize),

    #[error("unsupported placeholder `{0}`; use `:name` placeholders")]
    UnsupportedPlaceholder(String),

    #[error("unterminated {0} in query")]
    Unterminated(&'static str),

    #[error("parameter `{parameter}` must be `{expected}`, found `{found}`")]
    EntityParameterMismatch {
        parameter: String,
        expected: String,
        found: String,
    },
}

/// Invariants broken while composing generated code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("constructor parameter `{parameter}` of `{owner}` does not match any stored member")]
    UnmatchedConstructorParameter { owner: String, parameter: String },

    #[error("member `{member}` of `{owner}` is not covered by the constructor")]
    UncoveredMember { owner: String, member: String },

    #[error("`{0}` is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("`{0}` is not a valid type path")]
    InvalidTypePath(String),

    #[error("no generated mapper for `{0}`")]
    MissingMapper(String),
}

/// Any error raised for a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
}

impl SpecError {
    /// Stable family name (`validation`, `resolution`, `binding`, `generation`).
    pub fn family(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Resolution(_) => "resolution",
            Self::Binding(_) => "binding",
            Self::Generation(_) => "generation",
        }
    }
}

/// An error attached to the declaration it was raised for.
///
/// `declaration` is a qualified name; member-level errors append the member
/// (`crate::UserDao::get_user`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub declaration: String,
    pub error: SpecError,
}

impl Diagnostic {
    pub fn new(declaration: impl Into<String>, error: impl Into<SpecError>) -> Self {
        Self {
            declaration: declaration.into(),
            error: error.into(),
        }
    }

    /// Re-anchors a member diagnostic under `owner::member`.
    pub fn member(owner: &str, member: &str, error: impl Into<SpecError>) -> Self {
        Self::new(format!("{owner}::{member}"), error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.declaration, self.error)
    }
}

impl std::error::Error for Diagnostic {}

impl Serialize for Diagnostic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Diagnostic", 3)?;
        state.serialize_field("declaration", &self.declaration)?;
        state.serialize_field("kind", self.error.family())?;
        state.serialize_field("message", &self.error.to_string())?;
        state.end()
    }
}
