//! Storage mapping between property types and SQL affinities.
//!
//! A property whose Rust type is the runtime's native representation of its
//! affinity (`i64`, `f64`, `String`, `Vec<u8>`) is read and bound directly.
//! Every other property goes through a [`ColumnAdapterReference`]: either one
//! of the built-in primitive adapters or a user converter listed in
//! `@TypeConverters`.

use std::fmt;

use serde::Serialize;

use crate::TypeRef;
use crate::annotations::TypeAffinity;

/// Identity of an adapter: (source type, storage affinity).
///
/// Two columns of the same type stored the same way share one adapter
/// instance in the generated database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ColumnAdapterReference {
    pub source_type: TypeRef,
    pub affinity: TypeAffinity,
}

impl ColumnAdapterReference {
    /// Builds a reference; the source type is stored without its `Option`.
    pub fn new(source_type: &TypeRef, affinity: TypeAffinity) -> Self {
        Self {
            source_type: source_type.non_null(),
            affinity,
        }
    }

    /// The runtime type the adapter encodes into.
    pub fn storage_type(&self) -> TypeRef {
        storage_type(self.affinity).unwrap_or_else(TypeRef::unit)
    }

    /// The built-in adapter covering this pair, if any.
    pub fn builtin(&self) -> Option<BuiltinAdapter> {
        let builtin = BuiltinAdapter::for_type(&self.source_type)?;
        (builtin.affinity() == self.affinity).then_some(builtin)
    }
}

impl fmt::Display for ColumnAdapterReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.source_type, self.storage_type())
    }
}

/// Adapters shipped with the runtime for primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinAdapter {
    /// `i8 i16 i32 u8 u16 u32` stored as `i64`.
    Integer,
    /// `bool` stored as `0`/`1`.
    Boolean,
    /// `f32` stored as `f64`.
    Float,
}

impl BuiltinAdapter {
    pub fn for_type(ty: &TypeRef) -> Option<Self> {
        if !ty.arguments.is_empty() {
            return None;
        }
        match ty.name.as_str() {
            "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => Some(Self::Integer),
            "bool" => Some(Self::Boolean),
            "f32" => Some(Self::Float),
            _ => None,
        }
    }

    pub fn affinity(self) -> TypeAffinity {
        match self {
            Self::Integer | Self::Boolean => TypeAffinity::Integer,
            Self::Float => TypeAffinity::Real,
        }
    }
}

/// How a value moves between its Rust type and SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueMapping {
    /// The type is the runtime's own representation of the affinity.
    Native(TypeAffinity),
    /// Conversion through an adapter.
    Adapted(ColumnAdapterReference),
}

impl ValueMapping {
    pub fn affinity(&self) -> TypeAffinity {
        match self {
            Self::Native(affinity) => *affinity,
            Self::Adapted(adapter) => adapter.affinity,
        }
    }

    pub fn adapter(&self) -> Option<&ColumnAdapterReference> {
        match self {
            Self::Native(_) => None,
            Self::Adapted(adapter) => Some(adapter),
        }
    }

    /// Resolves the mapping for `ty`, honouring an explicit affinity.
    ///
    /// Returns `None` when no affinity is declared and none can be inferred.
    ///
    /// # Examples
    ///
    /// ```
    /// use kabin_core::{TypeAffinity, TypeRef, ValueMapping};
    ///
    /// let native = ValueMapping::resolve(&TypeRef::new("String"), TypeAffinity::Undefined);
    /// assert_eq!(native, Some(ValueMapping::Native(TypeAffinity::Text)));
    ///
    /// let adapted = ValueMapping::resolve(&TypeRef::new("i32"), TypeAffinity::Undefined).unwrap();
    /// assert_eq!(adapted.adapter().unwrap().storage_type().to_rust(), "i64");
    ///
    /// assert_eq!(ValueMapping::resolve(&TypeRef::new("uuid::Uuid"), TypeAffinity::Undefined), None);
    /// ```
    pub fn resolve(ty: &TypeRef, explicit: TypeAffinity) -> Option<Self> {
        let base = ty.non_null();
        let native = native_affinity(&base);
        if explicit == TypeAffinity::Undefined {
            if let Some(affinity) = native {
                return Some(Self::Native(affinity));
            }
            let builtin = BuiltinAdapter::for_type(&base)?;
            return Some(Self::Adapted(ColumnAdapterReference::new(&base, builtin.affinity())));
        }
        if native == Some(explicit) {
            Some(Self::Native(explicit))
        } else {
            Some(Self::Adapted(ColumnAdapterReference::new(&base, explicit)))
        }
    }
}

/// Affinity of a type the runtime reads and binds natively.
pub fn native_affinity(ty: &TypeRef) -> Option<TypeAffinity> {
    match (ty.name.as_str(), ty.arguments.as_slice()) {
        ("i64", []) => Some(TypeAffinity::Integer),
        ("f64", []) => Some(TypeAffinity::Real),
        ("String" | "std::string::String" | "alloc::string::String", []) => Some(TypeAffinity::Text),
        ("Vec" | "std::vec::Vec" | "alloc::vec::Vec", [element])
            if element.name == "u8" && !element.nullable =>
        {
            Some(TypeAffinity::Blob)
        }
        _ => None,
    }
}

/// The runtime type values of an affinity are stored as.
pub fn storage_type(affinity: TypeAffinity) -> Option<TypeRef> {
    match affinity {
        TypeAffinity::Undefined => None,
        TypeAffinity::Integer => Some(TypeRef::new("i64")),
        TypeAffinity::Real => Some(TypeRef::new("f64")),
        TypeAffinity::Text => Some(TypeRef::new("String")),
        TypeAffinity::Blob => Some(TypeRef::new("Vec").with_argument(TypeRef::new("u8"))),
    }
}

/// Whether `ty` is a `Vec<_>` (other than the `Vec<u8>` blob type).
pub fn list_element(ty: &TypeRef) -> Option<&TypeRef> {
    match (ty.name.as_str(), ty.arguments.as_slice()) {
        ("Vec" | "std::vec::Vec" | "alloc::vec::Vec", [element]) if native_affinity(ty).is_none() => {
            Some(element)
        }
        _ => None,
    }
}
