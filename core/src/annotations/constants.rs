//! Enum-valued annotation attributes.

use serde::{Deserialize, Serialize};

/// An enum attribute parsed from its constant name.
pub trait AnnotationEnum: Sized + Copy + 'static {
    /// Name used in diagnostics.
    const KIND: &'static str;
    /// Every accepted constant, in declaration order.
    const CONSTANTS: &'static [&'static str];

    fn from_constant(constant: &str) -> Option<Self>;

    fn constant(self) -> &'static str;
}

macro_rules! annotation_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default $default:ident {
            $($(#[$variant_meta:meta])* $variant:ident => $constant:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$variant_meta])* #[serde(rename = $constant)] $variant),+
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl AnnotationEnum for $name {
            const KIND: &'static str = stringify!($name);
            const CONSTANTS: &'static [&'static str] = &[$($constant),+];

            fn from_constant(constant: &str) -> Option<Self> {
                let constant = constant.rsplit(['.', ':']).next().unwrap_or(constant);
                match constant {
                    $($constant => Some(Self::$variant),)+
                    _ => None,
                }
            }

            fn constant(self) -> &'static str {
                match self {
                    $(Self::$variant => $constant),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.constant())
            }
        }
    };
}

annotation_enum! {
    /// Storage class a column is declared with.
    TypeAffinity, default Undefined {
        /// Inferred from the property type.
        Undefined => "UNDEFINED",
        Text => "TEXT",
        Integer => "INTEGER",
        Real => "REAL",
        Blob => "BLOB",
    }
}

impl TypeAffinity {
    /// Column type keyword, `None` for [`TypeAffinity::Undefined`].
    pub fn sql(self) -> Option<&'static str> {
        match self {
            Self::Undefined => None,
            other => Some(other.constant()),
        }
    }
}

annotation_enum! {
    Collate, default Unspecified {
        Unspecified => "UNSPECIFIED",
        Binary => "BINARY",
        NoCase => "NOCASE",
        RTrim => "RTRIM",
    }
}

impl Collate {
    pub fn sql(self) -> Option<&'static str> {
        match self {
            Self::Unspecified => None,
            other => Some(other.constant()),
        }
    }
}

annotation_enum! {
    /// SQLite conflict resolution algorithm.
    OnConflictStrategy, default Abort {
        Abort => "ABORT",
        Replace => "REPLACE",
        Ignore => "IGNORE",
        Rollback => "ROLLBACK",
        Fail => "FAIL",
    }
}

impl OnConflictStrategy {
    pub fn sql(self) -> &'static str {
        self.constant()
    }

    pub fn is_default(self) -> bool {
        self == Self::Abort
    }
}

annotation_enum! {
    /// Action taken on child rows when a parent key changes.
    ForeignKeyAction, default NoAction {
        NoAction => "NO_ACTION",
        Cascade => "CASCADE",
        SetNull => "SET_NULL",
        SetDefault => "SET_DEFAULT",
        Restrict => "RESTRICT",
    }
}

impl ForeignKeyAction {
    pub fn sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
        }
    }
}

annotation_enum! {
    IndexOrder, default Asc {
        Asc => "ASC",
        Desc => "DESC",
    }
}

impl IndexOrder {
    pub fn sql(self) -> &'static str {
        self.constant()
    }
}
