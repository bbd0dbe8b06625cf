use std::fmt;

use serde::Serialize;

/// First line of every generated file.
pub const GENERATED_HEADER: &str = "// @generated by kabin";

/// What a generated unit contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Table,
    Mapper,
    Queries,
    Dao,
    Database,
    Schema,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "table",
            Self::Mapper => "mapper",
            Self::Queries => "queries",
            Self::Dao => "dao",
            Self::Database => "database",
            Self::Schema => "schema",
        };
        f.write_str(name)
    }
}

/// One generated Rust module, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedUnit {
    /// Name of the main item (`UserTable`).
    pub name: String,
    /// `output_module::name`.
    pub qualified_name: String,
    /// Module the unit is written as (`user_table`).
    pub module: String,
    pub kind: UnitKind,
    /// Complete file contents, header included.
    pub source: String,
}

impl GeneratedUnit {
    pub fn file_name(&self) -> String {
        format!("{}.rs", self.module)
    }
}
