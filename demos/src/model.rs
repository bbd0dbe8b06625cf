//! Entities, compound rows and the uuid converter.

use kabin_runtime::{ColumnAdapter, KabinError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub spouse_id: Option<i64>,
}

impl User {
    /// An `id` of `0` lets SQLite assign one on insert.
    pub fn new(name: String, id: i64, spouse_id: Option<i64>) -> Self {
        Self { id, name, spouse_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: i64,
    pub author_id: i64,
    pub body: String,
    pub pinned: bool,
    pub uuid: uuid::Uuid,
    pub location: Option<Location>,
    /// Never stored.
    pub draft: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserWithSpouse {
    pub user: User,
    pub spouse: Option<User>,
    pub spouse_of: Option<User>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserWithNotes {
    pub user: User,
    pub notes: Vec<Note>,
    pub bodies: Vec<String>,
}

/// Stores a uuid as its hyphenated text.
#[derive(Debug, Default)]
pub struct UuidConverter;

impl ColumnAdapter<uuid::Uuid, String> for UuidConverter {
    fn decode(&self, value: String) -> Result<uuid::Uuid> {
        uuid::Uuid::parse_str(&value).map_err(|err| KabinError::Conversion(err.to_string()))
    }

    fn encode(&self, value: &uuid::Uuid) -> String {
        value.hyphenated().to_string()
    }
}
