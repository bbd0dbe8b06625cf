//! SQL text embedded in generated units.
//!
//! Every identifier is quoted with backticks, so table and column names may
//! collide with SQL keywords.

use kabin_core::{
    ColumnSpec, DatabaseSpec, EntitySpec, ForeignKeySpec, IndexSpec, OnConflictStrategy,
    RelationSpec,
};

/// Quotes an identifier: `` `name` ``.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn column_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE TABLE IF NOT EXISTS` for an entity.
pub fn create_table(entity: &EntitySpec) -> String {
    let mut definitions: Vec<String> = entity
        .stored_columns()
        .into_iter()
        .map(|column| column_definition(entity, column))
        .collect();
    if entity.primary_key.is_composite() {
        definitions.push(format!(
            "PRIMARY KEY({})",
            column_list(entity.primary_key.columns.iter().map(String::as_str))
        ));
    }
    definitions.extend(entity.foreign_keys.iter().map(foreign_key));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(&entity.table_name),
        definitions.join(", ")
    )
}

fn column_definition(entity: &EntitySpec, column: &ColumnSpec) -> String {
    let mut definition = quote_identifier(&column.name);
    if let Some(affinity) = column.affinity().and_then(|affinity| affinity.sql()) {
        definition.push(' ');
        definition.push_str(affinity);
    }
    if column.is_primary_key && !entity.primary_key.is_composite() {
        definition.push_str(" PRIMARY KEY");
        if !entity.primary_key.on_conflict.is_default() {
            definition.push_str(" ON CONFLICT ");
            definition.push_str(entity.primary_key.on_conflict.sql());
        }
        if entity.primary_key.auto_generate {
            definition.push_str(" AUTOINCREMENT");
        }
    }
    if !column.is_nullable {
        definition.push_str(" NOT NULL");
    }
    if let Some(collate) = column.collate.sql() {
        definition.push_str(" COLLATE ");
        definition.push_str(collate);
    }
    if let Some(default) = &column.default_value {
        definition.push_str(" DEFAULT ");
        definition.push_str(default);
    }
    definition
}

fn foreign_key(foreign_key: &ForeignKeySpec) -> String {
    let mut clause = format!(
        "FOREIGN KEY({}) REFERENCES {}({}) ON UPDATE {} ON DELETE {}",
        column_list(foreign_key.child_columns.iter().map(String::as_str)),
        quote_identifier(&foreign_key.table),
        column_list(foreign_key.parent_columns.iter().map(String::as_str)),
        foreign_key.on_update.sql(),
        foreign_key.on_delete.sql(),
    );
    if foreign_key.deferred {
        clause.push_str(" DEFERRABLE INITIALLY DEFERRED");
    }
    clause
}

/// One `CREATE INDEX IF NOT EXISTS` per declared index.
pub fn create_indices(entity: &EntitySpec) -> Vec<String> {
    entity
        .indices
        .iter()
        .map(|index| create_index(&entity.table_name, index))
        .collect()
}

fn create_index(table: &str, index: &IndexSpec) -> String {
    let columns: Vec<String> = index
        .columns
        .iter()
        .enumerate()
        .map(|(position, column)| match index.orders.get(position) {
            Some(order) => format!("{} {}", quote_identifier(column), order.sql()),
            None => quote_identifier(column),
        })
        .collect();
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_identifier(&index.name),
        quote_identifier(table),
        columns.join(", ")
    )
}

pub fn drop_table(entity: &EntitySpec) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_identifier(&entity.table_name))
}

/// Every statement a database schema runs on creation, tables first.
pub fn schema_statements(database: &DatabaseSpec) -> Vec<String> {
    let mut statements: Vec<String> = database
        .entities
        .iter()
        .map(|entity| create_table(entity))
        .collect();
    statements.extend(database.entities.iter().flat_map(|entity| create_indices(entity)));
    statements
}

fn conflict_clause(on_conflict: OnConflictStrategy) -> String {
    if on_conflict.is_default() {
        String::new()
    } else {
        format!("OR {} ", on_conflict.sql())
    }
}

/// Insert of every stored column; values bind in stored-column order.
///
/// An auto-generated key binds through `nullif(?, 0)`, so a zero key lets
/// SQLite assign the row id.
pub fn insert(entity: &EntitySpec, on_conflict: OnConflictStrategy) -> String {
    let columns = entity.stored_columns();
    let values: Vec<&str> = columns
        .iter()
        .map(|column| {
            if column.is_primary_key && entity.primary_key.auto_generate {
                "nullif(?, 0)"
            } else {
                "?"
            }
        })
        .collect();
    format!(
        "INSERT {}INTO {} ({}) VALUES ({})",
        conflict_clause(on_conflict),
        quote_identifier(&entity.table_name),
        column_list(columns.iter().map(|column| column.name.as_str())),
        values.join(", ")
    )
}

/// Update by primary key; binds the non-key columns, then the key columns.
pub fn update(entity: &EntitySpec, on_conflict: OnConflictStrategy) -> String {
    let assignments: Vec<String> = update_columns(entity)
        .iter()
        .map(|column| format!("{} = ?", quote_identifier(&column.name)))
        .collect();
    format!(
        "UPDATE {}{} SET {} WHERE {}",
        conflict_clause(on_conflict),
        quote_identifier(&entity.table_name),
        assignments.join(", "),
        key_condition(entity)
    )
}

/// Delete by primary key.
pub fn delete(entity: &EntitySpec) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        quote_identifier(&entity.table_name),
        key_condition(entity)
    )
}

/// Columns an update assigns, in stored-column order.
pub fn update_columns(entity: &EntitySpec) -> Vec<&ColumnSpec> {
    entity
        .stored_columns()
        .into_iter()
        .filter(|column| !column.is_primary_key)
        .collect()
}

fn key_condition(entity: &EntitySpec) -> String {
    entity
        .primary_key
        .columns
        .iter()
        .map(|column| format!("{} = ?", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Select of the related rows for one parent key.
pub fn relation_select(relation: &RelationSpec) -> String {
    let columns = column_list(relation.selected_columns());
    let table = quote_identifier(&relation.entity_table);
    let column = quote_identifier(&relation.entity_column);
    match &relation.junction {
        None => format!("SELECT {columns} FROM {table} WHERE {column} = ?"),
        Some(junction) => format!(
            "SELECT {columns} FROM {table} WHERE {column} IN (SELECT {} FROM {} WHERE {} = ?)",
            quote_identifier(&junction.entity_column),
            quote_identifier(&junction.table),
            quote_identifier(&junction.parent_column)
        ),
    }
}

#[cfg(test)]
mod tests {
    use kabin_core::{
        Collate, ColumnSpec, ConstructorSpec, EntityMember, ForeignKeyAction, IndexOrder,
        PrimaryKeySpec, TypeAffinity, TypeRef, ValueMapping,
    };

    use super::*;

    fn column(name: &str, affinity: TypeAffinity, nullable: bool) -> EntityMember {
        EntityMember::Column(ColumnSpec {
            property: name.to_string(),
            ty: TypeRef::new("i64"),
            name: name.to_string(),
            mapping: Some(ValueMapping::Native(affinity)),
            is_nullable: nullable,
            default_value: None,
            collate: Collate::Unspecified,
            index: false,
            ignore: None,
            is_primary_key: name == "id",
            embedded_in: None,
        })
    }

    fn user() -> EntitySpec {
        EntitySpec {
            declaration: "crate::User".to_string(),
            table_name: "User".to_string(),
            members: vec![
                column("id", TypeAffinity::Integer, false),
                column("name", TypeAffinity::Text, false),
                column("group", TypeAffinity::Integer, true),
            ],
            primary_key: PrimaryKeySpec {
                columns: vec!["id".to_string()],
                auto_generate: true,
                on_conflict: OnConflictStrategy::Abort,
            },
            foreign_keys: vec![ForeignKeySpec {
                entity: "crate::Group".to_string(),
                table: "Group".to_string(),
                parent_columns: vec!["id".to_string()],
                child_columns: vec!["group".to_string()],
                on_delete: ForeignKeyAction::Cascade,
                on_update: ForeignKeyAction::NoAction,
                deferred: true,
            }],
            indices: vec![IndexSpec {
                name: "index_User_name".to_string(),
                unique: true,
                columns: vec!["name".to_string()],
                orders: vec![IndexOrder::Desc],
            }],
            constructor: ConstructorSpec::struct_literal(Vec::new()),
        }
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            create_table(&user()),
            "CREATE TABLE IF NOT EXISTS `User` (\
             `id` INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
             `name` TEXT NOT NULL, \
             `group` INTEGER, \
             FOREIGN KEY(`group`) REFERENCES `Group`(`id`) ON UPDATE NO ACTION ON DELETE CASCADE \
             DEFERRABLE INITIALLY DEFERRED)"
        );
    }

    #[test]
    fn test_create_index_with_order() {
        assert_eq!(
            create_indices(&user()),
            vec!["CREATE UNIQUE INDEX IF NOT EXISTS `index_User_name` ON `User` (`name` DESC)"]
        );
    }

    #[test]
    fn test_write_statements() {
        let user = user();
        assert_eq!(
            insert(&user, OnConflictStrategy::Replace),
            "INSERT OR REPLACE INTO `User` (`id`, `name`, `group`) VALUES (nullif(?, 0), ?, ?)"
        );
        assert_eq!(
            insert(&user, OnConflictStrategy::Abort),
            "INSERT INTO `User` (`id`, `name`, `group`) VALUES (nullif(?, 0), ?, ?)"
        );
        assert_eq!(
            update(&user, OnConflictStrategy::Abort),
            "UPDATE `User` SET `name` = ?, `group` = ? WHERE `id` = ?"
        );
        assert_eq!(delete(&user), "DELETE FROM `User` WHERE `id` = ?");
    }

    #[test]
    fn test_insert_binds_plain_key_without_auto_generate() {
        let mut user = user();
        user.primary_key.auto_generate = false;
        assert_eq!(
            insert(&user, OnConflictStrategy::Abort),
            "INSERT INTO `User` (`id`, `name`, `group`) VALUES (?, ?, ?)"
        );
    }

    #[test]
    fn test_composite_key_is_a_table_constraint() {
        let mut user = user();
        user.foreign_keys.clear();
        user.primary_key.columns = vec!["id".to_string(), "name".to_string()];
        user.primary_key.auto_generate = false;
        let sql = create_table(&user);
        assert!(sql.contains("`id` INTEGER NOT NULL"));
        assert!(sql.ends_with("PRIMARY KEY(`id`, `name`))"));
        assert_eq!(delete(&user), "DELETE FROM `User` WHERE `id` = ? AND `name` = ?");
    }

    #[test]
    fn test_identifiers_escape_backticks() {
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
