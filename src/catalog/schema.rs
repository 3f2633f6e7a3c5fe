//! Schema definitions for FlatDB
//!
//! This module defines fields, tables and the database that owns them.
//! Table and field lookups are case-insensitive; the declared spelling is
//! kept for display and persistence.

use super::index::Index;
use super::types::FieldType;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::fmt::Write;

/// Column definition in a table
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// VARCHAR max characters, CHAR fixed bytes; informational otherwise
    pub length: i32,
    /// Primary key flag (advisory)
    pub primary_key: bool,
    /// Is this field nullable?
    pub nullable: bool,
    /// Reserved default-value expression, persisted but unused
    pub default: Option<String>,
}

impl Field {
    /// Create a nullable, non-key field
    pub fn new(name: impl Into<String>, field_type: FieldType, length: i32) -> Self {
        Self {
            name: name.into(),
            field_type,
            length,
            primary_key: false,
            nullable: true,
            default: None,
        }
    }

    /// Set nullable flag
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set primary key flag
    pub fn primary_key(mut self, pk: bool) -> Self {
        self.primary_key = pk;
        self
    }

    /// Case-insensitive name match
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Type with its length, e.g. `VARCHAR(20)`
    pub fn type_label(&self) -> String {
        match self.field_type {
            FieldType::Varchar | FieldType::Char => format!("{}({})", self.field_type, self.length),
            _ => self.field_type.to_string(),
        }
    }
}

/// Table definition
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name as created
    pub name: String,
    /// Ordered fields; the order is the on-disk layout
    pub fields: Vec<Field>,
    /// Cached row count (advisory)
    pub record_count: i32,
    /// Last modification, milliseconds since the epoch
    pub last_modified: i64,
    /// Indexes keyed by lower-cased index name
    pub indexes: IndexMap<String, Index>,
}

impl Table {
    /// Create a new table definition
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            record_count: 0,
            last_modified: now_millis(),
            indexes: IndexMap::new(),
        }
    }

    /// Position of a field by name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.is_named(name))
    }

    /// Get a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    /// Get a field by name or fail with `ColumnNotFound`
    pub fn require_field(&self, name: &str) -> Result<usize> {
        self.field_index(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string(), self.name.clone()))
    }

    /// Check if a field exists
    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    /// Field names in layout order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Get an index by name
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(&name.to_lowercase())
    }

    /// Indexes over the given column
    pub fn indexes_on(&self, column: &str) -> impl Iterator<Item = &Index> {
        let column = column.to_string();
        self.indexes
            .values()
            .filter(move |idx| idx.column_name.eq_ignore_ascii_case(&column))
    }

    /// Mark the table as modified now
    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }

    /// Human-readable schema summary
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Table: {}", self.name);

        for field in &self.fields {
            let mut flags = Vec::new();
            if field.primary_key {
                flags.push("PRIMARY KEY");
            }
            if !field.nullable {
                flags.push("NOT NULL");
            }
            let _ = writeln!(
                out,
                "  {} {}{}{}",
                field.name,
                field.type_label(),
                if flags.is_empty() { "" } else { " " },
                flags.join(" ")
            );
        }

        for index in self.indexes.values() {
            let _ = writeln!(
                out,
                "  {}INDEX {} ON ({})",
                if index.unique { "UNIQUE " } else { "" },
                index.name,
                index.column_name
            );
        }

        out
    }
}

/// The database: every table, keyed by lower-cased name
#[derive(Debug, Clone, Default)]
pub struct Database {
    /// Database name (the catalog file's base name)
    pub name: String,
    tables: IndexMap<String, Table>,
}

impl Database {
    /// Create an empty database
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: IndexMap::new(),
        }
    }

    /// Get a table by name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    /// Get a mutable table by name
    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(&name.to_lowercase())
    }

    /// Get a table or fail with `TableNotFound`
    pub fn require_table(&self, name: &str) -> Result<&Table> {
        self.table(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Mutable variant of [`Database::require_table`]
    pub fn require_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.table_mut(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Check if a table exists
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    /// Add a table; fails if the name is taken
    pub fn add_table(&mut self, table: Table) -> Result<()> {
        let key = table.name.to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(Error::TableAlreadyExists(table.name));
        }
        self.tables.insert(key, table);
        Ok(())
    }

    /// Remove a table by name
    pub fn remove_table(&mut self, name: &str) -> Option<Table> {
        self.tables.shift_remove(&name.to_lowercase())
    }

    /// Rename a table in place, keeping its position
    pub fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let old_key = old_name.to_lowercase();
        if !self.tables.contains_key(&old_key) {
            return Err(Error::TableNotFound(old_name.to_string()));
        }
        if self.has_table(new_name) {
            return Err(Error::TableAlreadyExists(new_name.to_string()));
        }

        let tables = std::mem::take(&mut self.tables);
        self.tables = tables
            .into_iter()
            .map(|(key, mut table)| {
                if key != old_key {
                    return (key, table);
                }
                table.name = new_name.to_string();
                for idx in table.indexes.values_mut() {
                    idx.table_name = new_name.to_string();
                }
                (new_name.to_lowercase(), table)
            })
            .collect();
        Ok(())
    }

    /// Table names in creation order
    pub fn table_names(&self) -> Vec<String> {
        self.tables.values().map(|t| t.name.clone()).collect()
    }

    /// All tables in creation order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Mutable iterator over all tables
    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.tables.values_mut()
    }

    /// Number of tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
