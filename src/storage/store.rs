//! Storage facade
//!
//! Binds the in-memory [`Database`] to its catalog file and resolves each
//! table's record file from the catalog path.

use super::catalog_file;
use super::record::{Record, Value};
use super::record_file::RecordFile;
use crate::catalog::{Database, Field, Index, Table};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Catalog plus record files rooted at one catalog path
#[derive(Debug)]
pub struct Storage {
    catalog_path: PathBuf,
    db: Database,
}

impl Storage {
    /// Load the catalog (empty if missing) and rebuild every index
    pub fn open(catalog_path: impl Into<PathBuf>) -> Result<Self> {
        let catalog_path = catalog_path.into();
        let db = catalog_file::read_catalog(&catalog_path)?;

        let mut storage = Self { catalog_path, db };
        storage.rebuild_all_indexes()?;

        info!(
            path = %storage.catalog_path.display(),
            tables = storage.db.table_count(),
            "storage opened"
        );
        Ok(storage)
    }

    /// Re-read the catalog from disk, dropping in-memory state
    pub fn reload(&mut self) -> Result<()> {
        self.db = catalog_file::read_catalog(&self.catalog_path)?;
        self.rebuild_all_indexes()
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Rewrite the catalog file from the in-memory database
    pub fn persist(&self) -> Result<()> {
        catalog_file::write_catalog(&self.catalog_path, &self.db)
    }

    /// Path of a table's record file
    pub fn record_path(&self, table_name: &str) -> PathBuf {
        record_path_for(&self.catalog_path, table_name)
    }

    /// Record file of a table
    pub fn record_file(&self, table_name: &str) -> RecordFile {
        RecordFile::new(self.record_path(table_name))
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.db.require_table(name)
    }

    /// Rebuild every index of one table from a full scan
    pub fn rebuild_indexes(&mut self, table_name: &str) -> Result<()> {
        let Some((fields, rows)) = self.index_rows(table_name)? else {
            return Ok(());
        };

        let table = self.db.require_table_mut(table_name)?;
        for index in table.indexes.values_mut() {
            let column = index_column(&fields, index)?;
            index.rebuild(
                rows.iter()
                    .map(|(offset, record)| (*offset, record.get(column).unwrap_or(&Value::Null))),
            )?;
        }

        Ok(())
    }

    /// Stored rows of a table that has indexes, with its fields
    fn index_rows(&self, table_name: &str) -> Result<Option<(Vec<Field>, Vec<(u64, Record)>)>> {
        let table = self.db.require_table(table_name)?;
        if table.indexes.is_empty() {
            return Ok(None);
        }
        let rows = self.record_file(&table.name).scan_logged(&table.fields)?;
        Ok(Some((table.fields.clone(), rows)))
    }

    /// Rebuild all indexes on open. Rows that already hold duplicate keys
    /// are loaded anyway so the unique check keeps seeing them; a record
    /// file that cannot be read fails the open.
    fn rebuild_all_indexes(&mut self) -> Result<()> {
        for name in self.db.table_names() {
            let Err(e) = self.rebuild_indexes(&name) else {
                continue;
            };
            warn!(table = %name, error = %e, "index rebuild failed, loading keys unchecked");

            let Some((fields, rows)) = self.index_rows(&name)? else {
                continue;
            };
            let table = self.db.require_table_mut(&name)?;
            for index in table.indexes.values_mut() {
                let column = index_column(&fields, index)?;
                let duplicates = index.rebuild_unchecked(
                    rows.iter()
                        .map(|(offset, record)| (*offset, record.get(column).unwrap_or(&Value::Null))),
                );
                if index.unique && duplicates > 0 {
                    warn!(index = %index.name, duplicates, "unique index holds duplicate keys");
                }
            }
        }
        Ok(())
    }
}

fn index_column(fields: &[Field], index: &Index) -> Result<usize> {
    fields
        .iter()
        .position(|f| f.is_named(&index.column_name))
        .ok_or_else(|| Error::ColumnNotFound(index.column_name.clone(), index.table_name.clone()))
}

/// `<dir>/<base>_<table>.dat`, where `<base>` is the catalog file name
/// without a `.dbf` or `.dat` extension
pub fn record_path_for(catalog_path: &Path, table_name: &str) -> PathBuf {
    let file_name = catalog_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let base = file_name
        .strip_suffix(".dbf")
        .or_else(|| file_name.strip_suffix(".dat"))
        .unwrap_or(&file_name);

    let dir = catalog_path.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}_{}.dat", base, table_name))
}
