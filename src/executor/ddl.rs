//! DDL execution
//!
//! Each operation validates, mutates the in-memory catalog and rewrites the
//! catalog file. Layout-changing ALTERs re-encode the record file first.

use super::result::QueryResult;
use crate::catalog::validate::{self, check_identifier};
use crate::catalog::{Field, FieldType, Index, Table};
use crate::error::{Error, Result};
use crate::sql::{AlterAction, AlterTableStatement, CreateIndexStatement, CreateTableStatement, FieldDef};
use crate::storage::catalog_file::MAX_TABLES;
use crate::storage::{Record, Storage, Value};
use crate::transaction::{TransactionManager, TransactionOperation};
use std::collections::HashSet;
use tracing::{info, warn};

/// Schema-changing statements
pub struct DdlExecutor<'a> {
    storage: &'a mut Storage,
    journal: &'a mut TransactionManager,
}

impl<'a> DdlExecutor<'a> {
    pub fn new(storage: &'a mut Storage, journal: &'a mut TransactionManager) -> Self {
        Self { storage, journal }
    }

    /// CREATE TABLE
    pub fn create_table(&mut self, stmt: &CreateTableStatement) -> Result<QueryResult> {
        check_identifier(&stmt.table_name)?;
        if self.storage.database().has_table(&stmt.table_name) {
            return Err(Error::TableAlreadyExists(stmt.table_name.clone()));
        }
        if self.storage.database().table_count() >= MAX_TABLES {
            return Err(Error::StorageError(format!(
                "catalog already holds the maximum of {} tables",
                MAX_TABLES
            )));
        }
        if stmt.fields.is_empty() {
            return Err(Error::ValidationError(format!(
                "table '{}' must have at least one column",
                stmt.table_name
            )));
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(stmt.fields.len());
        for def in &stmt.fields {
            if !seen.insert(def.name.to_lowercase()) {
                return Err(Error::ColumnAlreadyExists(
                    def.name.clone(),
                    stmt.table_name.clone(),
                ));
            }
            fields.push(field_from_def(def)?);
        }

        let table = Table::new(stmt.table_name.clone(), fields);
        self.storage.database_mut().add_table(table)?;
        self.persist()?;
        self.storage.record_file(&stmt.table_name).create()?;

        self.journal.record(TransactionOperation::ddl(
            &stmt.table_name,
            format!("CREATE TABLE {}", stmt.table_name),
        ));
        info!(table = %stmt.table_name, "table created");

        Ok(QueryResult::with_message(format!(
            "Table '{}' created successfully",
            stmt.table_name
        )))
    }

    /// DROP TABLE. The record file is deleted before the catalog changes.
    pub fn drop_table(&mut self, name: &str) -> Result<QueryResult> {
        let table_name = self.storage.table(name)?.name.clone();

        self.storage.record_file(&table_name).remove()?;
        self.storage.database_mut().remove_table(&table_name);
        self.persist()?;

        self.journal.record(TransactionOperation::ddl(
            &table_name,
            format!("DROP TABLE {}", table_name),
        ));
        info!(table = %table_name, "table dropped");

        Ok(QueryResult::with_message(format!(
            "Table '{}' dropped successfully",
            table_name
        )))
    }

    /// RENAME TABLE. Moves the record file to the path derived from the
    /// new name.
    pub fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<QueryResult> {
        let current = self.storage.table(old_name)?.name.clone();
        check_identifier(new_name)?;
        if self.storage.database().has_table(new_name) {
            return Err(Error::TableAlreadyExists(new_name.to_string()));
        }

        let old_file = self.storage.record_file(&current);
        let new_file = old_file.rename_to(self.storage.record_path(new_name))?;

        self.storage.database_mut().rename_table(&current, new_name)?;
        if let Err(e) = self.persist() {
            if let Err(move_back) = new_file.rename_to(old_file.path()) {
                warn!(error = %move_back, "could not move record file back after failed rename");
            }
            return Err(e);
        }

        self.journal.record(TransactionOperation::ddl(
            new_name,
            format!("RENAME TABLE {} TO {}", current, new_name),
        ));
        info!(from = %current, to = %new_name, "table renamed");

        Ok(QueryResult::with_message(format!(
            "Table renamed from '{}' to '{}'",
            current, new_name
        )))
    }

    /// CREATE [UNIQUE] INDEX, built from a full scan
    pub fn create_index(&mut self, stmt: &CreateIndexStatement) -> Result<QueryResult> {
        check_identifier(&stmt.index_name)?;
        let table = self.storage.table(&stmt.table_name)?;
        let column = table.require_field(&stmt.column_name)?;

        if self
            .storage
            .database()
            .tables()
            .any(|t| t.index(&stmt.index_name).is_some())
        {
            return Err(Error::IndexAlreadyExists(stmt.index_name.clone()));
        }

        let table_name = table.name.clone();
        let fields = table.fields.clone();
        let column_name = fields[column].name.clone();

        let rows = self.storage.record_file(&table_name).scan_logged(&fields)?;
        let mut index = Index::new(&stmt.index_name, &table_name, &column_name, stmt.unique);
        index.rebuild(
            rows.iter()
                .map(|(offset, record)| (*offset, record.get(column).unwrap_or(&Value::Null))),
        )?;

        let table = self.storage.database_mut().require_table_mut(&table_name)?;
        table.indexes.insert(stmt.index_name.to_lowercase(), index);
        table.touch();
        self.persist()?;

        self.journal.record(TransactionOperation::ddl(
            &table_name,
            format!("CREATE INDEX {}", stmt.index_name),
        ));
        info!(index = %stmt.index_name, table = %table_name, column = %column_name, "index created");

        Ok(QueryResult::with_message(format!(
            "Index '{}' created successfully on {}({})",
            stmt.index_name, table_name, column_name
        )))
    }

    /// ALTER TABLE
    pub fn alter_table(&mut self, stmt: &AlterTableStatement) -> Result<QueryResult> {
        let table = self.storage.table(&stmt.table_name)?.clone();

        let message = match &stmt.action {
            AlterAction::AddColumn(def) => {
                self.add_column(table, def)?;
                "Column added successfully"
            }
            AlterAction::DropColumn(column) => {
                self.drop_column(table, column)?;
                "Column dropped successfully"
            }
            AlterAction::ModifyColumn {
                column,
                field_type,
                length,
            } => {
                self.modify_column(table, column, *field_type, *length)?;
                "Column modified successfully"
            }
            AlterAction::RenameColumn { old_name, new_name } => {
                self.rename_column(table, old_name, new_name)?;
                "Column renamed successfully"
            }
        };

        self.journal.record(TransactionOperation::ddl(
            &stmt.table_name,
            format!("ALTER TABLE {}: {}", stmt.table_name, message),
        ));
        Ok(QueryResult::with_message(message))
    }

    fn add_column(&mut self, mut table: Table, def: &FieldDef) -> Result<()> {
        if table.has_field(&def.name) {
            return Err(Error::ColumnAlreadyExists(def.name.clone(), table.name));
        }
        let field = field_from_def(def)?;

        let records = self.active_records(&table)?;
        if !field.nullable && !records.is_empty() {
            return Err(Error::ValidationError(format!(
                "cannot add NOT NULL column '{}' to non-empty table '{}'",
                field.name, table.name
            )));
        }

        let records = records
            .into_iter()
            .map(|r| {
                let mut values = r.into_values();
                values.push(Value::Null);
                Record::new(values)
            })
            .collect();

        info!(table = %table.name, column = %field.name, "adding column");
        table.fields.push(field);
        self.install(table, records)
    }

    fn drop_column(&mut self, mut table: Table, column: &str) -> Result<()> {
        let pos = table.require_field(column)?;
        if table.fields[pos].primary_key {
            return Err(Error::ValidationError(format!(
                "cannot drop primary key column '{}'",
                table.fields[pos].name
            )));
        }
        if table.fields.len() == 1 {
            return Err(Error::ValidationError(format!(
                "cannot drop the only column of table '{}'",
                table.name
            )));
        }

        let records = self
            .active_records(&table)?
            .into_iter()
            .map(|r| {
                let mut values = r.into_values();
                values.remove(pos);
                Record::new(values)
            })
            .collect();

        let dropped = table.fields.remove(pos);
        table
            .indexes
            .retain(|_, idx| !idx.column_name.eq_ignore_ascii_case(&dropped.name));

        info!(table = %table.name, column = %dropped.name, "dropping column");
        self.install(table, records)
    }

    fn modify_column(
        &mut self,
        mut table: Table,
        column: &str,
        field_type: FieldType,
        length: i32,
    ) -> Result<()> {
        let pos = table.require_field(column)?;

        let mut field = table.fields[pos].clone();
        field.field_type = field_type;
        field.length = length;

        let mut records = Vec::new();
        for record in self.active_records(&table)? {
            let mut values = record.into_values();
            let converted = validate::convert_value(values[pos].clone(), &field)?;
            validate::validate_value(&converted, &field)?;
            values[pos] = converted;
            records.push(Record::new(values));
        }

        info!(table = %table.name, column = %field.name, to = %field.type_label(), "modifying column");
        table.fields[pos] = field;
        self.install(table, records)
    }

    fn rename_column(&mut self, mut table: Table, old_name: &str, new_name: &str) -> Result<()> {
        let pos = table.require_field(old_name)?;
        check_identifier(new_name)?;
        if let Some(other) = table.field_index(new_name) {
            if other != pos {
                return Err(Error::ColumnAlreadyExists(new_name.to_string(), table.name));
            }
        }

        let old = std::mem::replace(&mut table.fields[pos].name, new_name.to_string());
        for index in table.indexes.values_mut() {
            if index.column_name.eq_ignore_ascii_case(&old) {
                index.column_name = new_name.to_string();
            }
        }
        table.touch();

        let name = table.name.clone();
        *self.storage.database_mut().require_table_mut(&name)? = table;
        self.persist()
    }

    fn active_records(&self, table: &Table) -> Result<Vec<Record>> {
        self.storage
            .record_file(&table.name)
            .read_all_active(&table.fields)
    }

    /// Re-encode the record file in the table's new layout, then swap the
    /// table into the catalog and rebuild its indexes. Unique keys are
    /// checked before the file is touched; a later failure puts the old
    /// file and table back.
    fn install(&mut self, mut table: Table, records: Vec<Record>) -> Result<()> {
        check_unique_keys(&table, &records)?;

        let file = self.storage.record_file(&table.name);
        let previous_bytes = file.read_raw()?;
        let previous = self.storage.table(&table.name)?.clone();

        file.rewrite(&table.fields, &records)?;

        table.record_count = records.len() as i32;
        table.touch();

        let name = table.name.clone();
        *self.storage.database_mut().require_table_mut(&name)? = table;

        let outcome = match self.storage.rebuild_indexes(&name) {
            Ok(()) => self.persist(),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            self.undo_install(previous, &previous_bytes);
            return Err(e);
        }
        Ok(())
    }

    fn undo_install(&mut self, previous: Table, bytes: &[u8]) {
        let name = previous.name.clone();
        warn!(table = %name, "alter failed after rewrite, restoring previous layout");

        if let Err(e) = self.storage.record_file(&name).write_raw(bytes) {
            warn!(table = %name, error = %e, "could not restore record file");
        }
        let db = self.storage.database_mut();
        match db.table_mut(&name) {
            Some(slot) => *slot = previous,
            None => {
                if let Err(e) = db.add_table(previous) {
                    warn!(table = %name, error = %e, "could not restore table");
                }
            }
        }
        if let Err(e) = self.storage.rebuild_indexes(&name) {
            warn!(table = %name, error = %e, "index rebuild after restore failed");
        }
    }

    /// Rewrite the catalog file; on failure, fall back to what is on disk
    fn persist(&mut self) -> Result<()> {
        if let Err(e) = self.storage.persist() {
            if let Err(reload) = self.storage.reload() {
                warn!(error = %reload, "catalog reload after failed write also failed");
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Fail if `records` hold duplicate keys for any unique index of `table`
fn check_unique_keys(table: &Table, records: &[Record]) -> Result<()> {
    for index in table.indexes.values().filter(|idx| idx.unique) {
        let pos = table.require_field(&index.column_name)?;
        let mut candidate = Index::new(&index.name, &table.name, &index.column_name, true);
        candidate.rebuild(
            records
                .iter()
                .enumerate()
                .map(|(i, r)| (i as u64, r.get(pos).unwrap_or(&Value::Null))),
        )?;
    }
    Ok(())
}

fn field_from_def(def: &FieldDef) -> Result<Field> {
    check_identifier(&def.name)?;
    if def.field_type.is_text() && def.field_type != FieldType::Date && def.length <= 0 {
        return Err(Error::LengthRequired(def.field_type.to_string()));
    }

    Ok(Field::new(def.name.clone(), def.field_type, def.length)
        .primary_key(def.primary_key)
        .nullable(def.nullable && !def.primary_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{parse, Statement};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Storage, TransactionManager) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("ddl.dbf")).unwrap();
        (dir, storage, TransactionManager::new())
    }

    fn run(storage: &mut Storage, tm: &mut TransactionManager, sql: &str) -> Result<QueryResult> {
        let mut ddl = DdlExecutor::new(storage, tm);
        match parse(sql)? {
            Statement::CreateTable(s) => ddl.create_table(&s),
            Statement::CreateIndex(s) => ddl.create_index(&s),
            Statement::AlterTable(s) => ddl.alter_table(&s),
            Statement::DropTable(name) => ddl.drop_table(&name),
            Statement::RenameTable { old_name, new_name } => ddl.rename_table(&old_name, &new_name),
            other => panic!("Expected DDL statement, got {:?}", other),
        }
    }

    #[test]
    fn test_create_table() {
        let (_dir, mut storage, mut tm) = setup();
        let result = run(
            &mut storage,
            &mut tm,
            "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(20) NOT NULL)",
        )
        .unwrap();
        assert_eq!(result.message.as_deref(), Some("Table 'users' created successfully"));

        let table = storage.table("USERS").unwrap();
        assert_eq!(table.field_names(), vec!["id", "name"]);
        assert!(table.fields[0].primary_key);
        assert!(!table.fields[0].nullable);
        assert!(storage.record_file("users").exists());

        assert!(matches!(
            run(&mut storage, &mut tm, "CREATE TABLE Users (x INT)"),
            Err(Error::TableAlreadyExists(_))
        ));
        assert!(matches!(
            run(&mut storage, &mut tm, "CREATE TABLE t2 (a INT, A INT)"),
            Err(Error::ColumnAlreadyExists(..))
        ));
    }

    #[test]
    fn test_drop_and_rename() {
        let (_dir, mut storage, mut tm) = setup();
        run(&mut storage, &mut tm, "CREATE TABLE a (x INT)").unwrap();
        let old_path = storage.record_path("a");
        std::fs::write(&old_path, b"").unwrap();

        let result = run(&mut storage, &mut tm, "RENAME TABLE a TO b").unwrap();
        assert_eq!(result.message.as_deref(), Some("Table renamed from 'a' to 'b'"));
        assert!(!old_path.exists());
        assert!(storage.record_path("b").exists());

        run(&mut storage, &mut tm, "DROP TABLE b").unwrap();
        assert!(!storage.database().has_table("b"));
        assert!(!storage.record_path("b").exists());
        assert!(matches!(
            run(&mut storage, &mut tm, "DROP TABLE b"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_drop_primary_key_rejected() {
        let (_dir, mut storage, mut tm) = setup();
        run(&mut storage, &mut tm, "CREATE TABLE t (id INT PRIMARY KEY, v INT)").unwrap();
        assert!(matches!(
            run(&mut storage, &mut tm, "ALTER TABLE t DROP COLUMN id"),
            Err(Error::ValidationError(_))
        ));
    }

    #[test]
    fn test_failed_catalog_write_restores_layout() {
        let (dir, mut storage, mut tm) = setup();
        run(&mut storage, &mut tm, "CREATE TABLE t (id INT, v INT)").unwrap();
        let fields = storage.table("t").unwrap().fields.clone();
        let file = storage.record_file("t");
        file.append(&fields, &Record::new(vec![Value::Int(1), Value::Int(10)]))
            .unwrap();
        file.append(&fields, &Record::new(vec![Value::Int(2), Value::Null]))
            .unwrap();
        let before = file.read_raw().unwrap();

        // a non-empty directory in place of the catalog makes the rename fail
        let catalog = dir.path().join("ddl.dbf");
        std::fs::remove_file(&catalog).unwrap();
        std::fs::create_dir(&catalog).unwrap();
        std::fs::write(catalog.join("keep"), b"x").unwrap();

        assert!(run(&mut storage, &mut tm, "ALTER TABLE t ADD COLUMN w INT").is_err());
        assert_eq!(file.read_raw().unwrap(), before);
        assert_eq!(storage.table("t").unwrap().field_names(), vec!["id", "v"]);
        assert_eq!(file.read_all_active(&fields).unwrap().len(), 2);
    }

    #[test]
    fn test_ddl_is_journaled() {
        let (_dir, mut storage, mut tm) = setup();
        tm.begin().unwrap();
        run(&mut storage, &mut tm, "CREATE TABLE t (id INT)").unwrap();
        let ops = &tm.current().unwrap().operations;
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, crate::transaction::OperationKind::Ddl);
    }
}
