//! DML execution: INSERT, UPDATE and DELETE
//!
//! Changes go straight to the record file. Live indexes are maintained
//! incrementally and every touched row is journaled for ROLLBACK.

use super::query::QueryExecutor;
use super::result::QueryResult;
use crate::catalog::validate::{self, convert_literal, validate_record};
use crate::catalog::{FieldType, Table};
use crate::error::{Error, Result};
use crate::sql::{
    ArithmeticOp, DeleteStatement, InsertStatement, Literal, SetValue, UpdateStatement,
};
use crate::storage::{Record, Storage, Value};
use crate::transaction::{TransactionManager, TransactionOperation};
use std::collections::HashSet;
use tracing::debug;

/// Row-changing statements
pub struct DmlExecutor<'a> {
    storage: &'a mut Storage,
    journal: &'a mut TransactionManager,
}

/// A resolved UPDATE assignment
enum Assign<'s> {
    Literal(usize, &'s Literal),
    Arithmetic {
        target: usize,
        source: usize,
        op: ArithmeticOp,
        operand: f64,
    },
}

impl<'a> DmlExecutor<'a> {
    pub fn new(storage: &'a mut Storage, journal: &'a mut TransactionManager) -> Self {
        Self { storage, journal }
    }

    /// INSERT one or more rows. Every row is converted and validated
    /// before the first one is written.
    pub fn insert(&mut self, stmt: &InsertStatement) -> Result<QueryResult> {
        let table = self.storage.table(&stmt.table_name)?.clone();

        let targets = match &stmt.columns {
            Some(columns) => columns
                .iter()
                .map(|c| table.require_field(c))
                .collect::<Result<Vec<_>>>()?,
            None => (0..table.field_count()).collect(),
        };

        let mut records = Vec::with_capacity(stmt.values.len());
        for tuple in &stmt.values {
            if tuple.len() != targets.len() {
                return Err(Error::ArityMismatch {
                    table: table.name.clone(),
                    expected: targets.len(),
                    found: tuple.len(),
                });
            }

            let mut record = Record::nulls(table.field_count());
            for (&pos, literal) in targets.iter().zip(tuple) {
                record.set(pos, convert_literal(literal, &table.fields[pos])?);
            }
            validate_record(&record, &table)?;
            records.push(record);
        }

        check_unique(&table, records.iter().map(|r| (None, r)))?;

        let file = self.storage.record_file(&table.name);
        let mut inserted = 0;
        for record in records {
            let offset = file.append(&table.fields, &record)?;

            let live = self.storage.database_mut().require_table_mut(&table.name)?;
            for index in live.indexes.values_mut() {
                if let Some(pos) = table.field_index(&index.column_name) {
                    index.insert(&record.values()[pos], offset)?;
                }
            }
            live.record_count += 1;
            live.touch();

            self.journal.record(TransactionOperation::insert(
                &table.name,
                file.path().to_path_buf(),
                offset,
                record,
            ));
            inserted += 1;
        }

        self.storage.persist()?;
        debug!(table = %table.name, rows = inserted, "inserted");

        Ok(QueryResult::with_affected_rows(
            inserted,
            format!("{} row(s) inserted", inserted),
        ))
    }

    /// DELETE matching rows by tombstoning them
    pub fn delete(&mut self, stmt: &DeleteStatement) -> Result<QueryResult> {
        let table = self.storage.table(&stmt.table_name)?.clone();
        let matched = QueryExecutor::new(&*self.storage)
            .matching_records(&table, stmt.where_clause.as_ref())?;

        let file = self.storage.record_file(&table.name);
        let mut deleted = 0;
        for (offset, record) in matched {
            file.tombstone(offset)?;

            let live = self.storage.database_mut().require_table_mut(&table.name)?;
            for index in live.indexes.values_mut() {
                if let Some(pos) = table.field_index(&index.column_name) {
                    index.remove(&record.values()[pos], offset);
                }
            }
            live.record_count = (live.record_count - 1).max(0);
            live.touch();

            self.journal.record(TransactionOperation::delete(
                &table.name,
                file.path().to_path_buf(),
                offset,
                record,
            ));
            deleted += 1;
        }

        self.storage.persist()?;
        debug!(table = %table.name, rows = deleted, "deleted");

        Ok(QueryResult::with_affected_rows(
            deleted,
            format!("{} row(s) deleted", deleted),
        ))
    }

    /// UPDATE matching rows.
    ///
    /// All new records are computed and validated first, so a failing
    /// assignment leaves the table untouched. A record whose encoding
    /// changes length is tombstoned and appended at the end of the file.
    pub fn update(&mut self, stmt: &UpdateStatement) -> Result<QueryResult> {
        let table = self.storage.table(&stmt.table_name)?.clone();

        let assignments = stmt
            .assignments
            .iter()
            .map(|a| {
                let target = table.require_field(&a.column)?;
                Ok(match &a.value {
                    SetValue::Literal(lit) => Assign::Literal(target, lit),
                    SetValue::Arithmetic {
                        column,
                        op,
                        operand,
                    } => Assign::Arithmetic {
                        target,
                        source: table.require_field(column)?,
                        op: *op,
                        operand: *operand,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let matched = QueryExecutor::new(&*self.storage)
            .matching_records(&table, stmt.where_clause.as_ref())?;

        let mut changes = Vec::with_capacity(matched.len());
        for (offset, old) in matched {
            let mut new = Record::new(old.values().to_vec());
            for assign in &assignments {
                let (pos, value) = match assign {
                    Assign::Literal(pos, lit) => (*pos, convert_literal(lit, &table.fields[*pos])?),
                    Assign::Arithmetic {
                        target,
                        source,
                        op,
                        operand,
                    } => (
                        *target,
                        evaluate_arithmetic(&table, &old, *target, *source, *op, *operand)?,
                    ),
                };
                new.set(pos, value);
            }
            validate_record(&new, &table)?;
            changes.push((offset, old, new));
        }

        check_unique(
            &table,
            changes.iter().map(|(offset, _, new)| (Some(*offset), new)),
        )?;

        // old keys go first so rows may take over each other's unique values
        let live = self.storage.database_mut().require_table_mut(&table.name)?;
        for index in live.indexes.values_mut() {
            if let Some(pos) = table.field_index(&index.column_name) {
                for (offset, old, _) in &changes {
                    index.remove(&old.values()[pos], *offset);
                }
            }
        }

        let file = self.storage.record_file(&table.name);
        let mut updated = 0;
        for (offset, old, new) in changes {
            let relocated_to = if file.fits_at(&table.fields, offset, &new)? {
                file.write_at(&table.fields, offset, &new)?;
                None
            } else {
                file.tombstone(offset)?;
                Some(file.append(&table.fields, &new)?)
            };
            let new_offset = relocated_to.unwrap_or(offset);

            let live = self.storage.database_mut().require_table_mut(&table.name)?;
            for index in live.indexes.values_mut() {
                if let Some(pos) = table.field_index(&index.column_name) {
                    index.insert(&new.values()[pos], new_offset)?;
                }
            }
            live.touch();

            if let Some(moved) = relocated_to {
                debug!(table = %table.name, from = offset, to = moved, "record relocated");
            }
            self.journal.record(TransactionOperation::update(
                &table.name,
                file.path().to_path_buf(),
                offset,
                old,
                new,
                relocated_to,
            ));
            updated += 1;
        }

        self.storage.persist()?;
        debug!(table = %table.name, rows = updated, "updated");

        Ok(QueryResult::with_affected_rows(
            updated,
            format!("{} row(s) updated", updated),
        ))
    }
}

/// `column OP number` against the row's current value, coerced to the
/// target column's type
fn evaluate_arithmetic(
    table: &Table,
    row: &Record,
    target: usize,
    source: usize,
    op: ArithmeticOp,
    operand: f64,
) -> Result<Value> {
    let current = row.get(source).cloned().unwrap_or(Value::Null);
    let lhs = match &current {
        Value::Int(_) | Value::Float(_) => current.as_f64().unwrap_or_default(),
        other => {
            return Err(Error::TypeMismatch {
                from: format!("{} in column '{}'", other.type_name(), table.fields[source].name),
                to: "number".to_string(),
            })
        }
    };

    let result = match op {
        ArithmeticOp::Add => lhs + operand,
        ArithmeticOp::Sub => lhs - operand,
        ArithmeticOp::Mul => lhs * operand,
        ArithmeticOp::Div => {
            if operand == 0.0 {
                return Err(Error::DivisionByZero);
            }
            lhs / operand
        }
    };

    let field = &table.fields[target];
    match field.field_type {
        FieldType::Int => validate::convert_value(Value::Int(result.round() as i64), field),
        FieldType::Float => Ok(Value::Float(result)),
        _ => Ok(Value::Text(validate::plain_number(&Value::Float(result)))),
    }
}

/// Reject records that would duplicate a key of a unique index, either
/// against stored rows or among themselves. Each record carries the offset
/// it replaces, if any.
fn check_unique<'r>(
    table: &Table,
    records: impl Iterator<Item = (Option<u64>, &'r Record)> + Clone,
) -> Result<()> {
    for index in table.indexes.values().filter(|idx| idx.unique) {
        let Some(pos) = table.field_index(&index.column_name) else {
            continue;
        };

        let replaced: Vec<u64> = records.clone().filter_map(|(offset, _)| offset).collect();
        let mut batch = HashSet::new();

        for (_, record) in records.clone() {
            let value = &record.values()[pos];
            if value.is_null() {
                continue;
            }
            if index.conflicts(value, &replaced) || !batch.insert(value.clone()) {
                return Err(Error::UniqueViolation {
                    index: index.name.clone(),
                    value: value.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Field, Index};
    use crate::sql::{parse, Statement};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Storage, TransactionManager) {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path().join("dml.dbf")).unwrap();
        let mut table = Table::new(
            "t",
            vec![
                Field::new("id", FieldType::Int, 4).nullable(false),
                Field::new("name", FieldType::Varchar, 10),
                Field::new("score", FieldType::Float, 8),
            ],
        );
        table
            .indexes
            .insert("t_id".into(), Index::new("t_id", "t", "id", true));
        storage.database_mut().add_table(table).unwrap();
        storage.persist().unwrap();
        (dir, storage, TransactionManager::new())
    }

    fn run(storage: &mut Storage, tm: &mut TransactionManager, sql: &str) -> Result<QueryResult> {
        let mut dml = DmlExecutor::new(storage, tm);
        match parse(sql)? {
            Statement::Insert(s) => dml.insert(&s),
            Statement::Update(s) => dml.update(&s),
            Statement::Delete(s) => dml.delete(&s),
            other => panic!("Expected DML statement, got {:?}", other),
        }
    }

    fn rows(storage: &Storage) -> Vec<Vec<Value>> {
        let fields = &storage.table("t").unwrap().fields;
        storage
            .record_file("t")
            .read_all_active(fields)
            .unwrap()
            .into_iter()
            .map(Record::into_values)
            .collect()
    }

    #[test]
    fn test_insert_named_and_positional() {
        let (_dir, mut storage, mut tm) = setup();
        let result = run(
            &mut storage,
            &mut tm,
            "INSERT INTO t VALUES (1, 'a', 1.5), (2, 'b', 2)",
        )
        .unwrap();
        assert_eq!(result.affected_rows, 2);
        assert_eq!(result.message.as_deref(), Some("2 row(s) inserted"));

        run(&mut storage, &mut tm, "INSERT INTO t (name, id) VALUES ('c', 3)").unwrap();
        assert_eq!(
            rows(&storage)[2],
            vec![Value::Int(3), Value::from("c"), Value::Null]
        );
        assert_eq!(rows(&storage)[1][2], Value::Float(2.0));
        assert_eq!(storage.table("t").unwrap().record_count, 3);
    }

    #[test]
    fn test_insert_validation_is_all_or_nothing() {
        let (_dir, mut storage, mut tm) = setup();
        assert!(matches!(
            run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'a', 1), (NULL, 'b', 2)"),
            Err(Error::NullNotAllowed(_))
        ));
        assert!(rows(&storage).is_empty());

        assert!(matches!(
            run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'abcdefghijk', 1)"),
            Err(Error::ValueTooLong { .. })
        ));
        assert!(matches!(
            run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'a')"),
            Err(Error::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_unique_index_enforced() {
        let (_dir, mut storage, mut tm) = setup();
        run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'a', 1)").unwrap();
        assert!(matches!(
            run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'b', 1)"),
            Err(Error::UniqueViolation { .. })
        ));
        assert!(matches!(
            run(&mut storage, &mut tm, "INSERT INTO t VALUES (5, 'b', 1), (5, 'c', 1)"),
            Err(Error::UniqueViolation { .. })
        ));
        assert_eq!(rows(&storage).len(), 1);
    }

    #[test]
    fn test_update_arithmetic() {
        let (_dir, mut storage, mut tm) = setup();
        run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'a', 10), (2, 'b', 20)").unwrap();

        let result = run(&mut storage, &mut tm, "UPDATE t SET score = score + 5 WHERE id = 1").unwrap();
        assert_eq!(result.affected_rows, 1);
        assert_eq!(rows(&storage)[0][2], Value::Float(15.0));
        assert_eq!(rows(&storage)[1][2], Value::Float(20.0));

        assert!(matches!(
            run(&mut storage, &mut tm, "UPDATE t SET score = score / 0"),
            Err(Error::DivisionByZero)
        ));
        assert_eq!(rows(&storage)[0][2], Value::Float(15.0));
    }

    #[test]
    fn test_update_relocates_on_length_change() {
        let (_dir, mut storage, mut tm) = setup();
        run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'a', 1), (2, 'b', 2)").unwrap();

        run(&mut storage, &mut tm, "UPDATE t SET name = 'longer' WHERE id = 1").unwrap();
        let all = rows(&storage);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], vec![Value::Int(1), Value::from("longer"), Value::Float(1.0)]);

        let index = storage.table("t").unwrap().index("t_id").unwrap();
        assert_eq!(index.lookup(&Value::Int(1)).len(), 1);
        assert_ne!(index.lookup(&Value::Int(1))[0], 0);
    }

    #[test]
    fn test_update_shifts_unique_keys() {
        let (_dir, mut storage, mut tm) = setup();
        run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'a', 1), (2, 'b', 2)").unwrap();

        run(&mut storage, &mut tm, "UPDATE t SET id = id + 1").unwrap();
        let ids: Vec<Value> = rows(&storage).into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec![Value::Int(2), Value::Int(3)]);

        assert!(matches!(
            run(&mut storage, &mut tm, "UPDATE t SET id = 7"),
            Err(Error::UniqueViolation { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let (_dir, mut storage, mut tm) = setup();
        run(&mut storage, &mut tm, "INSERT INTO t VALUES (1, 'a', 1), (2, 'b', 2), (3, 'c', 3)").unwrap();

        let result = run(&mut storage, &mut tm, "DELETE FROM t WHERE id = 2").unwrap();
        assert_eq!(result.message.as_deref(), Some("1 row(s) deleted"));
        assert_eq!(rows(&storage).len(), 2);

        let index = storage.table("t").unwrap().index("t_id").unwrap();
        assert!(index.lookup(&Value::Int(2)).is_empty());

        run(&mut storage, &mut tm, "DELETE FROM t").unwrap();
        assert!(rows(&storage).is_empty());
        assert_eq!(storage.table("t").unwrap().record_count, 0);
    }
}
