//! Transaction Manager
//!
//! Handles transaction lifecycle (Begin, Commit, Rollback). Statements
//! apply their changes to disk immediately; the active transaction only
//! keeps an undo journal that ROLLBACK replays in reverse.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::storage::{Record, RecordFile, Storage};

/// Transaction State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Kind of journaled operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Ddl,
}

/// One journaled change with what is needed to undo it
#[derive(Debug, Clone)]
pub struct TransactionOperation {
    pub kind: OperationKind,
    pub table_name: String,
    /// Record file the change was applied to
    pub data_file: Option<PathBuf>,
    /// Offset of the touched record
    pub offset: u64,
    /// Record before the change (UPDATE, DELETE)
    pub old_record: Option<Record>,
    /// Record after the change (INSERT, UPDATE)
    pub new_record: Option<Record>,
    /// New offset when an UPDATE moved the record to the end of the file
    pub relocated_to: Option<u64>,
    /// Statement summary for DDL entries
    pub description: Option<String>,
}

impl TransactionOperation {
    fn new(kind: OperationKind, table_name: &str, data_file: Option<PathBuf>, offset: u64) -> Self {
        Self {
            kind,
            table_name: table_name.to_string(),
            data_file,
            offset,
            old_record: None,
            new_record: None,
            relocated_to: None,
            description: None,
        }
    }

    pub fn insert(table_name: &str, data_file: PathBuf, offset: u64, record: Record) -> Self {
        let mut op = Self::new(OperationKind::Insert, table_name, Some(data_file), offset);
        op.new_record = Some(record);
        op
    }

    pub fn update(
        table_name: &str,
        data_file: PathBuf,
        offset: u64,
        old_record: Record,
        new_record: Record,
        relocated_to: Option<u64>,
    ) -> Self {
        let mut op = Self::new(OperationKind::Update, table_name, Some(data_file), offset);
        op.old_record = Some(old_record);
        op.new_record = Some(new_record);
        op.relocated_to = relocated_to;
        op
    }

    pub fn delete(table_name: &str, data_file: PathBuf, offset: u64, old_record: Record) -> Self {
        let mut op = Self::new(OperationKind::Delete, table_name, Some(data_file), offset);
        op.old_record = Some(old_record);
        op
    }

    pub fn ddl(table_name: &str, description: impl Into<String>) -> Self {
        let mut op = Self::new(OperationKind::Ddl, table_name, None, 0);
        op.description = Some(description.into());
        op
    }
}

/// Transaction Context
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: u64,
    pub state: TransactionState,
    pub operations: Vec<TransactionOperation>,
}

/// Transaction Manager: at most one active transaction
#[derive(Debug)]
pub struct TransactionManager {
    current: Option<Transaction>,
    next_trans_id: u64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new() -> Self {
        Self {
            current: None,
            next_trans_id: 1,
        }
    }

    /// Begin a new transaction
    pub fn begin(&mut self) -> Result<u64> {
        if let Some(active) = &self.current {
            return Err(Error::TransactionAlreadyActive(active.id));
        }

        let trans_id = self.next_trans_id;
        self.next_trans_id += 1;

        self.current = Some(Transaction {
            id: trans_id,
            state: TransactionState::Active,
            operations: Vec::new(),
        });

        info!(trans_id, "transaction started");
        Ok(trans_id)
    }

    /// Check if a transaction is active
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Id of the active transaction
    pub fn current_id(&self) -> Option<u64> {
        self.current.as_ref().map(|t| t.id)
    }

    /// The active transaction
    pub fn current(&self) -> Option<&Transaction> {
        self.current.as_ref()
    }

    /// Journal an operation. Outside a transaction this does nothing.
    pub fn record(&mut self, op: TransactionOperation) {
        if let Some(trans) = &mut self.current {
            trans.operations.push(op);
        }
    }

    /// Commit and discard the active transaction
    pub fn commit(&mut self) -> Result<Transaction> {
        let mut trans = self.current.take().ok_or(Error::NoActiveTransaction)?;
        trans.state = TransactionState::Committed;

        info!(trans_id = trans.id, ops = trans.operations.len(), "transaction committed");
        Ok(trans)
    }

    /// Undo the active transaction's operations in reverse order.
    ///
    /// A journal holding DDL is refused as a whole and stays active. A
    /// failure while undoing also leaves it active; every undo step is
    /// idempotent, so ROLLBACK can be retried.
    pub fn rollback(&mut self, storage: &mut Storage) -> Result<Transaction> {
        let trans = self.current.as_ref().ok_or(Error::NoActiveTransaction)?;

        if let Some(op) = trans.operations.iter().find(|op| op.kind == OperationKind::Ddl) {
            return Err(Error::TransactionError(format!(
                "transaction {} contains DDL on '{}' ({}), which cannot be rolled back",
                trans.id,
                op.table_name,
                op.description.as_deref().unwrap_or("schema change")
            )));
        }

        for op in &trans.operations {
            storage.table(&op.table_name).map_err(|_| {
                Error::TransactionError(format!(
                    "cannot roll back: table '{}' no longer exists",
                    op.table_name
                ))
            })?;
            if op.data_file.is_none() {
                return Err(Error::TransactionError(format!(
                    "cannot roll back: no data file recorded for '{}'",
                    op.table_name
                )));
            }
        }

        let mut touched = HashSet::new();
        for op in trans.operations.iter().rev() {
            if let Err(e) = undo(storage, op) {
                warn!(trans_id = trans.id, error = %e, "rollback failed");
                return Err(Error::TransactionError(format!("rollback failed: {}", e)));
            }
            touched.insert(op.table_name.to_lowercase());
        }

        for name in &touched {
            storage.rebuild_indexes(name)?;
        }
        if !touched.is_empty() {
            storage.persist()?;
        }

        let mut trans = self.current.take().ok_or(Error::NoActiveTransaction)?;
        trans.state = TransactionState::RolledBack;

        info!(trans_id = trans.id, ops = trans.operations.len(), "transaction rolled back");
        Ok(trans)
    }
}

fn undo(storage: &mut Storage, op: &TransactionOperation) -> Result<()> {
    let path = op
        .data_file
        .clone()
        .ok_or_else(|| Error::TransactionError("missing data file".to_string()))?;
    let file = RecordFile::new(path);
    let table = storage.database_mut().require_table_mut(&op.table_name)?;
    let fields = table.fields.clone();

    let missing_old = || {
        Error::TransactionError(format!(
            "no saved record for offset {} in '{}'",
            op.offset, op.table_name
        ))
    };

    match op.kind {
        OperationKind::Insert => {
            file.tombstone(op.offset)?;
            table.record_count = (table.record_count - 1).max(0);
        }
        OperationKind::Delete => {
            let old = op.old_record.as_ref().ok_or_else(missing_old)?;
            file.write_at(&fields, op.offset, &Record::new(old.values().to_vec()))?;
            table.record_count += 1;
        }
        OperationKind::Update => match op.relocated_to {
            Some(new_offset) => {
                file.tombstone(new_offset)?;
                file.restore(op.offset)?;
            }
            None => {
                let old = op.old_record.as_ref().ok_or_else(missing_old)?;
                file.write_at(&fields, op.offset, &Record::new(old.values().to_vec()))?;
            }
        },
        OperationKind::Ddl => {}
    }

    table.touch();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_lifecycle() {
        let mut tm = TransactionManager::new();

        let t1 = tm.begin().unwrap();
        assert!(tm.is_active());
        assert!(matches!(tm.begin(), Err(Error::TransactionAlreadyActive(id)) if id == t1));

        let done = tm.commit().unwrap();
        assert_eq!(done.state, TransactionState::Committed);
        assert!(!tm.is_active());
        assert!(matches!(tm.commit(), Err(Error::NoActiveTransaction)));

        let t2 = tm.begin().unwrap();
        assert_eq!(t2, t1 + 1);
    }

    #[test]
    fn test_record_outside_transaction_is_ignored() {
        let mut tm = TransactionManager::new();
        tm.record(TransactionOperation::ddl("t", "CREATE TABLE"));
        tm.begin().unwrap();
        tm.record(TransactionOperation::ddl("t", "DROP TABLE"));
        assert_eq!(tm.current().unwrap().operations.len(), 1);
    }

    #[test]
    fn test_rollback_refuses_ddl() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path().join("db.dbf")).unwrap();
        let mut tm = TransactionManager::new();

        tm.begin().unwrap();
        tm.record(TransactionOperation::ddl("t", "CREATE TABLE t"));

        assert!(matches!(
            tm.rollback(&mut storage),
            Err(Error::TransactionError(_))
        ));
        assert!(tm.is_active());
        tm.commit().unwrap();
    }

    #[test]
    fn test_rollback_without_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path().join("db.dbf")).unwrap();
        let mut tm = TransactionManager::new();

        assert!(matches!(
            tm.rollback(&mut storage),
            Err(Error::NoActiveTransaction)
        ));
    }
}
