//! Transaction module
//!
//! Single active transaction with a best-effort undo journal.

pub mod transaction;

pub use transaction::{
    OperationKind, Transaction, TransactionManager, TransactionOperation, TransactionState,
};
