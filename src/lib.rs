//! FlatDB - a single-file relational database engine
//!
//! This library provides:
//! - SQL parsing (lexer, parser, AST, batch splitting)
//! - The schema catalog with hash indexes
//! - Flat binary storage: a catalog file plus one record file per table
//! - DDL, DML and query execution (joins, grouping, subqueries)
//! - A best-effort transaction undo journal
//! - Users and permissions, snapshot backups, and the statement dispatcher

pub mod auth;
pub mod backup;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod executor;
pub mod sql;
pub mod storage;
pub mod transaction;

pub use engine::{Engine, EngineConfig};
pub use error::{Error, ErrorKind, Result};
pub use executor::QueryResult;
pub use storage::Value;
