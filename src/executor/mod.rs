//! Statement execution module
//!
//! This module contains the DDL, DML and query executors together with
//! predicate evaluation and the result type they share.

pub mod ddl;
pub mod dml;
pub mod predicate;
pub mod query;
pub mod result;

pub use ddl::DdlExecutor;
pub use dml::DmlExecutor;
pub use predicate::{Binding, Scope, SubqueryRunner};
pub use query::QueryExecutor;
pub use result::QueryResult;
