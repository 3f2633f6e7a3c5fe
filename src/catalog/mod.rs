//! Catalog module
//!
//! This module contains the in-memory schema: field types, tables, the
//! database, hash indexes and the validation rules applied to them.

pub mod index;
pub mod schema;
pub mod types;
pub mod validate;

pub use index::Index;
pub use schema::{Database, Field, Table};
pub use types::FieldType;
