//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Value and record types
//! - Binary record codec
//! - Catalog file reader/writer
//! - Per-table record files
//! - The storage facade tying them together

pub mod catalog_file;
pub mod codec;
pub mod record;
pub mod record_file;
pub mod store;

pub use record::{Record, Value};
pub use record_file::{RecordFile, ScanResult};
pub use store::{record_path_for, Storage};
