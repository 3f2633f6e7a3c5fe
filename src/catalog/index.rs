//! In-memory hash index
//!
//! An index maps a column value to the record-file offsets holding it, in
//! insertion order. Only the metadata is persisted; entries are rebuilt
//! from a full scan when the catalog is opened.

use crate::error::{Error, Result};
use crate::storage::Value;
use std::collections::HashMap;

/// Secondary index over one column
#[derive(Debug, Clone)]
pub struct Index {
    /// Index name
    pub name: String,
    /// Owning table
    pub table_name: String,
    /// Indexed column
    pub column_name: String,
    /// Reject duplicate non-NULL values
    pub unique: bool,
    entries: HashMap<Value, Vec<u64>>,
}

impl Index {
    /// Create an empty index
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            unique,
            entries: HashMap::new(),
        }
    }

    /// Add an entry. NULL values are not indexed.
    pub fn insert(&mut self, value: &Value, offset: u64) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if self.unique && self.conflicts(value, &[offset]) {
            return Err(Error::UniqueViolation {
                index: self.name.clone(),
                value: value.to_string(),
            });
        }

        let offsets = self.entries.entry(value.clone()).or_default();
        if !offsets.contains(&offset) {
            offsets.push(offset);
        }
        Ok(())
    }

    /// Remove an entry if present
    pub fn remove(&mut self, value: &Value, offset: u64) {
        if let Some(offsets) = self.entries.get_mut(value) {
            offsets.retain(|o| *o != offset);
            if offsets.is_empty() {
                self.entries.remove(value);
            }
        }
    }

    /// Offsets holding `value`
    pub fn lookup(&self, value: &Value) -> &[u64] {
        self.entries.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if `value` is already held at an offset outside `ignore`
    pub fn conflicts(&self, value: &Value, ignore: &[u64]) -> bool {
        !value.is_null() && self.lookup(value).iter().any(|o| !ignore.contains(o))
    }

    /// Replace all entries from `(offset, value)` pairs
    pub fn rebuild<'a>(&mut self, rows: impl IntoIterator<Item = (u64, &'a Value)>) -> Result<()> {
        self.entries.clear();
        for (offset, value) in rows {
            self.insert(value, offset)?;
        }
        Ok(())
    }

    /// Replace all entries without the unique check and return how many
    /// rows repeat a key seen earlier. Used to load rows that already break
    /// the constraint, so later writes are still checked against them.
    pub fn rebuild_unchecked<'a>(
        &mut self,
        rows: impl IntoIterator<Item = (u64, &'a Value)>,
    ) -> usize {
        self.entries.clear();
        let mut duplicates = 0;
        for (offset, value) in rows {
            if value.is_null() {
                continue;
            }
            let offsets = self.entries.entry(value.clone()).or_default();
            if !offsets.is_empty() {
                duplicates += 1;
            }
            if !offsets.contains(&offset) {
                offsets.push(offset);
            }
        }
        duplicates
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Metadata equality; entries are derived state
impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.table_name == other.table_name
            && self.column_name == other.column_name
            && self.unique == other.unique
    }
}
