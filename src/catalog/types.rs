//! Field types for FlatDB
//!
//! This module defines the column types supported by the database and
//! their persisted ordinals.

use crate::error::{Error, Result};
use std::fmt;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 32-bit integer
    Int,
    /// Variable-length string with a maximum length
    Varchar,
    /// Fixed-length string, zero-padded on disk
    Char,
    /// Date stored as text
    Date,
    /// 64-bit floating point (also spelled DOUBLE)
    Float,
}

impl FieldType {
    /// Ordinal persisted in the catalog file
    pub fn ordinal(&self) -> u8 {
        match self {
            FieldType::Int => 0,
            FieldType::Varchar => 1,
            FieldType::Char => 2,
            FieldType::Date => 3,
            FieldType::Float => 4,
        }
    }

    /// Inverse of [`FieldType::ordinal`]
    pub fn from_ordinal(ordinal: u8) -> Option<FieldType> {
        match ordinal {
            0 => Some(FieldType::Int),
            1 => Some(FieldType::Varchar),
            2 => Some(FieldType::Char),
            3 => Some(FieldType::Date),
            4 => Some(FieldType::Float),
            _ => None,
        }
    }

    /// Length used when a definition omits one. Negative means the
    /// length must be given explicitly.
    pub fn default_length(&self) -> i32 {
        match self {
            FieldType::Int => 4,
            FieldType::Varchar => -1,
            FieldType::Char => 1,
            FieldType::Date => 8,
            FieldType::Float => 8,
        }
    }

    /// Parse a type name (case-insensitive)
    pub fn from_name(name: &str) -> Result<FieldType> {
        match name.to_uppercase().as_str() {
            "INT" | "INTEGER" => Ok(FieldType::Int),
            "VARCHAR" => Ok(FieldType::Varchar),
            "CHAR" => Ok(FieldType::Char),
            "DATE" => Ok(FieldType::Date),
            "FLOAT" | "DOUBLE" => Ok(FieldType::Float),
            _ => Err(Error::UnknownType(name.to_string())),
        }
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    /// Check if values of this type are stored as text
    pub fn is_text(&self) -> bool {
        !self.is_numeric()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Varchar => write!(f, "VARCHAR"),
            FieldType::Char => write!(f, "CHAR"),
            FieldType::Date => write!(f, "DATE"),
            FieldType::Float => write!(f, "FLOAT"),
        }
    }
}
