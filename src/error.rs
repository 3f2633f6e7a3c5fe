//! Error types for FlatDB
//!
//! This module defines all error types used throughout the database engine.

use thiserror::Error;

/// The main error type for FlatDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Lexer Errors ==========
    #[error("Lexer error: unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedCharacter { ch: char, line: usize, column: usize },

    #[error("Lexer error: unterminated string literal starting at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },

    #[error("Lexer error: invalid number '{text}' at line {line}, column {column}")]
    InvalidNumber {
        text: String,
        line: usize,
        column: usize,
    },

    // ========== Parser Errors ==========
    #[error("Parse error: unexpected token '{found}' at line {line}, column {column}, expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("Parse error: empty statement")]
    EmptyStatement,

    #[error("Parse error: unknown type '{0}'")]
    UnknownType(String),

    #[error("Parse error: length required for type {0}")]
    LengthRequired(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    // ========== Validation Errors ==========
    #[error("Validation error: invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Validation error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Validation error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Validation error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Validation error: column '{0}' already exists in table '{1}'")]
    ColumnAlreadyExists(String, String),

    #[error("Validation error: index '{0}' not found")]
    IndexNotFound(String),

    #[error("Validation error: index '{0}' already exists")]
    IndexAlreadyExists(String),

    #[error("Validation error: record has {found} values but table '{table}' has {expected} fields")]
    ArityMismatch {
        table: String,
        expected: usize,
        found: usize,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Validation error: duplicate value '{value}' for unique index '{index}'")]
    UniqueViolation { index: String, value: String },

    // ========== Type Errors ==========
    #[error("Type error: cannot convert {from} to {to}")]
    TypeMismatch { from: String, to: String },

    #[error("Type error: field '{0}' cannot be NULL")]
    NullNotAllowed(String),

    #[error("Type error: value too long for field '{field}' (max {max})")]
    ValueTooLong { field: String, max: i32 },

    #[error("Execution error: division by zero")]
    DivisionByZero,

    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Storage error: invalid catalog file magic 0x{0:08X}")]
    BadMagic(u32),

    #[error("Storage error: unsupported catalog file version {0}")]
    UnsupportedVersion(u32),

    #[error("Storage error: corrupted record at offset {offset}: {reason}")]
    CorruptedRecord { offset: u64, reason: String },

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ========== Transaction Errors ==========
    #[error("Transaction error: no active transaction")]
    NoActiveTransaction,

    #[error("Transaction error: transaction {0} is already active")]
    TransactionAlreadyActive(u64),

    #[error("Transaction error: transaction {0} not found")]
    TransactionNotFound(u64),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    // ========== Auth Errors ==========
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Auth error: user '{0}' not found")]
    UserNotFound(String),

    #[error("Auth error: user '{0}' already exists")]
    UserAlreadyExists(String),

    #[error("Auth error: invalid credentials for user '{0}'")]
    InvalidCredentials(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error categories surfaced to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Validation,
    Storage,
    Transaction,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedCharacter { .. }
            | Error::UnterminatedString { .. }
            | Error::InvalidNumber { .. }
            | Error::UnexpectedToken { .. }
            | Error::EmptyStatement
            | Error::UnknownType(_)
            | Error::LengthRequired(_)
            | Error::ParseError(_) => ErrorKind::Parse,

            Error::StorageError(_)
            | Error::BadMagic(_)
            | Error::UnsupportedVersion(_)
            | Error::CorruptedRecord { .. }
            | Error::IoError(_)
            | Error::Internal(_) => ErrorKind::Storage,

            Error::NoActiveTransaction
            | Error::TransactionAlreadyActive(_)
            | Error::TransactionNotFound(_)
            | Error::TransactionError(_) => ErrorKind::Transaction,

            _ => ErrorKind::Validation,
        }
    }
}

/// Result type alias for FlatDB operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TableNotFound("users".to_string());
        assert_eq!(err.to_string(), "Validation error: table 'users' not found");

        let err = Error::UnexpectedCharacter {
            ch: '@',
            line: 2,
            column: 5,
        };
        assert_eq!(
            err.to_string(),
            "Lexer error: unexpected character '@' at line 2, column 5"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::EmptyStatement.kind(), ErrorKind::Parse);
        assert_eq!(Error::NullNotAllowed("a".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::BadMagic(1).kind(), ErrorKind::Storage);
        assert_eq!(Error::NoActiveTransaction.kind(), ErrorKind::Transaction);
    }
}
