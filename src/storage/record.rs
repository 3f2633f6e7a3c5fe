//! Record and Value types for FlatDB
//!
//! This module defines how row data is represented in memory.

use std::cmp::Ordering;
use std::fmt;

/// A value in the database
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL value
    Null,
    /// Integer value; INT fields keep it within the i32 range
    Int(i64),
    /// Float value (64-bit)
    Float(f64),
    /// Text value (CHAR, VARCHAR and DATE fields)
    Text(String),
}

// Floats compare bitwise so values can key the hash index
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
        }
    }
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a number
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric view of this value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view of this value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::Text(_) => "TEXT",
        }
    }

    /// Total order used by predicates, MAX/MIN and ORDER BY.
    ///
    /// NULL sorts first. Two numbers compare numerically whatever their
    /// variants, two texts compare lexicographically, and anything else
    /// falls back to comparing display strings.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => a.to_string().cmp(&b.to_string()),
            },
        }
    }

    /// Equality under [`Value::compare`]
    pub fn loosely_equals(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{:.1}", n)
            }
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A row: one value per field of the owning table, plus the tombstone flag
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
    /// Logically deleted
    pub deleted: bool,
}

impl Record {
    /// Create an active record from values
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            deleted: false,
        }
    }

    /// Record of `arity` NULLs
    pub fn nulls(arity: usize) -> Self {
        Self::new(vec![Value::Null; arity])
    }

    /// Get a value by index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Set a value by index; out-of-range indexes are ignored
    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Get all values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the record has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the record and return the values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_compare_across_variants() {
        assert_eq!(Value::Int(3).compare(&Value::Float(3.0)), Ordering::Equal);
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Ordering::Less);
        assert!(Value::Float(10.0).loosely_equals(&Value::Int(10)));
    }

    #[test]
    fn test_null_sorts_first() {
        assert_eq!(Value::Null.compare(&Value::Int(-100)), Ordering::Less);
        assert_eq!(Value::Text("a".into()).compare(&Value::Null), Ordering::Greater);
        assert_eq!(Value::Null.compare(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn test_mixed_compare_uses_display() {
        assert_eq!(
            Value::Int(5).compare(&Value::Text("5".into())),
            Ordering::Equal
        );
        assert_eq!(
            Value::Text("abc".into()).compare(&Value::Text("abd".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_float_display() {
        assert_eq!(Value::Float(5.0).to_string(), "5.0");
        assert_eq!(Value::Float(2.25).to_string(), "2.25");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_record_set_get() {
        let mut record = Record::nulls(3);
        record.set(1, Value::from("x"));
        record.set(9, Value::Int(1));

        assert_eq!(record.len(), 3);
        assert_eq!(record.get(1), Some(&Value::Text("x".into())));
        assert!(record.get(0).unwrap().is_null());
        assert!(!record.deleted);
    }
}
