//! Identifier, literal-conversion and record validation rules

use super::schema::{Field, Table};
use super::types::FieldType;
use crate::error::{Error, Result};
use crate::sql::Literal;
use crate::storage::{Record, Value};

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Fail with `InvalidIdentifier` unless `name` is a valid identifier
pub fn check_identifier(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Convert a parsed literal into a value of the field's type
pub fn convert_literal(literal: &Literal, field: &Field) -> Result<Value> {
    let value = match literal {
        Literal::Null => Value::Null,
        Literal::Integer(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NULL") {
                Value::Null
            } else {
                Value::Text(trimmed.to_string())
            }
        }
    };
    convert_value(value, field)
}

/// Coerce a value into the field's type
pub fn convert_value(value: Value, field: &Field) -> Result<Value> {
    let mismatch = |v: &Value| Error::TypeMismatch {
        from: format!("{} '{}'", v.type_name(), v),
        to: field.field_type.to_string(),
    };

    match (field.field_type, value) {
        (_, Value::Null) => Ok(Value::Null),

        (FieldType::Int, Value::Int(n)) => int_in_range(n).ok_or_else(|| mismatch(&Value::Int(n))),
        (FieldType::Int, Value::Float(f)) => {
            if f.fract() == 0.0 {
                int_in_range(f as i64).ok_or_else(|| mismatch(&Value::Float(f)))
            } else {
                Err(mismatch(&Value::Float(f)))
            }
        }
        (FieldType::Int, Value::Text(s)) => match s.trim().parse::<i64>() {
            Ok(n) => int_in_range(n).ok_or_else(|| mismatch(&Value::Text(s.clone()))),
            Err(_) => Err(mismatch(&Value::Text(s))),
        },

        (FieldType::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
        (FieldType::Float, Value::Float(f)) => Ok(Value::Float(f)),
        (FieldType::Float, Value::Text(s)) => match s.trim().parse::<f64>() {
            Ok(f) => Ok(Value::Float(f)),
            Err(_) => Err(mismatch(&Value::Text(s))),
        },

        (_, Value::Text(s)) => Ok(Value::Text(s)),
        (_, number) => Ok(Value::Text(plain_number(&number))),
    }
}

fn int_in_range(n: i64) -> Option<Value> {
    i32::try_from(n).ok().map(|n| Value::Int(n as i64))
}

/// Display a number without a trailing `.0` for whole floats
pub fn plain_number(value: &Value) -> String {
    match value {
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        other => other.to_string(),
    }
}

/// Check arity, NULL-ability and type/length conformance of a record
pub fn validate_record(record: &Record, table: &Table) -> Result<()> {
    if record.len() != table.field_count() {
        return Err(Error::ArityMismatch {
            table: table.name.clone(),
            expected: table.field_count(),
            found: record.len(),
        });
    }

    for (field, value) in table.fields.iter().zip(record.values()) {
        validate_value(value, field)?;
    }

    Ok(())
}

/// Check one value against its field
pub fn validate_value(value: &Value, field: &Field) -> Result<()> {
    let type_error = || Error::TypeMismatch {
        from: value.type_name().to_string(),
        to: field.field_type.to_string(),
    };

    match (field.field_type, value) {
        (_, Value::Null) if !field.nullable => Err(Error::NullNotAllowed(field.name.clone())),
        (_, Value::Null) => Ok(()),
        (FieldType::Int, Value::Int(n)) if i32::try_from(*n).is_ok() => Ok(()),
        (FieldType::Float, Value::Float(_)) => Ok(()),
        (FieldType::Varchar, Value::Text(s)) => {
            if s.chars().count() > field.length.max(0) as usize {
                Err(Error::ValueTooLong {
                    field: field.name.clone(),
                    max: field.length,
                })
            } else {
                Ok(())
            }
        }
        (FieldType::Char, Value::Text(s)) => {
            if s.len() > field.length.max(0) as usize {
                Err(Error::ValueTooLong {
                    field: field.name.clone(),
                    max: field.length,
                })
            } else if s.contains('\0') {
                Err(Error::ValidationError(format!(
                    "CHAR field '{}' cannot contain NUL bytes",
                    field.name
                )))
            } else {
                Ok(())
            }
        }
        (FieldType::Date, Value::Text(_)) => Ok(()),
        _ => Err(type_error()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("_tmp_1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_convert_literals() {
        let int = Field::new("n", FieldType::Int, 4);
        let float = Field::new("f", FieldType::Float, 8);
        let text = Field::new("s", FieldType::Varchar, 10);

        assert_eq!(convert_literal(&Literal::String(" 42 ".into()), &int).unwrap(), Value::Int(42));
        assert_eq!(convert_literal(&Literal::Float(3.0), &int).unwrap(), Value::Int(3));
        assert!(convert_literal(&Literal::Float(3.5), &int).is_err());
        assert!(convert_literal(&Literal::Integer(3_000_000_000), &int).is_err());
        assert_eq!(convert_literal(&Literal::Integer(2), &float).unwrap(), Value::Float(2.0));
        assert_eq!(convert_literal(&Literal::Integer(7), &text).unwrap(), Value::from("7"));
        assert_eq!(convert_literal(&Literal::String("null".into()), &text).unwrap(), Value::Null);
        assert_eq!(convert_literal(&Literal::String("  ".into()), &int).unwrap(), Value::Null);
        assert!(matches!(
            convert_literal(&Literal::String("abc".into()), &int),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_record() {
        let table = Table::new(
            "t",
            vec![
                Field::new("id", FieldType::Int, 4).nullable(false),
                Field::new("code", FieldType::Char, 3),
                Field::new("name", FieldType::Varchar, 4),
            ],
        );

        let ok = Record::new(vec![Value::Int(1), Value::from("ab"), Value::from("éééé")]);
        assert!(validate_record(&ok, &table).is_ok());

        let null_id = Record::new(vec![Value::Null, Value::Null, Value::Null]);
        assert!(matches!(
            validate_record(&null_id, &table),
            Err(Error::NullNotAllowed(_))
        ));

        let long = Record::new(vec![Value::Int(1), Value::from("abcd"), Value::Null]);
        assert!(matches!(
            validate_record(&long, &table),
            Err(Error::ValueTooLong { .. })
        ));

        let short = Record::new(vec![Value::Int(1)]);
        assert!(matches!(
            validate_record(&short, &table),
            Err(Error::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_plain_number() {
        assert_eq!(plain_number(&Value::Float(15.0)), "15");
        assert_eq!(plain_number(&Value::Float(1.5)), "1.5");
        assert_eq!(plain_number(&Value::Int(3)), "3");
    }
}
