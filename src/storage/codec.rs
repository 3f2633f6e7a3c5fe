//! Binary record codec
//!
//! Record layout (big-endian):
//!
//! ```text
//! +------------+---------+---------+-----+
//! | status i32 | field 0 | field 1 | ... |
//! +------------+---------+---------+-----+
//! ```
//!
//! | type          | encoding                                        |
//! |---------------|-------------------------------------------------|
//! | INT           | null marker u8, i32                             |
//! | FLOAT         | null marker u8, f64                             |
//! | CHAR(n)       | n bytes, zero padded; all zeros is NULL         |
//! | VARCHAR, DATE | i32 byte length, UTF-8 bytes; length 0 is NULL  |

use super::record::{Record, Value};
use crate::catalog::{Field, FieldType};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// Status word of a live record
pub const STATUS_ACTIVE: i32 = 0;
/// Status word of a tombstoned record
pub const STATUS_DELETED: i32 = 1;

const NULL_ABSENT: u8 = 0;
const NULL_PRESENT: u8 = 1;

/// Upper bound on a single variable-length value, to reject garbage prefixes
const MAX_VAR_LEN: i32 = 16 * 1024 * 1024;

/// Encode a full record, status word included
pub fn encode_record(fields: &[Field], record: &Record) -> Result<Vec<u8>> {
    if record.len() != fields.len() {
        return Err(Error::StorageError(format!(
            "record has {} values, layout has {} fields",
            record.len(),
            fields.len()
        )));
    }

    let mut buf = Vec::new();
    let status = if record.deleted {
        STATUS_DELETED
    } else {
        STATUS_ACTIVE
    };
    buf.write_i32::<BigEndian>(status)?;

    for (field, value) in fields.iter().zip(record.values()) {
        encode_value(&mut buf, field, value)?;
    }

    Ok(buf)
}

/// Encode a single value for `field`
pub fn encode_value<W: Write>(w: &mut W, field: &Field, value: &Value) -> Result<()> {
    match field.field_type {
        FieldType::Int => match value {
            Value::Null => {
                w.write_u8(NULL_PRESENT)?;
                w.write_i32::<BigEndian>(0)?;
            }
            Value::Int(n) => {
                let n = i32::try_from(*n).map_err(|_| Error::TypeMismatch {
                    from: format!("INT {}", n),
                    to: "INT(32-bit)".to_string(),
                })?;
                w.write_u8(NULL_ABSENT)?;
                w.write_i32::<BigEndian>(n)?;
            }
            other => return Err(layout_mismatch(field, other)),
        },
        FieldType::Float => match value {
            Value::Null => {
                w.write_u8(NULL_PRESENT)?;
                w.write_f64::<BigEndian>(0.0)?;
            }
            Value::Float(f) => {
                w.write_u8(NULL_ABSENT)?;
                w.write_f64::<BigEndian>(*f)?;
            }
            Value::Int(n) => {
                w.write_u8(NULL_ABSENT)?;
                w.write_f64::<BigEndian>(*n as f64)?;
            }
            other => return Err(layout_mismatch(field, other)),
        },
        FieldType::Char => {
            let width = field.length.max(0) as usize;
            let mut block = vec![0u8; width];
            match value {
                Value::Null => {}
                Value::Text(s) => {
                    let bytes = s.as_bytes();
                    if bytes.len() > width {
                        return Err(Error::ValueTooLong {
                            field: field.name.clone(),
                            max: field.length,
                        });
                    }
                    block[..bytes.len()].copy_from_slice(bytes);
                }
                other => return Err(layout_mismatch(field, other)),
            }
            w.write_all(&block)?;
        }
        FieldType::Varchar | FieldType::Date => match value {
            Value::Null => w.write_i32::<BigEndian>(0)?,
            Value::Text(s) => {
                let bytes = s.as_bytes();
                w.write_i32::<BigEndian>(bytes.len() as i32)?;
                w.write_all(bytes)?;
            }
            other => return Err(layout_mismatch(field, other)),
        },
    }
    Ok(())
}

fn layout_mismatch(field: &Field, value: &Value) -> Error {
    Error::TypeMismatch {
        from: value.type_name().to_string(),
        to: format!("{} ({})", field.field_type, field.name),
    }
}

/// Decode one record starting at the cursor position
pub fn decode_record<R: Read>(r: &mut R, fields: &[Field]) -> Result<Record> {
    let status = r.read_i32::<BigEndian>()?;
    let deleted = match status {
        STATUS_ACTIVE => false,
        STATUS_DELETED => true,
        other => {
            return Err(Error::StorageError(format!("invalid status word {}", other)));
        }
    };

    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        values.push(decode_value(r, field)?);
    }

    let mut record = Record::new(values);
    record.deleted = deleted;
    Ok(record)
}

/// Decode a single value for `field`
pub fn decode_value<R: Read>(r: &mut R, field: &Field) -> Result<Value> {
    match field.field_type {
        FieldType::Int => {
            let marker = read_null_marker(r)?;
            let n = r.read_i32::<BigEndian>()?;
            Ok(if marker { Value::Null } else { Value::Int(n as i64) })
        }
        FieldType::Float => {
            let marker = read_null_marker(r)?;
            let f = r.read_f64::<BigEndian>()?;
            Ok(if marker { Value::Null } else { Value::Float(f) })
        }
        FieldType::Char => {
            let mut block = vec![0u8; field.length.max(0) as usize];
            r.read_exact(&mut block)?;
            let end = block.iter().position(|b| *b == 0).unwrap_or(block.len());
            if end == 0 {
                return Ok(Value::Null);
            }
            utf8(block[..end].to_vec()).map(Value::Text)
        }
        FieldType::Varchar | FieldType::Date => {
            let len = r.read_i32::<BigEndian>()?;
            if !(0..=MAX_VAR_LEN).contains(&len) {
                return Err(Error::StorageError(format!(
                    "invalid length prefix {} for field '{}'",
                    len, field.name
                )));
            }
            if len == 0 {
                return Ok(Value::Null);
            }
            let mut bytes = vec![0u8; len as usize];
            r.read_exact(&mut bytes)?;
            utf8(bytes).map(Value::Text)
        }
    }
}

fn read_null_marker<R: Read>(r: &mut R) -> Result<bool> {
    match r.read_u8()? {
        NULL_ABSENT => Ok(false),
        NULL_PRESENT => Ok(true),
        other => Err(Error::StorageError(format!("invalid null marker {}", other))),
    }
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::StorageError(format!("invalid UTF-8: {}", e)))
}

/// Byte length of the record encoded at the start of `bytes`
pub fn encoded_len(bytes: &[u8], fields: &[Field]) -> Result<usize> {
    let mut cursor = Cursor::new(bytes);
    decode_record(&mut cursor, fields)?;
    Ok(cursor.position() as usize)
}
