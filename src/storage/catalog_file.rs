//! Catalog file reader and writer
//!
//! File layout (big-endian):
//!
//! ```text
//! 0     magic u32 | version u32 | table count u32
//! 12    table index: { name len u32, name bytes, schema offset i64 } * count
//! 512   schema blocks (or right after the index if it does not fit)
//! ```
//!
//! Each schema block holds the table name, its fields, the cached record
//! count, the last-modified timestamp and the index metadata. Index
//! contents are never written.

use crate::catalog::{Database, Field, FieldType, Index, Table};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;
use tracing::{debug, info};

/// "DBMS"
pub const CATALOG_MAGIC: u32 = 0x4442_4D53;
/// Current format version
pub const CATALOG_VERSION: u32 = 1;
/// Size of the reserved header region
pub const HEADER_SIZE: u64 = 512;
/// Offset of the table index
const INDEX_START: u64 = 12;
/// Maximum number of tables in one catalog
pub const MAX_TABLES: usize = 100;

/// Load a catalog file. A missing or empty file yields an empty database.
pub fn read_catalog(path: &Path) -> Result<Database> {
    let name = database_name(path);

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "catalog file missing, starting empty");
            return Ok(Database::new(name));
        }
        Err(e) => return Err(e.into()),
    };
    if bytes.is_empty() {
        return Ok(Database::new(name));
    }

    let db = decode_catalog(&bytes, name).map_err(|e| match e {
        Error::IoError(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
            Error::StorageError(format!("catalog file {} is truncated", path.display()))
        }
        other => other,
    })?;

    debug!(path = %path.display(), tables = db.table_count(), "catalog loaded");
    Ok(db)
}

/// Rewrite the whole catalog file from `db`
pub fn write_catalog(path: &Path, db: &Database) -> Result<()> {
    let bytes = encode_catalog(db)?;

    let tmp = path.with_extension("dbf.tmp");
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;

    info!(
        path = %path.display(),
        tables = db.table_count(),
        bytes = bytes.len(),
        "catalog rewritten"
    );
    Ok(())
}

/// Database name derived from the catalog file stem
pub fn database_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "database".to_string())
}

// ========== Encoding ==========

/// Serialize a database into catalog file bytes
pub fn encode_catalog(db: &Database) -> Result<Vec<u8>> {
    if db.table_count() > MAX_TABLES {
        return Err(Error::StorageError(format!(
            "catalog holds {} tables, the limit is {}",
            db.table_count(),
            MAX_TABLES
        )));
    }

    let mut blocks = Vec::with_capacity(db.table_count());
    for table in db.tables() {
        let mut block = Vec::new();
        write_table(&mut block, table)?;
        blocks.push((table.name.as_str(), block));
    }

    let index_len: u64 = blocks
        .iter()
        .map(|(name, _)| 4 + name.len() as u64 + 8)
        .sum();
    let schema_start = HEADER_SIZE.max(INDEX_START + index_len);

    let mut buf = Vec::new();
    buf.write_u32::<BigEndian>(CATALOG_MAGIC)?;
    buf.write_u32::<BigEndian>(CATALOG_VERSION)?;
    buf.write_u32::<BigEndian>(blocks.len() as u32)?;

    let mut offset = schema_start;
    for (name, block) in &blocks {
        buf.write_u32::<BigEndian>(name.len() as u32)?;
        buf.extend_from_slice(name.as_bytes());
        buf.write_i64::<BigEndian>(offset as i64)?;
        offset += block.len() as u64;
    }

    buf.resize(schema_start as usize, 0);
    for (_, block) in &blocks {
        buf.extend_from_slice(block);
    }

    Ok(buf)
}

fn write_table(buf: &mut Vec<u8>, table: &Table) -> Result<()> {
    write_string(buf, Some(&table.name))?;
    buf.write_i32::<BigEndian>(table.fields.len() as i32)?;

    for field in &table.fields {
        write_string(buf, Some(&field.name))?;
        buf.write_u8(field.field_type.ordinal())?;
        buf.write_i32::<BigEndian>(field.length)?;
        buf.write_u8(field.primary_key as u8)?;
        buf.write_u8(field.nullable as u8)?;
        write_string(buf, field.default.as_deref())?;
    }

    buf.write_i32::<BigEndian>(table.record_count)?;
    buf.write_i64::<BigEndian>(table.last_modified)?;

    buf.write_i32::<BigEndian>(table.indexes.len() as i32)?;
    for index in table.indexes.values() {
        write_string(buf, Some(&index.name))?;
        write_string(buf, Some(&index.table_name))?;
        write_string(buf, Some(&index.column_name))?;
        buf.write_u8(index.unique as u8)?;
    }

    Ok(())
}

/// Length-prefixed UTF-8; `None` and "" are both written as length 0
fn write_string(buf: &mut Vec<u8>, s: Option<&str>) -> Result<()> {
    let bytes = s.map(str::as_bytes).unwrap_or(&[]);
    buf.write_i32::<BigEndian>(bytes.len() as i32)?;
    buf.extend_from_slice(bytes);
    Ok(())
}

// ========== Decoding ==========

/// Parse catalog file bytes
pub fn decode_catalog(bytes: &[u8], name: impl Into<String>) -> Result<Database> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.read_u32::<BigEndian>()?;
    if magic != CATALOG_MAGIC {
        return Err(Error::BadMagic(magic));
    }
    let version = cursor.read_u32::<BigEndian>()?;
    if version != CATALOG_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let count = cursor.read_u32::<BigEndian>()? as usize;
    if count > MAX_TABLES {
        return Err(Error::StorageError(format!(
            "catalog declares {} tables, the limit is {}",
            count, MAX_TABLES
        )));
    }

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_string(&mut cursor)?
            .ok_or_else(|| Error::StorageError("empty table name in catalog index".into()))?;
        let offset = cursor.read_i64::<BigEndian>()?;
        entries.push((name, offset));
    }

    let mut db = Database::new(name);
    for (entry_name, offset) in entries {
        if offset < 0 || offset as usize >= bytes.len() {
            return Err(Error::StorageError(format!(
                "schema offset {} for table '{}' is outside the file",
                offset, entry_name
            )));
        }
        cursor.set_position(offset as u64);
        let table = read_table(&mut cursor)?;
        db.add_table(table)?;
    }

    Ok(db)
}

fn read_table(cursor: &mut Cursor<&[u8]>) -> Result<Table> {
    let name = read_string(cursor)?
        .ok_or_else(|| Error::StorageError("table without a name".into()))?;

    let field_count = cursor.read_i32::<BigEndian>()?;
    if field_count < 0 {
        return Err(Error::StorageError(format!(
            "negative field count for table '{}'",
            name
        )));
    }

    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(read_field(cursor)?);
    }

    let mut table = Table::new(name, fields);
    table.record_count = cursor.read_i32::<BigEndian>()?;
    table.last_modified = cursor.read_i64::<BigEndian>()?;

    // Older files end right after the timestamp
    let index_count = match cursor.read_i32::<BigEndian>() {
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
        Err(e) => return Err(e.into()),
    };

    for _ in 0..index_count.max(0) {
        let index_name = read_string(cursor)?
            .ok_or_else(|| Error::StorageError("index without a name".into()))?;
        let table_name = read_string(cursor)?.unwrap_or_else(|| table.name.clone());
        let column_name = read_string(cursor)?
            .ok_or_else(|| Error::StorageError("index without a column".into()))?;
        let unique = cursor.read_u8()? != 0;

        let index = Index::new(index_name, table_name, column_name, unique);
        table.indexes.insert(index.name.to_lowercase(), index);
    }

    Ok(table)
}

fn read_field(cursor: &mut Cursor<&[u8]>) -> Result<Field> {
    let name = read_string(cursor)?
        .ok_or_else(|| Error::StorageError("field without a name".into()))?;

    let ordinal = cursor.read_u8()?;
    let field_type = FieldType::from_ordinal(ordinal).ok_or_else(|| {
        Error::StorageError(format!("unknown type ordinal {} for field '{}'", ordinal, name))
    })?;

    let length = cursor.read_i32::<BigEndian>()?;
    let primary_key = cursor.read_u8()? != 0;
    let nullable = cursor.read_u8()? != 0;
    let default = read_string(cursor)?;

    let mut field = Field::new(name, field_type, length)
        .primary_key(primary_key)
        .nullable(nullable);
    field.default = default;
    Ok(field)
}

fn read_string<R: Read>(r: &mut R) -> Result<Option<String>> {
    let len = r.read_i32::<BigEndian>()?;
    if len < 0 {
        return Err(Error::StorageError(format!("negative string length {}", len)));
    }
    if len == 0 {
        return Ok(None);
    }

    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| Error::StorageError(format!("invalid UTF-8 in catalog: {}", e)))
}
