//! Per-table record file
//!
//! A record file is a flat append log of encoded records with no header.
//! Records are variable length, so every position is found by decoding
//! from the start of the file; offsets returned here are the only row
//! handles the executors use.

use super::codec::{self, STATUS_ACTIVE, STATUS_DELETED};
use super::record::Record;
use crate::catalog::Field;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of a full scan
#[derive(Debug)]
pub struct ScanResult {
    /// Active records with their offsets, in file order
    pub records: Vec<(u64, Record)>,
    /// Set when decoding stopped early; `records` holds everything before it
    pub truncated: Option<Error>,
}

/// Handle on one table's record file
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create an empty file, discarding any previous content
    pub fn create(&self) -> Result<()> {
        File::create(&self.path)?;
        Ok(())
    }

    /// Delete the file. A file that is already gone is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageError(format!(
                "cannot delete {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Move the file to `new_path`; a missing file is created there empty
    pub fn rename_to(&self, new_path: impl Into<PathBuf>) -> Result<RecordFile> {
        let target = RecordFile::new(new_path);
        if self.exists() {
            fs::rename(&self.path, &target.path)?;
        } else {
            target.create()?;
        }
        Ok(target)
    }

    /// Decode every record from offset 0, keeping the active ones.
    ///
    /// A missing or empty file is zero rows. A decode failure stops the
    /// scan and is reported in [`ScanResult::truncated`].
    pub fn scan(&self, fields: &[Field]) -> Result<ScanResult> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let len = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes.as_slice());
        let mut records = Vec::new();
        let mut truncated = None;

        while cursor.position() < len {
            let offset = cursor.position();
            match codec::decode_record(&mut cursor, fields) {
                Ok(record) if record.deleted => {}
                Ok(record) => records.push((offset, record)),
                Err(e) => {
                    truncated = Some(Error::CorruptedRecord {
                        offset,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        debug!(
            path = %self.path.display(),
            rows = records.len(),
            truncated = truncated.is_some(),
            "scanned record file"
        );
        Ok(ScanResult { records, truncated })
    }

    /// Active records in file order. A truncated tail is logged and
    /// dropped.
    pub fn read_all_active(&self, fields: &[Field]) -> Result<Vec<Record>> {
        Ok(self
            .scan_logged(fields)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Like [`RecordFile::scan`], logging a truncation instead of
    /// returning it
    pub fn scan_logged(&self, fields: &[Field]) -> Result<Vec<(u64, Record)>> {
        let result = self.scan(fields)?;
        if let Some(err) = &result.truncated {
            warn!(
                path = %self.path.display(),
                error = %err,
                kept = result.records.len(),
                "record file scan truncated"
            );
        }
        Ok(result.records)
    }

    /// Strict single-record read, tombstoned or not
    pub fn read_at(&self, fields: &[Field], offset: u64) -> Result<Record> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);

        codec::decode_record(&mut reader, fields).map_err(|e| Error::CorruptedRecord {
            offset,
            reason: e.to_string(),
        })
    }

    /// Overwrite the record at `offset`. The new encoding must have the
    /// same byte length as the slot.
    pub fn write_at(&self, fields: &[Field], offset: u64, record: &Record) -> Result<()> {
        let existing = self.read_at(fields, offset)?;
        let slot_len = codec::encode_record(fields, &existing)?.len();
        let bytes = codec::encode_record(fields, record)?;

        if bytes.len() != slot_len {
            return Err(Error::StorageError(format!(
                "record at offset {} is {} bytes, replacement is {}",
                offset,
                slot_len,
                bytes.len()
            )));
        }

        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    /// Check whether `record` fits exactly in the slot at `offset`
    pub fn fits_at(&self, fields: &[Field], offset: u64, record: &Record) -> Result<bool> {
        let existing = self.read_at(fields, offset)?;
        Ok(codec::encode_record(fields, &existing)?.len()
            == codec::encode_record(fields, record)?.len())
    }

    /// Append a record at the end of the file and return its offset
    pub fn append(&self, fields: &[Field], record: &Record) -> Result<u64> {
        let bytes = codec::encode_record(fields, record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let offset = file.metadata()?.len();
        file.write_all(&bytes)?;
        file.flush()?;

        Ok(offset)
    }

    /// Mark the record at `offset` deleted. Field bytes are left in place.
    pub fn tombstone(&self, offset: u64) -> Result<()> {
        self.write_status(offset, STATUS_DELETED)
    }

    /// Clear the tombstone at `offset`
    pub fn restore(&self, offset: u64) -> Result<()> {
        self.write_status(offset, STATUS_ACTIVE)
    }

    fn write_status(&self, offset: u64, status: i32) -> Result<()> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        if offset + 4 > file.metadata()?.len() {
            return Err(Error::CorruptedRecord {
                offset,
                reason: "offset is past the end of the file".to_string(),
            });
        }

        file.seek(SeekFrom::Start(offset))?;
        let current = file.read_i32::<BigEndian>()?;
        if current != STATUS_ACTIVE && current != STATUS_DELETED {
            return Err(Error::CorruptedRecord {
                offset,
                reason: format!("invalid status word {}", current),
            });
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_i32::<BigEndian>(status)?;
        file.flush()?;
        Ok(())
    }

    /// Replace the whole file with `records` in the given layout and
    /// return their new offsets
    pub fn rewrite(&self, fields: &[Field], records: &[Record]) -> Result<Vec<u64>> {
        let mut buf = Vec::new();
        let mut offsets = Vec::with_capacity(records.len());

        for record in records {
            offsets.push(buf.len() as u64);
            buf.extend(codec::encode_record(fields, record)?);
        }

        self.write_raw(&buf)?;

        debug!(path = %self.path.display(), rows = records.len(), "record file rewritten");
        Ok(offsets)
    }

    /// Raw file contents; a missing file reads as empty
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the file with `bytes` through a temp file and rename
    pub fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        let tmp = self.path.with_extension("dat.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
