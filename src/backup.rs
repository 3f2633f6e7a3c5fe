//! Snapshot backup and restore
//!
//! A snapshot is a directory `backup_<unix-seconds>` holding a copy of the
//! catalog file and of every table's record file, under their own
//! file names.

use crate::error::{Error, Result};
use crate::storage::catalog_file;
use crate::storage::record_path_for;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const SNAPSHOT_PREFIX: &str = "backup_";

/// Copy the catalog and the record files of `tables` into a new snapshot
/// directory under `backup_dir` and return its path
pub fn create_snapshot(catalog_path: &Path, tables: &[String], backup_dir: &Path) -> Result<PathBuf> {
    if !catalog_path.is_file() {
        return Err(Error::StorageError(format!(
            "catalog file {} does not exist",
            catalog_path.display()
        )));
    }

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut snapshot = backup_dir.join(format!("{}{}", SNAPSHOT_PREFIX, secs));
    let mut n = 1;
    while snapshot.exists() {
        snapshot = backup_dir.join(format!("{}{}_{}", SNAPSHOT_PREFIX, secs, n));
        n += 1;
    }
    fs::create_dir_all(&snapshot)?;

    copy_into(catalog_path, &snapshot)?;
    let mut copied = 0;
    for table in tables {
        let data = record_path_for(catalog_path, table);
        if data.is_file() {
            copy_into(&data, &snapshot)?;
            copied += 1;
        }
    }

    info!(snapshot = %snapshot.display(), tables = copied, "backup created");
    Ok(snapshot)
}

/// Copy a snapshot back over `catalog_path` and its record files. Tables
/// whose record file is absent from the snapshot get an empty one.
pub fn restore_snapshot(snapshot_dir: &Path, catalog_path: &Path) -> Result<()> {
    let source_catalog = find_catalog(snapshot_dir, catalog_path)?;
    let db = catalog_file::read_catalog(&source_catalog)?;

    if let Some(parent) = catalog_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&source_catalog, catalog_path)?;

    for table in db.table_names() {
        let source = record_path_for(&source_catalog, &table);
        let target = record_path_for(catalog_path, &table);
        if source.is_file() {
            fs::copy(&source, &target)?;
        } else {
            fs::write(&target, b"")?;
        }
        debug!(table = %table, "restored record file");
    }

    info!(snapshot = %snapshot_dir.display(), tables = db.table_count(), "backup restored");
    Ok(())
}

/// Snapshot directories under `backup_dir`, oldest first
pub fn list_snapshots(backup_dir: &Path) -> Result<Vec<PathBuf>> {
    if !backup_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut snapshots: Vec<PathBuf> = fs::read_dir(backup_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX))
        })
        .collect();
    snapshots.sort();
    Ok(snapshots)
}

/// The snapshot's catalog: same file name as the target, else the only
/// `.dbf` file in the directory
fn find_catalog(snapshot_dir: &Path, catalog_path: &Path) -> Result<PathBuf> {
    if let Some(name) = catalog_path.file_name() {
        let same = snapshot_dir.join(name);
        if same.is_file() {
            return Ok(same);
        }
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(snapshot_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "dbf"))
        .collect();

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(Error::StorageError(format!(
            "no catalog file in snapshot {}",
            snapshot_dir.display()
        ))),
        _ => Err(Error::StorageError(format!(
            "snapshot {} holds more than one catalog file",
            snapshot_dir.display()
        ))),
    }
}

fn copy_into(file: &Path, dir: &Path) -> Result<()> {
    let name = file
        .file_name()
        .ok_or_else(|| Error::StorageError(format!("{} is not a file", file.display())))?;
    fs::copy(file, dir.join(name))?;
    Ok(())
}
