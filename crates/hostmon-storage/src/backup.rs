//! Point-in-time copies of the sample database.
//!
//! Backups are written with SQLite's online backup API, so they are
//! consistent even while the agent keeps appending.

use crate::error::{Result, StorageError};
use chrono::Local;
use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName, OpenFlags};
use std::path::{Path, PathBuf};

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_EXTENSION: &str = ".sqlite";

/// Number of backups kept unless configured otherwise.
pub const DEFAULT_KEEP: usize = 3;

/// Copies `db_path` into `backup_dir` as `backup_<timestamp>.sqlite`, then
/// prunes the directory down to the `keep` newest backups.
///
/// Returns the path of the new backup.
pub fn create_backup(db_path: &Path, backup_dir: &Path, keep: usize) -> Result<PathBuf> {
    if !db_path.exists() {
        return Err(StorageError::MissingDatabase(db_path.to_path_buf()));
    }
    std::fs::create_dir_all(backup_dir)?;

    let target = next_backup_path(backup_dir);
    let source = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    source.backup(DatabaseName::Main, &target, None)?;
    tracing::info!(backup = %target.display(), "Backup created");

    let removed = prune_backups(backup_dir, keep)?;
    if removed > 0 {
        tracing::info!(removed, keep, "Old backups removed");
    }
    Ok(target)
}

/// Replaces the contents of `db_path` with the newest backup in
/// `backup_dir`. Returns the backup that was restored.
pub fn restore_latest(db_path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    let latest = list_backups(backup_dir)?
        .pop()
        .ok_or_else(|| StorageError::NoBackup(backup_dir.to_path_buf()))?;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut conn = Connection::open(db_path)?;
    conn.restore(DatabaseName::Main, &latest, None::<fn(Progress)>)?;
    tracing::info!(backup = %latest.display(), database = %db_path.display(), "Database restored");
    Ok(latest)
}

/// Backups in `backup_dir`, oldest first. A missing directory has none.
pub fn list_backups(backup_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_backup = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(BACKUP_EXTENSION));
        if is_backup && path.is_file() {
            backups.push(path);
        }
    }
    // Names embed a sortable timestamp.
    backups.sort();
    Ok(backups)
}

fn prune_backups(backup_dir: &Path, keep: usize) -> Result<usize> {
    let backups = list_backups(backup_dir)?;
    let excess = backups.len().saturating_sub(keep);
    for old in &backups[..excess] {
        std::fs::remove_file(old)?;
        tracing::debug!(backup = %old.display(), "Removed old backup");
    }
    Ok(excess)
}

fn next_backup_path(backup_dir: &Path) -> PathBuf {
    loop {
        let stamp = Local::now().format("%Y%m%d_%H%M%S%.3f");
        let path = backup_dir.join(format!("{BACKUP_PREFIX}{stamp}{BACKUP_EXTENSION}"));
        if !path.exists() {
            return path;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}
