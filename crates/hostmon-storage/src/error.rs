use std::path::PathBuf;

/// Errors that can occur within the storage layer.
///
/// Read paths of [`crate::SampleStore`] never surface these; they log and
/// report "no value". Writes, eviction, cooldown persistence and backups
/// return them to the caller.
///
/// # Examples
///
/// ```rust
/// use hostmon_storage::error::StorageError;
/// use std::path::PathBuf;
///
/// let err = StorageError::NoBackup(PathBuf::from("data/backups"));
/// assert!(err.to_string().contains("data/backups"));
/// assert!(!err.is_unavailable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The database file could not be opened or initialised.
    #[error("Storage: sample store unavailable at {}: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed on an open connection.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error while preparing directories or handling backups.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database to back up does not exist.
    #[error("Storage: database {} does not exist", .0.display())]
    MissingDatabase(PathBuf),

    /// No backup file was found in the backup directory.
    #[error("Storage: no backup found in {}", .0.display())]
    NoBackup(PathBuf),
}

impl StorageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
