use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Derived from the filesystem on demand, never persisted.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    /// Artifact filename minus its final extension.
    pub id: String,
    pub filename: String,
    pub file_path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the artifact as written (compressed for `.gz` artifacts).
    pub checksum: String,
}

/// Result of a backup run. Side files are best-effort, so their absence is
/// an empty option instead of an error.
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub info: BackupInfo,
    pub wal_path: Option<PathBuf>,
    pub shm_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub valid: bool,
    pub checksum: String,
    pub size: u64,
}
