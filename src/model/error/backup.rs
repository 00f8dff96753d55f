use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("No backup destination configured")]
    NoDestination,

    #[error("Destination is not on an external volume: {path}")]
    NotExternal { path: PathBuf },

    #[error("Destination is not writable: {path}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Primary data file not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("No external drive is reachable")]
    NoExternalDrive,

    #[error("Backup artifact is invalid: {path}")]
    InvalidBackup { path: PathBuf },

    #[error("Failed to compress file: {path}")]
    CompressFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decompress file: {path}")]
    DecompressFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
