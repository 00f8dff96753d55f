use crate::core::backup::destination_validator::DestinationValidator;
use crate::core::database_manager::DatabaseManager;
use crate::model::backup::{BackupInfo, BackupOutcome, VerifyReport};
use crate::model::error::Error;
use crate::model::error::backup::BackupError;
use crate::model::error::io::IOError;
use crate::model::error::system::SystemError;
use crate::utils::file_hash;
use crate::utils::log_entry::backup::BackupEntry;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Balanced speed/ratio; retail terminals back up over slow USB media, so
/// the maximum level is not worth the CPU time.
const COMPRESSION_LEVEL: u32 = 6;
const ARTIFACT_PREFIX: &str = "tillvault-backup-";
const SQLITE_SIGNATURE: &[u8; 16] = b"SQLite format 3\0";

pub struct BackupEngine {
    database_manager: Arc<DatabaseManager>,
    validator: Arc<DestinationValidator>,
    data_file: PathBuf,
}

impl BackupEngine {
    pub fn new(
        database_manager: Arc<DatabaseManager>,
        validator: Arc<DestinationValidator>,
        data_file: PathBuf,
    ) -> Self {
        Self {
            database_manager,
            validator,
            data_file,
        }
    }

    fn wal_file(&self) -> PathBuf {
        side_file(&self.data_file, "-wal")
    }

    fn shm_file(&self) -> PathBuf {
        side_file(&self.data_file, "-shm")
    }

    /// Snapshots the primary data file (and, best-effort, its WAL/SHM side
    /// files) as gzip artifacts at `destination`.
    pub async fn create_backup(
        &self,
        destination: &Path,
        description: Option<&str>,
    ) -> Result<BackupOutcome, Error> {
        if destination.as_os_str().is_empty() {
            Err(BackupError::NoDestination)?
        }
        if !self.validator.is_external(destination).await {
            Err(BackupError::NotExternal { path: destination.to_path_buf() })?
        }
        fs::create_dir_all(destination)
            .await
            .map_err(|err| IOError::CreateDirectoryFailed {
                path: destination.to_path_buf(),
                source: err,
            })?;
        self.validator.probe_write(destination).await?;
        if fs::metadata(&self.data_file).await.is_err() {
            Err(BackupError::SourceMissing { path: self.data_file.clone() })?
        }

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
        let base = format!("{ARTIFACT_PREFIX}{timestamp}");
        let artifact = destination.join(format!("{base}.db.gz"));
        compress_file(&self.data_file, &artifact).await?;

        let wal_path = self
            .backup_side_file(&self.wal_file(), destination, &base, "-wal")
            .await;
        let shm_path = self
            .backup_side_file(&self.shm_file(), destination, &base, "-shm")
            .await;

        let checksum = file_hash::sha256(&artifact).await?;
        let metadata = fs::metadata(&artifact)
            .await
            .map_err(|err| IOError::GetMetadataFailed {
                path: artifact.clone(),
                source: err,
            })?;

        info!(
            artifact = %artifact.display(),
            size = metadata.len(),
            description = description.unwrap_or(""),
            "{}", BackupEntry::BackupCreated
        );

        Ok(BackupOutcome {
            info: BackupInfo {
                id: artifact_id(&artifact),
                filename: format!("{base}.db.gz"),
                file_path: artifact,
                size: metadata.len(),
                created_at: created_time(&metadata),
                checksum,
            },
            wal_path,
            shm_path,
        })
    }

    /// Absence of a side file is normal; a compression failure only costs
    /// the side file, never the run.
    async fn backup_side_file(
        &self,
        source: &Path,
        destination: &Path,
        base: &str,
        suffix: &str,
    ) -> Option<PathBuf> {
        if fs::metadata(source).await.is_err() {
            return None;
        }
        let target = destination.join(format!("{base}.db{suffix}.gz"));
        match compress_file(source, &target).await {
            Ok(()) => Some(target),
            Err(err) => {
                warn!(path = %source.display(), error = %err, "{}", BackupEntry::SideFileSkipped);
                None
            }
        }
    }

    /// Signature check against a scratch decompression. The scratch file is
    /// a scoped resource, removed on success and failure alike; legacy
    /// uncompressed `.db` artifacts are read directly.
    pub async fn verify_backup(&self, path: &Path) -> Result<VerifyReport, Error> {
        debug!(path = %path.display(), "{}", BackupEntry::VerifyStarted);
        let metadata = fs::metadata(path)
            .await
            .map_err(|err| IOError::GetMetadataFailed {
                path: path.to_path_buf(),
                source: err,
            })?;
        let checksum = file_hash::sha256(path).await?;

        let valid = if is_gzip(path) {
            read_decompressed_header(path).await?
                .map(|header| header == *SQLITE_SIGNATURE)
                .unwrap_or(false)
        } else {
            let mut header = [0u8; 16];
            match read_exact_prefix(path, &mut header).await {
                Ok(true) => header == *SQLITE_SIGNATURE,
                Ok(false) => false,
                Err(err) => return Err(err),
            }
        };

        Ok(VerifyReport { valid, checksum, size: metadata.len() })
    }

    /// Replaces the live data file with the backup.
    ///
    /// The replace is a multi-step delete-then-write with no rollback: once
    /// the old primary file is removed, a decompression failure leaves no
    /// primary file on disk. The pool is closed before the file is touched
    /// and reopened afterward in every outcome.
    pub async fn restore_backup(&self, backup_path: &Path) -> Result<(), Error> {
        let report = self.verify_backup(backup_path).await?;
        if !report.valid {
            Err(BackupError::InvalidBackup { path: backup_path.to_path_buf() })?
        }

        self.database_manager.close_connection().await;
        let result = self.replace_data_files(backup_path).await;
        let reopen = self.database_manager.reopen().await;
        result?;
        reopen?;
        info!(path = %backup_path.display(), "{}", BackupEntry::RestoreComplete);
        Ok(())
    }

    async fn replace_data_files(&self, backup_path: &Path) -> Result<(), Error> {
        for stale in [self.data_file.clone(), self.wal_file(), self.shm_file()] {
            match fs::remove_file(&stale).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    Err(IOError::DeleteFileFailed { path: stale, source: err })?
                }
            }
        }

        restore_artifact(backup_path, &self.data_file).await?;

        for (suffix, target) in [("-wal", self.wal_file()), ("-shm", self.shm_file())] {
            let compressed = sibling_artifact(backup_path, suffix, true);
            let plain = sibling_artifact(backup_path, suffix, false);
            let source = if fs::metadata(&compressed).await.is_ok() {
                compressed
            } else if fs::metadata(&plain).await.is_ok() {
                plain
            } else {
                continue;
            };
            if let Err(err) = restore_artifact(&source, &target).await {
                warn!(path = %source.display(), error = %err, "{}", BackupEntry::SideFileSkipped);
            }
        }
        Ok(())
    }

    /// Rescans `dir`; nothing is cached.
    pub async fn list_backups(&self, dir: &Path) -> Result<Vec<BackupInfo>, Error> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|err| IOError::ReadDirectoryFailed {
                path: dir.to_path_buf(),
                source: err,
            })?;
        let mut backups = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| IOError::ReadDirectoryFailed {
                path: dir.to_path_buf(),
                source: err,
            })?
        {
            let filename = entry.file_name().to_string_lossy().to_string();
            if !is_primary_artifact(&filename) {
                continue;
            }
            let file_path = entry.path();
            let metadata = entry
                .metadata()
                .await
                .map_err(|err| IOError::GetMetadataFailed {
                    path: file_path.clone(),
                    source: err,
                })?;
            let checksum = file_hash::sha256(&file_path).await?;
            backups.push(BackupInfo {
                id: artifact_id(&file_path),
                filename,
                size: metadata.len(),
                created_at: created_time(&metadata),
                checksum,
                file_path,
            });
        }
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Deletes the oldest artifacts (and their side files) beyond
    /// `max_backups`. Returns how many primaries were removed.
    pub async fn prune_backups(&self, dir: &Path, max_backups: u32) -> Result<usize, Error> {
        let backups = self.list_backups(dir).await?;
        let mut removed = 0;
        for stale in backups.iter().skip(max_backups as usize) {
            fs::remove_file(&stale.file_path)
                .await
                .map_err(|err| IOError::DeleteFileFailed {
                    path: stale.file_path.clone(),
                    source: err,
                })?;
            for suffix in ["-wal", "-shm"] {
                for gz in [true, false] {
                    let side = sibling_artifact(&stale.file_path, suffix, gz);
                    let _ = fs::remove_file(&side).await;
                }
            }
            removed += 1;
        }
        if removed > 0 {
            info!(directory = %dir.display(), removed, "{}", BackupEntry::RetentionPruned);
        }
        Ok(removed)
    }
}

fn side_file(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// `…/x.db.gz` + `-wal` → `…/x.db-wal.gz` (or `…/x.db-wal` for legacy
/// uncompressed artifacts).
fn sibling_artifact(primary: &Path, suffix: &str, compressed: bool) -> PathBuf {
    let name = primary.file_name().unwrap_or_default().to_string_lossy();
    let base = name.strip_suffix(".gz").unwrap_or(&name);
    let sibling = if compressed {
        format!("{base}{suffix}.gz")
    } else {
        format!("{base}{suffix}")
    };
    primary.with_file_name(sibling)
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

fn is_primary_artifact(filename: &str) -> bool {
    filename.starts_with(ARTIFACT_PREFIX)
        && (filename.ends_with(".db.gz") || filename.ends_with(".db"))
}

fn artifact_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn created_time(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

async fn compress_file(source: &Path, target: &Path) -> Result<(), Error> {
    let source = source.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let run = || -> std::io::Result<()> {
            let mut input = std::fs::File::open(&source)?;
            let output = std::fs::File::create(&target)?;
            let mut encoder = GzEncoder::new(output, Compression::new(COMPRESSION_LEVEL));
            std::io::copy(&mut input, &mut encoder)?;
            encoder.finish()?;
            Ok(())
        };
        run().map_err(|err| {
            Error::from(BackupError::CompressFailed { path: source.clone(), source: err })
        })
    })
    .await
    .map_err(SystemError::ThreadPanic)?
}

async fn decompress_file(source: &Path, target: &Path) -> Result<(), Error> {
    let source = source.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let run = || -> std::io::Result<()> {
            let input = std::fs::File::open(&source)?;
            let mut decoder = GzDecoder::new(input);
            let mut output = std::fs::File::create(&target)?;
            std::io::copy(&mut decoder, &mut output)?;
            Ok(())
        };
        run().map_err(|err| {
            Error::from(BackupError::DecompressFailed { path: source.clone(), source: err })
        })
    })
    .await
    .map_err(SystemError::ThreadPanic)?
}

async fn restore_artifact(source: &Path, target: &Path) -> Result<(), Error> {
    if is_gzip(source) {
        decompress_file(source, target).await
    } else {
        fs::copy(source, target)
            .await
            .map(|_| ())
            .map_err(|err| {
                Error::from(IOError::CopyFileFailed {
                    src: source.to_path_buf(),
                    dst: target.to_path_buf(),
                    source: err,
                })
            })
    }
}

/// Decompresses into a scratch temp file and reads the first 16 bytes.
/// Returns `Ok(None)` when the gzip stream itself is corrupt, which callers
/// treat as an invalid artifact rather than an I/O failure.
async fn read_decompressed_header(path: &Path) -> Result<Option<[u8; 16]>, Error> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        use std::io::{Read, Seek, SeekFrom, Write};

        let input = std::fs::File::open(&path).map_err(|err| {
            Error::from(IOError::ReadFileFailed { path: path.clone(), source: err })
        })?;
        // NamedTempFile removes itself on drop, covering every exit path.
        let mut scratch = tempfile::NamedTempFile::new().map_err(|err| {
            Error::from(IOError::WriteFileFailed {
                path: std::env::temp_dir(),
                source: err,
            })
        })?;
        let mut decoder = GzDecoder::new(input);
        if std::io::copy(&mut decoder, scratch.as_file_mut()).is_err() {
            return Ok(None);
        }
        scratch.as_file_mut().flush().ok();
        scratch
            .as_file_mut()
            .seek(SeekFrom::Start(0))
            .map_err(|err| {
                Error::from(IOError::ReadFileFailed { path: path.clone(), source: err })
            })?;
        let mut header = [0u8; 16];
        match scratch.as_file_mut().read_exact(&mut header) {
            Ok(()) => Ok(Some(header)),
            Err(_) => Ok(None),
        }
    })
    .await
    .map_err(SystemError::ThreadPanic)?
}

/// Reads exactly `buffer.len()` bytes; `Ok(false)` when the file is shorter.
async fn read_exact_prefix(path: &Path, buffer: &mut [u8]) -> Result<bool, Error> {
    use tokio::io::AsyncReadExt;

    let mut file = fs::File::open(path)
        .await
        .map_err(|err| IOError::ReadFileFailed {
            path: path.to_path_buf(),
            source: err,
        })?;
    match file.read_exact(buffer).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(IOError::ReadFileFailed {
            path: path.to_path_buf(),
            source: err,
        })?,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeProbe;

    /// The engine snapshots a standalone file carrying the SQLite signature
    /// so byte comparisons stay deterministic; the managed store database
    /// only exercises the close/reopen ordering during restore.
    async fn engine_in(dir: &Path) -> (BackupEngine, PathBuf) {
        let data_dir = dir.join("data");
        fs::create_dir_all(&data_dir).await.unwrap();
        let data_file = data_dir.join("tillvault.db");
        let mut content = SQLITE_SIGNATURE.to_vec();
        content.extend_from_slice(&[0x5a; 4096]);
        fs::write(&data_file, &content).await.unwrap();

        let database_manager =
            Arc::new(DatabaseManager::new(&data_dir.join("store.db")).await.unwrap());
        let probe = FakeProbe::with_roots(vec![data_dir.clone(), dir.join("backups")]);
        let validator = Arc::new(DestinationValidator::new(data_dir, Arc::new(probe)));
        let engine = BackupEngine::new(database_manager, validator, data_file.clone());
        (engine, data_file)
    }

    #[tokio::test]
    async fn create_verify_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, data_file) = engine_in(dir.path()).await;
        let original = fs::read(&data_file).await.unwrap();

        let destination = dir.path().join("backups");
        let outcome = engine.create_backup(&destination, Some("nightly")).await.unwrap();
        assert!(outcome.info.filename.starts_with(ARTIFACT_PREFIX));
        assert!(outcome.info.size > 0);

        let report = engine.verify_backup(&outcome.info.file_path).await.unwrap();
        assert!(report.valid);
        assert_eq!(report.checksum, outcome.info.checksum);

        engine.restore_backup(&outcome.info.file_path).await.unwrap();
        let restored = fs::read(&data_file).await.unwrap();
        assert_eq!(restored, original);
    }

    #[tokio::test]
    async fn wal_side_file_rides_along_and_restores_with_the_primary() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, data_file) = engine_in(dir.path()).await;
        let wal_file = side_file(&data_file, "-wal");
        fs::write(&wal_file, b"wal frames").await.unwrap();
        let original = fs::read(&data_file).await.unwrap();
        let original_wal = fs::read(&wal_file).await.unwrap();

        let destination = dir.path().join("backups");
        let outcome = engine.create_backup(&destination, None).await.unwrap();
        let wal_artifact = outcome.wal_path.expect("wal artifact written");
        assert!(wal_artifact.to_string_lossy().ends_with(".db-wal.gz"));
        assert!(fs::metadata(&wal_artifact).await.is_ok());
        assert!(outcome.shm_path.is_none());

        // Diverge both live files, then bring the snapshot back.
        fs::write(&data_file, b"later state").await.unwrap();
        fs::write(&wal_file, b"later frames").await.unwrap();
        engine.restore_backup(&outcome.info.file_path).await.unwrap();
        assert_eq!(fs::read(&data_file).await.unwrap(), original);
        assert_eq!(fs::read(&wal_file).await.unwrap(), original_wal);
    }

    #[tokio::test]
    async fn same_volume_destination_is_rejected_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path()).await;

        // "data/nested" shares the fake volume root with the data dir.
        let destination = dir.path().join("data").join("nested");
        let result = engine.create_backup(&destination, None).await;
        assert!(matches!(
            result,
            Err(Error::Backup(BackupError::NotExternal { .. }))
        ));
        assert!(fs::metadata(&destination).await.is_err());
    }

    #[tokio::test]
    async fn blank_destination_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path()).await;
        let result = engine.create_backup(Path::new(""), None).await;
        assert!(matches!(result, Err(Error::Backup(BackupError::NoDestination))));
    }

    #[tokio::test]
    async fn corrupt_artifact_fails_verification_not_restore() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, data_file) = engine_in(dir.path()).await;
        let before = fs::read(&data_file).await.unwrap();

        let bogus = dir.path().join("backups").join("tillvault-backup-x.db.gz");
        fs::create_dir_all(bogus.parent().unwrap()).await.unwrap();
        fs::write(&bogus, b"not a gzip stream").await.unwrap();

        let report = engine.verify_backup(&bogus).await.unwrap();
        assert!(!report.valid);

        let result = engine.restore_backup(&bogus).await;
        assert!(matches!(
            result,
            Err(Error::Backup(BackupError::InvalidBackup { .. }))
        ));
        // The live data file is untouched on a verify failure.
        assert_eq!(fs::read(&data_file).await.unwrap(), before);
    }

    #[tokio::test]
    async fn legacy_uncompressed_artifact_verifies_directly() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, data_file) = engine_in(dir.path()).await;

        let legacy = dir.path().join("backups").join("tillvault-backup-old.db");
        fs::create_dir_all(legacy.parent().unwrap()).await.unwrap();
        fs::copy(&data_file, &legacy).await.unwrap();

        let report = engine.verify_backup(&legacy).await.unwrap();
        assert!(report.valid);
    }

    #[tokio::test]
    async fn listing_scans_primaries_and_skips_side_files() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path()).await;

        let destination = dir.path().join("backups");
        let outcome = engine.create_backup(&destination, None).await.unwrap();
        fs::write(destination.join("tillvault-backup-x.db-wal.gz"), b"side")
            .await
            .unwrap();
        fs::write(destination.join("unrelated.txt"), b"noise").await.unwrap();

        let backups = engine.list_backups(&destination).await.unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].filename, outcome.info.filename);
        assert_eq!(backups[0].id, outcome.info.filename.trim_end_matches(".gz"));
    }

    #[tokio::test]
    async fn pruning_keeps_the_newest_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path()).await;
        let destination = dir.path().join("backups");

        for _ in 0..3 {
            engine.create_backup(&destination, None).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let removed = engine.prune_backups(&destination, 2).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(engine.list_backups(&destination).await.unwrap().len(), 2);
    }
}
