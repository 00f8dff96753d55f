use crate::interface::volume_probe::{MediaKind, VolumeProbe};
use crate::model::error::Error;
use crate::model::error::backup::BackupError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::warn;

const WRITE_PROBE_MARKER: &str = ".tillvault-write-test";

/// Gates every backup destination. Backups must never land on the volume
/// holding the live data file, so classification errs toward rejecting a
/// same-volume path and the writability check performs a real write.
pub struct DestinationValidator {
    data_dir: PathBuf,
    probe: Arc<dyn VolumeProbe>,
}

impl DestinationValidator {
    pub fn new(data_dir: PathBuf, probe: Arc<dyn VolumeProbe>) -> Self {
        Self { data_dir, probe }
    }

    /// Three stages: volume-root topology, then media type for same-root
    /// paths, then a boot-volume fallback when the media query fails.
    pub async fn is_external(&self, path: &Path) -> bool {
        let candidate_root = self.probe.volume_root(path);
        let data_root = self.probe.volume_root(&self.data_dir);
        if candidate_root != data_root {
            return true;
        }
        match self.probe.media_kind(&candidate_root).await {
            Ok(MediaKind::Removable | MediaKind::Network) => true,
            Ok(_) => false,
            Err(err) => {
                warn!(root = %candidate_root.display(), error = %err, "media query failed, using boot-volume fallback");
                !self.probe.is_system_volume(&candidate_root)
            }
        }
    }

    /// Classification plus a create-and-delete write probe. The two failure
    /// kinds stay distinct so callers can tell a misconfigured path from a
    /// read-only one.
    pub async fn validate_external_drive(&self, path: &Path) -> Result<(), Error> {
        if !self.is_external(path).await {
            Err(BackupError::NotExternal { path: path.to_path_buf() })?
        }
        self.probe_write(path).await
    }

    pub async fn probe_write(&self, dir: &Path) -> Result<(), Error> {
        let marker = dir.join(WRITE_PROBE_MARKER);
        let attempt = async {
            fs::write(&marker, b"probe").await?;
            fs::remove_file(&marker).await
        };
        attempt.await.map_err(|err| {
            Error::from(BackupError::NotWritable {
                path: dir.to_path_buf(),
                source: err,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::volume_probe::MediaKind;
    use crate::test_support::FakeProbe;
    use std::path::PathBuf;

    fn validator(data_dir: &str, probe: FakeProbe) -> DestinationValidator {
        DestinationValidator::new(PathBuf::from(data_dir), Arc::new(probe))
    }

    #[tokio::test]
    async fn different_volume_roots_are_external_regardless_of_media() {
        let validator = validator("/data/app", FakeProbe::fixed());
        assert!(validator.is_external(Path::new("/backup/drive")).await);
    }

    #[tokio::test]
    async fn same_root_fixed_media_is_not_external() {
        let validator = validator("/data/app", FakeProbe::fixed());
        assert!(!validator.is_external(Path::new("/data/other")).await);
    }

    #[tokio::test]
    async fn same_root_removable_media_is_external() {
        let mut probe = FakeProbe::fixed();
        probe.media = Ok(MediaKind::Removable);
        let validator = validator("/data/app", probe);
        assert!(validator.is_external(Path::new("/data/other")).await);
    }

    #[tokio::test]
    async fn media_query_failure_falls_back_to_boot_volume_check() {
        let mut probe = FakeProbe::fixed();
        probe.media = Err(());
        probe.system_root = PathBuf::from("/other");
        let validator = validator("/data/app", probe);
        // Same root as the data dir, query fails, root is not the boot
        // volume: treated as external.
        assert!(validator.is_external(Path::new("/data/other")).await);
    }

    #[tokio::test]
    async fn non_external_path_is_rejected_with_the_external_error_kind() {
        let validator = validator("/data/app", FakeProbe::fixed());
        let result = validator.validate_external_drive(Path::new("/data/other")).await;
        assert!(matches!(
            result,
            Err(Error::Backup(BackupError::NotExternal { .. }))
        ));
    }

    #[tokio::test]
    async fn unwritable_external_path_is_a_writability_error() {
        // A regular file cannot host the probe marker, so the write probe
        // fails even when the process has broad filesystem rights.
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("artifact.bin");
        std::fs::write(&not_a_dir, b"payload").unwrap();

        let validator = DestinationValidator::new(
            PathBuf::from("/data/app"),
            Arc::new(FakeProbe::fixed()),
        );
        let result = validator.validate_external_drive(&not_a_dir).await;
        assert!(matches!(
            result,
            Err(Error::Backup(BackupError::NotWritable { .. }))
        ));
    }
}
