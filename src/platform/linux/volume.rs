use crate::interface::volume_probe::{MediaKind, VolumeProbe};
use crate::model::error::Error;
use crate::model::error::io::IOError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

const MOUNT_TABLE: &str = "/proc/mounts";
const NETWORK_FILESYSTEMS: &[&str] = &["nfs", "nfs4", "cifs", "smb3", "smbfs", "fuse.sshfs"];
const EXTERNAL_MOUNT_PREFIXES: &[&str] = &["/run/media/", "/media/", "/mnt/"];

#[derive(Debug, Clone)]
struct MountEntry {
    device: String,
    mount_point: PathBuf,
    fstype: String,
}

/// Mount-table based probe. Volume roots come from the longest matching
/// mount point; media classification reads the removable flag under /sys.
pub struct NativeVolumeProbe {
    timeout: Duration,
}

impl NativeVolumeProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn parse_mounts(content: &str) -> Vec<MountEntry> {
        content
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device = fields.next()?.to_string();
                // Mount points escape spaces as \040 in /proc/mounts.
                let mount_point = PathBuf::from(fields.next()?.replace("\\040", " "));
                let fstype = fields.next()?.to_string();
                Some(MountEntry { device, mount_point, fstype })
            })
            .collect()
    }

    fn mounts_blocking() -> Vec<MountEntry> {
        std::fs::read_to_string(MOUNT_TABLE)
            .map(|content| Self::parse_mounts(&content))
            .unwrap_or_default()
    }

    async fn mounts(&self) -> Result<Vec<MountEntry>, Error> {
        let content = fs::read_to_string(MOUNT_TABLE)
            .await
            .map_err(|err| IOError::ReadFileFailed {
                path: PathBuf::from(MOUNT_TABLE),
                source: err,
            })?;
        Ok(Self::parse_mounts(&content))
    }

    fn entry_for_root(entries: &[MountEntry], root: &Path) -> Option<MountEntry> {
        entries
            .iter()
            .find(|entry| entry.mount_point == root)
            .cloned()
    }

    /// Partition name → backing disk name: `sda1` → `sda`, `nvme0n1p2` →
    /// `nvme0n1`, `mmcblk0p1` → `mmcblk0`.
    fn disk_name(device: &str) -> Option<String> {
        let name = device.strip_prefix("/dev/")?;
        if let Some(position) = name.rfind('p') {
            let (disk, partition) = name.split_at(position);
            if disk.ends_with(|symbol: char| symbol.is_ascii_digit())
                && partition[1..].chars().all(|symbol| symbol.is_ascii_digit())
                && !partition[1..].is_empty()
            {
                return Some(disk.to_string());
            }
        }
        Some(name.trim_end_matches(|symbol: char| symbol.is_ascii_digit()).to_string())
    }

    async fn classify(&self, entry: &MountEntry) -> Result<MediaKind, Error> {
        if NETWORK_FILESYSTEMS.contains(&entry.fstype.as_str()) || entry.device.contains("://") {
            return Ok(MediaKind::Network);
        }
        let Some(disk) = Self::disk_name(&entry.device) else {
            return Ok(MediaKind::Unknown);
        };
        let removable_path = PathBuf::from(format!("/sys/block/{disk}/removable"));
        let flag = fs::read_to_string(&removable_path)
            .await
            .map_err(|err| IOError::ReadFileFailed {
                path: removable_path,
                source: err,
            })?;
        if flag.trim() == "1" {
            Ok(MediaKind::Removable)
        } else {
            Ok(MediaKind::Fixed)
        }
    }

    fn looks_external(mount_point: &Path) -> bool {
        let repr = mount_point.to_string_lossy();
        EXTERNAL_MOUNT_PREFIXES
            .iter()
            .any(|prefix| repr.starts_with(prefix))
    }
}

#[async_trait]
impl VolumeProbe for NativeVolumeProbe {
    fn volume_root(&self, path: &Path) -> PathBuf {
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let entries = Self::mounts_blocking();
        entries
            .iter()
            .filter(|entry| resolved.starts_with(&entry.mount_point))
            .max_by_key(|entry| entry.mount_point.as_os_str().len())
            .map(|entry| entry.mount_point.clone())
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    async fn media_kind(&self, root: &Path) -> Result<MediaKind, Error> {
        let probe = async {
            let entries = self.mounts().await?;
            match Self::entry_for_root(&entries, root) {
                Some(entry) => self.classify(&entry).await,
                None => Ok(MediaKind::Unknown),
            }
        };
        tokio::time::timeout(self.timeout, probe)
            .await
            .map_err(|_| {
                Error::from(IOError::ReadFileFailed {
                    path: root.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "volume classification timed out",
                    ),
                })
            })?
    }

    fn is_system_volume(&self, root: &Path) -> bool {
        root == Path::new("/")
    }

    async fn external_volumes(&self) -> Vec<PathBuf> {
        let Ok(entries) = self.mounts().await else {
            return Vec::new();
        };
        let mut volumes = Vec::new();
        for entry in &entries {
            if Self::looks_external(&entry.mount_point) {
                volumes.push(entry.mount_point.clone());
                continue;
            }
            if let Ok(MediaKind::Removable | MediaKind::Network) = self.classify(entry).await {
                volumes.push(entry.mount_point.clone());
            }
        }
        volumes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mount_table_lines() {
        let table = "/dev/sda1 / ext4 rw 0 0\n/dev/sdb1 /run/media/pos/USB\\040DRIVE vfat rw 0 0\n";
        let entries = NativeVolumeProbe::parse_mounts(table);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mount_point, PathBuf::from("/"));
        assert_eq!(entries[1].mount_point, PathBuf::from("/run/media/pos/USB DRIVE"));
        assert_eq!(entries[1].fstype, "vfat");
    }

    #[test]
    fn resolves_partition_to_disk() {
        assert_eq!(NativeVolumeProbe::disk_name("/dev/sda1").unwrap(), "sda");
        assert_eq!(NativeVolumeProbe::disk_name("/dev/nvme0n1p2").unwrap(), "nvme0n1");
        assert_eq!(NativeVolumeProbe::disk_name("/dev/mmcblk0p1").unwrap(), "mmcblk0");
        assert!(NativeVolumeProbe::disk_name("tmpfs").is_none());
    }

    #[test]
    fn external_prefixes_match_removable_mounts() {
        assert!(NativeVolumeProbe::looks_external(Path::new("/run/media/pos/usb")));
        assert!(NativeVolumeProbe::looks_external(Path::new("/mnt/backup")));
        assert!(!NativeVolumeProbe::looks_external(Path::new("/home/pos")));
    }
}
