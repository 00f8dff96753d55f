use crate::interface::volume_probe::{MediaKind, VolumeProbe};
use crate::model::error::Error;
use crate::model::error::io::IOError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf, Prefix};
use std::time::Duration;
use tokio::process::Command;

// Win32 drive types as reported by Win32_LogicalDisk.DriveType.
const DRIVE_TYPE_REMOVABLE: u32 = 2;
const DRIVE_TYPE_FIXED: u32 = 3;
const DRIVE_TYPE_NETWORK: u32 = 4;

/// Drive-letter / UNC probe. Media classification shells out to PowerShell,
/// bounded by the configured timeout.
pub struct NativeVolumeProbe {
    timeout: Duration,
}

impl NativeVolumeProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn drive_letter(root: &Path) -> Option<char> {
        match root.components().next()? {
            Component::Prefix(prefix) => match prefix.kind() {
                Prefix::Disk(letter) | Prefix::VerbatimDisk(letter) => {
                    Some(letter.to_ascii_uppercase() as char)
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn is_unc(root: &Path) -> bool {
        matches!(
            root.components().next(),
            Some(Component::Prefix(prefix))
                if matches!(prefix.kind(), Prefix::UNC(..) | Prefix::VerbatimUNC(..))
        )
    }

    async fn query_drive_type(&self, letter: char) -> Result<u32, Error> {
        let filter = format!("DeviceID='{letter}:'");
        let command = format!(
            "(Get-CimInstance Win32_LogicalDisk -Filter \"{filter}\").DriveType"
        );
        let output = tokio::time::timeout(
            self.timeout,
            Command::new("powershell")
                .args(["-NoProfile", "-Command", &command])
                .output(),
        )
        .await
        .map_err(|_| {
            Error::from(IOError::ReadFileFailed {
                path: PathBuf::from(format!("{letter}:\\")),
                source: std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "volume classification timed out",
                ),
            })
        })?
        .map_err(|err| IOError::ReadFileFailed {
            path: PathBuf::from(format!("{letter}:\\")),
            source: err,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<u32>()
            .map_err(|_| {
                Error::from(IOError::ReadFileFailed {
                    path: PathBuf::from(format!("{letter}:\\")),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "unexpected drive type output",
                    ),
                })
            })
    }

    fn system_drive() -> PathBuf {
        std::env::var("SystemDrive")
            .map(|drive| PathBuf::from(format!("{drive}\\")))
            .unwrap_or_else(|_| PathBuf::from("C:\\"))
    }
}

#[async_trait]
impl VolumeProbe for NativeVolumeProbe {
    fn volume_root(&self, path: &Path) -> PathBuf {
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut components = resolved.components();
        match components.next() {
            Some(Component::Prefix(prefix)) => {
                let mut root = PathBuf::from(prefix.as_os_str());
                root.push("\\");
                root
            }
            _ => Self::system_drive(),
        }
    }

    async fn media_kind(&self, root: &Path) -> Result<MediaKind, Error> {
        if Self::is_unc(root) {
            return Ok(MediaKind::Network);
        }
        let Some(letter) = Self::drive_letter(root) else {
            return Ok(MediaKind::Unknown);
        };
        match self.query_drive_type(letter).await? {
            DRIVE_TYPE_REMOVABLE => Ok(MediaKind::Removable),
            DRIVE_TYPE_NETWORK => Ok(MediaKind::Network),
            DRIVE_TYPE_FIXED => Ok(MediaKind::Fixed),
            _ => Ok(MediaKind::Unknown),
        }
    }

    fn is_system_volume(&self, root: &Path) -> bool {
        root.as_os_str().eq_ignore_ascii_case(Self::system_drive().as_os_str())
    }

    async fn external_volumes(&self) -> Vec<PathBuf> {
        let system_root = Self::system_drive();
        let mut volumes = Vec::new();
        for letter in b'A'..=b'Z' {
            let root = PathBuf::from(format!("{}:\\", letter as char));
            if root.as_os_str().eq_ignore_ascii_case(system_root.as_os_str()) {
                continue;
            }
            if !root.exists() {
                continue;
            }
            match self.media_kind(&root).await {
                Ok(MediaKind::Removable | MediaKind::Network) => volumes.push(root),
                Ok(_) => {}
                // Reachable but unclassifiable: keep it as a candidate.
                Err(_) => volumes.push(root),
            }
        }
        volumes
    }
}
