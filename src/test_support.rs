//! Shared doubles for unit tests.

use crate::interface::notification::NotificationSink;
use crate::interface::volume_probe::{MediaKind, VolumeProbe};
use crate::model::error::Error;
use crate::model::error::backup::BackupError;
use crate::model::notification::Notification;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// When `roots` is set, the volume root of a path is its longest matching
/// entry; otherwise paths are rooted at their first two components, so
/// `/data/...` and `/backup/...` land on different "volumes".
pub struct FakeProbe {
    pub roots: Vec<PathBuf>,
    pub media: Result<MediaKind, ()>,
    pub system_root: PathBuf,
    pub externals: Vec<PathBuf>,
}

impl FakeProbe {
    pub fn fixed() -> Self {
        Self {
            roots: Vec::new(),
            media: Ok(MediaKind::Fixed),
            system_root: PathBuf::from("/"),
            externals: Vec::new(),
        }
    }

    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots, ..Self::fixed() }
    }
}

#[async_trait]
impl VolumeProbe for FakeProbe {
    fn volume_root(&self, path: &Path) -> PathBuf {
        if let Some(root) = self
            .roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.as_os_str().len())
        {
            return root.clone();
        }
        path.components().take(2).collect()
    }

    async fn media_kind(&self, _root: &Path) -> Result<MediaKind, Error> {
        self.media.map_err(|_| Error::from(BackupError::NoExternalDrive))
    }

    fn is_system_volume(&self, root: &Path) -> bool {
        root == self.system_root
    }

    async fn external_volumes(&self) -> Vec<PathBuf> {
        self.externals.clone()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: Notification) {
        self.delivered.lock().unwrap().push(notification);
    }
}
