use crate::model::error::Error;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Fixed,
    Removable,
    Network,
    Unknown,
}

/// Platform-specific volume classification. The OS query behind
/// `media_kind` must be time-bounded; callers fall back to topology when it
/// fails, so a slow or missing probe degrades instead of hanging the
/// scheduler.
#[async_trait]
pub trait VolumeProbe: Send + Sync {
    /// Root of the volume holding `path`: drive letter or UNC share on
    /// Windows, longest matching mount point elsewhere.
    fn volume_root(&self, path: &Path) -> PathBuf;

    /// Media classification of the volume rooted at `root`.
    async fn media_kind(&self, root: &Path) -> Result<MediaKind, Error>;

    /// Whether `root` is the system/boot volume.
    fn is_system_volume(&self, root: &Path) -> bool;

    /// Mount points of external volumes currently reachable.
    async fn external_volumes(&self) -> Vec<PathBuf>;
}
