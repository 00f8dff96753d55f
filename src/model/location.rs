use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    ExternalDrive,
    Local,
    Network,
    Cloud,
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationType::ExternalDrive => write!(f, "external_drive"),
            LocationType::Local => write!(f, "local"),
            LocationType::Network => write!(f, "network"),
            LocationType::Cloud => write!(f, "cloud"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupLocation {
    pub id: i64,
    pub name: String,
    pub location_type: LocationType,
    pub path: PathBuf,
    /// Type-specific settings, e.g. `{"provider": "s3"}` for cloud.
    pub config: Option<serde_json::Value>,
    pub is_active: bool,
    /// Ascending priority places the location earlier in rotation.
    pub priority: i64,
    /// Retention cap; oldest artifacts beyond this are pruned after a run.
    pub max_backups: Option<u32>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBackupLocation {
    pub name: String,
    pub location_type: LocationType,
    pub path: PathBuf,
    pub config: Option<serde_json::Value>,
    pub is_active: bool,
    pub priority: i64,
    pub max_backups: Option<u32>,
    pub created_by: Option<i64>,
}

/// Validation is recovered locally into a result the caller branches on,
/// never surfaced as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationValidation {
    pub valid: bool,
    pub message: String,
}

impl LocationValidation {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { valid: true, message: message.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { valid: false, message: message.into() }
    }
}
