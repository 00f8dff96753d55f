use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Timing fields of a schedule. `time` is "HH:mm" in the fixed source
/// timezone; `cron_expression` is only read for the custom type.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    /// 0 = Sunday through 6 = Saturday.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackupSchedule {
    pub id: i64,
    pub name: String,
    pub schedule_type: ScheduleType,
    pub config: ScheduleConfig,
    /// Legacy single destination, used when no locations are joined.
    pub destination_path: Option<PathBuf>,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<RunStatus>,
    pub last_run_error: Option<String>,
    /// Round-robin cursor: the join `order` used by the most recent run.
    pub last_rotation_order: Option<i64>,
    pub created_by_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBackupSchedule {
    pub name: String,
    pub schedule_type: ScheduleType,
    pub config: ScheduleConfig,
    pub destination_path: Option<PathBuf>,
    pub is_active: bool,
    pub created_by_id: Option<i64>,
}

/// Everything a finished run writes back, persisted in one UPDATE.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub error: Option<String>,
    pub last_run_at: DateTime<Utc>,
    pub next_run_at: Option<DateTime<Utc>>,
}
