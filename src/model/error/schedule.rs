use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Backup schedule not found: {id}")]
    NotFound { id: i64 },

    #[error("Invalid time of day: {value}")]
    InvalidTime { value: String },

    #[error("Invalid cron expression: {value}")]
    InvalidCronExpression { value: String },

    #[error("Custom schedule is missing a cron expression")]
    MissingCronExpression,

    #[error("Schedule is already running")]
    AlreadyRunning,
}
