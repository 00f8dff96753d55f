use crate::define_log_entries;

define_log_entries! {
    ScheduleEntry {
        #[error("Schedule timer registered")]
        TimerRegistered: tracing::Level::INFO,

        #[error("Schedule timer stopped")]
        TimerStopped: tracing::Level::INFO,

        #[error("Scheduled backup run started")]
        RunStarted: tracing::Level::INFO,

        #[error("Scheduled backup run succeeded")]
        RunSucceeded: tracing::Level::INFO,

        #[error("Scheduled backup run failed")]
        RunFailed: tracing::Level::ERROR,

        #[error("Scheduled backup run skipped")]
        RunSkipped: tracing::Level::WARN,

        #[error("Overlapping fire ignored, previous run still in flight")]
        OverlappingFire: tracing::Level::WARN,
    }
}
