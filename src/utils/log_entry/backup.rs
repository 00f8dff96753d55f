use crate::define_log_entries;

define_log_entries! {
    BackupEntry {
        #[error("Backup artifact created")]
        BackupCreated: tracing::Level::INFO,

        #[error("Side file backup failed, continuing without it")]
        SideFileSkipped: tracing::Level::WARN,

        #[error("Backup verification started")]
        VerifyStarted: tracing::Level::DEBUG,

        #[error("Restore completed")]
        RestoreComplete: tracing::Level::INFO,

        #[error("Retention pruning removed old artifacts")]
        RetentionPruned: tracing::Level::INFO,
    }
}
