use crate::define_log_entries;

define_log_entries! {
    SystemEntry {
        #[error("Online now")]
        Online: tracing::Level::INFO,

        #[error("Initializing")]
        Initializing: tracing::Level::INFO,

        #[error("Initialization completed")]
        InitializeComplete: tracing::Level::INFO,

        #[error("Termination in process")]
        Terminating: tracing::Level::INFO,

        #[error("Termination completed")]
        TerminateComplete: tracing::Level::INFO,

        #[error("Invalid configuration")]
        InvalidConfig: tracing::Level::ERROR,

        #[error("Configuration not found")]
        ConfigNotFound: tracing::Level::ERROR,

        #[error("Database connected")]
        DatabaseConnectSuccess: tracing::Level::INFO,

        #[error("Database connection closed")]
        DatabaseClosed: tracing::Level::INFO,
    }
}
