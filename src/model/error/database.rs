use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to create database")]
    CreateDatabaseFailed(#[source] std::io::Error),

    #[error("Failed to connect to database")]
    DatabaseConnectFailed(#[source] sqlx::Error),

    #[error("Database connection is closed")]
    ConnectionClosed,

    #[error("Failed to execute SQL statement")]
    StatementExecutionFailed(#[source] sqlx::Error),

    #[error("Database record is corrupted")]
    DataCorrupted,
}
