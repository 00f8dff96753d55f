use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Invalid configuration")]
    InvalidConfig,

    #[error("Worker thread panicked")]
    ThreadPanic(#[source] tokio::task::JoinError),
}
