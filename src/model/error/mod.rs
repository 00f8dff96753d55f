pub mod backup;
pub mod database;
pub mod io;
pub mod location;
pub mod schedule;
pub mod system;

use crate::model::error::backup::BackupError;
use crate::model::error::database::DatabaseError;
use crate::model::error::io::IOError;
use crate::model::error::location::LocationError;
use crate::model::error::schedule::ScheduleError;
use crate::model::error::system::SystemError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Backup(BackupError),
    #[error(transparent)]
    Database(DatabaseError),
    #[error(transparent)]
    IO(IOError),
    #[error(transparent)]
    Location(LocationError),
    #[error(transparent)]
    Schedule(ScheduleError),
    #[error(transparent)]
    System(SystemError),
}

impl Error {
    /// Environment errors mean "retry at the next cadence"; the scheduler
    /// records them as skipped runs instead of failures.
    pub fn is_environment(&self) -> bool {
        matches!(self, Error::Backup(BackupError::NoExternalDrive))
    }
}

impl From<BackupError> for Error {
    fn from(error: BackupError) -> Self {
        Self::Backup(error)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Self {
        Self::Database(error)
    }
}

impl From<IOError> for Error {
    fn from(error: IOError) -> Self {
        Self::IO(error)
    }
}

impl From<LocationError> for Error {
    fn from(error: LocationError) -> Self {
        Self::Location(error)
    }
}

impl From<ScheduleError> for Error {
    fn from(error: ScheduleError) -> Self {
        Self::Schedule(error)
    }
}

impl From<SystemError> for Error {
    fn from(error: SystemError) -> Self {
        Self::System(error)
    }
}
