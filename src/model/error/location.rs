use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Backup location not found: {id}")]
    NotFound { id: i64 },

    #[error("Location {id} is still referenced by a schedule")]
    StillReferenced { id: i64 },

    #[error("Unknown location type: {value}")]
    UnknownType { value: String },
}
