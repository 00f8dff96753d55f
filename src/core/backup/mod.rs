pub mod backup_engine;
pub mod destination_validator;
