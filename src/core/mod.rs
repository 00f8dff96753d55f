pub mod backup;
pub mod config_manager;
pub mod database_manager;
pub mod location;
pub mod schedule;
pub mod system;
