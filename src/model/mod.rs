pub mod backup;
pub mod config;
pub mod error;
pub mod location;
pub mod notification;
pub mod schedule;
