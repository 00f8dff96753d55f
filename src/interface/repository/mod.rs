pub mod location;
pub mod schedule;
