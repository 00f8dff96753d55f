pub mod file_hash;
pub mod log_entry;
pub mod logging;
