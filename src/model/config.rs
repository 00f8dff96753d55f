use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct ConfigTable {
    #[serde(rename = "Config")]
    pub config: Config,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Primary SQLite data file of the product.
    pub data_file: PathBuf,
    /// Fixed source timezone, as an offset from UTC in minutes. Schedule
    /// times of day are interpreted in this timezone.
    pub source_utc_offset_minutes: i32,
    /// Upper bound on the OS volume media-type query, in seconds.
    pub volume_probe_timeout: u64,
}
