use crate::model::config::{Config, ConfigTable};
use crate::utils::log_entry::system::SystemEntry;
use std::fs;
use std::sync::{OnceLock, RwLock};
use tracing::{error, info};

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// A UTC offset beyond 14 hours in either direction does not exist.
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

pub struct ConfigManager;

impl ConfigManager {
    pub fn initialization() {
        info!("{}", SystemEntry::Initializing);
        let config = Self::load_config();
        CONFIG.get_or_init(|| RwLock::new(config));
        info!("{}", SystemEntry::InitializeComplete);
    }

    fn load_config() -> Config {
        match fs::read_to_string("./config.toml") {
            Ok(toml_string) => match toml::from_str::<ConfigTable>(&toml_string) {
                Ok(config_table) => {
                    let config = config_table.config;
                    if !Self::validate(&config) {
                        error!("{}", SystemEntry::InvalidConfig);
                        panic!("{}", SystemEntry::InvalidConfig);
                    }
                    config
                }
                Err(_) => {
                    error!("{}", SystemEntry::InvalidConfig);
                    panic!("{}", SystemEntry::InvalidConfig);
                }
            },
            Err(_) => {
                error!("{}", SystemEntry::ConfigNotFound);
                panic!("{}", SystemEntry::ConfigNotFound);
            }
        }
    }

    fn validate(config: &Config) -> bool {
        !config.data_file.as_os_str().is_empty()
            && config.source_utc_offset_minutes.abs() <= MAX_UTC_OFFSET_MINUTES
            && config.volume_probe_timeout > 0
    }

    pub fn now() -> Config {
        // Initialization has been ensured
        let lock = CONFIG.get().unwrap();
        lock.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn base() -> Config {
        Config {
            data_file: PathBuf::from("./tillvault.db"),
            source_utc_offset_minutes: 0,
            volume_probe_timeout: 4,
        }
    }

    #[test]
    fn offsets_beyond_fourteen_hours_are_rejected() {
        let mut config = base();
        assert!(ConfigManager::validate(&config));
        config.source_utc_offset_minutes = 14 * 60;
        assert!(ConfigManager::validate(&config));
        config.source_utc_offset_minutes = 15 * 60;
        assert!(!ConfigManager::validate(&config));
        config.source_utc_offset_minutes = -15 * 60;
        assert!(!ConfigManager::validate(&config));
    }

    #[test]
    fn empty_data_file_is_rejected() {
        let mut config = base();
        config.data_file = PathBuf::new();
        assert!(!ConfigManager::validate(&config));
    }
}
