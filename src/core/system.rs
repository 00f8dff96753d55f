use crate::core::backup::backup_engine::BackupEngine;
use crate::core::backup::destination_validator::DestinationValidator;
use crate::core::config_manager::ConfigManager;
use crate::core::database_manager::DatabaseManager;
use crate::core::location::location_registry::LocationRegistry;
use crate::core::schedule::scheduler_service::SchedulerService;
use crate::interface::notification::LogNotificationSink;
use crate::interface::volume_probe::VolumeProbe;
use crate::model::error::Error;
use crate::model::error::system::SystemError;
use crate::platform::NativeVolumeProbe;
use crate::utils::log_entry::system::SystemEntry;
use crate::utils::logging::Logging;
use chrono::FixedOffset;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub struct System {
    database_manager: Arc<DatabaseManager>,
    scheduler: Arc<SchedulerService>,
}

impl System {
    pub async fn initialize() -> Result<Self, Error> {
        Logging::initialize();
        info!("{}", SystemEntry::Initializing);
        ConfigManager::initialization();
        let config = ConfigManager::now();

        let database_manager = Arc::new(DatabaseManager::new(&config.data_file).await?);
        let probe: Arc<dyn VolumeProbe> = Arc::new(NativeVolumeProbe::new(
            Duration::from_secs(config.volume_probe_timeout),
        ));
        let data_dir = config
            .data_file
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let validator = Arc::new(DestinationValidator::new(data_dir, probe.clone()));
        let backup_engine = Arc::new(BackupEngine::new(
            database_manager.clone(),
            validator.clone(),
            config.data_file.clone(),
        ));
        let location_registry =
            Arc::new(LocationRegistry::new(database_manager.clone(), validator));
        let source_offset = FixedOffset::east_opt(config.source_utc_offset_minutes * 60)
            .ok_or(SystemError::InvalidConfig)?;
        let scheduler = Arc::new(SchedulerService::new(
            database_manager.clone(),
            backup_engine,
            location_registry,
            probe,
            Arc::new(LogNotificationSink),
            source_offset,
        ));
        scheduler.start().await?;
        info!("{}", SystemEntry::InitializeComplete);
        Ok(Self { database_manager, scheduler })
    }

    pub async fn run(&self) {
        info!("{}", SystemEntry::Online);
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for the shutdown signal");
        }
    }

    pub async fn terminate(&self) {
        info!("{}", SystemEntry::Terminating);
        self.scheduler.stop().await;
        self.database_manager.close_connection().await;
        info!("{}", SystemEntry::TerminateComplete);
    }
}
