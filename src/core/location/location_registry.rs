use crate::core::backup::destination_validator::DestinationValidator;
use crate::core::database_manager::DatabaseManager;
use crate::interface::repository::location::LocationRepository;
use crate::interface::repository::schedule::ScheduleRepository;
use crate::model::error::Error;
use crate::model::error::location::LocationError;
use crate::model::error::schedule::ScheduleError;
use crate::model::location::{
    BackupLocation, LocationType, LocationValidation, NewBackupLocation,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

pub struct LocationRegistry {
    database_manager: Arc<DatabaseManager>,
    validator: Arc<DestinationValidator>,
}

impl LocationRegistry {
    pub fn new(
        database_manager: Arc<DatabaseManager>,
        validator: Arc<DestinationValidator>,
    ) -> Self {
        Self { database_manager, validator }
    }

    pub async fn create_location(
        &self,
        location: &NewBackupLocation,
    ) -> Result<BackupLocation, Error> {
        self.database_manager.create_backup_location(location).await
    }

    pub async fn update_location(&self, location: &BackupLocation) -> Result<(), Error> {
        self.database_manager.update_backup_location(location).await
    }

    pub async fn remove_location(&self, id: i64) -> Result<(), Error> {
        self.database_manager.remove_backup_location(id).await
    }

    pub async fn get_location(&self, id: i64) -> Result<BackupLocation, Error> {
        self.database_manager
            .get_backup_location(id)
            .await?
            .ok_or_else(|| LocationError::NotFound { id }.into())
    }

    pub async fn get_all_locations(&self) -> Result<Vec<BackupLocation>, Error> {
        self.database_manager.get_all_backup_locations().await
    }

    pub async fn set_schedule_locations(
        &self,
        schedule_id: i64,
        entries: &[(i64, i64)],
    ) -> Result<(), Error> {
        self.database_manager
            .set_schedule_locations(schedule_id, entries)
            .await
    }

    pub async fn schedule_location_count(&self, schedule_id: i64) -> Result<usize, Error> {
        Ok(self
            .database_manager
            .get_schedule_location_entries(schedule_id)
            .await?
            .len())
    }

    /// Type-specific checks, recovered into a `{valid, message}` result the
    /// caller branches on.
    pub async fn validate_location(
        &self,
        location_type: LocationType,
        path: &Path,
        config: Option<&Value>,
    ) -> LocationValidation {
        match location_type {
            LocationType::ExternalDrive => {
                match self.validator.validate_external_drive(path).await {
                    Ok(()) => LocationValidation::ok("External drive is reachable and writable"),
                    Err(err) => LocationValidation::rejected(err.to_string()),
                }
            }
            LocationType::Local => match self.validator.probe_write(path).await {
                Ok(()) => LocationValidation::ok("Local path is writable"),
                Err(err) => LocationValidation::rejected(err.to_string()),
            },
            LocationType::Network => {
                let repr = path.to_string_lossy();
                if repr.starts_with(r"\\") || repr.starts_with("//") {
                    LocationValidation::ok("Network path looks like a UNC share")
                } else {
                    LocationValidation::rejected(
                        "Network location requires a UNC-style path (\\\\server\\share)",
                    )
                }
            }
            LocationType::Cloud => {
                let provider = config
                    .and_then(|config| config.get("provider"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if provider.is_empty() {
                    LocationValidation::rejected(
                        "Cloud location requires a provider in its configuration",
                    )
                } else {
                    LocationValidation::ok(format!("Cloud provider '{provider}' configured"))
                }
            }
        }
    }

    /// Round-robin over the schedule's ordered locations: advance past the
    /// most recently used join order, wrapping to the first entry. `None`
    /// means the schedule has no configured locations and the caller should
    /// fall back to the legacy single destination.
    pub async fn next_rotation_location(
        &self,
        schedule_id: i64,
    ) -> Result<Option<BackupLocation>, Error> {
        let entries = self
            .database_manager
            .get_schedule_location_entries(schedule_id)
            .await?;
        if entries.is_empty() {
            return Ok(None);
        }
        let schedule = self
            .database_manager
            .get_backup_schedule(schedule_id)
            .await?
            .ok_or(ScheduleError::NotFound { id: schedule_id })?;

        let (order, location) = match schedule.last_rotation_order {
            Some(last) => entries
                .iter()
                .find(|(order, _)| *order > last)
                .unwrap_or(&entries[0]),
            None => &entries[0],
        };
        self.database_manager
            .set_rotation_order(schedule_id, *order)
            .await?;
        Ok(Some(location.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schedule::{NewBackupSchedule, ScheduleConfig, ScheduleType};
    use crate::test_support::FakeProbe;
    use std::path::PathBuf;

    async fn registry_in(dir: &Path) -> (LocationRegistry, Arc<DatabaseManager>) {
        let database_manager =
            Arc::new(DatabaseManager::new(&dir.join("store.db")).await.unwrap());
        let validator = Arc::new(DestinationValidator::new(
            dir.join("data"),
            Arc::new(FakeProbe::fixed()),
        ));
        (
            LocationRegistry::new(database_manager.clone(), validator),
            database_manager,
        )
    }

    fn new_location(name: &str, priority: i64) -> NewBackupLocation {
        NewBackupLocation {
            name: name.to_string(),
            location_type: LocationType::ExternalDrive,
            path: PathBuf::from(format!("/drives/{name}")),
            config: None,
            is_active: true,
            priority,
            max_backups: None,
            created_by: None,
        }
    }

    async fn schedule_with_locations(
        registry: &LocationRegistry,
        database_manager: &DatabaseManager,
        count: usize,
    ) -> i64 {
        let schedule = database_manager
            .create_backup_schedule(&NewBackupSchedule {
                name: "nightly".to_string(),
                schedule_type: ScheduleType::Daily,
                config: ScheduleConfig::default(),
                destination_path: None,
                is_active: true,
                created_by_id: None,
            })
            .await
            .unwrap();
        let mut entries = Vec::new();
        for index in 0..count {
            let location = registry
                .create_location(&new_location(&format!("drive{index}"), index as i64))
                .await
                .unwrap();
            entries.push((location.id, index as i64));
        }
        registry
            .set_schedule_locations(schedule.id, &entries)
            .await
            .unwrap();
        schedule.id
    }

    #[tokio::test]
    async fn rotation_cycles_in_join_order_and_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, database_manager) = registry_in(dir.path()).await;
        let schedule_id =
            schedule_with_locations(&registry, &database_manager, 3).await;

        let mut seen = Vec::new();
        for _ in 0..4 {
            let location = registry
                .next_rotation_location(schedule_id)
                .await
                .unwrap()
                .unwrap();
            seen.push(location.name);
        }
        assert_eq!(seen, ["drive0", "drive1", "drive2", "drive0"]);
    }

    #[tokio::test]
    async fn rotation_is_empty_without_configured_locations() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, database_manager) = registry_in(dir.path()).await;
        let schedule_id =
            schedule_with_locations(&registry, &database_manager, 0).await;
        assert!(registry
            .next_rotation_location(schedule_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn referenced_location_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, database_manager) = registry_in(dir.path()).await;
        let schedule_id =
            schedule_with_locations(&registry, &database_manager, 1).await;
        let entries = database_manager
            .get_schedule_location_entries(schedule_id)
            .await
            .unwrap();
        let location_id = entries[0].1.id;

        let result = registry.remove_location(location_id).await;
        assert!(matches!(
            result,
            Err(Error::Location(LocationError::StillReferenced { .. }))
        ));

        registry
            .set_schedule_locations(schedule_id, &[])
            .await
            .unwrap();
        registry.remove_location(location_id).await.unwrap();
    }

    #[tokio::test]
    async fn network_validation_requires_unc_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = registry_in(dir.path()).await;

        let rejected = registry
            .validate_location(LocationType::Network, Path::new("/srv/backups"), None)
            .await;
        assert!(!rejected.valid);

        let accepted = registry
            .validate_location(LocationType::Network, Path::new(r"\\nas\pos-backups"), None)
            .await;
        assert!(accepted.valid);
    }

    #[tokio::test]
    async fn cloud_validation_requires_a_provider() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = registry_in(dir.path()).await;

        let missing = registry
            .validate_location(LocationType::Cloud, Path::new("bucket/prefix"), None)
            .await;
        assert!(!missing.valid);

        let config = serde_json::json!({ "provider": "s3" });
        let present = registry
            .validate_location(LocationType::Cloud, Path::new("bucket/prefix"), Some(&config))
            .await;
        assert!(present.valid);
    }
}
