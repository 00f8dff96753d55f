use crate::model::error::Error;
use crate::model::error::database::DatabaseError;
use crate::utils::log_entry::system::SystemEntry;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::fs::File;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug)]
pub struct DatabaseManager {
    path: PathBuf,
    pool: RwLock<Option<SqlitePool>>,
}

impl DatabaseManager {
    pub async fn new(path: &Path) -> Result<Self, Error> {
        info!("{}", SystemEntry::Initializing);
        if !Self::exist_database(path).await {
            Self::create_database(path).await?;
        }
        let pool = Self::connect(path).await?;
        info!("{}", SystemEntry::DatabaseConnectSuccess);
        let database_manager = Self {
            path: path.to_path_buf(),
            pool: RwLock::new(Some(pool)),
        };
        database_manager.create_missing_tables().await?;
        info!("{}", SystemEntry::InitializeComplete);
        Ok(database_manager)
    }

    async fn connect(path: &Path) -> Result<SqlitePool, Error> {
        let url = format!("sqlite://{}", path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(DatabaseError::DatabaseConnectFailed)?;
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(pool)
    }

    pub async fn get_pool(&self) -> Result<SqlitePool, Error> {
        let guard = self.pool.read().await;
        guard.clone().ok_or_else(|| DatabaseError::ConnectionClosed.into())
    }

    /// Closes the live handle. Restore relies on this running to completion
    /// before the data file is replaced.
    pub async fn close_connection(&self) {
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            info!("{}", SystemEntry::DatabaseClosed);
        }
    }

    pub async fn reopen(&self) -> Result<(), Error> {
        let pool = Self::connect(&self.path).await?;
        *self.pool.write().await = Some(pool);
        info!("{}", SystemEntry::DatabaseConnectSuccess);
        Ok(())
    }

    pub async fn exist_database(path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }

    pub async fn create_database(path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(DatabaseError::CreateDatabaseFailed)?;
            }
        }
        let _ = File::create(path)
            .await
            .map_err(DatabaseError::CreateDatabaseFailed)?;
        Ok(())
    }

    pub async fn exist_table(&self, table_name: &str) -> bool {
        let Ok(pool) = self.get_pool().await else {
            return false;
        };
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
        )
        .bind(table_name)
        .fetch_one(&pool)
        .await
        .unwrap_or(false)
    }

    async fn create_missing_tables(&self) -> Result<(), Error> {
        use crate::interface::repository::location::LocationRepository;
        use crate::interface::repository::schedule::ScheduleRepository;

        if !self.exist_table("BackupSchedules").await {
            self.create_backup_schedule_table().await?;
        }
        if !self.exist_table("BackupLocations").await {
            self.create_backup_location_table().await?;
        }
        if !self.exist_table("BackupScheduleLocations").await {
            self.create_schedule_location_table().await?;
        }
        Ok(())
    }
}
