use crate::core::database_manager::DatabaseManager;
use crate::model::error::Error;
use crate::model::error::database::DatabaseError;
use crate::model::error::location::LocationError;
use crate::model::location::{BackupLocation, NewBackupLocation};
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

pub trait LocationRepository {
    async fn create_backup_location_table(&self) -> Result<(), Error>;
    async fn create_schedule_location_table(&self) -> Result<(), Error>;
    async fn create_backup_location(
        &self,
        location: &NewBackupLocation,
    ) -> Result<BackupLocation, Error>;
    async fn update_backup_location(&self, location: &BackupLocation) -> Result<(), Error>;
    /// Refuses to delete a location still referenced by any schedule.
    async fn remove_backup_location(&self, id: i64) -> Result<(), Error>;
    async fn get_backup_location(&self, id: i64) -> Result<Option<BackupLocation>, Error>;
    async fn get_all_backup_locations(&self) -> Result<Vec<BackupLocation>, Error>;
    /// Replaces the ordered location set of a schedule.
    async fn set_schedule_locations(
        &self,
        schedule_id: i64,
        entries: &[(i64, i64)],
    ) -> Result<(), Error>;
    /// Active locations joined to a schedule, as `(order, location)` pairs
    /// sorted by the join order.
    async fn get_schedule_location_entries(
        &self,
        schedule_id: i64,
    ) -> Result<Vec<(i64, BackupLocation)>, Error>;
}

impl LocationRepository for DatabaseManager {
    async fn create_backup_location_table(&self) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            CREATE TABLE BackupLocations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                path TEXT NOT NULL,
                config TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 0,
                max_backups INTEGER,
                created_by INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }

    async fn create_schedule_location_table(&self) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            CREATE TABLE BackupScheduleLocations (
                schedule_id INTEGER NOT NULL,
                location_id INTEGER NOT NULL,
                "order" INTEGER NOT NULL,
                PRIMARY KEY (schedule_id, location_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }

    async fn create_backup_location(
        &self,
        location: &NewBackupLocation,
    ) -> Result<BackupLocation, Error> {
        let pool = self.get_pool().await?;
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO BackupLocations (
                name, type, path, config, is_active, priority, max_backups,
                created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&location.name)
        .bind(
            serde_json::to_string(&location.location_type)
                .map_err(|_| DatabaseError::DataCorrupted)?,
        )
        .bind(location.path.to_string_lossy().to_string())
        .bind(
            location
                .config
                .as_ref()
                .map(|config| config.to_string()),
        )
        .bind(location.is_active)
        .bind(location.priority)
        .bind(location.max_backups)
        .bind(location.created_by)
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;

        Ok(BackupLocation {
            id: result.last_insert_rowid(),
            name: location.name.clone(),
            location_type: location.location_type,
            path: location.path.clone(),
            config: location.config.clone(),
            is_active: location.is_active,
            priority: location.priority,
            max_backups: location.max_backups,
            created_by: location.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_backup_location(&self, location: &BackupLocation) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE BackupLocations
            SET
                name = ?,
                type = ?,
                path = ?,
                config = ?,
                is_active = ?,
                priority = ?,
                max_backups = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&location.name)
        .bind(
            serde_json::to_string(&location.location_type)
                .map_err(|_| DatabaseError::DataCorrupted)?,
        )
        .bind(location.path.to_string_lossy().to_string())
        .bind(
            location
                .config
                .as_ref()
                .map(|config| config.to_string()),
        )
        .bind(location.is_active)
        .bind(location.priority)
        .bind(location.max_backups)
        .bind(Utc::now())
        .bind(location.id)
        .execute(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }

    async fn remove_backup_location(&self, id: i64) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        let references: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM BackupScheduleLocations WHERE location_id = ?",
        )
        .bind(id)
        .fetch_one(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;
        if references > 0 {
            Err(LocationError::StillReferenced { id })?
        }
        sqlx::query("DELETE FROM BackupLocations WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }

    async fn get_backup_location(&self, id: i64) -> Result<Option<BackupLocation>, Error> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT * FROM BackupLocations WHERE id = ?")
            .bind(id)
            .fetch_optional(&pool)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        row.map(|row| location_from_row(&row)).transpose()
    }

    async fn get_all_backup_locations(&self) -> Result<Vec<BackupLocation>, Error> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query("SELECT * FROM BackupLocations ORDER BY priority, id")
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        rows.iter().map(location_from_row).collect()
    }

    async fn set_schedule_locations(
        &self,
        schedule_id: i64,
        entries: &[(i64, i64)],
    ) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        sqlx::query("DELETE FROM BackupScheduleLocations WHERE schedule_id = ?")
            .bind(schedule_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        for (location_id, order) in entries {
            sqlx::query(
                r#"
                INSERT INTO BackupScheduleLocations (schedule_id, location_id, "order")
                VALUES (?, ?, ?)
                "#,
            )
            .bind(schedule_id)
            .bind(location_id)
            .bind(order)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        }
        tx.commit()
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }

    async fn get_schedule_location_entries(
        &self,
        schedule_id: i64,
    ) -> Result<Vec<(i64, BackupLocation)>, Error> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT join_table."order" AS join_order, location.*
            FROM BackupScheduleLocations join_table
            JOIN BackupLocations location ON location.id = join_table.location_id
            WHERE join_table.schedule_id = ? AND location.is_active = 1
            ORDER BY join_table."order"
            "#,
        )
        .bind(schedule_id)
        .fetch_all(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let order: i64 = row.get("join_order");
            entries.push((order, location_from_row(row)?));
        }
        Ok(entries)
    }
}

fn location_from_row(row: &SqliteRow) -> Result<BackupLocation, Error> {
    let type_str: String = row.get("type");
    let location_type = serde_json::from_str(&type_str)
        .map_err(|_| LocationError::UnknownType { value: type_str.clone() })?;

    let config_str: Option<String> = row.get("config");
    let config = config_str
        .map(|config| serde_json::from_str(&config))
        .transpose()
        .map_err(|_| DatabaseError::DataCorrupted)?;

    Ok(BackupLocation {
        id: row.get("id"),
        name: row.get("name"),
        location_type,
        path: row.get::<String, _>("path").into(),
        config,
        is_active: row.get("is_active"),
        priority: row.get("priority"),
        max_backups: row.get("max_backups"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
