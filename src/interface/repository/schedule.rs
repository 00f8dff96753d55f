use crate::core::database_manager::DatabaseManager;
use crate::model::error::Error;
use crate::model::error::database::DatabaseError;
use crate::model::schedule::{BackupSchedule, NewBackupSchedule, RunOutcome};
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

pub trait ScheduleRepository {
    async fn create_backup_schedule_table(&self) -> Result<(), Error>;
    async fn create_backup_schedule(
        &self,
        schedule: &NewBackupSchedule,
    ) -> Result<BackupSchedule, Error>;
    async fn update_backup_schedule(&self, schedule: &BackupSchedule) -> Result<(), Error>;
    async fn remove_backup_schedule(&self, id: i64) -> Result<(), Error>;
    async fn get_backup_schedule(&self, id: i64) -> Result<Option<BackupSchedule>, Error>;
    async fn get_all_backup_schedules(&self) -> Result<Vec<BackupSchedule>, Error>;
    /// Persists every field a finished run touches in a single statement.
    async fn record_run_outcome(&self, id: i64, outcome: &RunOutcome) -> Result<(), Error>;
    async fn set_rotation_order(&self, id: i64, order: i64) -> Result<(), Error>;
}

impl ScheduleRepository for DatabaseManager {
    async fn create_backup_schedule_table(&self) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            CREATE TABLE BackupSchedules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                schedule_type TEXT NOT NULL,
                schedule_config TEXT NOT NULL,
                destination_path TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_run_at TEXT,
                next_run_at TEXT,
                last_run_status TEXT,
                last_run_error TEXT,
                last_rotation_order INTEGER,
                created_by_id INTEGER,
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

    async fn create_backup_schedule(
        &self,
        schedule: &NewBackupSchedule,
    ) -> Result<BackupSchedule, Error> {
        let pool = self.get_pool().await?;
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO BackupSchedules (
                name,
                schedule_type,
                schedule_config,
                destination_path,
                is_active,
                created_by_id,
                created_at,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&schedule.name)
        .bind(
            serde_json::to_string(&schedule.schedule_type)
                .map_err(|_| DatabaseError::DataCorrupted)?,
        )
        .bind(
            serde_json::to_string(&schedule.config).map_err(|_| DatabaseError::DataCorrupted)?,
        )
        .bind(
            schedule
                .destination_path
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        )
        .bind(schedule.is_active)
        .bind(schedule.created_by_id)
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;

        let id = result.last_insert_rowid();
        Ok(BackupSchedule {
            id,
            name: schedule.name.clone(),
            schedule_type: schedule.schedule_type,
            config: schedule.config.clone(),
            destination_path: schedule.destination_path.clone(),
            is_active: schedule.is_active,
            last_run_at: None,
            next_run_at: None,
            last_run_status: None,
            last_run_error: None,
            last_rotation_order: None,
            created_by_id: schedule.created_by_id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_backup_schedule(&self, schedule: &BackupSchedule) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE BackupSchedules
            SET
                name = ?,
                schedule_type = ?,
                schedule_config = ?,
                destination_path = ?,
                is_active = ?,
                last_run_at = ?,
                next_run_at = ?,
                last_run_status = ?,
                last_run_error = ?,
                last_rotation_order = ?,
                created_by_id = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&schedule.name)
        .bind(
            serde_json::to_string(&schedule.schedule_type)
                .map_err(|_| DatabaseError::DataCorrupted)?,
        )
        .bind(
            serde_json::to_string(&schedule.config).map_err(|_| DatabaseError::DataCorrupted)?,
        )
        .bind(
            schedule
                .destination_path
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        )
        .bind(schedule.is_active)
        .bind(schedule.last_run_at)
        .bind(schedule.next_run_at)
        .bind(
            schedule
                .last_run_status
                .map(|status| serde_json::to_string(&status))
                .transpose()
                .map_err(|_| DatabaseError::DataCorrupted)?,
        )
        .bind(&schedule.last_run_error)
        .bind(schedule.last_rotation_order)
        .bind(schedule.created_by_id)
        .bind(Utc::now())
        .bind(schedule.id)
        .execute(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }

    async fn remove_backup_schedule(&self, id: i64) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        sqlx::query("DELETE FROM BackupScheduleLocations WHERE schedule_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        sqlx::query("DELETE FROM BackupSchedules WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        tx.commit()
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }

    async fn get_backup_schedule(&self, id: i64) -> Result<Option<BackupSchedule>, Error> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT * FROM BackupSchedules WHERE id = ?")
            .bind(id)
            .fetch_optional(&pool)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        row.map(|row| schedule_from_row(&row)).transpose()
    }

    async fn get_all_backup_schedules(&self) -> Result<Vec<BackupSchedule>, Error> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query("SELECT * FROM BackupSchedules ORDER BY id")
            .fetch_all(&pool)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        rows.iter().map(schedule_from_row).collect()
    }

    async fn record_run_outcome(&self, id: i64, outcome: &RunOutcome) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE BackupSchedules
            SET
                last_run_at = ?,
                last_run_status = ?,
                last_run_error = ?,
                next_run_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(outcome.last_run_at)
        .bind(
            serde_json::to_string(&outcome.status).map_err(|_| DatabaseError::DataCorrupted)?,
        )
        .bind(&outcome.error)
        .bind(outcome.next_run_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&pool)
        .await
        .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }

    async fn set_rotation_order(&self, id: i64, order: i64) -> Result<(), Error> {
        let pool = self.get_pool().await?;
        sqlx::query("UPDATE BackupSchedules SET last_rotation_order = ? WHERE id = ?")
            .bind(order)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(DatabaseError::StatementExecutionFailed)?;
        Ok(())
    }
}

fn schedule_from_row(row: &SqliteRow) -> Result<BackupSchedule, Error> {
    let schedule_type_str: String = row.get("schedule_type");
    let schedule_type =
        serde_json::from_str(&schedule_type_str).map_err(|_| DatabaseError::DataCorrupted)?;

    let config_str: String = row.get("schedule_config");
    let config = serde_json::from_str(&config_str).map_err(|_| DatabaseError::DataCorrupted)?;

    let status_str: Option<String> = row.get("last_run_status");
    let last_run_status = status_str
        .map(|status| serde_json::from_str(&status))
        .transpose()
        .map_err(|_| DatabaseError::DataCorrupted)?;

    Ok(BackupSchedule {
        id: row.get("id"),
        name: row.get("name"),
        schedule_type,
        config,
        destination_path: row
            .get::<Option<String>, _>("destination_path")
            .map(Into::into),
        is_active: row.get("is_active"),
        last_run_at: row.get("last_run_at"),
        next_run_at: row.get("next_run_at"),
        last_run_status,
        last_run_error: row.get("last_run_error"),
        last_rotation_order: row.get("last_rotation_order"),
        created_by_id: row.get("created_by_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
