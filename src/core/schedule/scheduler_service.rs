use crate::core::backup::backup_engine::BackupEngine;
use crate::core::database_manager::DatabaseManager;
use crate::core::location::location_registry::LocationRegistry;
use crate::core::schedule::trigger::{LocalTrigger, build_local_trigger, calculate_next_run};
use crate::interface::notification::NotificationSink;
use crate::interface::repository::schedule::ScheduleRepository;
use crate::interface::volume_probe::VolumeProbe;
use crate::model::error::Error;
use crate::model::error::backup::BackupError;
use crate::model::error::schedule::ScheduleError;
use crate::model::error::system::SystemError;
use crate::model::notification::{Notification, NotificationKind, NotificationPriority};
use crate::model::schedule::{BackupSchedule, NewBackupSchedule, RunOutcome, RunStatus};
use crate::utils::log_entry::schedule::ScheduleEntry;
use chrono::{FixedOffset, Local, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::select;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

struct TimerHandle {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    in_flight: Arc<AtomicBool>,
}

/// Owns one timer task per active schedule. Each timer sleeps until the next
/// local occurrence of its trigger, runs the backup inline, and loops;
/// dropping the handle's shutdown sender ends the task at the next wakeup,
/// sending on it ends it immediately.
pub struct SchedulerService {
    database_manager: Arc<DatabaseManager>,
    backup_engine: Arc<BackupEngine>,
    location_registry: Arc<LocationRegistry>,
    volume_probe: Arc<dyn VolumeProbe>,
    notifier: Arc<dyn NotificationSink>,
    source_offset: FixedOffset,
    timers: DashMap<i64, TimerHandle>,
}

impl SchedulerService {
    pub fn new(
        database_manager: Arc<DatabaseManager>,
        backup_engine: Arc<BackupEngine>,
        location_registry: Arc<LocationRegistry>,
        volume_probe: Arc<dyn VolumeProbe>,
        notifier: Arc<dyn NotificationSink>,
        source_offset: FixedOffset,
    ) -> Self {
        Self {
            database_manager,
            backup_engine,
            location_registry,
            volume_probe,
            notifier,
            source_offset,
            timers: DashMap::new(),
        }
    }

    /// Registers timers for every active schedule. Schedules that fail to
    /// register (for example an unparsable stored cron expression) are
    /// logged and skipped so one bad row cannot block startup.
    pub async fn start(&self) -> Result<(), Error> {
        for schedule in self.database_manager.get_all_backup_schedules().await? {
            if !schedule.is_active {
                continue;
            }
            if let Err(err) = self.schedule_backup(&schedule).await {
                error!(schedule_id = schedule.id, error = %err, "failed to register schedule timer");
            }
        }
        Ok(())
    }

    /// Stops every timer and waits for the tasks to wind down.
    pub async fn stop(&self) {
        let ids: Vec<i64> = self.timers.iter().map(|entry| *entry.key()).collect();
        let mut handles = Vec::new();
        for id in ids {
            if let Some((_, timer)) = self.timers.remove(&id) {
                let _ = timer.shutdown.send(());
                handles.push(timer.handle);
            }
        }
        for result in futures::future::join_all(handles).await {
            if let Err(err) = result {
                error!("{}", SystemError::ThreadPanic(err));
            }
        }
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Registers (or re-registers) the timer for one schedule and persists a
    /// freshly computed next-run estimate.
    pub async fn schedule_backup(&self, schedule: &BackupSchedule) -> Result<(), Error> {
        self.unschedule_backup(schedule.id).await;
        if !schedule.is_active {
            return Ok(());
        }
        let trigger =
            build_local_trigger(schedule.schedule_type, &schedule.config, self.source_offset)?;

        let in_flight = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let runner = self.runner_for(schedule.id, in_flight.clone());
        let handle = tokio::spawn(runner.run(trigger, shutdown_rx));
        self.timers.insert(
            schedule.id,
            TimerHandle { shutdown: shutdown_tx, handle, in_flight },
        );
        info!(schedule_id = schedule.id, "{}", ScheduleEntry::TimerRegistered);

        let mut updated = schedule.clone();
        updated.next_run_at = Some(calculate_next_run(
            schedule.schedule_type,
            &schedule.config,
            self.source_offset,
            Utc::now(),
        )?);
        self.database_manager.update_backup_schedule(&updated).await
    }

    /// Stops the schedule's timer if one is registered. Returns whether a
    /// timer existed.
    pub async fn unschedule_backup(&self, id: i64) -> bool {
        let Some((_, timer)) = self.timers.remove(&id) else {
            return false;
        };
        let _ = timer.shutdown.send(());
        let _ = timer.handle.await;
        info!(schedule_id = id, "{}", ScheduleEntry::TimerStopped);
        true
    }

    pub async fn create_schedule(
        &self,
        new: &NewBackupSchedule,
    ) -> Result<BackupSchedule, Error> {
        let schedule = self.database_manager.create_backup_schedule(new).await?;
        if schedule.is_active {
            self.schedule_backup(&schedule).await?;
        }
        self.database_manager
            .get_backup_schedule(schedule.id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound { id: schedule.id }.into())
    }

    pub async fn update_schedule(&self, schedule: &BackupSchedule) -> Result<(), Error> {
        self.database_manager.update_backup_schedule(schedule).await?;
        self.schedule_backup(schedule).await
    }

    pub async fn set_schedule_active(&self, id: i64, active: bool) -> Result<(), Error> {
        let mut schedule = self
            .database_manager
            .get_backup_schedule(id)
            .await?
            .ok_or(ScheduleError::NotFound { id })?;
        schedule.is_active = active;
        self.update_schedule(&schedule).await
    }

    pub async fn remove_schedule(&self, id: i64) -> Result<(), Error> {
        self.unschedule_backup(id).await;
        self.database_manager.remove_backup_schedule(id).await
    }

    /// Runs a schedule immediately, outside its timer. Refused while a run
    /// for the same schedule is in flight.
    pub async fn trigger_backup(&self, id: i64) -> Result<(), Error> {
        let in_flight = self
            .timers
            .get(&id)
            .map(|timer| timer.in_flight.clone())
            .unwrap_or_default();
        if in_flight.swap(true, Ordering::SeqCst) {
            Err(ScheduleError::AlreadyRunning)?
        }
        self.runner_for(id, in_flight.clone()).execute().await;
        in_flight.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn runner_for(&self, schedule_id: i64, in_flight: Arc<AtomicBool>) -> ScheduleRunner {
        ScheduleRunner {
            schedule_id,
            database_manager: self.database_manager.clone(),
            backup_engine: self.backup_engine.clone(),
            location_registry: self.location_registry.clone(),
            volume_probe: self.volume_probe.clone(),
            notifier: self.notifier.clone(),
            source_offset: self.source_offset,
            in_flight,
        }
    }
}

/// Detached per-schedule worker. Holds its own handles so the timer task is
/// independent of the service's lifetime.
struct ScheduleRunner {
    schedule_id: i64,
    database_manager: Arc<DatabaseManager>,
    backup_engine: Arc<BackupEngine>,
    location_registry: Arc<LocationRegistry>,
    volume_probe: Arc<dyn VolumeProbe>,
    notifier: Arc<dyn NotificationSink>,
    source_offset: FixedOffset,
    in_flight: Arc<AtomicBool>,
}

impl ScheduleRunner {
    async fn run(self, trigger: LocalTrigger, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let now = Local::now();
            let Some(next) = trigger.next_occurrence(&now) else {
                warn!(schedule_id = self.schedule_id, "trigger has no upcoming occurrence");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep(wait) => {}
            }
            if self.in_flight.swap(true, Ordering::SeqCst) {
                warn!(schedule_id = self.schedule_id, "{}", ScheduleEntry::OverlappingFire);
                continue;
            }
            self.execute().await;
            self.in_flight.store(false, Ordering::SeqCst);
        }
    }

    /// One complete run: load the schedule, attempt the backup, persist the
    /// outcome in a single update, then notify. Environment problems (no
    /// external drive reachable) record a skip and leave the schedule
    /// active; everything else records a failure.
    async fn execute(&self) {
        let schedule = match self.database_manager.get_backup_schedule(self.schedule_id).await {
            Ok(Some(schedule)) if schedule.is_active => schedule,
            Ok(_) => return,
            Err(err) => {
                error!(schedule_id = self.schedule_id, error = %err, "could not load schedule for run");
                return;
            }
        };
        info!(schedule_id = schedule.id, name = %schedule.name, "{}", ScheduleEntry::RunStarted);

        let result = self.run_backup(&schedule).await;
        let now = Utc::now();
        let next_run_at =
            calculate_next_run(schedule.schedule_type, &schedule.config, self.source_offset, now)
                .ok();
        let (status, error) = match &result {
            Ok(()) => (RunStatus::Success, None),
            Err(err) if err.is_environment() => (RunStatus::Skipped, Some(err.to_string())),
            Err(err) => (RunStatus::Failed, Some(err.to_string())),
        };
        let outcome = RunOutcome { status, error, last_run_at: now, next_run_at };
        if let Err(err) = self
            .database_manager
            .record_run_outcome(schedule.id, &outcome)
            .await
        {
            error!(schedule_id = schedule.id, error = %err, "failed to persist run outcome");
        }

        let (entry, kind, priority, message) = match (&outcome.status, &outcome.error) {
            (RunStatus::Success, _) => (
                ScheduleEntry::RunSucceeded,
                NotificationKind::BackupCompleted,
                NotificationPriority::Normal,
                format!("Backup '{}' completed", schedule.name),
            ),
            (RunStatus::Skipped, detail) => (
                ScheduleEntry::RunSkipped,
                NotificationKind::BackupSkipped,
                NotificationPriority::Normal,
                format!(
                    "Backup '{}' skipped: {}",
                    schedule.name,
                    detail.as_deref().unwrap_or("environment not ready"),
                ),
            ),
            (RunStatus::Failed, detail) => (
                ScheduleEntry::RunFailed,
                NotificationKind::BackupFailed,
                NotificationPriority::High,
                format!(
                    "Backup '{}' failed: {}",
                    schedule.name,
                    detail.as_deref().unwrap_or("unknown error"),
                ),
            ),
        };
        match entry.level() {
            tracing::Level::ERROR => {
                error!(schedule_id = schedule.id, status = %outcome.status, "{entry}")
            }
            tracing::Level::WARN => {
                warn!(schedule_id = schedule.id, status = %outcome.status, "{entry}")
            }
            _ => info!(schedule_id = schedule.id, status = %outcome.status, "{entry}"),
        }
        self.notifier
            .notify(Notification {
                kind,
                title: "Scheduled backup".to_string(),
                message,
                user_id: schedule.created_by_id,
                priority,
            })
            .await;
    }

    /// Rotation locations take precedence over the legacy single
    /// destination. Each configured location gets one attempt per run, in
    /// rotation order; the first success wins and triggers retention
    /// pruning for that location.
    async fn run_backup(&self, schedule: &BackupSchedule) -> Result<(), Error> {
        let location_count = self
            .location_registry
            .schedule_location_count(schedule.id)
            .await?;
        if location_count > 0 {
            let mut last_error: Option<Error> = None;
            for _ in 0..location_count {
                let Some(location) = self
                    .location_registry
                    .next_rotation_location(schedule.id)
                    .await?
                else {
                    break;
                };
                match self.backup_engine.create_backup(&location.path, None).await {
                    Ok(_) => {
                        if let Some(max_backups) = location.max_backups {
                            if let Err(err) = self
                                .backup_engine
                                .prune_backups(&location.path, max_backups)
                                .await
                            {
                                warn!(location_id = location.id, error = %err, "retention pruning failed");
                            }
                        }
                        return Ok(());
                    }
                    Err(err) => {
                        warn!(location_id = location.id, error = %err, "backup attempt failed, rotating");
                        last_error = Some(err);
                    }
                }
            }
            return Err(last_error.unwrap_or_else(|| BackupError::NoDestination.into()));
        }

        match &schedule.destination_path {
            Some(destination) => {
                if self.volume_probe.external_volumes().await.is_empty() {
                    Err(BackupError::NoExternalDrive)?
                }
                self.backup_engine.create_backup(destination, None).await?;
                Ok(())
            }
            None => Err(BackupError::NoDestination.into()),
        }
    }
}
