use crate::core::schedule::cron::CronExpr;
use crate::model::error::schedule::ScheduleError;
use crate::model::error::Error;
use crate::model::schedule::{ScheduleConfig, ScheduleType};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, TimeZone, Timelike, Utc, Weekday,
};

pub const DEFAULT_BACKUP_TIME: &str = "02:00";
const SCAN_LIMIT_DAYS: u32 = 366;

/// A firing rule expressed in wall-clock time of some timezone. The timers
/// evaluate these against the machine's local clock; persisted next-run
/// estimates evaluate them against the configured source timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalTrigger {
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
    Monthly { day: u32, hour: u32, minute: u32 },
    Custom { expr: CronExpr },
}

pub fn parse_time(value: &str) -> Result<(u32, u32), ScheduleError> {
    let invalid = || ScheduleError::InvalidTime { value: value.to_string() };
    let (hour, minute) = value.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

fn weekday_from_sunday_index(index: u32) -> Result<Weekday, ScheduleError> {
    match index {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(ScheduleError::InvalidTime { value: format!("day_of_week {other}") }),
    }
}

/// Builds the trigger exactly as configured, in the source timezone's
/// wall-clock terms. Missing fields fall back to 02:00, Sunday, and the
/// first of the month.
pub fn source_trigger(
    schedule_type: ScheduleType,
    config: &ScheduleConfig,
) -> Result<LocalTrigger, Error> {
    let time = config.time.as_deref().unwrap_or(DEFAULT_BACKUP_TIME);
    let (hour, minute) = parse_time(time)?;
    match schedule_type {
        ScheduleType::Daily => Ok(LocalTrigger::Daily { hour, minute }),
        ScheduleType::Weekly => {
            let weekday = weekday_from_sunday_index(config.day_of_week.unwrap_or(0))?;
            Ok(LocalTrigger::Weekly { weekday, hour, minute })
        }
        ScheduleType::Monthly => {
            let day = config.day_of_month.unwrap_or(1);
            if day == 0 || day > 31 {
                return Err(ScheduleError::InvalidTime { value: format!("day_of_month {day}") }.into());
            }
            Ok(LocalTrigger::Monthly { day, hour, minute })
        }
        ScheduleType::Custom => {
            let expr = config
                .cron_expression
                .as_deref()
                .ok_or(ScheduleError::MissingCronExpression)?;
            Ok(LocalTrigger::Custom { expr: expr.parse()? })
        }
    }
}

/// Converts a schedule configured in the source timezone into a trigger for
/// the machine's local clock.
pub fn build_local_trigger(
    schedule_type: ScheduleType,
    config: &ScheduleConfig,
    source: FixedOffset,
) -> Result<LocalTrigger, Error> {
    build_local_trigger_for(schedule_type, config, source, *Local::now().offset())
}

pub fn build_local_trigger_for(
    schedule_type: ScheduleType,
    config: &ScheduleConfig,
    source: FixedOffset,
    target: FixedOffset,
) -> Result<LocalTrigger, Error> {
    let trigger = source_trigger(schedule_type, config)?;
    let now_source = Utc::now().with_timezone(&source);
    match trigger {
        LocalTrigger::Daily { .. } => {
            let next = trigger
                .next_occurrence(&now_source)
                .ok_or(ScheduleError::InvalidTime { value: "daily".to_string() })?;
            let local = next.with_timezone(&target);
            Ok(LocalTrigger::Daily { hour: local.hour(), minute: local.minute() })
        }
        LocalTrigger::Weekly { .. } => {
            let next = trigger
                .next_occurrence(&now_source)
                .ok_or(ScheduleError::InvalidTime { value: "weekly".to_string() })?;
            let local = next.with_timezone(&target);
            Ok(LocalTrigger::Weekly {
                weekday: local.weekday(),
                hour: local.hour(),
                minute: local.minute(),
            })
        }
        LocalTrigger::Monthly { day, hour, minute } => {
            // The day of month deliberately stays in source terms; converting
            // it through a specific month would drift for other months.
            let sample = now_source
                .with_time(chrono::NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default())
                .single()
                .unwrap_or(now_source);
            let local = sample.with_timezone(&target);
            Ok(LocalTrigger::Monthly { day, hour: local.hour(), minute: local.minute() })
        }
        custom @ LocalTrigger::Custom { .. } => Ok(custom),
    }
}

impl LocalTrigger {
    /// Next wall-clock occurrence strictly after `after`, in `after`'s
    /// timezone.
    pub fn next_occurrence<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        if let LocalTrigger::Custom { expr } = self {
            return expr.next_after(after);
        }
        let (hour, minute) = match self {
            LocalTrigger::Daily { hour, minute } => (*hour, *minute),
            LocalTrigger::Weekly { hour, minute, .. } => (*hour, *minute),
            LocalTrigger::Monthly { hour, minute, .. } => (*hour, *minute),
            LocalTrigger::Custom { .. } => unreachable!(),
        };
        let tz = after.timezone();
        let mut date = after.date_naive();
        for _ in 0..SCAN_LIMIT_DAYS {
            let matches = match self {
                LocalTrigger::Daily { .. } => true,
                LocalTrigger::Weekly { weekday, .. } => date.weekday() == *weekday,
                LocalTrigger::Monthly { day, .. } => date.day() == *day,
                LocalTrigger::Custom { .. } => unreachable!(),
            };
            if matches {
                if let Some(naive) = date.and_hms_opt(hour, minute, 0) {
                    if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
                        if candidate > *after {
                            return Some(candidate);
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }
        None
    }
}

/// Estimated next run in UTC, persisted alongside run outcomes. Custom
/// schedules are approximated as one day out; the timer itself follows the
/// cron expression exactly.
pub fn calculate_next_run(
    schedule_type: ScheduleType,
    config: &ScheduleConfig,
    source: FixedOffset,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, Error> {
    if schedule_type == ScheduleType::Custom {
        return Ok(now + Duration::days(1));
    }
    let trigger = source_trigger(schedule_type, config)?;
    let next = trigger
        .next_occurrence(&now.with_timezone(&source))
        .ok_or(ScheduleError::InvalidTime { value: "no upcoming occurrence".to_string() })?;
    Ok(next.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    fn config(time: &str) -> ScheduleConfig {
        ScheduleConfig { time: Some(time.to_string()), ..ScheduleConfig::default() }
    }

    #[test]
    fn time_strings_are_validated() {
        assert_eq!(parse_time("02:00").unwrap(), (2, 0));
        assert_eq!(parse_time("23:59").unwrap(), (23, 59));
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("7pm").is_err());
    }

    #[test]
    fn daily_next_run_rolls_over_at_the_configured_time() {
        let cfg = config("02:00");
        let source = offset(0);

        let before = Utc.with_ymd_and_hms(2026, 8, 27, 1, 0, 0).unwrap();
        let next = calculate_next_run(ScheduleType::Daily, &cfg, source, before).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 27, 2, 0, 0).unwrap());

        let after = Utc.with_ymd_and_hms(2026, 8, 27, 3, 0, 0).unwrap();
        let next = calculate_next_run(ScheduleType::Daily, &cfg, source, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 28, 2, 0, 0).unwrap());
    }

    #[test]
    fn weekly_next_run_lands_on_the_configured_weekday() {
        let cfg = ScheduleConfig {
            day_of_week: Some(1),
            time: Some("09:00".to_string()),
            ..ScheduleConfig::default()
        };
        let source = offset(3);
        // Sunday 23:50 in the source timezone.
        let now = Utc.with_ymd_and_hms(2026, 8, 23, 20, 50, 0).unwrap();
        let next = calculate_next_run(ScheduleType::Weekly, &cfg, source, now).unwrap();
        // Monday 09:00 source time is 06:00 UTC.
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 24, 6, 0, 0).unwrap());
    }

    #[test]
    fn monthly_next_run_advances_to_the_following_month() {
        let cfg = ScheduleConfig {
            day_of_month: Some(1),
            time: Some("02:00".to_string()),
            ..ScheduleConfig::default()
        };
        let now = Utc.with_ymd_and_hms(2026, 8, 15, 12, 0, 0).unwrap();
        let next = calculate_next_run(ScheduleType::Monthly, &cfg, offset(0), now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 9, 1, 2, 0, 0).unwrap());
    }

    #[test]
    fn custom_next_run_is_approximated_a_day_out() {
        let cfg = ScheduleConfig {
            cron_expression: Some("*/5 * * * *".to_string()),
            ..ScheduleConfig::default()
        };
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 4, 0, 0).unwrap();
        let next = calculate_next_run(ScheduleType::Custom, &cfg, offset(0), now).unwrap();
        assert_eq!(next, now + Duration::days(1));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg = ScheduleConfig::default();
        assert_eq!(
            source_trigger(ScheduleType::Daily, &cfg).unwrap(),
            LocalTrigger::Daily { hour: 2, minute: 0 }
        );
        assert_eq!(
            source_trigger(ScheduleType::Weekly, &cfg).unwrap(),
            LocalTrigger::Weekly { weekday: Weekday::Sun, hour: 2, minute: 0 }
        );
        assert_eq!(
            source_trigger(ScheduleType::Monthly, &cfg).unwrap(),
            LocalTrigger::Monthly { day: 1, hour: 2, minute: 0 }
        );
        assert!(matches!(
            source_trigger(ScheduleType::Custom, &cfg),
            Err(Error::Schedule(ScheduleError::MissingCronExpression))
        ));
    }

    #[test]
    fn weekly_conversion_shifts_the_weekday_across_midnight() {
        let cfg = ScheduleConfig {
            day_of_week: Some(1),
            time: Some("01:00".to_string()),
            ..ScheduleConfig::default()
        };
        // Monday 01:00 at UTC+3 is Sunday 22:00 at UTC.
        let trigger =
            build_local_trigger_for(ScheduleType::Weekly, &cfg, offset(3), offset(0)).unwrap();
        assert_eq!(
            trigger,
            LocalTrigger::Weekly { weekday: Weekday::Sun, hour: 22, minute: 0 }
        );
    }

    #[test]
    fn monthly_conversion_keeps_the_source_day_of_month() {
        let cfg = ScheduleConfig {
            day_of_month: Some(15),
            time: Some("02:00".to_string()),
            ..ScheduleConfig::default()
        };
        let trigger =
            build_local_trigger_for(ScheduleType::Monthly, &cfg, offset(3), offset(0)).unwrap();
        assert_eq!(trigger, LocalTrigger::Monthly { day: 15, hour: 23, minute: 0 });
    }

    #[test]
    fn next_occurrence_is_strictly_in_the_future() {
        let trigger = LocalTrigger::Daily { hour: 2, minute: 0 };
        let at = offset(0).with_ymd_and_hms(2026, 8, 27, 2, 0, 0).unwrap();
        let next = trigger.next_occurrence(&at).unwrap();
        assert_eq!(next, offset(0).with_ymd_and_hms(2026, 8, 28, 2, 0, 0).unwrap());
    }
}
