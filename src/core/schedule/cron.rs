use crate::model::error::schedule::ScheduleError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike};
use std::str::FromStr;

const SCAN_LIMIT_DAYS: u32 = 366;

/// Five-field cron expression (minute hour day-of-month month day-of-week),
/// supporting `*`, numbers, lists, ranges, and `/step`. Day-of-week uses
/// 0–7 with both 0 and 7 meaning Sunday. Fired in local time; user-supplied
/// expressions pass through here unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    expr: String,
    minutes: u64,
    hours: u32,
    days_of_month: u32,
    months: u16,
    days_of_week: u8,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl FromStr for CronExpr {
    type Err = ScheduleError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidCronExpression { value: expr.to_string() };
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid());
        }
        let (minutes, _) = parse_field(fields[0], 0, 59).ok_or_else(invalid)?;
        let (hours, _) = parse_field(fields[1], 0, 23).ok_or_else(invalid)?;
        let (days_of_month, dom_restricted) =
            parse_field(fields[2], 1, 31).ok_or_else(invalid)?;
        let (months, _) = parse_field(fields[3], 1, 12).ok_or_else(invalid)?;
        let (raw_dow, dow_restricted) = parse_field(fields[4], 0, 7).ok_or_else(invalid)?;
        // Fold 7 (Sunday) onto bit 0.
        let days_of_week = (raw_dow | (raw_dow >> 7)) & 0x7f;

        Ok(CronExpr {
            expr: expr.to_string(),
            minutes,
            hours: hours as u32,
            days_of_month: days_of_month as u32,
            months: months as u16,
            days_of_week: days_of_week as u8,
            dom_restricted,
            dow_restricted,
        })
    }
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl CronExpr {
    fn day_matches(&self, date: NaiveDate) -> bool {
        if self.months & (1 << date.month()) as u16 == 0 {
            return false;
        }
        let dom = self.days_of_month & (1 << date.day()) != 0;
        let dow = self.days_of_week & (1 << date.weekday().num_days_from_sunday()) != 0;
        // Standard cron rule: when both day fields are restricted, either
        // may match; otherwise the restricted one decides.
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// Next local occurrence strictly after `after`, scanning at most one
    /// year ahead.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let start = (after.naive_local() + Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;
        let mut date = start.date();
        for day_offset in 0..SCAN_LIMIT_DAYS {
            if self.day_matches(date) {
                let first_day = day_offset == 0;
                for hour in 0..24u32 {
                    if self.hours & (1 << hour) == 0 {
                        continue;
                    }
                    if first_day && hour < start.hour() {
                        continue;
                    }
                    for minute in 0..60u32 {
                        if self.minutes & (1u64 << minute) == 0 {
                            continue;
                        }
                        if first_day && hour == start.hour() && minute < start.minute() {
                            continue;
                        }
                        let naive = date.and_hms_opt(hour, minute, 0)?;
                        if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
                            if candidate > *after {
                                return Some(candidate);
                            }
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }
        None
    }
}

/// Returns the value bitmask and whether the field was restricted (anything
/// other than a bare `*`).
fn parse_field(field: &str, min: u32, max: u32) -> Option<(u64, bool)> {
    if field == "*" {
        return Some((range_mask(min, max), false));
    }
    let mut mask = 0u64;
    for item in field.split(',') {
        let (body, step) = match item.split_once('/') {
            Some((body, step)) => (body, step.parse::<u32>().ok().filter(|s| *s > 0)?),
            None => (item, 1),
        };
        let (low, high) = if body == "*" {
            (min, max)
        } else if let Some((low, high)) = body.split_once('-') {
            (low.parse().ok()?, high.parse().ok()?)
        } else {
            let value: u32 = body.parse().ok()?;
            // A bare value with a step means "from value to max".
            if item.contains('/') { (value, max) } else { (value, value) }
        };
        if low < min || high > max || low > high {
            return None;
        }
        // Widen before stepping; a huge step would overflow u32.
        let mut value = u64::from(low);
        while value <= u64::from(high) {
            mask |= 1u64 << value;
            value += u64::from(step);
        }
    }
    Some((mask, true))
}

fn range_mask(min: u32, max: u32) -> u64 {
    let mut mask = 0u64;
    for value in min..=max {
        mask |= 1u64 << value;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        utc().with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!("* * * *".parse::<CronExpr>().is_err());
        assert!("61 * * * *".parse::<CronExpr>().is_err());
        assert!("* 24 * * *".parse::<CronExpr>().is_err());
        assert!("a b c d e".parse::<CronExpr>().is_err());
    }

    #[test]
    fn nightly_expression_advances_to_the_next_day() {
        let expr: CronExpr = "0 2 * * *".parse().unwrap();
        let next = expr.next_after(&at(2026, 8, 27, 3, 0)).unwrap();
        assert_eq!(next, at(2026, 8, 28, 2, 0));
        let next = expr.next_after(&at(2026, 8, 27, 1, 0)).unwrap();
        assert_eq!(next, at(2026, 8, 27, 2, 0));
    }

    #[test]
    fn step_expression_fires_every_quarter_hour() {
        let expr: CronExpr = "*/15 * * * *".parse().unwrap();
        let next = expr.next_after(&at(2026, 8, 27, 3, 16)).unwrap();
        assert_eq!(next, at(2026, 8, 27, 3, 30));
    }

    #[test]
    fn day_of_week_seven_is_sunday() {
        let expr: CronExpr = "0 9 * * 7".parse().unwrap();
        // 2026-08-27 is a Thursday; the following Sunday is the 30th.
        let next = expr.next_after(&at(2026, 8, 27, 12, 0)).unwrap();
        assert_eq!(next, at(2026, 8, 30, 9, 0));
    }

    #[test]
    fn oversized_steps_select_only_the_range_start() {
        let expr: CronExpr = "0 0 1/4294967295 * *".parse().unwrap();
        let next = expr.next_after(&at(2026, 8, 14, 1, 0)).unwrap();
        assert_eq!(next, at(2026, 9, 1, 0, 0));
    }

    #[test]
    fn restricted_dom_and_dow_match_either() {
        let expr: CronExpr = "0 0 15 * 1".parse().unwrap();
        // Friday the 14th: the next match is Saturday the 15th (day-of-month),
        // not Monday the 17th.
        let next = expr.next_after(&at(2026, 8, 14, 1, 0)).unwrap();
        assert_eq!(next, at(2026, 8, 15, 0, 0));
    }

    #[test]
    fn occurrence_is_strictly_after_the_reference() {
        let expr: CronExpr = "30 4 * * *".parse().unwrap();
        let next = expr.next_after(&at(2026, 8, 27, 4, 30)).unwrap();
        assert_eq!(next, at(2026, 8, 28, 4, 30));
    }
}
