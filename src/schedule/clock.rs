//! Wall-clock helpers. Timestamps are stored in UTC and compared in
//! Indian Standard Time, which is a fixed offset with no DST.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};

use super::ScheduleError;

/// IST is UTC+05:30.
pub const IST_OFFSET_MINUTES: i64 = 330;

pub fn to_ist(ts: DateTime<Utc>) -> NaiveDateTime {
    ts.naive_utc() + Duration::minutes(IST_OFFSET_MINUTES)
}

pub fn ist_date(ts: DateTime<Utc>) -> NaiveDate {
    to_ist(ts).date()
}

pub fn minutes_of_day(t: NaiveTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

/// Drops seconds and sub-seconds so comparisons happen on whole minutes.
pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date()
        .and_hms_opt(ts.hour(), ts.minute(), 0)
        .unwrap_or(ts)
}

/// Parses `HH:MM` (a trailing `:SS` is tolerated, as MySQL TIME renders it).
pub fn parse_hhmm(value: &str) -> Result<NaiveTime, ScheduleError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(value.to_string()))
}

pub fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Weekday number with Sunday = 0, the encoding used by `work_days`.
pub fn weekday_number(day: Weekday) -> u8 {
    day.num_days_from_sunday() as u8
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 0,
    }
}

/// First and last day of a month, or `None` for an invalid month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
    Some((first, last))
}

/// Parses `YYYY-MM` into its first and last day.
pub fn parse_month(value: &str) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d").ok()?;
    month_bounds(first.year(), first.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ist_shift_crosses_midnight() {
        let utc = Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap();
        let ist = to_ist(utc);
        assert_eq!(ist.date(), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert_eq!(minutes_of_day(ist.time()), 90);
    }

    #[test]
    fn parses_schedule_times() {
        assert_eq!(parse_hhmm("09:05").unwrap(), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert_eq!(parse_hhmm("17:30:00").unwrap(), NaiveTime::from_hms_opt(17, 30, 0).unwrap());
        assert!(matches!(parse_hhmm("9am"), Err(ScheduleError::InvalidTime(_))));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2026, 12), 31);
        let (first, last) = parse_month("2026-04").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 4, 30).unwrap());
        assert!(parse_month("2026-13").is_none());
    }

    #[test]
    fn truncation_drops_seconds() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 5, 59)
            .unwrap();
        assert_eq!(truncate_to_minute(ts).time(), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
    }
}
