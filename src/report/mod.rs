//! Aggregations over fetched attendance rows: salary and teacher behaviour.

pub mod behavior;
pub mod salary;

use chrono::{Datelike, NaiveDate};

use crate::model::work_schedule::WorkSchedule;
use crate::schedule::AttendanceStatus;

/// The parts of an attendance row the reports care about.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub late_minutes: u32,
    pub early_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttendanceSummary {
    pub present_days: u32,
    pub late_days: u32,
    pub absent_days: u32,
    pub leave_days: u32,
    pub late_minutes: u64,
    pub early_minutes: u64,
}

/// Counts days by status. Expected working days with no row at all are
/// absences too.
pub fn summarize(records: &[DayRecord], expected_days: &[NaiveDate]) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();

    for record in records {
        match record.status {
            AttendanceStatus::Present => summary.present_days += 1,
            AttendanceStatus::Late => summary.late_days += 1,
            AttendanceStatus::Absent => summary.absent_days += 1,
            AttendanceStatus::OnLeave => summary.leave_days += 1,
        }
        summary.late_minutes += u64::from(record.late_minutes);
        summary.early_minutes += u64::from(record.early_minutes);
    }

    summary.absent_days += expected_days
        .iter()
        .filter(|day| !records.iter().any(|r| r.date == **day))
        .count() as u32;

    summary
}

/// Working days of `schedule` between `from` and `to` inclusive, skipping
/// holidays.
pub fn expected_working_days(
    from: NaiveDate,
    to: NaiveDate,
    schedule: &WorkSchedule,
    holidays: &[NaiveDate],
) -> Vec<NaiveDate> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| schedule.is_work_day(d.weekday()) && !holidays.contains(d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::repository::tests::schedule;

    fn day(d: u32, status: AttendanceStatus, late: u32) -> DayRecord {
        DayRecord {
            date: NaiveDate::from_ymd_opt(2026, 3, d).unwrap(),
            status,
            late_minutes: late,
            early_minutes: 0,
        }
    }

    #[test]
    fn summary_counts_missing_days_as_absent() {
        let records = vec![
            day(2, AttendanceStatus::Present, 0),
            day(3, AttendanceStatus::Late, 12),
            day(4, AttendanceStatus::OnLeave, 0),
        ];
        let expected: Vec<_> = (2..=6).map(|d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap()).collect();

        let summary = summarize(&records, &expected);
        assert_eq!(summary.present_days, 1);
        assert_eq!(summary.late_days, 1);
        assert_eq!(summary.leave_days, 1);
        assert_eq!(summary.absent_days, 2);
        assert_eq!(summary.late_minutes, 12);
    }

    #[test]
    fn working_days_skip_sundays_and_holidays() {
        let s = schedule(1, None);
        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let holiday = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();

        let days = expected_working_days(from, to, &s, &[holiday]);
        // Mon 2 .. Sat 7 minus the Wednesday holiday
        assert_eq!(days.len(), 5);
        assert!(!days.contains(&holiday));
        assert!(!days.contains(&from));
    }
}
