//! Pure classification of check-ins and check-outs against a schedule.
//!
//! Every function here takes IST wall-clock values (see [`super::clock`]) and
//! has no side effects, so handlers can call them from any worker.

use chrono::{Datelike, Duration, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use super::clock::{minutes_of_day, truncate_to_minute};
use crate::model::work_schedule::WorkSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    OnLeave,
}

/// PRESENT when `now` is at or before the shift start plus grace, LATE
/// otherwise. Absence is never decided here.
pub fn determine_status(now: NaiveDateTime, schedule: &WorkSchedule) -> AttendanceStatus {
    let now = truncate_to_minute(now);
    let shift = schedule.shift_for(now.weekday());
    let start = now.date().and_time(shift.start);
    let grace_deadline = start + Duration::minutes(i64::from(shift.grace_minutes));

    if now <= grace_deadline {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Late
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInAssessment {
    pub status: AttendanceStatus,
    /// Minutes after the shift start, not after the grace deadline.
    pub late_minutes: u32,
}

/// Classifies a check-in. Sundays and days outside `work_days` are ABSENT.
pub fn assess_check_in(now: NaiveDateTime, schedule: &WorkSchedule) -> CheckInAssessment {
    let day = now.weekday();
    if day == Weekday::Sun || !schedule.is_work_day(day) {
        return CheckInAssessment {
            status: AttendanceStatus::Absent,
            late_minutes: 0,
        };
    }

    let status = determine_status(now, schedule);
    let late_minutes = match status {
        AttendanceStatus::Late => {
            let shift = schedule.shift_for(day);
            (minutes_of_day(now.time()) - minutes_of_day(shift.start)).max(0) as u32
        }
        _ => 0,
    };

    CheckInAssessment {
        status,
        late_minutes,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckOutAssessment {
    pub early_minutes: u32,
    pub overtime_minutes: u32,
    pub worked_minutes: u32,
}

pub fn assess_check_out(
    check_in: Option<NaiveDateTime>,
    check_out: NaiveDateTime,
    schedule: &WorkSchedule,
) -> CheckOutAssessment {
    let shift = schedule.shift_for(check_out.weekday());
    let diff = minutes_of_day(shift.end) - minutes_of_day(check_out.time());

    let worked_minutes = check_in
        .map(|ci| (check_out - ci).num_minutes().max(0) as u32)
        .unwrap_or(0);

    CheckOutAssessment {
        early_minutes: diff.max(0) as u32,
        overtime_minutes: (-diff).max(0) as u32,
        worked_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(date: &str, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn schedule() -> WorkSchedule {
        WorkSchedule {
            id: 1,
            name: "Teaching".into(),
            department_id: Some(1),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            grace_minutes: 5,
            work_days: vec![1, 2, 3, 4, 5, 6],
            saturday_start_time: Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            saturday_end_time: Some(NaiveTime::from_hms_opt(13, 0, 0).unwrap()),
            saturday_grace_minutes: Some(15),
            geofence: None,
            is_default: false,
            is_global: false,
        }
    }

    // 2026-03-02 is a Monday, 2026-03-07 a Saturday, 2026-03-08 a Sunday.
    const MONDAY: &str = "2026-03-02";
    const SATURDAY: &str = "2026-03-07";
    const SUNDAY: &str = "2026-03-08";

    #[test]
    fn within_grace_is_present() {
        let s = schedule();
        for minute in 0..=5 {
            assert_eq!(determine_status(at(MONDAY, 9, minute), &s), AttendanceStatus::Present);
        }
        assert_eq!(determine_status(at(MONDAY, 7, 45), &s), AttendanceStatus::Present);
    }

    #[test]
    fn after_grace_is_late_counted_from_start() {
        let s = schedule();
        let assessment = assess_check_in(at(MONDAY, 9, 7), &s);
        assert_eq!(assessment.status, AttendanceStatus::Late);
        assert_eq!(assessment.late_minutes, 7);
    }

    #[test]
    fn late_minutes_always_exceed_grace() {
        let s = schedule();
        for minute in 6..120 {
            let now = at(MONDAY, 9, 0) + Duration::minutes(minute);
            let assessment = assess_check_in(now, &s);
            assert_eq!(assessment.status, AttendanceStatus::Late);
            assert_eq!(i64::from(assessment.late_minutes), minute);
            assert!(assessment.late_minutes > s.grace_minutes);
        }
    }

    #[test]
    fn seconds_inside_the_last_grace_minute_stay_present() {
        let s = schedule();
        let now = at(MONDAY, 9, 5) + Duration::seconds(30);
        assert_eq!(determine_status(now, &s), AttendanceStatus::Present);
    }

    #[test]
    fn present_reports_no_late_minutes() {
        let assessment = assess_check_in(at(MONDAY, 9, 4), &schedule());
        assert_eq!(assessment.status, AttendanceStatus::Present);
        assert_eq!(assessment.late_minutes, 0);
    }

    #[test]
    fn saturday_uses_its_own_grace() {
        let s = schedule();
        assert_eq!(assess_check_in(at(SATURDAY, 9, 10), &s).status, AttendanceStatus::Present);

        let late = assess_check_in(at(SATURDAY, 9, 20), &s);
        assert_eq!(late.status, AttendanceStatus::Late);
        assert_eq!(late.late_minutes, 20);
    }

    #[test]
    fn sunday_is_absent() {
        let assessment = assess_check_in(at(SUNDAY, 8, 55), &schedule());
        assert_eq!(assessment.status, AttendanceStatus::Absent);
        assert_eq!(assessment.late_minutes, 0);
    }

    #[test]
    fn day_outside_work_days_is_absent() {
        let mut s = schedule();
        s.work_days = vec![1, 2, 3, 4, 5];
        assert_eq!(assess_check_in(at(SATURDAY, 9, 0), &s).status, AttendanceStatus::Absent);
    }

    #[test]
    fn classification_is_repeatable() {
        let s = schedule();
        let now = at(MONDAY, 9, 12);
        assert_eq!(assess_check_in(now, &s), assess_check_in(now, &s));
        assert_eq!(determine_status(now, &s), determine_status(now, &s));
    }

    #[test]
    fn check_out_before_end_is_early() {
        let s = schedule();
        let out = assess_check_out(Some(at(MONDAY, 9, 0)), at(MONDAY, 15, 20), &s);
        assert_eq!(out.early_minutes, 40);
        assert_eq!(out.overtime_minutes, 0);
        assert_eq!(out.worked_minutes, 380);
    }

    #[test]
    fn check_out_after_end_is_overtime() {
        let s = schedule();
        let out = assess_check_out(None, at(SATURDAY, 13, 45), &s);
        assert_eq!(out.early_minutes, 0);
        assert_eq!(out.overtime_minutes, 45);
        assert_eq!(out.worked_minutes, 0);
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(AttendanceStatus::OnLeave.to_string(), "ON_LEAVE");
        assert_eq!("LATE".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Late);
    }
}
