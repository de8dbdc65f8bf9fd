use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::GeoPoint;
use crate::schedule::ScheduleError;
use crate::schedule::clock::{format_hhmm, parse_hhmm, weekday_number};

/// Row as stored in `work_schedules`. Times are `HH:MM` strings and work
/// days a comma separated list of weekday numbers (Sunday = 0).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkScheduleRow {
    pub id: u64,
    pub name: String,
    pub department_id: Option<u64>,
    pub start_time: String,
    pub end_time: String,
    pub grace_minutes: u32,
    pub work_days: String,
    pub saturday_start_time: Option<String>,
    pub saturday_end_time: Option<String>,
    pub saturday_grace_minutes: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_radius_km: Option<f64>,
    pub is_default: bool,
    pub is_global: bool,
}

/// Circular region a check-in must fall inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Geofence {
    pub center: GeoPoint,
    #[schema(example = 0.2)]
    pub radius_km: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkSchedule {
    pub id: u64,
    pub name: String,
    pub department_id: Option<u64>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub grace_minutes: u32,
    /// Sorted weekday numbers, Sunday = 0.
    pub work_days: Vec<u8>,
    pub saturday_start_time: Option<NaiveTime>,
    pub saturday_end_time: Option<NaiveTime>,
    pub saturday_grace_minutes: Option<u32>,
    pub geofence: Option<Geofence>,
    pub is_default: bool,
    pub is_global: bool,
}

/// The hours that apply on one particular weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub grace_minutes: u32,
}

impl WorkSchedule {
    pub fn shift_for(&self, day: Weekday) -> Shift {
        if day == Weekday::Sat {
            Shift {
                start: self.saturday_start_time.unwrap_or(self.start_time),
                end: self.saturday_end_time.unwrap_or(self.end_time),
                grace_minutes: self.saturday_grace_minutes.unwrap_or(self.grace_minutes),
            }
        } else {
            Shift {
                start: self.start_time,
                end: self.end_time,
                grace_minutes: self.grace_minutes,
            }
        }
    }

    pub fn is_work_day(&self, day: Weekday) -> bool {
        day != Weekday::Sun && self.work_days.contains(&weekday_number(day))
    }
}

pub fn parse_work_days(value: &str) -> Result<Vec<u8>, ScheduleError> {
    let mut days = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day: u8 = part
            .parse()
            .map_err(|_| ScheduleError::InvalidWorkDay(part.to_string()))?;
        if day > 6 {
            return Err(ScheduleError::InvalidWorkDay(part.to_string()));
        }
        if !days.contains(&day) {
            days.push(day);
        }
    }
    days.sort_unstable();
    Ok(days)
}

pub fn format_work_days(days: &[u8]) -> String {
    days.iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_optional_time(value: Option<&str>) -> Result<Option<NaiveTime>, ScheduleError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_hhmm(v).map(Some),
        _ => Ok(None),
    }
}

impl TryFrom<WorkScheduleRow> for WorkSchedule {
    type Error = ScheduleError;

    fn try_from(row: WorkScheduleRow) -> Result<Self, Self::Error> {
        let geofence = match (row.latitude, row.longitude, row.location_radius_km) {
            (Some(latitude), Some(longitude), Some(radius_km)) => Some(Geofence {
                center: GeoPoint { latitude, longitude },
                radius_km,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            name: row.name,
            department_id: row.department_id,
            start_time: parse_hhmm(&row.start_time)?,
            end_time: parse_hhmm(&row.end_time)?,
            grace_minutes: row.grace_minutes,
            work_days: parse_work_days(&row.work_days)?,
            saturday_start_time: parse_optional_time(row.saturday_start_time.as_deref())?,
            saturday_end_time: parse_optional_time(row.saturday_end_time.as_deref())?,
            saturday_grace_minutes: row.saturday_grace_minutes,
            geofence,
            is_default: row.is_default,
            is_global: row.is_global,
        })
    }
}

/// API view of a schedule.
#[derive(Debug, Serialize, ToSchema)]
pub struct WorkScheduleResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Teaching staff")]
    pub name: String,
    #[schema(example = 2, nullable = true)]
    pub department_id: Option<u64>,
    #[schema(example = "09:00")]
    pub start_time: String,
    #[schema(example = "16:00")]
    pub end_time: String,
    #[schema(example = 10)]
    pub grace_minutes: u32,
    #[schema(example = json!([1, 2, 3, 4, 5, 6]))]
    pub work_days: Vec<u8>,
    #[schema(example = "09:00", nullable = true)]
    pub saturday_start_time: Option<String>,
    #[schema(example = "13:00", nullable = true)]
    pub saturday_end_time: Option<String>,
    #[schema(example = 15, nullable = true)]
    pub saturday_grace_minutes: Option<u32>,
    pub geofence: Option<Geofence>,
    pub is_default: bool,
    pub is_global: bool,
}

impl From<&WorkSchedule> for WorkScheduleResponse {
    fn from(s: &WorkSchedule) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            department_id: s.department_id,
            start_time: format_hhmm(s.start_time),
            end_time: format_hhmm(s.end_time),
            grace_minutes: s.grace_minutes,
            work_days: s.work_days.clone(),
            saturday_start_time: s.saturday_start_time.map(format_hhmm),
            saturday_end_time: s.saturday_end_time.map(format_hhmm),
            saturday_grace_minutes: s.saturday_grace_minutes,
            geofence: s.geofence,
            is_default: s.is_default,
            is_global: s.is_global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> WorkScheduleRow {
        WorkScheduleRow {
            id: 1,
            name: "Primary".into(),
            department_id: Some(3),
            start_time: "09:00".into(),
            end_time: "16:00:00".into(),
            grace_minutes: 5,
            work_days: "1, 2,3,4,5,6,1".into(),
            saturday_start_time: Some("08:30".into()),
            saturday_end_time: Some("".into()),
            saturday_grace_minutes: None,
            latitude: Some(23.02),
            longitude: Some(72.57),
            location_radius_km: None,
            is_default: false,
            is_global: false,
        }
    }

    #[test]
    fn row_parses_into_schedule() {
        let schedule = WorkSchedule::try_from(row()).unwrap();
        assert_eq!(schedule.work_days, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(schedule.end_time, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
        assert_eq!(schedule.saturday_end_time, None);
        // radius missing, so no geofence
        assert!(schedule.geofence.is_none());
    }

    #[test]
    fn saturday_shift_falls_back_per_field() {
        let schedule = WorkSchedule::try_from(row()).unwrap();
        let sat = schedule.shift_for(Weekday::Sat);
        assert_eq!(sat.start, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(sat.end, schedule.end_time);
        assert_eq!(sat.grace_minutes, 5);
        assert_eq!(schedule.shift_for(Weekday::Mon).start, schedule.start_time);
    }

    #[test]
    fn sunday_is_never_a_work_day() {
        let mut schedule = WorkSchedule::try_from(row()).unwrap();
        schedule.work_days = vec![0, 1];
        assert!(!schedule.is_work_day(Weekday::Sun));
        assert!(schedule.is_work_day(Weekday::Mon));
        assert!(!schedule.is_work_day(Weekday::Tue));
    }

    #[test]
    fn rejects_bad_rows() {
        let mut bad = row();
        bad.work_days = "1,7".into();
        assert!(matches!(WorkSchedule::try_from(bad), Err(ScheduleError::InvalidWorkDay(_))));

        let mut bad = row();
        bad.start_time = "nine".into();
        assert!(matches!(WorkSchedule::try_from(bad), Err(ScheduleError::InvalidTime(_))));
    }
}
