use serde::Serialize;
use strum_macros::Display;
use utoipa::ToSchema;

use super::AttendanceSummary;

/// Average lateness at which the lateness component saturates.
const LATE_MINUTES_CEILING: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=29 => RiskLevel::Low,
            30..=59 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BehaviorMetrics {
    pub working_days: u32,
    pub present_days: u32,
    pub late_days: u32,
    pub absent_days: u32,
    pub leave_days: u32,
    /// Share of attended days that were on time, 0..=1.
    pub punctuality_rate: f64,
    pub average_late_minutes: f64,
    #[schema(example = 42)]
    pub risk_score: u32,
    pub risk_level: RiskLevel,
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}

pub fn behavior_metrics(summary: &AttendanceSummary, working_days: u32) -> BehaviorMetrics {
    let attended = summary.present_days + summary.late_days;
    let late_rate = ratio(summary.late_days, working_days).min(1.0);
    let absence_rate = ratio(summary.absent_days, working_days).min(1.0);
    let average_late_minutes = if summary.late_days == 0 {
        0.0
    } else {
        summary.late_minutes as f64 / f64::from(summary.late_days)
    };
    let lateness = (average_late_minutes / LATE_MINUTES_CEILING).min(1.0);

    let risk_score = (100.0 * (0.5 * late_rate + 0.3 * absence_rate + 0.2 * lateness)).round() as u32;

    BehaviorMetrics {
        working_days,
        present_days: summary.present_days,
        late_days: summary.late_days,
        absent_days: summary.absent_days,
        leave_days: summary.leave_days,
        punctuality_rate: if attended == 0 { 0.0 } else { ratio(summary.present_days, attended) },
        average_late_minutes,
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctual_teacher_is_low_risk() {
        let summary = AttendanceSummary {
            present_days: 22,
            ..Default::default()
        };
        let m = behavior_metrics(&summary, 22);
        assert_eq!(m.risk_score, 0);
        assert_eq!(m.risk_level, RiskLevel::Low);
        assert_eq!(m.punctuality_rate, 1.0);
    }

    #[test]
    fn frequent_long_lateness_is_high_risk() {
        let summary = AttendanceSummary {
            present_days: 6,
            late_days: 14,
            absent_days: 0,
            late_minutes: 14 * 40,
            ..Default::default()
        };
        let m = behavior_metrics(&summary, 20);
        // 0.5 * 0.7 + 0.2 * 1.0
        assert_eq!(m.risk_score, 55);
        assert_eq!(m.risk_level, RiskLevel::Medium);
        assert_eq!(m.average_late_minutes, 40.0);

        let worse = AttendanceSummary {
            absent_days: 6,
            ..summary
        };
        let m = behavior_metrics(&worse, 20);
        assert_eq!(m.risk_score, 64);
        assert_eq!(m.risk_level, RiskLevel::High);
    }

    #[test]
    fn no_working_days_scores_zero() {
        let m = behavior_metrics(&AttendanceSummary::default(), 0);
        assert_eq!(m.risk_score, 0);
        assert_eq!(m.punctuality_rate, 0.0);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(RiskLevel::from_score(29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::High);
    }
}
