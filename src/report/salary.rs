use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

use super::AttendanceSummary;
use crate::schedule::clock::days_in_month;

/// Salary rates assume an eight hour school day.
pub const WORK_HOURS_PER_DAY: f64 = 8.0;

/// Sundays between `from` and `to` that are not after `as_of`. Sundays are
/// paid, but not before they happen.
pub fn counted_sundays(from: NaiveDate, to: NaiveDate, as_of: NaiveDate) -> u32 {
    let end = to.min(as_of);
    from.iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| d.weekday() == Weekday::Sun)
        .count() as u32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalaryRates {
    pub per_day: f64,
    pub per_hour: f64,
    pub per_minute: f64,
}

pub fn salary_rates(base_salary: f64, year: i32, month: u32) -> SalaryRates {
    let days = days_in_month(year, month).max(1);
    let per_day = base_salary / f64::from(days);
    let per_hour = per_day / WORK_HOURS_PER_DAY;
    SalaryRates {
        per_day,
        per_hour,
        per_minute: per_hour / 60.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SalaryBreakdown {
    #[schema(example = 31)]
    pub days_in_month: u32,
    pub per_day: f64,
    pub per_minute: f64,
    pub present_days: u32,
    pub late_days: u32,
    pub absent_days: u32,
    pub leave_days: u32,
    pub counted_sundays: u32,
    /// Present + late + counted Sundays.
    pub hajar_divas: u32,
    pub late_minutes: u64,
    pub early_minutes: u64,
    pub late_deduction: f64,
    pub early_deduction: f64,
    pub gross_salary: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub net_salary: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Net pay from already computed components.
pub fn net_salary(gross: f64, late_deduction: f64, early_deduction: f64, bonus: f64, deductions: f64) -> f64 {
    round2(gross - late_deduction - early_deduction + bonus - deductions)
}

pub struct SalaryInput {
    pub base_salary: f64,
    pub year: i32,
    pub month: u32,
    pub summary: AttendanceSummary,
    pub counted_sundays: u32,
    pub bonus: f64,
    pub deductions: f64,
}

pub fn salary_breakdown(input: &SalaryInput) -> SalaryBreakdown {
    let rates = salary_rates(input.base_salary, input.year, input.month);
    let summary = &input.summary;

    let hajar_divas = summary.present_days + summary.late_days + input.counted_sundays;
    let late_deduction = summary.late_minutes as f64 * rates.per_minute;
    let early_deduction = summary.early_minutes as f64 * rates.per_minute;
    let gross_salary = rates.per_day * f64::from(hajar_divas);
    let net_salary = net_salary(
        gross_salary,
        late_deduction,
        early_deduction,
        input.bonus,
        input.deductions,
    );

    SalaryBreakdown {
        days_in_month: days_in_month(input.year, input.month),
        per_day: round2(rates.per_day),
        per_minute: rates.per_minute,
        present_days: summary.present_days,
        late_days: summary.late_days,
        absent_days: summary.absent_days,
        leave_days: summary.leave_days,
        counted_sundays: input.counted_sundays,
        hajar_divas,
        late_minutes: summary.late_minutes,
        early_minutes: summary.early_minutes,
        late_deduction: round2(late_deduction),
        early_deduction: round2(early_deduction),
        gross_salary: round2(gross_salary),
        bonus: input.bonus,
        deductions: input.deductions,
        net_salary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sundays_are_counted_up_to_as_of() {
        // March 2026 has Sundays on 1, 8, 15, 22, 29
        let (from, to) = (date(2026, 3, 1), date(2026, 3, 31));
        assert_eq!(counted_sundays(from, to, to), 5);
        assert_eq!(counted_sundays(from, to, date(2026, 3, 14)), 2);
        assert_eq!(counted_sundays(from, to, date(2026, 2, 28)), 0);
    }

    #[test]
    fn rates_follow_month_length() {
        let rates = salary_rates(31_000.0, 2026, 3);
        assert_eq!(rates.per_day, 1_000.0);
        assert_eq!(rates.per_hour, 125.0);
        assert!((rates.per_minute - 125.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_matches_hand_calculation() {
        let input = SalaryInput {
            base_salary: 30_000.0,
            year: 2026,
            month: 4, // 30 days, 1000/day, 125/hour
            summary: AttendanceSummary {
                present_days: 20,
                late_days: 2,
                absent_days: 1,
                leave_days: 1,
                late_minutes: 48,
                early_minutes: 24,
            },
            counted_sundays: 4,
            bonus: 500.0,
            deductions: 200.0,
        };

        let b = salary_breakdown(&input);
        assert_eq!(b.hajar_divas, 26);
        assert_eq!(b.gross_salary, 26_000.0);
        // 48 min at 125/60 per minute
        assert_eq!(b.late_deduction, 100.0);
        assert_eq!(b.early_deduction, 50.0);
        assert_eq!(b.net_salary, 26_150.0);
    }

    #[test]
    fn breakdown_is_reproducible() {
        let input = SalaryInput {
            base_salary: 27_500.0,
            year: 2026,
            month: 2,
            summary: AttendanceSummary {
                present_days: 17,
                late_days: 3,
                late_minutes: 71,
                ..Default::default()
            },
            counted_sundays: 4,
            bonus: 0.0,
            deductions: 0.0,
        };
        assert_eq!(salary_breakdown(&input), salary_breakdown(&input));
    }

    #[test]
    fn net_salary_after_manual_adjustment() {
        assert_eq!(net_salary(20_000.0, 312.5, 62.5, 1_000.0, 500.0), 20_125.0);
        assert_eq!(net_salary(1_000.0, 0.333, 0.0, 0.0, 0.0), 999.67);
    }
}
