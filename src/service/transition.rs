//! Pure attendance decisions: where a day's record stands, and what a
//! check-out computes. No I/O; the service applies the outcome.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::AppError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::site::ConstructionSite;
use crate::utils::time::{hours_between, same_day_at};

const MAX_SHIFT_HOURS: Decimal = dec!(24);

/// Share of the standard day under which leaving before closing time counts
/// as an early departure.
const EARLY_DEPARTURE_SHARE: Decimal = dec!(0.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftPhase {
    NoRecord,
    NotCheckedIn,
    OnShift { check_in: DateTime<Utc> },
    Completed,
}

pub fn phase_of(record: Option<&AttendanceRecord>) -> ShiftPhase {
    match record {
        None => ShiftPhase::NoRecord,
        Some(r) => match (r.check_in_time, r.check_out_time) {
            (None, _) => ShiftPhase::NotCheckedIn,
            (Some(check_in), None) => ShiftPhase::OnShift { check_in },
            (Some(_), Some(_)) => ShiftPhase::Completed,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftFigures {
    pub total_hours: Decimal,
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub status: AttendanceStatus,
}

/// Splits worked time into regular and overtime hours. The two always sum
/// to `total_hours`.
pub fn split_hours(
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
    site: &ConstructionSite,
) -> Result<(Decimal, Decimal, Decimal), AppError> {
    let standard = site.standard_hours_per_day;
    if standard <= Decimal::ZERO || standard > MAX_SHIFT_HOURS {
        return Err(AppError::Invalid(format!(
            "site {} standard hours per day {} must be within (0, 24]",
            site.id, standard
        )));
    }

    let total = hours_between(check_in, check_out);
    if total < Decimal::ZERO {
        return Err(AppError::Invalid(format!(
            "check-out at {check_out} precedes check-in at {check_in}"
        )));
    }
    if total > MAX_SHIFT_HOURS {
        return Err(AppError::Invalid(format!(
            "shift of {total} hours exceeds {MAX_SHIFT_HOURS} hours"
        )));
    }

    let regular = total.min(standard);
    let overtime = (total - standard).max(Decimal::ZERO);
    Ok((total, regular, overtime))
}

/// Figures for checking out at `now` a shift that started at `check_in`.
///
/// Order matters: LATE is applied first (only over PRESENT), then
/// EARLY_DEPARTURE, and only if that does not apply, OVERTIME, which
/// replaces LATE.
pub fn check_out_figures(
    check_in: DateTime<Utc>,
    now: DateTime<Utc>,
    current: AttendanceStatus,
    site: &ConstructionSite,
) -> Result<ShiftFigures, AppError> {
    let window = site.working_window()?;
    let (total, regular, overtime) = split_hours(check_in, now, site)?;

    let mut status = current;
    if check_in > same_day_at(check_in, window.start) && status == AttendanceStatus::Present {
        status = AttendanceStatus::Late;
    }

    let half_day = site.standard_hours_per_day * EARLY_DEPARTURE_SHARE;
    if now < same_day_at(now, window.end) && total < half_day {
        status = AttendanceStatus::EarlyDeparture;
    } else if overtime > Decimal::ZERO {
        status = AttendanceStatus::Overtime;
    }

    Ok(ShiftFigures {
        total_hours: total,
        regular_hours: regular,
        overtime_hours: overtime,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn site() -> ConstructionSite {
        ConstructionSite {
            id: 1,
            name: "Tower".into(),
            working_hours_start: "08:00".into(),
            working_hours_end: "17:00".into(),
            standard_hours_per_day: dec!(8),
            overtime_rate_multiplier: dec!(1.5),
            is_active: true,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    #[test]
    fn late_arrival_then_overtime_ends_as_overtime() {
        let figures =
            check_out_figures(at(8, 5), at(17, 10), AttendanceStatus::Present, &site()).unwrap();
        assert_eq!(figures.total_hours, dec!(9.08));
        assert_eq!(figures.regular_hours, dec!(8));
        assert_eq!(figures.overtime_hours, dec!(1.08));
        assert_eq!(figures.status, AttendanceStatus::Overtime);
    }

    #[test]
    fn late_arrival_with_exact_standard_day_stays_late() {
        let figures =
            check_out_figures(at(8, 1), at(16, 1), AttendanceStatus::Present, &site()).unwrap();
        assert_eq!(figures.overtime_hours, Decimal::ZERO);
        assert_eq!(figures.status, AttendanceStatus::Late);
    }

    #[test]
    fn on_time_nine_hour_shift_is_overtime() {
        let figures =
            check_out_figures(at(7, 59), at(16, 59), AttendanceStatus::Present, &site()).unwrap();
        assert_eq!(figures.total_hours, dec!(9));
        assert_eq!(figures.status, AttendanceStatus::Overtime);
    }

    #[test]
    fn arriving_exactly_at_start_is_not_late() {
        let figures =
            check_out_figures(at(8, 0), at(16, 0), AttendanceStatus::Present, &site()).unwrap();
        assert_eq!(figures.status, AttendanceStatus::Present);
    }

    #[test]
    fn short_shift_before_closing_is_early_departure() {
        let figures =
            check_out_figures(at(8, 0), at(11, 0), AttendanceStatus::Present, &site()).unwrap();
        assert_eq!(figures.total_hours, dec!(3));
        assert_eq!(figures.status, AttendanceStatus::EarlyDeparture);
    }

    #[test]
    fn leaving_early_after_half_a_day_is_not_early_departure() {
        let figures =
            check_out_figures(at(8, 0), at(12, 0), AttendanceStatus::Present, &site()).unwrap();
        assert_eq!(figures.total_hours, dec!(4));
        assert_eq!(figures.status, AttendanceStatus::Present);

        let late =
            check_out_figures(at(9, 0), at(15, 0), AttendanceStatus::Present, &site()).unwrap();
        assert_eq!(late.status, AttendanceStatus::Late);
    }

    #[test]
    fn short_shift_after_closing_is_not_early_departure() {
        let figures =
            check_out_figures(at(17, 30), at(19, 0), AttendanceStatus::Present, &site()).unwrap();
        assert_eq!(figures.status, AttendanceStatus::Late);
    }

    #[test]
    fn lateness_only_upgrades_present() {
        let figures =
            check_out_figures(at(9, 0), at(16, 0), AttendanceStatus::HalfDay, &site()).unwrap();
        assert_eq!(figures.status, AttendanceStatus::HalfDay);
    }

    #[test]
    fn regular_plus_overtime_equals_total() {
        let start = at(6, 0);
        for minutes in (0..=17 * 60).step_by(7) {
            let end = start + Duration::minutes(minutes);
            let (total, regular, overtime) = split_hours(start, end, &site()).unwrap();
            assert_eq!(regular + overtime, total, "after {minutes} minutes");
            assert!(regular <= dec!(8));
            assert!(overtime >= Decimal::ZERO);
        }
    }

    #[test]
    fn negative_or_oversized_shifts_are_rejected() {
        assert!(matches!(
            split_hours(at(12, 0), at(11, 0), &site()),
            Err(AppError::Invalid(_))
        ));
        assert!(matches!(
            split_hours(at(0, 0), at(0, 0) + Duration::hours(25), &site()),
            Err(AppError::Invalid(_))
        ));

        let mut broken = site();
        broken.standard_hours_per_day = Decimal::ZERO;
        assert!(matches!(
            split_hours(at(8, 0), at(9, 0), &broken),
            Err(AppError::Invalid(_))
        ));
    }

    #[test]
    fn phases_follow_the_recorded_times() {
        assert_eq!(phase_of(None), ShiftPhase::NoRecord);
    }
}
