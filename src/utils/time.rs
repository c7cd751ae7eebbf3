use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Hours are persisted with two decimals.
pub const HOURS_SCALE: u32 = 2;

/// Parses a 24-hour "HH:MM" string.
pub fn parse_hh_mm(value: &str) -> Option<NaiveTime> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Calendar day an event belongs to. Days are UTC, truncated to midnight.
pub fn attendance_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// The instant at `time` on the same UTC day as `ts`.
pub fn same_day_at(ts: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    ts.date_naive().and_time(time).and_utc()
}

/// Elapsed hours between two instants, rounded half-up to [`HOURS_SCALE`].
/// Negative when `to` precedes `from`.
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    let seconds = (to - from).num_seconds();
    (Decimal::from(seconds) / Decimal::from(3600))
        .round_dp_with_strategy(HOURS_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_only_two_digit_pairs() {
        assert_eq!(parse_hh_mm("08:00"), NaiveTime::from_hms_opt(8, 0, 0));
        assert_eq!(parse_hh_mm("17:30"), NaiveTime::from_hms_opt(17, 30, 0));
        assert_eq!(parse_hh_mm("8:00"), None);
        assert_eq!(parse_hh_mm("24:00"), None);
        assert_eq!(parse_hh_mm("08:60"), None);
        assert_eq!(parse_hh_mm("0800"), None);
        assert_eq!(parse_hh_mm("+8:00"), None);
        assert_eq!(parse_hh_mm("08:+5"), None);
        assert_eq!(parse_hh_mm("-1:00"), None);
    }

    #[test]
    fn hours_round_to_two_places() {
        let from = Utc.with_ymd_and_hms(2024, 1, 15, 8, 5, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 15, 17, 10, 0).unwrap();
        assert_eq!(hours_between(from, to), dec!(9.08));
        assert_eq!(hours_between(to, from), dec!(-9.08));
    }

    #[test]
    fn day_is_truncated_to_utc_midnight() {
        let late = Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 59).unwrap();
        assert_eq!(
            attendance_day(late),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        let start = same_day_at(late, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap());
    }
}
