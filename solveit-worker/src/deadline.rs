//! Relative task deadlines such as `24h`, `3d`, `2w`, `1m` or `1y`.
//!
//! Hours, days and weeks are fixed spans. Months and years move the
//! calendar month and keep the day of month; a day past the end of the
//! target month rolls over into the next one (Jan 31 + 1m is Mar 2 in a
//! leap year).

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static DEADLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([hdwmy])$").expect("Invalid deadline regex"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeadlineError {
    #[error("invalid duration format: {0}")]
    InvalidFormat(String),

    #[error("duration {0} is out of range")]
    OutOfRange(String),
}

/// Absolute deadline for a task assigned at `assigned_at`
pub fn parse_deadline(
    value: &str,
    assigned_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, DeadlineError> {
    let captures = DEADLINE_RE
        .captures(value)
        .ok_or_else(|| DeadlineError::InvalidFormat(value.to_string()))?;
    let out_of_range = || DeadlineError::OutOfRange(value.to_string());

    let amount: u32 = captures[1].parse().map_err(|_| out_of_range())?;
    let amount_i64 = i64::from(amount);

    let deadline = match &captures[2] {
        "h" => Duration::try_hours(amount_i64).and_then(|d| assigned_at.checked_add_signed(d)),
        "d" => Duration::try_days(amount_i64).and_then(|d| assigned_at.checked_add_signed(d)),
        "w" => Duration::try_weeks(amount_i64).and_then(|d| assigned_at.checked_add_signed(d)),
        "m" => add_months_rolling(assigned_at, amount),
        "y" => amount
            .checked_mul(12)
            .and_then(|months| add_months_rolling(assigned_at, months)),
        _ => return Err(DeadlineError::InvalidFormat(value.to_string())),
    };

    deadline.ok_or_else(out_of_range)
}

/// Shift the month, then count the day of month from the 1st of the target
/// month so overflow days carry into the following month.
fn add_months_rolling(at: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let total = i64::from(at.year()) * 12 + i64::from(at.month0()) + i64::from(months);
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_days(Days::new(u64::from(at.day0())))?;
    Some(date.and_time(at.time()).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_fixed_spans() {
        let base = at(2024, 1, 1, 0);
        assert_eq!(parse_deadline("24h", base).unwrap(), at(2024, 1, 2, 0));
        assert_eq!(parse_deadline("3d", base).unwrap(), at(2024, 1, 4, 0));
        assert_eq!(parse_deadline("2w", base).unwrap(), at(2024, 1, 15, 0));
    }

    #[test]
    fn test_calendar_spans() {
        assert_eq!(
            parse_deadline("1m", at(2024, 1, 15, 9)).unwrap(),
            at(2024, 2, 15, 9)
        );
        assert_eq!(
            parse_deadline("1m", at(2024, 12, 31, 6)).unwrap(),
            at(2025, 1, 31, 6)
        );
        assert_eq!(
            parse_deadline("14m", at(2023, 11, 30, 0)).unwrap(),
            at(2025, 1, 30, 0)
        );
    }

    #[test]
    fn test_calendar_overflow_rolls_forward() {
        assert_eq!(
            parse_deadline("1m", at(2024, 1, 31, 0)).unwrap(),
            at(2024, 3, 2, 0)
        );
        assert_eq!(
            parse_deadline("1m", at(2023, 1, 31, 12)).unwrap(),
            at(2023, 3, 3, 12)
        );
        assert_eq!(
            parse_deadline("1y", at(2024, 2, 29, 0)).unwrap(),
            at(2025, 3, 1, 0)
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = at(2024, 1, 1, 0);
        for value in ["badvalue", "5x", "", "h", "24", "3days", " 24h", "24H", "-1d"] {
            assert_eq!(
                parse_deadline(value, base),
                Err(DeadlineError::InvalidFormat(value.to_string())),
                "{value}"
            );
        }
    }

    #[test]
    fn test_out_of_range() {
        let base = at(2024, 1, 1, 0);
        assert!(matches!(
            parse_deadline("99999999999h", base),
            Err(DeadlineError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_deadline("4000000000y", base),
            Err(DeadlineError::OutOfRange(_))
        ));
    }
}
