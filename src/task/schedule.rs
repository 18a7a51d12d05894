//! Cron helpers for the recurring check.

use std::str::FromStr;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use cron::Schedule;

/// Parses a cron expression, prepending a seconds field to five-field expressions.
pub fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {trimmed}"))
    } else {
        Schedule::from_str(trimmed)
    }
}

/// Time left until the next fire time after `now`, if the schedule has one.
pub fn next_delay(schedule: &Schedule, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_parse_five_field() {
        let schedule = parse_schedule("*/15 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 7, 30).unwrap();
        assert_eq!(next_delay(&schedule, now), Some(Duration::from_secs(7 * 60 + 30)));
    }

    #[test]
    fn test_parse_six_field() {
        let schedule = parse_schedule("30 0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(next_delay(&schedule, now), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_next_fire_is_strictly_after_now() {
        let schedule = parse_schedule("*/15 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 15, 0).unwrap();
        assert_eq!(next_delay(&schedule, now), Some(Duration::from_secs(15 * 60)));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_schedule("not a cron").is_err());
    }
}
