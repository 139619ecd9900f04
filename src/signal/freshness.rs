use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, Utc, Weekday};
use serde::Serialize;

use crate::config::FreshnessConfig;

/// Latest bar older than the session it should reflect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Staleness {
    pub latest: NaiveDate,
    pub expected: NaiveDate,
}

fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn previous_trading_day(date: NaiveDate) -> NaiveDate {
    let mut day = date.pred_opt().unwrap_or(date);
    while !is_trading_day(day) {
        day = day.pred_opt().unwrap_or(day);
    }
    day
}

/// Most recent session whose daily bar should already exist at `now`.
///
/// Weekends and pre-open hours point back to the previous weekday. Exchange
/// holidays are not known here.
pub fn expected_session(now: DateTime<Utc>, offset: FixedOffset, open: NaiveTime) -> NaiveDate {
    let local = now.with_timezone(&offset);
    let today = local.date_naive();
    if is_trading_day(today) && local.time() >= open {
        today
    } else {
        previous_trading_day(today)
    }
}

pub fn check(
    latest: NaiveDate,
    now: DateTime<Utc>,
    config: &FreshnessConfig,
) -> Option<Staleness> {
    let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600).unwrap_or(Utc.fix());
    let open = config.session_open_time().unwrap_or(NaiveTime::MIN);
    let expected = expected_session(now, offset, open);
    (latest < expected).then_some(Staleness { latest, expected })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_york() -> FreshnessConfig {
        FreshnessConfig::default()
    }

    #[test]
    fn midsession_expects_today() {
        // Wednesday 2024-06-05 15:00 UTC = 10:00 at UTC-5
        let now = utc(2024, 6, 5, 15, 0);
        assert_eq!(check(date(2024, 6, 5), now, &new_york()), None);
        assert_eq!(
            check(date(2024, 6, 4), now, &new_york()),
            Some(Staleness {
                latest: date(2024, 6, 4),
                expected: date(2024, 6, 5),
            })
        );
    }

    #[test]
    fn pre_open_expects_previous_session() {
        // Wednesday 2024-06-05 13:00 UTC = 08:00 at UTC-5
        let now = utc(2024, 6, 5, 13, 0);
        assert_eq!(check(date(2024, 6, 4), now, &new_york()), None);
    }

    #[test]
    fn monday_pre_open_expects_friday() {
        // Monday 2024-06-03 12:00 UTC = 07:00 at UTC-5
        let now = utc(2024, 6, 3, 12, 0);
        assert_eq!(check(date(2024, 5, 31), now, &new_york()), None);
        assert!(check(date(2024, 5, 30), now, &new_york()).is_some());
    }

    #[test]
    fn weekend_expects_friday() {
        // Sunday 2024-06-09 18:00 UTC
        let now = utc(2024, 6, 9, 18, 0);
        assert_eq!(check(date(2024, 6, 7), now, &new_york()), None);
        assert!(check(date(2024, 6, 6), now, &new_york()).is_some());
    }

    #[test]
    fn summer_offset_moves_open_an_hour_earlier() {
        // Wednesday 2024-06-05 13:45 UTC = 09:45 EDT, 08:45 at UTC-5
        let now = utc(2024, 6, 5, 13, 45);
        let edt = FreshnessConfig {
            utc_offset_hours: -4,
            ..FreshnessConfig::default()
        };
        assert!(check(date(2024, 6, 4), now, &edt).is_some());
        assert_eq!(check(date(2024, 6, 4), now, &new_york()), None);
    }

    #[test]
    fn offset_shifts_calendar_day() {
        // Thursday 2024-06-06 02:00 UTC is still Wednesday evening in New York
        let now = utc(2024, 6, 6, 2, 0);
        assert_eq!(check(date(2024, 6, 5), now, &new_york()), None);
    }
}
