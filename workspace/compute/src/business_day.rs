//! Business-day resolution in the organization timezone.
//!
//! A business date is the calendar date of an instant in the configured
//! timezone, rendered as a zero-padded `YYYY-MM-DD` key. Every "entries of
//! day X" query goes through [`BusinessCalendar::day_bounds_utc`], so the
//! session close path and the daily recalculation agree on membership.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CashError, Result};

/// Format of every persisted business date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of "now". Injected so tests can pin the wall clock.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Inclusive UTC range covering one local business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub start_utc: DateTime<Utc>,
    /// Last millisecond of the day.
    pub end_utc: DateTime<Utc>,
}

impl DayBounds {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_utc <= instant && instant <= self.end_utc
    }
}

/// Resolves instants and date strings into business dates of one timezone.
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    tz: Tz,
    clock: Arc<dyn Clock>,
}

impl BusinessCalendar {
    pub fn new(tz: Tz, clock: Arc<dyn Clock>) -> Self {
        Self { tz, clock }
    }

    /// Calendar on the host clock.
    pub fn system(tz: Tz) -> Self {
        Self::new(tz, Arc::new(SystemClock))
    }

    /// Builds a calendar from an IANA timezone name such as `America/Bogota`.
    pub fn from_name(name: &str, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::new(parse_timezone(name)?, clock))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn timezone_name(&self) -> &'static str {
        self.tz.name()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Calendar date of `instant` (default: now) in the organization timezone.
    pub fn business_date_of(&self, instant: Option<DateTime<Utc>>) -> NaiveDate {
        let instant = instant.unwrap_or_else(|| self.clock.now());
        instant.with_timezone(&self.tz).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.business_date_of(None)
    }

    /// `[00:00:00.000, 23:59:59.999]` local time of `date`, expressed in UTC.
    ///
    /// The end is one millisecond before the next local midnight, so days
    /// that are 23 or 25 hours long around DST transitions are covered
    /// exactly.
    pub fn day_bounds_utc(&self, date: NaiveDate) -> DayBounds {
        let next = date.succ_opt().unwrap_or(date);
        DayBounds {
            start_utc: self.local_to_utc(date.and_time(NaiveTime::MIN)),
            end_utc: self.local_to_utc(next.and_time(NaiveTime::MIN)) - TimeDelta::milliseconds(1),
        }
    }

    /// First instant at or after `after` whose local wall time is `at`.
    pub fn next_occurrence(&self, after: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
        let mut date = self.business_date_of(Some(after));
        loop {
            let candidate = self.local_to_utc(date.and_time(at));
            if candidate > after {
                return candidate;
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => return candidate,
            };
        }
    }

    /// Maps a local wall time to UTC. Ambiguous times take the earlier
    /// offset; times inside a DST gap move forward to the first valid minute.
    fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let mut candidate = local;
        // Real-world gaps are at most a day long
        for _ in 0..=(24 * 60) {
            if let Some(resolved) = self.tz.from_local_datetime(&candidate).earliest() {
                return resolved.with_timezone(&Utc);
            }
            candidate += TimeDelta::minutes(1);
        }
        local.and_utc()
    }
}

/// Parses an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| CashError::UnknownTimezone(name.to_string()))
}

/// Parses a strict zero-padded `YYYY-MM-DD` business date.
pub fn parse_business_date(raw: &str) -> Result<NaiveDate> {
    let bytes = raw.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !well_formed {
        return Err(CashError::InvalidDateFormat(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| CashError::InvalidDateFormat(raw.to_string()))
}

/// Canonical storage key of a business date.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// First and last date of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    if !(1..=12).contains(&month) {
        return Err(CashError::InvalidMonth(month));
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(CashError::InvalidMonth(month))?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next_month
        .and_then(|d| d.pred_opt())
        .ok_or(CashError::InvalidMonth(month))?;
    debug_assert_eq!(last.month(), month);
    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar(tz: Tz, now: DateTime<Utc>) -> BusinessCalendar {
        BusinessCalendar::new(tz, Arc::new(FixedClock::new(now)))
    }

    fn utc(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    #[test]
    fn test_business_date_follows_organization_timezone() {
        // 02:30 UTC is still the previous evening in Bogota (UTC-5)
        let cal = calendar(chrono_tz::America::Bogota, utc("2025-03-02T02:30:00Z"));
        assert_eq!(date_key(cal.today()), "2025-03-01");
        assert_eq!(
            date_key(cal.business_date_of(Some(utc("2025-03-02T05:00:00Z")))),
            "2025-03-02"
        );
    }

    #[test]
    fn test_day_bounds_without_dst() {
        let cal = calendar(chrono_tz::America::Bogota, utc("2025-03-01T12:00:00Z"));
        let bounds = cal.day_bounds_utc(parse_business_date("2025-03-01").unwrap());
        assert_eq!(bounds.start_utc, utc("2025-03-01T05:00:00Z"));
        assert_eq!(bounds.end_utc, utc("2025-03-02T04:59:59.999Z"));
        assert!(bounds.contains(utc("2025-03-02T04:59:59Z")));
        assert!(!bounds.contains(utc("2025-03-02T05:00:00Z")));
    }

    #[test]
    fn test_day_bounds_on_spring_forward_day() {
        let cal = calendar(chrono_tz::America::New_York, utc("2025-03-09T12:00:00Z"));
        let bounds = cal.day_bounds_utc(parse_business_date("2025-03-09").unwrap());
        assert_eq!(bounds.start_utc, utc("2025-03-09T05:00:00Z"));
        // 23-hour day: the next midnight is already on daylight time
        assert_eq!(bounds.end_utc, utc("2025-03-10T03:59:59.999Z"));
    }

    #[test]
    fn test_day_bounds_when_midnight_does_not_exist() {
        // Sao Paulo skipped from 00:00 to 01:00 on 2018-11-04
        let cal = calendar(chrono_tz::America::Sao_Paulo, utc("2018-11-04T12:00:00Z"));
        let bounds = cal.day_bounds_utc(parse_business_date("2018-11-04").unwrap());
        assert_eq!(bounds.start_utc, utc("2018-11-04T03:00:00Z"));

        let previous = cal.day_bounds_utc(parse_business_date("2018-11-03").unwrap());
        assert_eq!(previous.end_utc, utc("2018-11-04T02:59:59.999Z"));
    }

    #[test]
    fn test_parse_business_date_rejects_malformed_input() {
        for raw in ["2025-3-1", "2025/03/01", "01-03-2025", "2025-02-30", "", "2025-03-01T00:00"] {
            let err = parse_business_date(raw).unwrap_err();
            assert_eq!(err.code(), "INVALID_DATE_FORMAT", "input {raw:?}");
        }
        assert_eq!(
            parse_business_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_month_bounds() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(date_key(first), "2024-02-01");
        assert_eq!(date_key(last), "2024-02-29");

        let (_, december_end) = month_bounds(2025, 12).unwrap();
        assert_eq!(date_key(december_end), "2025-12-31");

        assert!(matches!(month_bounds(2025, 13), Err(CashError::InvalidMonth(13))));
        assert!(matches!(month_bounds(2025, 0), Err(CashError::InvalidMonth(0))));
    }

    #[test]
    fn test_next_occurrence_of_sweep_time() {
        let at = NaiveTime::from_hms_opt(0, 5, 0).unwrap();
        let cal = calendar(chrono_tz::America::Bogota, utc("2025-03-01T12:00:00Z"));
        // 00:05 Bogota on 2025-03-02
        assert_eq!(
            cal.next_occurrence(utc("2025-03-01T12:00:00Z"), at),
            utc("2025-03-02T05:05:00Z")
        );
        // Just before the cutoff on the same local day
        assert_eq!(
            cal.next_occurrence(utc("2025-03-02T05:00:00Z"), at),
            utc("2025-03-02T05:05:00Z")
        );
    }

    #[test]
    fn test_unknown_timezone() {
        let err = BusinessCalendar::from_name("Mars/Olympus", Arc::new(SystemClock)).unwrap_err();
        assert!(matches!(err, CashError::UnknownTimezone(_)));
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(utc("2025-03-01T12:00:00Z"));
        clock.advance(TimeDelta::hours(13));
        assert_eq!(clock.now(), utc("2025-03-02T01:00:00Z"));
        clock.set(utc("2025-04-01T00:00:00Z"));
        assert_eq!(clock.now(), utc("2025-04-01T00:00:00Z"));
    }
}
