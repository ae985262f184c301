//! Billing calendar.
//!
//! Deterministic, pure logic. The caller supplies `now`; nothing here reads the
//! wall clock.
//!
//! The billing period is the calendar month of `now` in the configured
//! timezone. A card's own `closing_day` is not consulted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::ReconcileError;

// ---------------------------------------------------------------------------
// YearMonth
// ---------------------------------------------------------------------------

/// Calendar month key, rendered as `YYYY-MM`. Used as the reset marker key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ReconcileError> {
        if !(1..=12).contains(&month) {
            return Err(ReconcileError::InvalidInput(format!(
                "invalid month {month}; expected 1..=12"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of_date(d: NaiveDate) -> Self {
        Self {
            year: d.year(),
            month: d.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ReconcileError::InvalidInput(format!("invalid year-month '{s}'; expected YYYY-MM"));
        let (y, m) = s.trim().split_once('-').ok_or_else(bad)?;
        let year: i32 = y.parse().map_err(|_| bad())?;
        let month: u32 = m.parse().map_err(|_| bad())?;
        YearMonth::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ReconcileError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> Self {
        ym.to_string()
    }
}

// ---------------------------------------------------------------------------
// BillingCalendar
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BillingCalendar {
    tz: Tz,
}

impl Default for BillingCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl BillingCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self::new(Tz::UTC)
    }

    /// Build from an IANA zone name such as `America/Sao_Paulo`.
    pub fn from_name(name: &str) -> Result<Self, ReconcileError> {
        let tz: Tz = name.trim().parse().map_err(|e| {
            ReconcileError::InvalidInput(format!("unknown timezone '{name}': {e}"))
        })?;
        Ok(Self::new(tz))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    pub fn year_month(&self, now: DateTime<Utc>) -> YearMonth {
        YearMonth::of_date(self.local_date(now))
    }

    /// `true` on the first calendar day of the month, local time.
    pub fn is_first_day(&self, now: DateTime<Utc>) -> bool {
        self.local_date(now).day() == 1
    }

    /// Start of the billing period containing `now`: local midnight on day 1.
    ///
    /// Zones whose DST transition swallows local midnight resolve to the first
    /// representable hour of that day.
    pub fn period_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = self.local_date(now);
        let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap_or(local);

        (0..4)
            .filter_map(|h| first.and_hms_opt(h, 0, 0))
            .find_map(|naive| self.tz.from_local_datetime(&naive).earliest())
            .map(|t| t.with_timezone(&Utc))
            .or_else(|| first.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n)))
            .unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn period_start_is_first_of_month_midnight_utc() {
        let cal = BillingCalendar::utc();
        assert_eq!(
            cal.period_start(at("2026-10-19T15:42:00Z")),
            at("2026-10-01T00:00:00Z")
        );
    }

    #[test]
    fn period_start_respects_timezone_offset() {
        let cal = BillingCalendar::from_name("America/Sao_Paulo").unwrap();
        // 02:00Z on Oct 1st is still Sep 30th in Sao Paulo (UTC-3).
        let now = at("2026-10-01T02:00:00Z");
        assert_eq!(cal.year_month(now).to_string(), "2026-09");
        assert!(!cal.is_first_day(now));
        assert_eq!(cal.period_start(now), at("2026-09-01T03:00:00Z"));
    }

    #[test]
    fn first_day_detection() {
        let cal = BillingCalendar::utc();
        assert!(cal.is_first_day(at("2026-11-01T00:00:00Z")));
        assert!(cal.is_first_day(at("2026-11-01T23:59:59Z")));
        assert!(!cal.is_first_day(at("2026-11-02T00:00:00Z")));
    }

    #[test]
    fn year_month_parse_and_display() {
        let ym: YearMonth = "2026-03".parse().unwrap();
        assert_eq!(ym.year(), 2026);
        assert_eq!(ym.month(), 3);
        assert_eq!(ym.to_string(), "2026-03");
        assert!("2026-13".parse::<YearMonth>().is_err());
        assert!("202603".parse::<YearMonth>().is_err());
    }

    #[test]
    fn year_month_orders_chronologically() {
        let a: YearMonth = "2025-12".parse().unwrap();
        let b: YearMonth = "2026-01".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn unknown_timezone_is_invalid_input() {
        let err = BillingCalendar::from_name("Mars/Olympus").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }
}
