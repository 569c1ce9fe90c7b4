use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::error::EngineError;

/// Default `from` for "all time" windows: the product launch date. Carried
/// forward from the original deployment; overridable through
/// `PAGESIGHT_ALL_TIME_ORIGIN`. Domains registered later simply get empty
/// leading buckets.
pub const ALL_TIME_ORIGIN: (i32, u32, u32) = (2023, 1, 1);

pub fn default_all_time_origin() -> DateTime<Utc> {
    let (y, m, d) = ALL_TIME_ORIGIN;
    match Utc.with_ymd_and_hms(y, m, d, 0, 0, 0) {
        chrono::LocalResult::Single(t) => t,
        _ => Utc::now(),
    }
}

/// A reporting period. Calendar units cover the unit containing the
/// reference date; rolling units cover a fixed span ending at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Month,
    Year,
    AllTime,
    Rolling { amount: u32, unit: RollingUnit },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Minute,
    Hour,
    Day,
    Month,
}

/// An absolute UTC window plus the bucket size reports should use.
/// `to` is inclusive (last representable instant of the period for
/// calendar units, the reference date itself for rolling units).
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub granularity: Granularity,
}

impl Period {
    /// Parse the closed set of period strings: `day`, `month`, `year`,
    /// `all`, or `{amount}{unit}` with unit h/d/w/m/y (e.g. `7d`, `30d`,
    /// `12h`). Anything else is a validation error, never a default.
    ///
    /// Rolling amounts are capped per unit (24h, 365d, 52w, 24m, 10y):
    /// the period string is caller-supplied, and an uncapped amount
    /// would let one query materialize billions of buckets.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        match raw {
            "day" => return Ok(Period::Day),
            "month" => return Ok(Period::Month),
            "year" => return Ok(Period::Year),
            "all" => return Ok(Period::AllTime),
            _ => {}
        }

        let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
        let suffix = &raw[digits.len()..];
        let amount: u32 = digits
            .parse()
            .map_err(|_| EngineError::validation(format!("unknown period: {raw:?}")))?;
        if amount == 0 {
            return Err(EngineError::validation(format!("unknown period: {raw:?}")));
        }
        let unit = match suffix {
            "h" => RollingUnit::Hours,
            "d" => RollingUnit::Days,
            "w" => RollingUnit::Weeks,
            "m" => RollingUnit::Months,
            "y" => RollingUnit::Years,
            _ => return Err(EngineError::validation(format!("unknown period: {raw:?}"))),
        };
        let max = match unit {
            RollingUnit::Hours => 24,
            RollingUnit::Days => 365,
            RollingUnit::Weeks => 52,
            RollingUnit::Months => 24,
            RollingUnit::Years => 10,
        };
        if amount > max {
            return Err(EngineError::validation(format!(
                "period {raw:?} exceeds the maximum of {max}{suffix}"
            )));
        }
        Ok(Period::Rolling { amount, unit })
    }

    /// Resolve to an absolute window around `date`.
    ///
    /// Calendar units span `[startOf(unit), endOf(unit)]` in UTC; rolling
    /// units span `[date - amount * unit, date]`; `all` starts at the
    /// fixed origin. Granularity is fixed by the period: day→hour,
    /// rolling hours→minute, rolling days/weeks and month→day,
    /// year/rolling months/all→month.
    pub fn resolve(&self, date: DateTime<Utc>, all_time_origin: DateTime<Utc>) -> Window {
        match *self {
            Period::Day => {
                let from = truncate_day(date);
                Window {
                    from,
                    to: from + Duration::days(1) - Duration::milliseconds(1),
                    granularity: Granularity::Hour,
                }
            }
            Period::Month => {
                let from = truncate_month(date);
                let next = from
                    .checked_add_months(Months::new(1))
                    .unwrap_or(from + Duration::days(31));
                Window {
                    from,
                    to: next - Duration::milliseconds(1),
                    granularity: Granularity::Day,
                }
            }
            Period::Year => {
                let from = truncate_year(date);
                let next = from
                    .checked_add_months(Months::new(12))
                    .unwrap_or(from + Duration::days(366));
                Window {
                    from,
                    to: next - Duration::milliseconds(1),
                    granularity: Granularity::Month,
                }
            }
            Period::AllTime => Window {
                from: all_time_origin,
                to: date,
                granularity: Granularity::Month,
            },
            Period::Rolling { amount, unit } => {
                let from = match unit {
                    RollingUnit::Hours => date - Duration::hours(amount as i64),
                    RollingUnit::Days => date - Duration::days(amount as i64),
                    RollingUnit::Weeks => date - Duration::weeks(amount as i64),
                    RollingUnit::Months => date
                        .checked_sub_months(Months::new(amount))
                        .unwrap_or(date - Duration::days(30 * amount as i64)),
                    RollingUnit::Years => date
                        .checked_sub_months(Months::new(12 * amount))
                        .unwrap_or(date - Duration::days(365 * amount as i64)),
                };
                let granularity = match unit {
                    RollingUnit::Hours => Granularity::Minute,
                    RollingUnit::Days | RollingUnit::Weeks => Granularity::Day,
                    RollingUnit::Months | RollingUnit::Years => Granularity::Month,
                };
                Window {
                    from,
                    to: date,
                    granularity,
                }
            }
        }
    }
}

impl Window {
    /// Number of buckets in the window: whole granularity units between
    /// the ends, plus one (both ends produce a bucket). For a calendar
    /// month this is exactly the month's day count, 28–31.
    pub fn data_points(&self) -> i64 {
        self.granularity.whole_units_between(self.from, self.to) + 1
    }
}

impl Granularity {
    /// Whole units elapsed between `from` and `to`, truncating any
    /// partial unit. Months count calendar months, not 30-day spans.
    pub fn whole_units_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
        match self {
            Granularity::Minute => (to - from).num_minutes(),
            Granularity::Hour => (to - from).num_hours(),
            Granularity::Day => (to - from).num_days(),
            Granularity::Month => {
                let mut months = (to.year() as i64 * 12 + to.month0() as i64)
                    - (from.year() as i64 * 12 + from.month0() as i64);
                if (to.day(), to.time()) < (from.day(), from.time()) {
                    months -= 1;
                }
                months.max(0)
            }
        }
    }

    /// The instant `steps` units before `at` (calendar-aware for months).
    pub fn step_back(&self, at: DateTime<Utc>, steps: i64) -> DateTime<Utc> {
        match self {
            Granularity::Minute => at - Duration::minutes(steps),
            Granularity::Hour => at - Duration::hours(steps),
            Granularity::Day => at - Duration::days(steps),
            Granularity::Month => at
                .checked_sub_months(Months::new(steps as u32))
                .unwrap_or(at - Duration::days(30 * steps)),
        }
    }

    /// Whether two instants fall in the same bucket of this granularity.
    pub fn same_bucket(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        match self {
            Granularity::Minute => {
                a.date_naive() == b.date_naive() && a.hour() == b.hour() && a.minute() == b.minute()
            }
            Granularity::Hour => a.date_naive() == b.date_naive() && a.hour() == b.hour(),
            Granularity::Day => a.date_naive() == b.date_naive(),
            Granularity::Month => a.year() == b.year() && a.month() == b.month(),
        }
    }

    /// Truncate to the bucket's aligned start (used for output labels).
    pub fn truncate(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let day = truncate_day(at);
        match self {
            Granularity::Minute => day + Duration::hours(at.hour() as i64)
                + Duration::minutes(at.minute() as i64),
            Granularity::Hour => day + Duration::hours(at.hour() as i64),
            Granularity::Day => day,
            Granularity::Month => truncate_month(at),
        }
    }
}

fn truncate_day(at: DateTime<Utc>) -> DateTime<Utc> {
    match at
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|n| n.and_utc())
    {
        Some(t) => t,
        None => at,
    }
}

fn truncate_month(at: DateTime<Utc>) -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0) {
        chrono::LocalResult::Single(t) => t,
        _ => at,
    }
}

fn truncate_year(at: DateTime<Utc>) -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(at.year(), 1, 1, 0, 0, 0) {
        chrono::LocalResult::Single(t) => t,
        _ => at,
    }
}
