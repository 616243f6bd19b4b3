//! Time utilities for workdayd
//!
//! Office policy is expressed as 12-hour wall-clock strings ("10:15 AM") that
//! are interpreted in one fixed policy timezone, never the host's local zone.
//! Instants are carried as `DateTime<Utc>` and projected into the policy
//! timezone when a date or minute-of-day is needed, so the classifier and the
//! scheduler agree regardless of where the service runs.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `WORKDAY_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations.
//!
//! Format: RFC 3339 (e.g., `2025-12-25T14:30:00+05:30`)
//!
//! Example:
//! ```bash
//! WORKDAY_MOCK_TIME="2025-12-25T14:29:30+05:30" workdayd run
//! ```

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono::offset::LocalResult;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::{TimeError, TimeResult};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "WORKDAY_MOCK_TIME";

/// Timezone used when the service config does not name one
pub const DEFAULT_POLICY_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match DateTime::parse_from_rfc3339(&mock_time_str) {
                    Ok(mock_dt) => {
                        let offset = mock_dt.with_timezone(&Utc).signed_duration_since(Utc::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    Err(e) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            error = %e,
                            "Invalid mock time format, expected RFC 3339"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current instant, respecting mock time settings in debug builds.
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Resolve an IANA timezone name ("Asia/Kolkata")
pub fn parse_timezone(name: &str) -> TimeResult<Tz> {
    Tz::from_str(name.trim()).map_err(|_| TimeError::UnknownTimezone(name.to_string()))
}

/// Wall-clock time of day in the policy timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn from_minutes(minutes_since_midnight: u32) -> Option<Self> {
        if minutes_since_midnight >= MINUTES_PER_DAY {
            return None;
        }
        Self::new(
            (minutes_since_midnight / 60) as u8,
            (minutes_since_midnight % 60) as u8,
        )
    }

    /// Parse a strict 12-hour "H:MM AM|PM" string.
    ///
    /// `12:xx AM` is just after midnight, `12:xx PM` just after noon. The
    /// modifier is case-insensitive; the hour must be 1-12 and the minutes
    /// exactly two digits.
    pub fn parse_12h(s: &str) -> TimeResult<Self> {
        let trimmed = s.trim();
        let (time, modifier) = trimmed
            .split_once(' ')
            .ok_or_else(|| TimeError::invalid(s, "expected \"H:MM AM\" or \"H:MM PM\""))?;

        let (raw_hour, raw_minute) = time
            .split_once(':')
            .ok_or_else(|| TimeError::invalid(s, "expected ':' between hour and minutes"))?;

        if raw_hour.is_empty()
            || raw_hour.len() > 2
            || !raw_hour.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(TimeError::invalid(s, "hour must be a number 1-12"));
        }
        if raw_minute.len() != 2 || !raw_minute.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeError::invalid(s, "minutes must be two digits"));
        }

        let hour: u8 = raw_hour
            .parse()
            .map_err(|_| TimeError::invalid(s, "hour must be a number 1-12"))?;
        let minute: u8 = raw_minute
            .parse()
            .map_err(|_| TimeError::invalid(s, "minutes must be two digits"))?;

        if !(1..=12).contains(&hour) {
            return Err(TimeError::invalid(s, "hour must be 1-12"));
        }
        if minute > 59 {
            return Err(TimeError::invalid(s, "minutes must be 0-59"));
        }

        let is_pm = match modifier.trim().to_ascii_uppercase().as_str() {
            "AM" => false,
            "PM" => true,
            _ => return Err(TimeError::invalid(s, "modifier must be AM or PM")),
        };

        let hour24 = match (hour, is_pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, false) => h,
            (h, true) => h + 12,
        };

        Ok(Self {
            hour: hour24,
            minute,
        })
    }

    /// Canonical 12-hour rendering ("2:30 PM", "12:05 AM")
    pub fn format_12h(&self) -> String {
        let (hour12, modifier) = match self.hour {
            0 => (12, "AM"),
            h @ 1..=11 => (h, "AM"),
            12 => (12, "PM"),
            h => (h - 12, "PM"),
        };
        format!("{}:{:02} {}", hour12, self.minute, modifier)
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        (self.hour as u32) * 60 + (self.minute as u32)
    }

    pub fn daily_trigger(&self) -> DailyTrigger {
        DailyTrigger {
            hour: self.hour,
            minute: self.minute,
        }
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_since_midnight()
            .cmp(&other.minutes_since_midnight())
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_12h())
    }
}

impl FromStr for WallClock {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_12h(s)
    }
}

/// Parse a 12-hour time string into minutes since midnight
pub fn parse_time_to_minutes(s: &str) -> TimeResult<u32> {
    WallClock::parse_12h(s).map(|clock| clock.minutes_since_midnight())
}

/// Render minutes since midnight in canonical 12-hour form.
/// Values past the end of the day wrap around.
pub fn format_minutes_12h(minutes_since_midnight: u32) -> String {
    let wrapped = minutes_since_midnight % MINUTES_PER_DAY;
    WallClock {
        hour: (wrapped / 60) as u8,
        minute: (wrapped % 60) as u8,
    }
    .format_12h()
}

/// A trigger that fires once per day at a fixed wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DailyTrigger {
    pub hour: u8,
    pub minute: u8,
}

impl DailyTrigger {
    /// Build a trigger directly from a 12-hour policy string
    pub fn from_12h(s: &str) -> TimeResult<Self> {
        WallClock::parse_12h(s).map(|clock| clock.daily_trigger())
    }

    /// Five-field cron rendering: minute, hour, every day/month/weekday
    pub fn cron_expression(&self) -> String {
        format!("{} {} * * *", self.minute, self.hour)
    }

    /// Next firing strictly after `after`, evaluated in `tz`.
    ///
    /// Ambiguous local times (DST fall-back) fire at the earlier instant; a
    /// local time that does not exist (DST spring-forward) skips that day.
    pub fn next_fire_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let time = NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0)?;
        let local_date = after.with_timezone(&tz).date_naive();

        for offset in 0..3 {
            let date = local_date.checked_add_days(Days::new(offset))?;
            let candidate = match tz.from_local_datetime(&date.and_time(time)) {
                LocalResult::Single(dt) => dt,
                LocalResult::Ambiguous(earliest, _) => earliest,
                LocalResult::None => continue,
            };
            let candidate = candidate.with_timezone(&Utc);
            if candidate > after {
                return Some(candidate);
            }
        }

        None
    }
}

impl fmt::Display for DailyTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cron_expression())
    }
}

/// An instant projected into the policy timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyNow {
    pub date: NaiveDate,
    pub minutes_since_midnight: u32,
}

/// Project an instant into the policy timezone
pub fn policy_now(at: DateTime<Utc>, tz: Tz) -> PolicyNow {
    let local = at.with_timezone(&tz);
    PolicyNow {
        date: local.date_naive(),
        minutes_since_midnight: local.hour() * 60 + local.minute(),
    }
}

/// Current date and minute-of-day in the policy timezone
pub fn now_in_policy_timezone(tz: Tz) -> PolicyNow {
    policy_now(now(), tz)
}

/// UTC bounds `[start, end)` of a calendar day in the policy timezone
pub fn policy_day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_day_start(date, tz);
    let end = date
        .succ_opt()
        .map(|next| local_day_start(next, tz))
        .unwrap_or_else(|| start + chrono::Duration::days(1));
    (start, end)
}

fn local_day_start(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    // A few zones skip midnight on DST days; take the first hour that exists.
    for hour in 0..4 {
        if let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0)
            && let Some(dt) = tz.from_local_datetime(&date.and_time(time)).earliest()
        {
            return dt.with_timezone(&Utc);
        }
    }
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Whole minutes elapsed from `start` to `end`, floored, never negative
pub fn whole_minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let minutes = (end - start).num_minutes();
    u32::try_from(minutes.max(0)).unwrap_or(u32::MAX)
}

/// Helper to format minute counts in human-readable form
pub fn format_minutes(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;

    if hours > 0 {
        format!("{}h {}m", hours, rest)
    } else {
        format!("{}m", rest)
    }
}
