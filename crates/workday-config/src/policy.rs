//! Validated policy structures

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use workday_util::{DailyTrigger, WallClock, DEFAULT_POLICY_TIMEZONE};

use crate::schema::{
    RawBreakRules, RawBreakWindow, RawConfig, RawOfficeConfig, RawServiceConfig,
};
use crate::validation::{parse_policy_time, ValidationError};

pub const DEFAULT_START_TIME: &str = "10:00 AM";
pub const DEFAULT_LATE_GRACE_MINUTES: u32 = 15;
pub const DEFAULT_LATE_THRESHOLD: &str = "10:15 AM";
pub const DEFAULT_HALF_DAY_THRESHOLD: &str = "1:00 PM";
pub const DEFAULT_AUTO_ABSENT_TIME: &str = "11:00 AM";
pub const DEFAULT_WORK_END_TIME: &str = "7:00 PM";
pub const DEFAULT_LUNCH_START: &str = "2:30 PM";
pub const DEFAULT_LUNCH_END: &str = "3:30 PM";

/// Complete office policy record, as persisted (times in 12-hour form)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeConfig {
    pub start_time: String,
    pub late_grace_minutes: u32,
    pub late_threshold: String,
    pub half_day_threshold: String,
    pub auto_absent_time: String,
    pub work_end_time: String,
    pub break_window: BreakWindowConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakWindowConfig {
    pub start: String,
    pub end: String,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            start_time: DEFAULT_START_TIME.into(),
            late_grace_minutes: DEFAULT_LATE_GRACE_MINUTES,
            late_threshold: DEFAULT_LATE_THRESHOLD.into(),
            half_day_threshold: DEFAULT_HALF_DAY_THRESHOLD.into(),
            auto_absent_time: DEFAULT_AUTO_ABSENT_TIME.into(),
            work_end_time: DEFAULT_WORK_END_TIME.into(),
            break_window: BreakWindowConfig {
                start: DEFAULT_LUNCH_START.into(),
                end: DEFAULT_LUNCH_END.into(),
            },
        }
    }
}

impl OfficeConfig {
    /// Apply a partial override on top of this config, field by field
    pub fn merged(&self, over: &RawOfficeConfig) -> Self {
        let pick = |value: &Option<String>, base: &str| {
            value.clone().unwrap_or_else(|| base.to_string())
        };
        let window = over.break_window.clone().unwrap_or_default();

        Self {
            start_time: pick(&over.start_time, &self.start_time),
            late_grace_minutes: over.late_grace_minutes.unwrap_or(self.late_grace_minutes),
            late_threshold: pick(&over.late_threshold, &self.late_threshold),
            half_day_threshold: pick(&over.half_day_threshold, &self.half_day_threshold),
            auto_absent_time: pick(&over.auto_absent_time, &self.auto_absent_time),
            work_end_time: pick(&over.work_end_time, &self.work_end_time),
            break_window: BreakWindowConfig {
                start: pick(&window.start, &self.break_window.start),
                end: pick(&window.end, &self.break_window.end),
            },
        }
    }
}

impl RawOfficeConfig {
    /// Merge this partial override with the built-in defaults
    pub fn normalize(&self) -> OfficeConfig {
        OfficeConfig::default().merged(self)
    }
}

impl From<OfficeConfig> for RawOfficeConfig {
    fn from(config: OfficeConfig) -> Self {
        Self {
            start_time: Some(config.start_time),
            late_grace_minutes: Some(config.late_grace_minutes),
            late_threshold: Some(config.late_threshold),
            half_day_threshold: Some(config.half_day_threshold),
            auto_absent_time: Some(config.auto_absent_time),
            work_end_time: Some(config.work_end_time),
            break_window: Some(RawBreakWindow {
                start: Some(config.break_window.start),
                end: Some(config.break_window.end),
            }),
        }
    }
}

/// Office policy with every time parsed and the ordering invariants checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficePolicy {
    pub config: OfficeConfig,
    pub start: WallClock,
    pub late_grace_minutes: u32,
    pub late_threshold: WallClock,
    pub half_day_threshold: WallClock,
    pub auto_absent: WallClock,
    pub work_end: WallClock,
    pub lunch_start: WallClock,
    pub lunch_end: WallClock,
}

impl OfficePolicy {
    /// Parse and check a complete config, collecting every problem found
    pub fn from_config(config: OfficeConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut parse = |field: &'static str, value: &str| match parse_policy_time(field, value) {
            Ok(clock) => Some(clock),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let start = parse("start_time", &config.start_time);
        let late = parse("late_threshold", &config.late_threshold);
        let half_day = parse("half_day_threshold", &config.half_day_threshold);
        let auto_absent = parse("auto_absent_time", &config.auto_absent_time);
        let work_end = parse("work_end_time", &config.work_end_time);
        let lunch_start = parse("break_window.start", &config.break_window.start);
        let lunch_end = parse("break_window.end", &config.break_window.end);

        let (
            Some(start),
            Some(late_threshold),
            Some(half_day_threshold),
            Some(auto_absent),
            Some(work_end),
            Some(lunch_start),
            Some(lunch_end),
        ) = (start, late, half_day, auto_absent, work_end, lunch_start, lunch_end)
        else {
            return Err(errors);
        };

        if start > late_threshold {
            errors.push(ValidationError::ThresholdOrder {
                earlier: "start_time".into(),
                later: "late_threshold".into(),
                message: format!("{} is after {}", start, late_threshold),
            });
        }
        if late_threshold > half_day_threshold {
            errors.push(ValidationError::ThresholdOrder {
                earlier: "late_threshold".into(),
                later: "half_day_threshold".into(),
                message: format!("{} is after {}", late_threshold, half_day_threshold),
            });
        }
        if lunch_start >= lunch_end {
            errors.push(ValidationError::EmptyBreakWindow {
                start: lunch_start.to_string(),
                end: lunch_end.to_string(),
            });
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            late_grace_minutes: config.late_grace_minutes,
            config,
            start,
            late_threshold,
            half_day_threshold,
            auto_absent,
            work_end,
            lunch_start,
            lunch_end,
        })
    }

    /// Normalize a partial override against the defaults, then validate
    pub fn from_override(raw: &RawOfficeConfig) -> Result<Self, Vec<ValidationError>> {
        Self::from_config(raw.normalize())
    }

    pub fn lunch_start_trigger(&self) -> DailyTrigger {
        self.lunch_start.daily_trigger()
    }

    pub fn lunch_end_trigger(&self) -> DailyTrigger {
        self.lunch_end.daily_trigger()
    }

    pub fn auto_absent_trigger(&self) -> DailyTrigger {
        self.auto_absent.daily_trigger()
    }
}

impl Default for OfficePolicy {
    fn default() -> Self {
        Self {
            config: OfficeConfig::default(),
            start: WallClock { hour: 10, minute: 0 },
            late_grace_minutes: DEFAULT_LATE_GRACE_MINUTES,
            late_threshold: WallClock { hour: 10, minute: 15 },
            half_day_threshold: WallClock { hour: 13, minute: 0 },
            auto_absent: WallClock { hour: 11, minute: 0 },
            work_end: WallClock { hour: 19, minute: 0 },
            lunch_start: WallClock { hour: 14, minute: 30 },
            lunch_end: WallClock { hour: 15, minute: 30 },
        }
    }
}

/// Hard cap on how many members of a team may be on break at once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyCap {
    pub team: String,
    pub max_on_break: usize,
}

/// Advisory daily break budget for a team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftLimit {
    pub team: String,
    pub daily_minutes: u32,
}

/// Per-team break rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakRules {
    pub concurrency_caps: Vec<ConcurrencyCap>,
    pub soft_limits: Vec<SoftLimit>,
}

impl BreakRules {
    pub fn cap_for(&self, team: Option<&str>) -> Option<&ConcurrencyCap> {
        let team = team?;
        self.concurrency_caps.iter().find(|c| c.team == team)
    }

    pub fn soft_limit_for(&self, team: Option<&str>) -> Option<&SoftLimit> {
        let team = team?;
        self.soft_limits.iter().find(|l| l.team == team)
    }

    fn from_raw(raw: Option<RawBreakRules>) -> Self {
        let raw = raw.unwrap_or_default();
        let defaults = Self::default();

        Self {
            concurrency_caps: raw
                .concurrency_caps
                .map(|caps| {
                    caps.into_iter()
                        .map(|c| ConcurrencyCap {
                            team: c.team,
                            max_on_break: c.max_on_break,
                        })
                        .collect()
                })
                .unwrap_or(defaults.concurrency_caps),
            soft_limits: raw
                .soft_limits
                .map(|limits| {
                    limits
                        .into_iter()
                        .map(|l| SoftLimit {
                            team: l.team,
                            daily_minutes: l.daily_minutes,
                        })
                        .collect()
                })
                .unwrap_or(defaults.soft_limits),
        }
    }
}

impl Default for BreakRules {
    fn default() -> Self {
        Self {
            concurrency_caps: vec![ConcurrencyCap {
                team: "CALLER".into(),
                max_on_break: 2,
            }],
            soft_limits: vec![SoftLimit {
                team: "DEVELOPMENT".into(),
                daily_minutes: 60,
            }],
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub store_timeout: Duration,
    pub job_timeout: Duration,
    pub policy_poll_interval: Duration,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            // Validated before conversion; fall back rather than panic.
            timezone: raw
                .timezone
                .and_then(|tz| workday_util::parse_timezone(&tz).ok())
                .unwrap_or(defaults.timezone),
            store_timeout: raw
                .store_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            job_timeout: raw
                .job_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            policy_poll_interval: raw
                .policy_poll_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.policy_poll_interval),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: workday_util::data_dir_without_env(),
            timezone: DEFAULT_POLICY_TIMEZONE,
            store_timeout: Duration::from_millis(5000),
            job_timeout: Duration::from_secs(60),
            policy_poll_interval: Duration::from_secs(30),
        }
    }
}

/// Fully validated configuration
#[derive(Debug, Clone)]
pub struct WorkdayConfig {
    pub service: ServiceConfig,

    /// Office policy to seed the store with when none is stored
    pub office: OfficePolicy,

    pub breaks: BreakRules,
}

impl WorkdayConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let office = raw
            .office
            .as_ref()
            .and_then(|o| OfficePolicy::from_override(o).ok())
            .unwrap_or_default();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            office,
            breaks: BreakRules::from_raw(raw.breaks),
        }
    }
}

impl Default for WorkdayConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            office: OfficePolicy::default(),
            breaks: BreakRules::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_default_config() {
        let parsed = OfficePolicy::from_config(OfficeConfig::default()).unwrap();
        assert_eq!(parsed, OfficePolicy::default());
    }

    #[test]
    fn partial_override_merges_with_defaults() {
        let raw = RawOfficeConfig {
            late_threshold: Some("10:30 AM".into()),
            break_window: Some(RawBreakWindow {
                start: None,
                end: Some("4:00 PM".into()),
            }),
            ..Default::default()
        };

        let config = raw.normalize();
        assert_eq!(config.start_time, DEFAULT_START_TIME);
        assert_eq!(config.late_threshold, "10:30 AM");
        assert_eq!(config.break_window.start, DEFAULT_LUNCH_START);
        assert_eq!(config.break_window.end, "4:00 PM");
    }

    #[test]
    fn override_round_trips_through_raw() {
        let config = OfficeConfig::default();
        let raw: RawOfficeConfig = config.clone().into();
        assert_eq!(raw.normalize(), config);
    }

    #[test]
    fn triggers_follow_policy_times() {
        let policy = OfficePolicy::default();
        assert_eq!(policy.lunch_start_trigger().cron_expression(), "30 14 * * *");
        assert_eq!(policy.lunch_end_trigger().cron_expression(), "30 15 * * *");
        assert_eq!(policy.auto_absent_trigger().cron_expression(), "0 11 * * *");
    }

    #[test]
    fn break_rules_lookup_by_team() {
        let rules = BreakRules::default();
        assert_eq!(rules.cap_for(Some("CALLER")).unwrap().max_on_break, 2);
        assert!(rules.cap_for(Some("DEVELOPMENT")).is_none());
        assert!(rules.cap_for(None).is_none());
        assert_eq!(rules.soft_limit_for(Some("DEVELOPMENT")).unwrap().daily_minutes, 60);
    }

    #[test]
    fn explicit_empty_rules_disable_defaults() {
        let rules = BreakRules::from_raw(Some(RawBreakRules {
            concurrency_caps: Some(vec![]),
            soft_limits: None,
        }));
        assert!(rules.concurrency_caps.is_empty());
        assert_eq!(rules.soft_limits, BreakRules::default().soft_limits);
    }
}
