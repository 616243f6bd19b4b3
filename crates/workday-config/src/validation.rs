//! Configuration validation

use crate::policy::OfficePolicy;
use crate::schema::{RawBreakRules, RawConfig, RawOfficeConfig, RawServiceConfig};
use std::collections::HashSet;
use thiserror::Error;
use workday_util::{TimeError, WallClock};

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid time format for {field} '{value}': {message}")]
    InvalidTimeFormat {
        field: String,
        value: String,
        message: String,
    },

    #[error("{earlier} must not be after {later}: {message}")]
    ThresholdOrder {
        earlier: String,
        later: String,
        message: String,
    },

    #[error("Lunch window must end after it starts ({start} - {end})")]
    EmptyBreakWindow { start: String, end: String },

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Break rule for team '{team}': {message}")]
    BreakRuleError { team: String, message: String },

    #[error("Duplicate break rule for team: {0}")]
    DuplicateTeam(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Parse a policy time, attributing failures to the named field
pub fn parse_policy_time(field: &str, value: &str) -> Result<WallClock, ValidationError> {
    WallClock::parse_12h(value).map_err(|e| match e {
        TimeError::InvalidTimeFormat { message, .. } => ValidationError::InvalidTimeFormat {
            field: field.to_string(),
            value: value.to_string(),
            message,
        },
        other => ValidationError::InvalidTimeFormat {
            field: field.to_string(),
            value: value.to_string(),
            message: other.to_string(),
        },
    })
}

/// Validate a raw service configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = validate_service(&config.service);

    if let Some(office) = &config.office {
        errors.extend(validate_office_override(office));
    }

    if let Some(breaks) = &config.breaks {
        errors.extend(validate_break_rules(breaks));
    }

    errors
}

/// Validate a partial office policy after merging it with the defaults
pub fn validate_office_override(raw: &RawOfficeConfig) -> Vec<ValidationError> {
    match OfficePolicy::from_override(raw) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    }
}

fn validate_service(service: &RawServiceConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(tz) = &service.timezone
        && workday_util::parse_timezone(tz).is_err()
    {
        errors.push(ValidationError::InvalidTimezone(tz.clone()));
    }

    if service.store_timeout_ms == Some(0) {
        errors.push(ValidationError::GlobalError(
            "store_timeout_ms must be greater than 0".into(),
        ));
    }
    if service.job_timeout_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "job_timeout_seconds must be greater than 0".into(),
        ));
    }
    if service.policy_poll_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "policy_poll_seconds must be greater than 0".into(),
        ));
    }

    errors
}

fn validate_break_rules(rules: &RawBreakRules) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(caps) = &rules.concurrency_caps {
        let mut seen = HashSet::new();
        for cap in caps {
            if cap.team.trim().is_empty() {
                errors.push(ValidationError::GlobalError(
                    "concurrency cap team cannot be empty".into(),
                ));
            }
            if !seen.insert(cap.team.as_str()) {
                errors.push(ValidationError::DuplicateTeam(cap.team.clone()));
            }
            if cap.max_on_break == 0 {
                errors.push(ValidationError::BreakRuleError {
                    team: cap.team.clone(),
                    message: "max_on_break must be at least 1".into(),
                });
            }
        }
    }

    if let Some(limits) = &rules.soft_limits {
        let mut seen = HashSet::new();
        for limit in limits {
            if limit.team.trim().is_empty() {
                errors.push(ValidationError::GlobalError(
                    "soft limit team cannot be empty".into(),
                ));
            }
            if !seen.insert(limit.team.as_str()) {
                errors.push(ValidationError::DuplicateTeam(limit.team.clone()));
            }
            if limit.daily_minutes == 0 {
                errors.push(ValidationError::BreakRuleError {
                    team: limit.team.clone(),
                    message: "daily_minutes must be greater than 0".into(),
                });
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawBreakWindow, RawConcurrencyCap};

    #[test]
    fn test_parse_policy_time_names_field() {
        assert_eq!(
            parse_policy_time("start_time", "9:05 AM").unwrap(),
            WallClock::new(9, 5).unwrap()
        );

        let err = parse_policy_time("start_time", "25:00 PM").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidTimeFormat { ref field, .. } if field == "start_time"
        ));
    }

    #[test]
    fn test_threshold_order_violation() {
        let raw = RawOfficeConfig {
            start_time: Some("10:30 AM".into()),
            late_threshold: Some("10:15 AM".into()),
            ..Default::default()
        };

        let errors = validate_office_override(&raw);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::ThresholdOrder { .. }));
    }

    #[test]
    fn test_equal_thresholds_are_allowed() {
        let raw = RawOfficeConfig {
            start_time: Some("10:00 AM".into()),
            late_threshold: Some("10:00 AM".into()),
            half_day_threshold: Some("10:00 AM".into()),
            ..Default::default()
        };

        assert!(validate_office_override(&raw).is_empty());
    }

    #[test]
    fn test_empty_break_window() {
        let raw = RawOfficeConfig {
            break_window: Some(RawBreakWindow {
                start: Some("3:30 PM".into()),
                end: Some("3:30 PM".into()),
            }),
            ..Default::default()
        };

        let errors = validate_office_override(&raw);
        assert!(matches!(errors[0], ValidationError::EmptyBreakWindow { .. }));
    }

    #[test]
    fn test_all_bad_times_reported() {
        let raw = RawOfficeConfig {
            start_time: Some("ten".into()),
            auto_absent_time: Some("11:00".into()),
            ..Default::default()
        };

        let errors = validate_office_override(&raw);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_break_rule_validation() {
        let rules = RawBreakRules {
            concurrency_caps: Some(vec![
                RawConcurrencyCap {
                    team: "CALLER".into(),
                    max_on_break: 0,
                },
                RawConcurrencyCap {
                    team: "CALLER".into(),
                    max_on_break: 2,
                },
            ]),
            soft_limits: None,
        };

        let errors = validate_break_rules(&rules);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateTeam(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::BreakRuleError { .. })));
    }

    #[test]
    fn test_unknown_timezone() {
        let service = RawServiceConfig {
            timezone: Some("Nowhere/Special".into()),
            ..Default::default()
        };
        assert_eq!(
            validate_service(&service),
            vec![ValidationError::InvalidTimezone("Nowhere/Special".into())]
        );
    }
}
