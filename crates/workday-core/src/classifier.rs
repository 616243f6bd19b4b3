//! Attendance classification

use workday_api::AttendanceStatus;
use workday_config::OfficePolicy;

use crate::{CoreError, CoreResult};

/// Remark stored on check-ins that land past the half-day threshold
pub const HALF_DAY_REMARK: &str = "Late check-in (post half-day threshold)";

/// Classify a check-in by its minute of day in the policy timezone.
///
/// Promotion to a worse bucket needs a strictly later minute, so a check-in
/// exactly at a threshold keeps the better status.
pub fn classify(check_in_minutes: u32, policy: &OfficePolicy) -> CoreResult<AttendanceStatus> {
    if check_in_minutes < policy.start.minutes_since_midnight() {
        return Err(CoreError::TooEarly {
            opens_at: policy.start,
        });
    }

    let status = if check_in_minutes > policy.half_day_threshold.minutes_since_midnight() {
        AttendanceStatus::HalfDay
    } else if check_in_minutes > policy.late_threshold.minutes_since_midnight() {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    };

    Ok(status)
}

/// Remarks recorded alongside a fresh check-in
pub fn check_in_remarks(status: AttendanceStatus) -> Option<&'static str> {
    match status {
        AttendanceStatus::HalfDay => Some(HALF_DAY_REMARK),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workday_util::parse_time_to_minutes;

    fn minutes(s: &str) -> u32 {
        parse_time_to_minutes(s).unwrap()
    }

    fn rank(status: AttendanceStatus) -> u8 {
        match status {
            AttendanceStatus::Present => 0,
            AttendanceStatus::Late => 1,
            AttendanceStatus::HalfDay => 2,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_default_policy_buckets() {
        let policy = OfficePolicy::default();

        assert_eq!(classify(minutes("10:00 AM"), &policy).unwrap(), AttendanceStatus::Present);
        assert_eq!(classify(minutes("10:10 AM"), &policy).unwrap(), AttendanceStatus::Present);
        assert_eq!(classify(minutes("10:15 AM"), &policy).unwrap(), AttendanceStatus::Present);
        assert_eq!(classify(minutes("10:16 AM"), &policy).unwrap(), AttendanceStatus::Late);
        assert_eq!(classify(minutes("1:00 PM"), &policy).unwrap(), AttendanceStatus::Late);
        assert_eq!(classify(minutes("1:01 PM"), &policy).unwrap(), AttendanceStatus::HalfDay);
        assert_eq!(classify(minutes("6:45 PM"), &policy).unwrap(), AttendanceStatus::HalfDay);
    }

    #[test]
    fn test_too_early() {
        let policy = OfficePolicy::default();
        let err = classify(minutes("9:55 AM"), &policy).unwrap_err();
        assert!(matches!(err, CoreError::TooEarly { opens_at } if opens_at == policy.start));
    }

    #[test]
    fn test_classification_is_monotonic() {
        let policy = OfficePolicy::default();
        let start = policy.start.minutes_since_midnight();

        let mut previous = 0;
        for m in start..24 * 60 {
            let current = rank(classify(m, &policy).unwrap());
            assert!(current >= previous, "minute {} moved to a better bucket", m);
            previous = current;
        }
    }

    #[test]
    fn test_half_day_remark() {
        assert_eq!(check_in_remarks(AttendanceStatus::HalfDay), Some(HALF_DAY_REMARK));
        assert_eq!(check_in_remarks(AttendanceStatus::Late), None);
    }
}
