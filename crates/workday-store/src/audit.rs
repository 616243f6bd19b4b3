//! Audit event types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use workday_api::{AttendanceStatus, BreakType, SYSTEM_ACTOR};
use workday_util::{BreakLogId, EmployeeId};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// A new office policy version was stored
    PolicyUpdated { version: i64 },

    /// Daily triggers were rebuilt from a policy version
    Rescheduled {
        policy_version: i64,
        triggers: Vec<String>,
    },

    /// Employee added to the directory
    EmployeeProvisioned {
        employee_id: EmployeeId,
        team: Option<String>,
    },

    /// Employee deactivated (never deleted)
    EmployeeDeactivated { employee_id: EmployeeId },

    /// Admin changed an attendance record
    AttendanceOverridden {
        employee_id: EmployeeId,
        date: NaiveDate,
        old_status: Option<AttendanceStatus>,
        new_status: AttendanceStatus,
        old_remarks: Option<String>,
        remarks: String,
    },

    /// Approved leave written over the day's record
    LeaveRecorded {
        employee_id: EmployeeId,
        date: NaiveDate,
        old_status: Option<AttendanceStatus>,
    },

    /// Scheduler closed a running break or lunch
    BreakForcedEnd {
        employee_id: EmployeeId,
        log_id: BreakLogId,
        kind: BreakType,
        duration_minutes: u32,
    },

    /// Lunch-start sweep finished
    LunchStarted { employees: usize, forced_ends: usize },

    /// Lunch-end sweep finished
    LunchEnded { closed: usize, employees: usize },

    /// Auto-absent sweep finished
    AbsenteesMarked { date: NaiveDate, count: usize },

    /// A scheduled firing failed or timed out
    JobFailed { job: String, error: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Who caused the change (`SYSTEM` for the scheduler)
    pub actor: String,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    /// An event attributed to the system actor
    pub fn new(event: AuditEventType) -> Self {
        Self::by(SYSTEM_ACTOR, event)
    }

    pub fn by(actor: impl Into<String>, event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: workday_util::now(),
            actor: actor.into(),
            event,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = AuditEventType::AbsenteesMarked {
            date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            count: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "absentees_marked");
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn test_default_actor_is_system() {
        let event = AuditEvent::new(AuditEventType::ServiceStarted);
        assert_eq!(event.actor, SYSTEM_ACTOR);
        assert_eq!(event.id, 0);
    }
}
