//! Shared domain types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use workday_util::{BreakLogId, EmployeeId};

/// Actor recorded for changes made by the scheduler rather than a person
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// A stored or wire value did not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// What an employee is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmployeeStatus {
    Working,
    OnBreak,
    Lunch,
}

string_enum!(EmployeeStatus, "employee status", {
    Working => "WORKING",
    OnBreak => "ON_BREAK",
    Lunch => "LUNCH",
});

/// Directory role; only `Employee` rows take part in scheduled transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Admin,
}

string_enum!(Role, "role", {
    Employee => "EMPLOYEE",
    Admin => "ADMIN",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakType {
    Break,
    Lunch,
}

string_enum!(BreakType, "break type", {
    Break => "BREAK",
    Lunch => "LUNCH",
});

/// Lifecycle of a break log entry. `Completed` and `ForcedEnd` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakLogStatus {
    Active,
    Completed,
    ForcedEnd,
}

string_enum!(BreakLogStatus, "break log status", {
    Active => "ACTIVE",
    Completed => "COMPLETED",
    ForcedEnd => "FORCED_END",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    HalfDay,
    Absent,
    Leave,
}

string_enum!(AttendanceStatus, "attendance status", {
    Present => "present",
    Late => "late",
    HalfDay => "half_day",
    Absent => "absent",
    Leave => "leave",
});

/// Directory entry plus the employee's live status row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub role: Role,
    /// Team/cohort name, used for break concurrency caps and soft limits
    pub team: Option<String>,
    pub is_active: bool,
    pub current_status: EmployeeStatus,
}

impl Employee {
    /// A freshly provisioned, active employee in WORKING status
    pub fn new(id: impl Into<EmployeeId>, name: impl Into<String>, team: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Role::Employee,
            team,
            is_active: true,
            current_status: EmployeeStatus::Working,
        }
    }

    pub fn state(&self) -> EmployeeState {
        EmployeeState {
            employee_id: self.id.clone(),
            current_status: self.current_status,
            is_active: self.is_active,
        }
    }

    pub fn in_team(&self, team: &str) -> bool {
        self.team.as_deref() == Some(team)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeState {
    pub employee_id: EmployeeId,
    pub current_status: EmployeeStatus,
    pub is_active: bool,
}

/// One break or lunch interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakLogEntry {
    pub id: BreakLogId,
    pub employee_id: EmployeeId,
    #[serde(rename = "type")]
    pub kind: BreakType,
    pub status: BreakLogStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Whole minutes, set when the entry is closed
    pub duration_minutes: Option<u32>,
}

impl BreakLogEntry {
    pub fn is_active(&self) -> bool {
        self.status == BreakLogStatus::Active
    }
}

/// One attendance row per employee per policy-timezone day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Store-assigned row id (0 until persisted)
    pub id: i64,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in_time: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&EmployeeStatus::OnBreak).unwrap();
        assert_eq!(json, "\"ON_BREAK\"");
        let json = serde_json::to_string(&AttendanceStatus::HalfDay).unwrap();
        assert_eq!(json, "\"half_day\"");
        let json = serde_json::to_string(&BreakLogStatus::ForcedEnd).unwrap();
        assert_eq!(json, "\"FORCED_END\"");
    }

    #[test]
    fn string_forms_parse_back() {
        for status in [EmployeeStatus::Working, EmployeeStatus::OnBreak, EmployeeStatus::Lunch] {
            assert_eq!(status.as_str().parse::<EmployeeStatus>().unwrap(), status);
        }
        assert_eq!("leave".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Leave);
        assert!("on_break".parse::<EmployeeStatus>().is_err());
    }

    #[test]
    fn new_employee_starts_working() {
        let employee = Employee::new("EMP-1", "Asha", Some("CALLER".into()));
        assert_eq!(employee.current_status, EmployeeStatus::Working);
        assert!(employee.is_active);
        assert!(employee.in_team("CALLER"));
        assert!(!employee.in_team("DEVELOPMENT"));
        assert_eq!(employee.state().employee_id.as_str(), "EMP-1");
    }

    #[test]
    fn break_log_kind_serializes_as_type() {
        let entry = BreakLogEntry {
            id: BreakLogId::new(),
            employee_id: EmployeeId::new("EMP-1"),
            kind: BreakType::Lunch,
            status: BreakLogStatus::Active,
            start_time: Utc::now(),
            end_time: None,
            duration_minutes: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "LUNCH");
        assert!(entry.is_active());
    }
}
