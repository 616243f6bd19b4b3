//! Event types for workdayd -> subscriber streaming

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use workday_util::EmployeeId;

use crate::{AttendanceStatus, EmployeeStatus, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: workday_util::now(),
            payload,
        }
    }

    /// Channel name subscribers listen on
    pub fn name(&self) -> &'static str {
        self.payload.name()
    }
}

/// All events published by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A single employee changed status
    StatusUpdate {
        employee_id: EmployeeId,
        status: EmployeeStatus,
    },

    /// Every active employee was moved at once by a scheduled job
    GlobalStatusUpdate {
        status: EmployeeStatus,
        message: String,
    },

    /// An attendance record was created or changed
    AttendanceMarked {
        employee_id: EmployeeId,
        date: NaiveDate,
        status: AttendanceStatus,
    },

    /// Employees without a record were marked absent
    AbsenteesMarked { date: NaiveDate, count: usize },

    /// A new office policy version is in force
    PolicyUpdated { version: i64 },

    /// Service is shutting down
    Shutdown,
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::StatusUpdate { .. } => "statusUpdate",
            EventPayload::GlobalStatusUpdate { .. } => "globalStatusUpdate",
            EventPayload::AttendanceMarked { .. } => "attendanceMarked",
            EventPayload::AbsenteesMarked { .. } => "absenteesMarked",
            EventPayload::PolicyUpdated { .. } => "policyUpdated",
            EventPayload::Shutdown => "shutdown",
        }
    }
}
