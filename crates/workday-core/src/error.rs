//! Core error types

use std::time::Duration;
use thiserror::Error;
use workday_api::EmployeeStatus;
use workday_config::ValidationError;
use workday_store::StoreError;
use workday_util::{EmployeeId, WallClock};

use crate::JobKind;

/// Failures of per-employee operations. None of these leave partial writes behind.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid policy: {}", join(.0))]
    InvalidPolicy(Vec<ValidationError>),

    #[error("Cannot {action} while {status}")]
    InvalidStateTransition {
        action: &'static str,
        status: EmployeeStatus,
    },

    #[error("Break limit reached for team {team}: {limit} already on break")]
    ConcurrencyLimitExceeded { team: String, limit: usize },

    #[error("Attendance opens at {opens_at}")]
    TooEarly { opens_at: WallClock },

    #[error("Employee {0} is not on break")]
    NotOnBreak(EmployeeId),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Employee not found: {0}")]
    EmployeeNotFound(EmployeeId),

    #[error("Employee is inactive: {0}")]
    EmployeeInactive(EmployeeId),

    #[error("Employee already exists: {0}")]
    EmployeeExists(EmployeeId),

    #[error("Remarks are required for attendance overrides")]
    RemarksRequired,
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Scheduler failures. Timer tasks log these; only direct callers see them.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid policy, previous schedule kept: {}", join(.0))]
    InvalidPolicy(Vec<ValidationError>),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0} is already running")]
    AlreadyRunning(JobKind),

    #[error("{job} timed out after {after:?}")]
    JobTimedOut { job: JobKind, after: Duration },

    #[error("{job} failed: {source}")]
    JobFailed {
        job: JobKind,
        #[source]
        source: CoreError,
    },

    #[error("{job} panicked: {message}")]
    JobPanicked { job: JobKind, message: String },

    #[error("No async runtime available to run timers")]
    NoRuntime,
}

impl SchedulerError {
    /// Whether the same job may succeed on its next firing without intervention
    pub fn is_transient(&self) -> bool {
        match self {
            SchedulerError::Store(e) => e.is_transient(),
            SchedulerError::JobFailed {
                source: CoreError::StoreUnavailable(e),
                ..
            } => e.is_transient(),
            SchedulerError::AlreadyRunning(_) | SchedulerError::JobTimedOut { .. } => true,
            _ => false,
        }
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
