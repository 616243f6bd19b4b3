//! Bulk transitions run by the scheduler
//!
//! Each sweep runs in a single transaction, so a failure leaves every
//! employee exactly as they were before the sweep started.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use tracing::info;
use workday_api::{
    AttendanceRecord, AttendanceStatus, BreakLogEntry, BreakLogStatus, BreakType, EmployeeStatus,
    Event, EventPayload, Role, SYSTEM_ACTOR,
};
use workday_store::{AuditEvent, AuditEventType, Store};
use workday_util::{policy_now, whole_minutes_between, BreakLogId, EmployeeId};

use crate::{CoreResult, EventSink};

pub const LUNCH_STARTED_MESSAGE: &str = "Lunch Break Started";
pub const LUNCH_ENDED_MESSAGE: &str = "Lunch Break Ended";
pub const AUTO_ABSENT_REMARK: &str = "Auto-marked absent by scheduler";

/// A running entry closed by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForcedEnd {
    pub employee_id: EmployeeId,
    pub log_id: BreakLogId,
    pub kind: BreakType,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LunchStartOutcome {
    /// Employees moved to LUNCH
    pub employees: usize,
    pub forced_ends: Vec<ForcedEnd>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LunchEndOutcome {
    /// LUNCH entries closed
    pub closed: usize,
    /// Employees moved back to WORKING
    pub employees: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbsenteeOutcome {
    pub date: NaiveDate,
    pub marked: Vec<EmployeeId>,
}

/// Put every active employee on lunch.
///
/// Every ACTIVE entry in the system is closed as FORCED_END first, then each
/// active EMPLOYEE gets LUNCH status and a fresh LUNCH entry.
pub fn start_lunch(
    store: &dyn Store,
    events: &dyn EventSink,
    now: DateTime<Utc>,
) -> CoreResult<LunchStartOutcome> {
    let outcome = store.transaction(|tx| -> CoreResult<_> {
        let mut forced_ends = Vec::new();
        for entry in tx.active_break_logs(None, None)? {
            let duration = whole_minutes_between(entry.start_time, now);
            tx.finish_break_log(entry.id, BreakLogStatus::ForcedEnd, now, duration)?;
            // Employees not moved to LUNCH below must not stay ON_BREAK without a log.
            tx.set_status(&entry.employee_id, EmployeeStatus::Working)?;

            let forced = ForcedEnd {
                employee_id: entry.employee_id,
                log_id: entry.id,
                kind: entry.kind,
                duration_minutes: duration,
            };
            tx.append_audit(
                &AuditEvent::new(AuditEventType::BreakForcedEnd {
                    employee_id: forced.employee_id.clone(),
                    log_id: forced.log_id,
                    kind: forced.kind,
                    duration_minutes: forced.duration_minutes,
                })
                .at(now),
            )?;
            forced_ends.push(forced);
        }

        let employees = tx.active_employees(Role::Employee)?;
        for employee in &employees {
            tx.set_status(&employee.id, EmployeeStatus::Lunch)?;
            tx.insert_break_log(&BreakLogEntry {
                id: BreakLogId::new(),
                employee_id: employee.id.clone(),
                kind: BreakType::Lunch,
                status: BreakLogStatus::Active,
                start_time: now,
                end_time: None,
                duration_minutes: None,
            })?;
        }

        tx.append_audit(
            &AuditEvent::new(AuditEventType::LunchStarted {
                employees: employees.len(),
                forced_ends: forced_ends.len(),
            })
            .at(now),
        )?;

        Ok(LunchStartOutcome {
            employees: employees.len(),
            forced_ends,
        })
    })?;

    info!(
        employees = outcome.employees,
        forced_ends = outcome.forced_ends.len(),
        "Lunch started"
    );

    events.publish(Event::new(EventPayload::GlobalStatusUpdate {
        status: EmployeeStatus::Lunch,
        message: LUNCH_STARTED_MESSAGE.into(),
    }));

    Ok(outcome)
}

/// Close every running lunch and send everyone on lunch back to work
pub fn end_lunch(
    store: &dyn Store,
    events: &dyn EventSink,
    now: DateTime<Utc>,
) -> CoreResult<LunchEndOutcome> {
    let outcome = store.transaction(|tx| -> CoreResult<_> {
        let lunches = tx.active_break_logs(None, Some(BreakType::Lunch))?;
        for entry in &lunches {
            let duration = whole_minutes_between(entry.start_time, now);
            tx.finish_break_log(entry.id, BreakLogStatus::Completed, now, duration)?;
        }

        let employees = tx.set_status_where(
            Role::Employee,
            Some(EmployeeStatus::Lunch),
            EmployeeStatus::Working,
        )?;

        tx.append_audit(
            &AuditEvent::new(AuditEventType::LunchEnded {
                closed: lunches.len(),
                employees,
            })
            .at(now),
        )?;

        Ok(LunchEndOutcome {
            closed: lunches.len(),
            employees,
        })
    })?;

    info!(closed = outcome.closed, employees = outcome.employees, "Lunch ended");

    events.publish(Event::new(EventPayload::GlobalStatusUpdate {
        status: EmployeeStatus::Working,
        message: LUNCH_ENDED_MESSAGE.into(),
    }));

    Ok(outcome)
}

/// Mark every active employee without a record for today as absent.
///
/// Existing records are never touched, so running this twice is harmless.
pub fn mark_absentees(
    store: &dyn Store,
    events: &dyn EventSink,
    now: DateTime<Utc>,
    timezone: Tz,
) -> CoreResult<AbsenteeOutcome> {
    let date = policy_now(now, timezone).date;

    let marked = store.transaction(|tx| -> CoreResult<_> {
        let mut marked = Vec::new();
        for employee in tx.active_employees(Role::Employee)? {
            let record = AttendanceRecord {
                id: 0,
                employee_id: employee.id.clone(),
                date,
                status: AttendanceStatus::Absent,
                check_in_time: None,
                remarks: Some(AUTO_ABSENT_REMARK.into()),
                updated_by: SYSTEM_ACTOR.into(),
                updated_at: now,
            };
            if tx.insert_attendance_if_absent(&record)? {
                marked.push(employee.id);
            }
        }

        tx.append_audit(
            &AuditEvent::new(AuditEventType::AbsenteesMarked {
                date,
                count: marked.len(),
            })
            .at(now),
        )?;

        Ok(marked)
    })?;

    info!(date = %date, count = marked.len(), "Absentees marked");

    events.publish(Event::new(EventPayload::AbsenteesMarked {
        date,
        count: marked.len(),
    }));

    Ok(AbsenteeOutcome { date, marked })
}

impl fmt::Display for LunchStartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on lunch, {} breaks force-ended",
            self.employees,
            self.forced_ends.len()
        )
    }
}

impl fmt::Display for LunchEndOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lunches closed, {} back to work", self.closed, self.employees)
    }
}

impl fmt::Display for AbsenteeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} marked absent for {}", self.marked.len(), self.date)
    }
}
