//! Attendance check-in and administrative overrides

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use workday_api::{AttendanceRecord, AttendanceStatus, Event, EventPayload};
use workday_config::OfficeConfig;
use workday_store::{AuditEvent, AuditEventType, Store};
use workday_util::{policy_now, EmployeeId};

use crate::breaks::active_employee;
use crate::{check_in_remarks, classify, ActivePolicy, CoreError, CoreResult, EventSink};

/// Remark written when approved leave is applied
pub const APPROVED_LEAVE_REMARK: &str = "Approved leave";

/// Result of a check-in attempt
#[derive(Debug, Clone, Serialize)]
pub struct CheckIn {
    pub record: AttendanceRecord,
    /// The day already had a record; it was returned unchanged
    pub already_marked: bool,
}

/// Administrative change to one attendance record
#[derive(Debug, Clone)]
pub struct AttendanceOverride {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: String,
    pub actor: String,
}

/// Check-ins and attendance record maintenance
pub struct AttendanceService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    timezone: Tz,
    seed_policy: OfficeConfig,
}

impl AttendanceService {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        timezone: Tz,
        seed_policy: OfficeConfig,
    ) -> Self {
        Self {
            store,
            events,
            timezone,
            seed_policy,
        }
    }

    /// Record the employee's arrival for the policy day containing `now`.
    ///
    /// A second check-in on the same day returns the first record as-is.
    pub fn check_in(&self, employee_id: &EmployeeId, now: DateTime<Utc>) -> CoreResult<CheckIn> {
        let active = ActivePolicy::load(&*self.store, &self.seed_policy)?;
        let local = policy_now(now, self.timezone);

        let check_in = self.store.transaction(|tx| -> CoreResult<_> {
            active_employee(tx, employee_id)?;

            if let Some(existing) = tx.get_attendance(employee_id, local.date)? {
                return Ok(CheckIn {
                    record: existing,
                    already_marked: true,
                });
            }

            let status = classify(local.minutes_since_midnight, &active.policy)?;
            let record = AttendanceRecord {
                id: 0,
                employee_id: employee_id.clone(),
                date: local.date,
                status,
                check_in_time: Some(now),
                remarks: check_in_remarks(status).map(str::to_string),
                updated_by: employee_id.to_string(),
                updated_at: now,
            };
            tx.insert_attendance_if_absent(&record)?;

            let stored = tx
                .get_attendance(employee_id, local.date)?
                .unwrap_or(record);
            Ok(CheckIn {
                record: stored,
                already_marked: false,
            })
        })?;

        if check_in.already_marked {
            info!(employee_id = %employee_id, date = %local.date, "Attendance already marked");
        } else {
            info!(
                employee_id = %employee_id,
                date = %local.date,
                status = %check_in.record.status,
                policy_version = active.version,
                "Checked in"
            );
            self.publish_marked(&check_in.record);
        }

        Ok(check_in)
    }

    /// Replace an attendance record on an admin's authority. Remarks are mandatory.
    pub fn override_status(
        &self,
        change: AttendanceOverride,
        now: DateTime<Utc>,
    ) -> CoreResult<AttendanceRecord> {
        let remarks = change.remarks.trim();
        if remarks.is_empty() {
            return Err(CoreError::RemarksRequired);
        }

        let record = self.store.transaction(|tx| -> CoreResult<_> {
            tx.get_employee(&change.employee_id)?
                .ok_or_else(|| CoreError::EmployeeNotFound(change.employee_id.clone()))?;

            let previous = tx.get_attendance(&change.employee_id, change.date)?;
            let record = tx.upsert_attendance(&AttendanceRecord {
                id: 0,
                employee_id: change.employee_id.clone(),
                date: change.date,
                status: change.status,
                check_in_time: None,
                remarks: Some(remarks.to_string()),
                updated_by: change.actor.clone(),
                updated_at: now,
            })?;

            tx.append_audit(
                &AuditEvent::by(
                    change.actor.as_str(),
                    AuditEventType::AttendanceOverridden {
                        employee_id: change.employee_id.clone(),
                        date: change.date,
                        old_status: previous.as_ref().map(|r| r.status),
                        new_status: change.status,
                        old_remarks: previous.and_then(|r| r.remarks),
                        remarks: remarks.to_string(),
                    },
                )
                .at(now),
            )?;

            Ok(record)
        })?;

        info!(
            employee_id = %change.employee_id,
            date = %change.date,
            status = %change.status,
            actor = %change.actor,
            "Attendance overridden"
        );
        self.publish_marked(&record);

        Ok(record)
    }

    /// Mark the day as approved leave, whatever was recorded before
    pub fn record_approved_leave(
        &self,
        employee_id: &EmployeeId,
        date: NaiveDate,
        actor: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<AttendanceRecord> {
        let record = self.store.transaction(|tx| -> CoreResult<_> {
            tx.get_employee(employee_id)?
                .ok_or_else(|| CoreError::EmployeeNotFound(employee_id.clone()))?;

            let previous = tx.get_attendance(employee_id, date)?;
            let record = tx.upsert_attendance(&AttendanceRecord {
                id: 0,
                employee_id: employee_id.clone(),
                date,
                status: AttendanceStatus::Leave,
                check_in_time: None,
                remarks: Some(APPROVED_LEAVE_REMARK.to_string()),
                updated_by: actor.to_string(),
                updated_at: now,
            })?;

            tx.append_audit(
                &AuditEvent::by(
                    actor,
                    AuditEventType::LeaveRecorded {
                        employee_id: employee_id.clone(),
                        date,
                        old_status: previous.map(|r| r.status),
                    },
                )
                .at(now),
            )?;

            Ok(record)
        })?;

        info!(employee_id = %employee_id, date = %date, actor, "Approved leave recorded");
        self.publish_marked(&record);

        Ok(record)
    }

    pub fn attendance_on(
        &self,
        employee_id: &EmployeeId,
        date: NaiveDate,
    ) -> CoreResult<Option<AttendanceRecord>> {
        Ok(self
            .store
            .transaction(|tx| tx.get_attendance(employee_id, date))?)
    }

    pub fn attendance_for_day(&self, date: NaiveDate) -> CoreResult<Vec<AttendanceRecord>> {
        Ok(self.store.transaction(|tx| tx.attendance_for_day(date))?)
    }

    /// Policy day containing `now`
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        policy_now(now, self.timezone).date
    }

    fn publish_marked(&self, record: &AttendanceRecord) {
        self.events.publish(Event::new(EventPayload::AttendanceMarked {
            employee_id: record.employee_id.clone(),
            date: record.date,
            status: record.status,
        }));
    }
}
