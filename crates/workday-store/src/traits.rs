//! Store trait definitions

use chrono::{DateTime, NaiveDate, Utc};
use workday_api::{
    AttendanceRecord, BreakLogEntry, BreakLogStatus, BreakType, Employee, EmployeeStatus, Role,
};
use workday_config::OfficeConfig;
use workday_util::{BreakLogId, EmployeeId};

use crate::{AuditEvent, StoreError, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    /// Run `work` inside one exclusive transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back otherwise. Concurrent
    /// callers are serialized; waiting longer than the configured timeout
    /// fails with [`StoreError::Timeout`].
    fn atomically(&self, work: &mut dyn FnMut(&dyn StoreTx) -> StoreResult<()>) -> StoreResult<()>;

    // Audit log

    /// Append an audit event outside any transaction
    fn append_audit(&self, event: AuditEvent) -> StoreResult<i64>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Office policy

    /// Load the stored policy record, if any
    fn load_policy(&self) -> StoreResult<Option<StoredPolicy>>;

    /// Replace the policy record, bumping its version
    fn save_policy(&self, config: &OfficeConfig, actor: &str) -> StoreResult<StoredPolicy>;

    /// Store `config` as version 1 unless a record already exists; returns the record in force
    fn seed_policy(&self, config: &OfficeConfig, actor: &str) -> StoreResult<StoredPolicy>;

    /// Current policy version without decoding the record
    fn policy_version(&self) -> StoreResult<Option<i64>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

impl<'a> dyn Store + 'a {
    /// Run `f` in a transaction and hand back its value.
    ///
    /// Any error from `f` rolls the transaction back and is returned unchanged.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&dyn StoreTx) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut body = Some(f);
        let mut output = None;
        let mut failure = None;

        let result = self.atomically(&mut |tx| {
            let f = body
                .take()
                .ok_or_else(|| StoreError::Database("transaction body already consumed".into()))?;
            match f(tx) {
                Ok(value) => {
                    output = Some(value);
                    Ok(())
                }
                Err(e) => {
                    failure = Some(e);
                    Err(StoreError::Aborted)
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        result?;
        output.ok_or_else(|| StoreError::Database("transaction produced no value".into()).into())
    }
}

/// Operations available inside a store transaction
pub trait StoreTx {
    // Employees

    fn get_employee(&self, id: &EmployeeId) -> StoreResult<Option<Employee>>;

    /// Every employee, active or not, ordered by ID
    fn list_employees(&self) -> StoreResult<Vec<Employee>>;

    /// Active employees with the given role, ordered by ID
    fn active_employees(&self, role: Role) -> StoreResult<Vec<Employee>>;

    /// Number of active team members currently in `status`
    fn count_team_in_status(&self, team: &str, status: EmployeeStatus) -> StoreResult<usize>;

    /// Insert a new employee; returns false if the ID already exists
    fn insert_employee(&self, employee: &Employee) -> StoreResult<bool>;

    /// Returns false if no such employee exists
    fn set_employee_active(&self, id: &EmployeeId, active: bool) -> StoreResult<bool>;

    fn set_status(&self, id: &EmployeeId, status: EmployeeStatus) -> StoreResult<()>;

    /// Move every active employee of `role` currently in `from` (any status
    /// when `None`) to `to`. Returns the number of rows changed.
    fn set_status_where(
        &self,
        role: Role,
        from: Option<EmployeeStatus>,
        to: EmployeeStatus,
    ) -> StoreResult<usize>;

    // Break logs

    fn insert_break_log(&self, entry: &BreakLogEntry) -> StoreResult<()>;

    /// ACTIVE entries, newest first, optionally filtered by employee and type
    fn active_break_logs(
        &self,
        employee_id: Option<&EmployeeId>,
        kind: Option<BreakType>,
    ) -> StoreResult<Vec<BreakLogEntry>>;

    /// Close an ACTIVE entry. Returns false if it was not ACTIVE.
    fn finish_break_log(
        &self,
        id: BreakLogId,
        status: BreakLogStatus,
        end_time: DateTime<Utc>,
        duration_minutes: u32,
    ) -> StoreResult<bool>;

    /// Entries of `kind` for the employee that started in `[from, to)`
    fn break_logs_started_between(
        &self,
        employee_id: &EmployeeId,
        kind: BreakType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<BreakLogEntry>>;

    // Attendance

    fn get_attendance(
        &self,
        employee_id: &EmployeeId,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>>;

    fn attendance_for_day(&self, date: NaiveDate) -> StoreResult<Vec<AttendanceRecord>>;

    /// Insert only if the employee has no record for that date.
    /// Returns true if a row was written. `record.id` is ignored.
    fn insert_attendance_if_absent(&self, record: &AttendanceRecord) -> StoreResult<bool>;

    /// Insert or replace the (employee, date) record. `record.id` is ignored.
    fn upsert_attendance(&self, record: &AttendanceRecord) -> StoreResult<AttendanceRecord>;

    // Audit

    /// Append an audit event that commits with the transaction
    fn append_audit(&self, event: &AuditEvent) -> StoreResult<i64>;
}

/// The persisted single office policy record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPolicy {
    /// Starts at 1, incremented on every save
    pub version: i64,
    pub config: OfficeConfig,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}
