//! SQLite-based store implementation

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;
use workday_api::{
    AttendanceRecord, BreakLogEntry, BreakLogStatus, BreakType, Employee, EmployeeStatus, Role,
};
use workday_config::OfficeConfig;
use workday_util::{BreakLogId, EmployeeId};

use crate::{AuditEvent, AuditEventType, Store, StoreError, StoreResult, StoreTx, StoredPolicy};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Store tuning
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Upper bound on waiting for the connection or a database lock
    pub timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
        }
    }
}

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    options: StoreOptions,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, options)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, StoreOptions::default())
    }

    fn from_connection(conn: Connection, options: StoreOptions) -> StoreResult<Self> {
        conn.busy_timeout(options.timeout)?;
        let store = Self {
            conn: Mutex::new(conn),
            options,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Employee directory and live status
            CREATE TABLE IF NOT EXISTS employees (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                team TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                current_status TEXT NOT NULL DEFAULT 'WORKING'
            );

            -- Break and lunch log entries
            CREATE TABLE IF NOT EXISTS break_logs (
                id TEXT PRIMARY KEY,
                employee_id TEXT NOT NULL,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                duration_minutes INTEGER
            );

            -- Attendance (one record per employee and day)
            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                employee_id TEXT NOT NULL,
                date TEXT NOT NULL,
                status TEXT NOT NULL,
                check_in_time TEXT,
                remarks TEXT,
                updated_by TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (employee_id, date)
            );

            -- Office policy (single row)
            CREATE TABLE IF NOT EXISTS office_policy (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL,
                config_json TEXT NOT NULL,
                updated_by TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                actor TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE UNIQUE INDEX IF NOT EXISTS idx_break_logs_one_active
                ON break_logs(employee_id) WHERE status = 'ACTIVE';
            CREATE INDEX IF NOT EXISTS idx_break_logs_employee_start
                ON break_logs(employee_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    /// Acquire the connection, waiting at most the configured timeout
    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        let deadline = Instant::now() + self.options.timeout;
        loop {
            match self.conn.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(StoreError::Unavailable("connection lock poisoned".into()));
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::Timeout(format!(
                            "connection busy for {:?}",
                            self.options.timeout
                        )));
                    }
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
            }
        }
    }
}

impl Store for SqliteStore {
    fn atomically(&self, work: &mut dyn FnMut(&dyn StoreTx) -> StoreResult<()>) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let result = work(&SqliteTx { conn: &tx });

        match result {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    fn append_audit(&self, event: AuditEvent) -> StoreResult<i64> {
        let conn = self.lock()?;
        insert_audit(&conn, &event)
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, actor, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp = time_col(row, 1)?;
            let actor: String = row.get(2)?;
            let event_json: String = row.get(3)?;
            Ok((id, timestamp, actor, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, actor, event_json) = row?;
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                actor,
                event,
            });
        }

        Ok(events)
    }

    fn load_policy(&self) -> StoreResult<Option<StoredPolicy>> {
        let conn = self.lock()?;
        read_policy(&conn)
    }

    fn save_policy(&self, config: &OfficeConfig, actor: &str) -> StoreResult<StoredPolicy> {
        let mut conn = self.lock()?;
        let json = serde_json::to_string(config)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            r#"
            INSERT INTO office_policy (id, version, config_json, updated_by, updated_at)
            VALUES (1, 1, ?1, ?2, ?3)
            ON CONFLICT(id)
            DO UPDATE SET version = office_policy.version + 1,
                          config_json = excluded.config_json,
                          updated_by = excluded.updated_by,
                          updated_at = excluded.updated_at
            "#,
            params![json, actor, ts(workday_util::now())],
        )?;

        let stored = read_policy(&tx)?
            .ok_or_else(|| StoreError::NotFound("office policy after save".into()))?;
        tx.commit()?;

        debug!(version = stored.version, actor, "Office policy saved");
        Ok(stored)
    }

    fn seed_policy(&self, config: &OfficeConfig, actor: &str) -> StoreResult<StoredPolicy> {
        let conn = self.lock()?;
        let json = serde_json::to_string(config)?;

        let inserted = conn.execute(
            r#"
            INSERT INTO office_policy (id, version, config_json, updated_by, updated_at)
            VALUES (1, 1, ?1, ?2, ?3)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![json, actor, ts(workday_util::now())],
        )?;
        if inserted > 0 {
            debug!("Seeded default office policy");
        }

        read_policy(&conn)?.ok_or_else(|| StoreError::NotFound("office policy after seed".into()))
    }

    fn policy_version(&self) -> StoreResult<Option<i64>> {
        let conn = self.lock()?;
        let version = conn
            .query_row("SELECT version FROM office_policy WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(version)
    }

    fn is_healthy(&self) -> bool {
        match self.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(e) => {
                warn!(error = %e, "Store unhealthy");
                false
            }
        }
    }
}

/// Transaction-scoped view of the connection
struct SqliteTx<'a> {
    conn: &'a Connection,
}

const EMPLOYEE_COLUMNS: &str = "id, name, role, team, is_active, current_status";
const BREAK_LOG_COLUMNS: &str =
    "id, employee_id, type, status, start_time, end_time, duration_minutes";
const ATTENDANCE_COLUMNS: &str =
    "id, employee_id, date, status, check_in_time, remarks, updated_by, updated_at";

impl StoreTx for SqliteTx<'_> {
    fn get_employee(&self, id: &EmployeeId) -> StoreResult<Option<Employee>> {
        let employee = self
            .conn
            .query_row(
                &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"),
                [id.as_str()],
                employee_from_row,
            )
            .optional()?;
        Ok(employee)
    }

    fn list_employees(&self) -> StoreResult<Vec<Employee>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY id"))?;
        let employees = stmt
            .query_map([], employee_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(employees)
    }

    fn active_employees(&self, role: Role) -> StoreResult<Vec<Employee>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE role = ? AND is_active = 1 ORDER BY id"
        ))?;
        let employees = stmt
            .query_map([role.as_str()], employee_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(employees)
    }

    fn count_team_in_status(&self, team: &str, status: EmployeeStatus) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM employees WHERE team = ? AND current_status = ? AND is_active = 1",
            params![team, status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert_employee(&self, employee: &Employee) -> StoreResult<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO employees (id, name, role, team, is_active, current_status)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![
                employee.id.as_str(),
                employee.name,
                employee.role.as_str(),
                employee.team,
                employee.is_active,
                employee.current_status.as_str(),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn set_employee_active(&self, id: &EmployeeId, active: bool) -> StoreResult<bool> {
        let updated = self.conn.execute(
            "UPDATE employees SET is_active = ? WHERE id = ?",
            params![active, id.as_str()],
        )?;
        Ok(updated > 0)
    }

    fn set_status(&self, id: &EmployeeId, status: EmployeeStatus) -> StoreResult<()> {
        let updated = self.conn.execute(
            "UPDATE employees SET current_status = ? WHERE id = ?",
            params![status.as_str(), id.as_str()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("employee {}", id)));
        }
        Ok(())
    }

    fn set_status_where(
        &self,
        role: Role,
        from: Option<EmployeeStatus>,
        to: EmployeeStatus,
    ) -> StoreResult<usize> {
        let updated = self.conn.execute(
            r#"
            UPDATE employees SET current_status = ?1
            WHERE role = ?2 AND is_active = 1 AND (?3 IS NULL OR current_status = ?3)
            "#,
            params![to.as_str(), role.as_str(), from.map(|s| s.as_str())],
        )?;
        Ok(updated)
    }

    fn insert_break_log(&self, entry: &BreakLogEntry) -> StoreResult<()> {
        self.conn.execute(
            &format!("INSERT INTO break_logs ({BREAK_LOG_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
            params![
                entry.id.to_string(),
                entry.employee_id.as_str(),
                entry.kind.as_str(),
                entry.status.as_str(),
                ts(entry.start_time),
                entry.end_time.map(ts),
                entry.duration_minutes,
            ],
        )?;
        debug!(employee_id = %entry.employee_id, log_id = %entry.id, kind = %entry.kind, "Break log opened");
        Ok(())
    }

    fn active_break_logs(
        &self,
        employee_id: Option<&EmployeeId>,
        kind: Option<BreakType>,
    ) -> StoreResult<Vec<BreakLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {BREAK_LOG_COLUMNS} FROM break_logs
            WHERE status = 'ACTIVE'
              AND (?1 IS NULL OR employee_id = ?1)
              AND (?2 IS NULL OR type = ?2)
            ORDER BY start_time DESC
            "#
        ))?;
        let entries = stmt
            .query_map(
                params![employee_id.map(|id| id.as_str()), kind.map(|k| k.as_str())],
                break_log_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn finish_break_log(
        &self,
        id: BreakLogId,
        status: BreakLogStatus,
        end_time: DateTime<Utc>,
        duration_minutes: u32,
    ) -> StoreResult<bool> {
        let updated = self.conn.execute(
            r#"
            UPDATE break_logs SET status = ?, end_time = ?, duration_minutes = ?
            WHERE id = ? AND status = 'ACTIVE'
            "#,
            params![status.as_str(), ts(end_time), duration_minutes, id.to_string()],
        )?;
        Ok(updated > 0)
    }

    fn break_logs_started_between(
        &self,
        employee_id: &EmployeeId,
        kind: BreakType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<BreakLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {BREAK_LOG_COLUMNS} FROM break_logs
            WHERE employee_id = ? AND type = ? AND start_time >= ? AND start_time < ?
            ORDER BY start_time
            "#
        ))?;
        let entries = stmt
            .query_map(
                params![employee_id.as_str(), kind.as_str(), ts(from), ts(to)],
                break_log_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn get_attendance(
        &self,
        employee_id: &EmployeeId,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?"
                ),
                params![employee_id.as_str(), day(date)],
                attendance_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn attendance_for_day(&self, date: NaiveDate) -> StoreResult<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date = ? ORDER BY employee_id"
        ))?;
        let records = stmt
            .query_map([day(date)], attendance_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn insert_attendance_if_absent(&self, record: &AttendanceRecord) -> StoreResult<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO attendance
                (employee_id, date, status, check_in_time, remarks, updated_by, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(employee_id, date) DO NOTHING
            "#,
            params![
                record.employee_id.as_str(),
                day(record.date),
                record.status.as_str(),
                record.check_in_time.map(ts),
                record.remarks,
                record.updated_by,
                ts(record.updated_at),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn upsert_attendance(&self, record: &AttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.conn.execute(
            r#"
            INSERT INTO attendance
                (employee_id, date, status, check_in_time, remarks, updated_by, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(employee_id, date)
            DO UPDATE SET status = excluded.status,
                          check_in_time = COALESCE(excluded.check_in_time, attendance.check_in_time),
                          remarks = excluded.remarks,
                          updated_by = excluded.updated_by,
                          updated_at = excluded.updated_at
            "#,
            params![
                record.employee_id.as_str(),
                day(record.date),
                record.status.as_str(),
                record.check_in_time.map(ts),
                record.remarks,
                record.updated_by,
                ts(record.updated_at),
            ],
        )?;

        self.get_attendance(&record.employee_id, record.date)?
            .ok_or_else(|| StoreError::NotFound(format!("attendance for {}", record.employee_id)))
    }

    fn append_audit(&self, event: &AuditEvent) -> StoreResult<i64> {
        insert_audit(self.conn, event)
    }
}

fn insert_audit(conn: &Connection, event: &AuditEvent) -> StoreResult<i64> {
    let event_json = serde_json::to_string(&event.event)?;

    conn.execute(
        "INSERT INTO audit_log (timestamp, actor, event_json) VALUES (?, ?, ?)",
        params![ts(event.timestamp), event.actor, event_json],
    )?;

    let id = conn.last_insert_rowid();
    debug!(event_id = id, "Audit event appended");
    Ok(id)
}

fn read_policy(conn: &Connection) -> StoreResult<Option<StoredPolicy>> {
    let row = conn
        .query_row(
            "SELECT version, config_json, updated_by, updated_at FROM office_policy WHERE id = 1",
            [],
            |row| {
                let version: i64 = row.get(0)?;
                let json: String = row.get(1)?;
                let updated_by: String = row.get(2)?;
                let updated_at = time_col(row, 3)?;
                Ok((version, json, updated_by, updated_at))
            },
        )
        .optional()?;

    match row {
        Some((version, json, updated_by, updated_at)) => Ok(Some(StoredPolicy {
            version,
            config: serde_json::from_str(&json)?,
            updated_by,
            updated_at,
        })),
        None => Ok(None),
    }
}

// Fixed-width UTC timestamps so string comparison matches time order.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| {
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: EmployeeId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        role: parse_col(row, 2)?,
        team: row.get(3)?,
        is_active: row.get(4)?,
        current_status: parse_col(row, 5)?,
    })
}

fn break_log_from_row(row: &Row<'_>) -> rusqlite::Result<BreakLogEntry> {
    Ok(BreakLogEntry {
        id: BreakLogId::from_uuid(parse_col::<Uuid>(row, 0)?),
        employee_id: EmployeeId::new(row.get::<_, String>(1)?),
        kind: parse_col(row, 2)?,
        status: parse_col(row, 3)?,
        start_time: time_col(row, 4)?,
        end_time: opt_time_col(row, 5)?,
        duration_minutes: row.get(6)?,
    })
}

fn attendance_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.get(0)?,
        employee_id: EmployeeId::new(row.get::<_, String>(1)?),
        date: parse_col(row, 2)?,
        status: parse_col(row, 3)?,
        check_in_time: opt_time_col(row, 4)?,
        remarks: row.get(5)?,
        updated_by: row.get(6)?,
        updated_at: time_col(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use workday_api::{AttendanceStatus, SYSTEM_ACTOR};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    fn store_with(employees: &[Employee]) -> Arc<dyn Store> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .transaction(|tx| -> StoreResult<()> {
                for e in employees {
                    tx.insert_employee(e)?;
                }
                Ok(())
            })
            .unwrap();
        store
    }

    fn break_entry(employee: &str, start: DateTime<Utc>) -> BreakLogEntry {
        BreakLogEntry {
            id: BreakLogId::new(),
            employee_id: EmployeeId::new(employee),
            kind: BreakType::Break,
            status: BreakLogStatus::Active,
            start_time: start,
            end_time: None,
            duration_minutes: None,
        }
    }

    fn attendance(employee: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: 0,
            employee_id: EmployeeId::new(employee),
            date: date(),
            status,
            check_in_time: None,
            remarks: None,
            updated_by: SYSTEM_ACTOR.into(),
            updated_at: at(5, 30),
        }
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::by("admin", AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::PolicyUpdated { version: 2 }))
            .unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].event, AuditEventType::PolicyUpdated { version: 2 }));
        assert_eq!(events[1].actor, "admin");
    }

    #[test]
    fn test_employee_roundtrip_and_filters() {
        let mut admin = Employee::new("ADM-1", "Asha", None);
        admin.role = Role::Admin;
        let mut gone = Employee::new("EMP-3", "Ravi", Some("CALLER".into()));
        gone.is_active = false;

        let store = store_with(&[
            Employee::new("EMP-1", "Meera", Some("CALLER".into())),
            Employee::new("EMP-2", "Karan", Some("DEVELOPMENT".into())),
            admin,
            gone,
        ]);

        store
            .transaction(|tx| -> StoreResult<()> {
                let active = tx.active_employees(Role::Employee)?;
                let ids: Vec<_> = active.iter().map(|e| e.id.as_str()).collect();
                assert_eq!(ids, vec!["EMP-1", "EMP-2"]);

                assert!(!tx.insert_employee(&Employee::new("EMP-1", "Dup", None))?);
                assert_eq!(tx.get_employee(&"EMP-1".into())?.unwrap().name, "Meera");
                assert_eq!(tx.list_employees()?.len(), 4);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_status_updates() {
        let store = store_with(&[
            Employee::new("EMP-1", "Meera", Some("CALLER".into())),
            Employee::new("EMP-2", "Karan", Some("CALLER".into())),
        ]);

        store
            .transaction(|tx| -> StoreResult<()> {
                tx.set_status(&"EMP-1".into(), EmployeeStatus::OnBreak)?;
                assert_eq!(tx.count_team_in_status("CALLER", EmployeeStatus::OnBreak)?, 1);

                let moved =
                    tx.set_status_where(Role::Employee, None, EmployeeStatus::Lunch)?;
                assert_eq!(moved, 2);

                let back = tx.set_status_where(
                    Role::Employee,
                    Some(EmployeeStatus::Lunch),
                    EmployeeStatus::Working,
                )?;
                assert_eq!(back, 2);

                assert!(matches!(
                    tx.set_status(&"NOPE".into(), EmployeeStatus::Working),
                    Err(StoreError::NotFound(_))
                ));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_break_log_lifecycle() {
        let store = store_with(&[Employee::new("EMP-1", "Meera", None)]);
        let entry = break_entry("EMP-1", at(8, 0));

        store
            .transaction(|tx| -> StoreResult<()> {
                tx.insert_break_log(&entry)?;
                let active = tx.active_break_logs(Some(&"EMP-1".into()), Some(BreakType::Break))?;
                assert_eq!(active, vec![entry.clone()]);
                assert!(tx.active_break_logs(None, Some(BreakType::Lunch))?.is_empty());

                assert!(tx.finish_break_log(entry.id, BreakLogStatus::Completed, at(8, 12), 12)?);
                // Already closed
                assert!(!tx.finish_break_log(entry.id, BreakLogStatus::ForcedEnd, at(8, 13), 13)?);

                let today =
                    tx.break_logs_started_between(&"EMP-1".into(), BreakType::Break, at(0, 0), at(23, 0))?;
                assert_eq!(today.len(), 1);
                assert_eq!(today[0].status, BreakLogStatus::Completed);
                assert_eq!(today[0].duration_minutes, Some(12));
                assert_eq!(today[0].end_time, Some(at(8, 12)));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_second_active_entry_is_rejected() {
        let store = store_with(&[Employee::new("EMP-1", "Meera", None)]);

        let result = store.transaction(|tx| -> StoreResult<()> {
            tx.insert_break_log(&break_entry("EMP-1", at(8, 0)))?;
            tx.insert_break_log(&break_entry("EMP-1", at(8, 1)))?;
            Ok(())
        });
        assert!(result.is_err());

        // The whole transaction rolled back
        let active = store
            .transaction(|tx| tx.active_break_logs(None, None))
            .unwrap();
        assert!(active.is_empty());
    }

    #[test]
    fn test_attendance_conditional_insert() {
        let store = store_with(&[Employee::new("EMP-1", "Meera", None)]);

        store
            .transaction(|tx| -> StoreResult<()> {
                assert!(tx.insert_attendance_if_absent(&attendance("EMP-1", AttendanceStatus::Late))?);
                assert!(!tx.insert_attendance_if_absent(&attendance("EMP-1", AttendanceStatus::Absent))?);

                let record = tx.get_attendance(&"EMP-1".into(), date())?.unwrap();
                assert_eq!(record.status, AttendanceStatus::Late);
                assert_eq!(tx.attendance_for_day(date())?.len(), 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_attendance_upsert_keeps_check_in() {
        let store = store_with(&[Employee::new("EMP-1", "Meera", None)]);
        let mut first = attendance("EMP-1", AttendanceStatus::Present);
        first.check_in_time = Some(at(4, 35));

        store
            .transaction(|tx| -> StoreResult<()> {
                tx.upsert_attendance(&first)?;

                let mut leave = attendance("EMP-1", AttendanceStatus::Leave);
                leave.remarks = Some("Approved leave".into());
                let stored = tx.upsert_attendance(&leave)?;

                assert_eq!(stored.status, AttendanceStatus::Leave);
                assert_eq!(stored.check_in_time, Some(at(4, 35)));
                assert_eq!(stored.remarks.as_deref(), Some("Approved leave"));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_policy_versions() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load_policy().unwrap().is_none());
        assert!(store.policy_version().unwrap().is_none());

        let seeded = store.seed_policy(&OfficeConfig::default(), SYSTEM_ACTOR).unwrap();
        assert_eq!(seeded.version, 1);

        let mut changed = OfficeConfig::default();
        changed.start_time = "9:30 AM".into();
        let saved = store.save_policy(&changed, "admin").unwrap();
        assert_eq!(saved.version, 2);
        assert_eq!(saved.updated_by, "admin");

        // Seeding never overwrites
        let again = store.seed_policy(&OfficeConfig::default(), SYSTEM_ACTOR).unwrap();
        assert_eq!(again.version, 2);
        assert_eq!(again.config.start_time, "9:30 AM");
        assert_eq!(store.policy_version().unwrap(), Some(2));
    }

    #[test]
    fn test_on_disk_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workdayd.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.seed_policy(&OfficeConfig::default(), SYSTEM_ACTOR).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.policy_version().unwrap(), Some(1));
    }

    #[test]
    fn test_lock_timeout() {
        let short = SqliteStore {
            conn: Mutex::new(Connection::open_in_memory().unwrap()),
            options: StoreOptions {
                timeout: Duration::from_millis(20),
            },
        };

        let _held = short.conn.lock().unwrap();
        let err = short.lock().err().unwrap();
        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(err.is_transient());
        assert!(!StoreError::NotFound("EMP-1".into()).is_transient());
    }

    fn count_employees(store: &dyn Store) -> StoreResult<usize> {
        store.transaction(|tx| Ok(tx.list_employees()?.len()))
    }

    #[test]
    fn test_transaction_through_borrowed_store() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .atomically(&mut |tx| tx.insert_employee(&Employee::new("EMP-1", "Meera", None)).map(|_| ()))
            .unwrap();

        assert_eq!(count_employees(&store).unwrap(), 1);
    }
}
