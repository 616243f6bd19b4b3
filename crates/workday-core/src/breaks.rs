//! Break state machine
//!
//! ```text
//! WORKING --start_break--> ON_BREAK --end_break--> WORKING
//! WORKING --lunch sweep--> LUNCH --lunch sweep--> WORKING
//! ```
//!
//! Employees never enter or leave LUNCH themselves; see [`crate::start_lunch`].

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use workday_api::{
    BreakLogEntry, BreakLogStatus, BreakType, Employee, EmployeeStatus, Event, EventPayload,
};
use workday_config::BreakRules;
use workday_store::{Store, StoreTx};
use workday_util::{
    format_minutes, policy_day_bounds, policy_now, whole_minutes_between, BreakLogId, EmployeeId,
};

use crate::{CoreError, CoreResult, EventSink};

/// Result of a successful break start
#[derive(Debug, Clone, Serialize)]
pub struct BreakStarted {
    pub entry: BreakLogEntry,
    /// Break minutes already used today, before this break
    pub used_minutes_today: u32,
    /// Set when the team's daily soft limit is already used up
    pub warning: Option<String>,
}

/// Result of a successful break end
#[derive(Debug, Clone, Serialize)]
pub struct BreakEnded {
    pub duration_minutes: u32,
    /// The closed entry; `None` when no ACTIVE log was found
    pub entry: Option<BreakLogEntry>,
    pub total_break_minutes_today: u32,
}

/// Live status of one employee
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeStatusView {
    pub employee_id: EmployeeId,
    pub status: EmployeeStatus,
    pub total_break_minutes_today: u32,
    pub active_break: Option<BreakLogEntry>,
}

/// Per-employee break transitions
pub struct BreakEngine {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    rules: BreakRules,
    timezone: Tz,
}

impl BreakEngine {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        rules: BreakRules,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            events,
            rules,
            timezone,
        }
    }

    /// Move a WORKING employee to ON_BREAK and open a BREAK log entry
    pub fn start_break(&self, employee_id: &EmployeeId, now: DateTime<Utc>) -> CoreResult<BreakStarted> {
        let (employee, entry, used) = self.store.transaction(|tx| -> CoreResult<_> {
            let employee = active_employee(tx, employee_id)?;

            if employee.current_status != EmployeeStatus::Working {
                return Err(CoreError::InvalidStateTransition {
                    action: "start a break",
                    status: employee.current_status,
                });
            }

            if let Some(cap) = self.rules.cap_for(employee.team.as_deref()) {
                let on_break = tx.count_team_in_status(&cap.team, EmployeeStatus::OnBreak)?;
                if on_break >= cap.max_on_break {
                    return Err(CoreError::ConcurrencyLimitExceeded {
                        team: cap.team.clone(),
                        limit: cap.max_on_break,
                    });
                }
            }

            let used = break_minutes_on_day(tx, employee_id, now, self.timezone)?;

            let entry = BreakLogEntry {
                id: BreakLogId::new(),
                employee_id: employee_id.clone(),
                kind: BreakType::Break,
                status: BreakLogStatus::Active,
                start_time: now,
                end_time: None,
                duration_minutes: None,
            };
            tx.set_status(employee_id, EmployeeStatus::OnBreak)?;
            tx.insert_break_log(&entry)?;

            Ok((employee, entry, used))
        })?;

        let warning = self
            .rules
            .soft_limit_for(employee.team.as_deref())
            .filter(|limit| used >= limit.daily_minutes)
            .map(|limit| {
                format!(
                    "Daily break limit of {} reached ({} used today)",
                    format_minutes(limit.daily_minutes),
                    format_minutes(used)
                )
            });

        if let Some(w) = &warning {
            warn!(employee_id = %employee_id, used_minutes = used, warning = %w, "Break started over soft limit");
        } else {
            info!(employee_id = %employee_id, used_minutes = used, "Break started");
        }

        self.events.publish(Event::new(EventPayload::StatusUpdate {
            employee_id: employee_id.clone(),
            status: EmployeeStatus::OnBreak,
        }));

        Ok(BreakStarted {
            entry,
            used_minutes_today: used,
            warning,
        })
    }

    /// Close the employee's running break and return them to WORKING
    pub fn end_break(&self, employee_id: &EmployeeId, now: DateTime<Utc>) -> CoreResult<BreakEnded> {
        let ended = self.store.transaction(|tx| -> CoreResult<_> {
            let employee = tx
                .get_employee(employee_id)?
                .ok_or_else(|| CoreError::EmployeeNotFound(employee_id.clone()))?;

            if employee.current_status != EmployeeStatus::OnBreak {
                return Err(CoreError::NotOnBreak(employee_id.clone()));
            }

            let running = tx
                .active_break_logs(Some(employee_id), Some(BreakType::Break))?
                .into_iter()
                .next();

            let (duration_minutes, entry) = match running {
                Some(mut entry) => {
                    let duration = whole_minutes_between(entry.start_time, now);
                    tx.finish_break_log(entry.id, BreakLogStatus::Completed, now, duration)?;
                    entry.status = BreakLogStatus::Completed;
                    entry.end_time = Some(now);
                    entry.duration_minutes = Some(duration);
                    (duration, Some(entry))
                }
                None => {
                    warn!(employee_id = %employee_id, "No active break log, resetting status anyway");
                    (0, None)
                }
            };

            tx.set_status(employee_id, EmployeeStatus::Working)?;
            let total = break_minutes_on_day(tx, employee_id, now, self.timezone)?;

            Ok(BreakEnded {
                duration_minutes,
                entry,
                total_break_minutes_today: total,
            })
        })?;

        info!(
            employee_id = %employee_id,
            duration_minutes = ended.duration_minutes,
            total_today = ended.total_break_minutes_today,
            "Break ended"
        );

        self.events.publish(Event::new(EventPayload::StatusUpdate {
            employee_id: employee_id.clone(),
            status: EmployeeStatus::Working,
        }));

        Ok(ended)
    }

    /// Break minutes used on the current policy day
    pub fn daily_break_usage(&self, employee_id: &EmployeeId, now: DateTime<Utc>) -> CoreResult<u32> {
        self.store.transaction(|tx| -> CoreResult<_> {
            tx.get_employee(employee_id)?
                .ok_or_else(|| CoreError::EmployeeNotFound(employee_id.clone()))?;
            Ok(break_minutes_on_day(tx, employee_id, now, self.timezone)?)
        })
    }

    pub fn status(&self, employee_id: &EmployeeId, now: DateTime<Utc>) -> CoreResult<EmployeeStatusView> {
        self.store.transaction(|tx| -> CoreResult<_> {
            let employee = tx
                .get_employee(employee_id)?
                .ok_or_else(|| CoreError::EmployeeNotFound(employee_id.clone()))?;
            let active_break = tx.active_break_logs(Some(employee_id), None)?.into_iter().next();

            Ok(EmployeeStatusView {
                employee_id: employee.id,
                status: employee.current_status,
                total_break_minutes_today: break_minutes_on_day(tx, employee_id, now, self.timezone)?,
                active_break,
            })
        })
    }
}

/// Load an employee that may take part in transitions
pub(crate) fn active_employee(tx: &dyn StoreTx, employee_id: &EmployeeId) -> CoreResult<Employee> {
    let employee = tx
        .get_employee(employee_id)?
        .ok_or_else(|| CoreError::EmployeeNotFound(employee_id.clone()))?;
    if !employee.is_active {
        return Err(CoreError::EmployeeInactive(employee_id.clone()));
    }
    Ok(employee)
}

/// Sum of BREAK minutes started on the policy day containing `now`.
/// A still-running break counts its elapsed whole minutes.
fn break_minutes_on_day(
    tx: &dyn StoreTx,
    employee_id: &EmployeeId,
    now: DateTime<Utc>,
    timezone: Tz,
) -> workday_store::StoreResult<u32> {
    let today = policy_now(now, timezone).date;
    let (from, to) = policy_day_bounds(today, timezone);

    let minutes = tx
        .break_logs_started_between(employee_id, BreakType::Break, from, to)?
        .iter()
        .map(|entry| match entry.status {
            BreakLogStatus::Active => whole_minutes_between(entry.start_time, now),
            _ => entry.duration_minutes.unwrap_or(0),
        })
        .sum();

    Ok(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ist, store_with, RecordingSink};
    use workday_config::{ConcurrencyCap, SoftLimit};

    fn setup(employees: Vec<Employee>) -> (BreakEngine, Arc<dyn Store>, Arc<RecordingSink>) {
        let store = store_with(employees);
        let sink = Arc::new(RecordingSink::default());
        let rules = BreakRules {
            concurrency_caps: vec![ConcurrencyCap {
                team: "CALLER".into(),
                max_on_break: 2,
            }],
            soft_limits: vec![SoftLimit {
                team: "DEVELOPMENT".into(),
                daily_minutes: 60,
            }],
        };
        let engine = BreakEngine::new(store.clone(), sink.clone(), rules, chrono_tz::Asia::Kolkata);
        (engine, store, sink)
    }

    fn caller(id: &str) -> Employee {
        Employee::new(id, id, Some("CALLER".into()))
    }

    #[test]
    fn test_start_then_end_break() {
        let (engine, store, sink) = setup(vec![caller("EMP-1")]);
        let id = EmployeeId::new("EMP-1");

        let started = engine.start_break(&id, ist(11, 0)).unwrap();
        assert!(started.warning.is_none());
        assert_eq!(engine.status(&id, ist(11, 5)).unwrap().status, EmployeeStatus::OnBreak);

        let ended = engine.end_break(&id, ist(11, 12)).unwrap();
        assert_eq!(ended.duration_minutes, 12);
        assert_eq!(ended.total_break_minutes_today, 12);

        let entry = ended.entry.unwrap();
        assert_eq!(entry.id, started.entry.id);
        assert_eq!(entry.status, BreakLogStatus::Completed);

        let view = engine.status(&id, ist(11, 13)).unwrap();
        assert_eq!(view.status, EmployeeStatus::Working);
        assert!(view.active_break.is_none());

        let active = store.transaction(|tx| tx.active_break_logs(None, None)).unwrap();
        assert!(active.is_empty());
        assert_eq!(sink.names(), vec!["statusUpdate", "statusUpdate"]);
    }

    #[test]
    fn test_start_break_requires_working() {
        let (engine, _store, _sink) = setup(vec![caller("EMP-1")]);
        let id = EmployeeId::new("EMP-1");

        engine.start_break(&id, ist(11, 0)).unwrap();
        let err = engine.start_break(&id, ist(11, 1)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidStateTransition {
                status: EmployeeStatus::OnBreak,
                ..
            }
        ));
    }

    #[test]
    fn test_end_break_when_working() {
        let (engine, _store, _sink) = setup(vec![caller("EMP-1")]);
        let err = engine.end_break(&"EMP-1".into(), ist(11, 0)).unwrap_err();
        assert!(matches!(err, CoreError::NotOnBreak(_)));
    }

    #[test]
    fn test_end_break_without_log_still_resets() {
        let (engine, store, _sink) = setup(vec![caller("EMP-1")]);
        let id = EmployeeId::new("EMP-1");
        store
            .transaction(|tx| tx.set_status(&id, EmployeeStatus::OnBreak))
            .unwrap();

        let ended = engine.end_break(&id, ist(11, 0)).unwrap();
        assert_eq!(ended.duration_minutes, 0);
        assert!(ended.entry.is_none());
        assert_eq!(engine.status(&id, ist(11, 0)).unwrap().status, EmployeeStatus::Working);
    }

    #[test]
    fn test_concurrency_cap() {
        let (engine, _store, _sink) = setup(vec![
            caller("EMP-1"),
            caller("EMP-2"),
            caller("EMP-3"),
            Employee::new("DEV-1", "DEV-1", Some("DEVELOPMENT".into())),
        ]);

        engine.start_break(&"EMP-1".into(), ist(11, 0)).unwrap();
        engine.start_break(&"EMP-2".into(), ist(11, 0)).unwrap();

        let err = engine.start_break(&"EMP-3".into(), ist(11, 1)).unwrap_err();
        assert!(matches!(err, CoreError::ConcurrencyLimitExceeded { limit: 2, .. }));

        // Other teams are not capped
        engine.start_break(&"DEV-1".into(), ist(11, 1)).unwrap();

        // A slot frees up once someone returns
        engine.end_break(&"EMP-1".into(), ist(11, 10)).unwrap();
        engine.start_break(&"EMP-3".into(), ist(11, 11)).unwrap();
    }

    #[test]
    fn test_soft_limit_warns_but_succeeds() {
        let (engine, _store, _sink) = setup(vec![Employee::new(
            "DEV-1",
            "DEV-1",
            Some("DEVELOPMENT".into()),
        )]);
        let id = EmployeeId::new("DEV-1");

        engine.start_break(&id, ist(11, 0)).unwrap();
        engine.end_break(&id, ist(11, 59)).unwrap();

        let second = engine.start_break(&id, ist(12, 0)).unwrap();
        assert!(second.warning.is_none());
        assert_eq!(second.used_minutes_today, 59);
        engine.end_break(&id, ist(12, 1)).unwrap();

        let third = engine.start_break(&id, ist(16, 0)).unwrap();
        assert_eq!(third.used_minutes_today, 60);
        assert!(third.warning.is_some());
    }

    #[test]
    fn test_daily_usage_counts_running_break() {
        let (engine, _store, _sink) = setup(vec![caller("EMP-1")]);
        let id = EmployeeId::new("EMP-1");

        engine.start_break(&id, ist(11, 0)).unwrap();
        engine.end_break(&id, ist(11, 10)).unwrap();
        engine.start_break(&id, ist(12, 0)).unwrap();

        assert_eq!(engine.daily_break_usage(&id, ist(12, 7)).unwrap(), 17);
    }

    #[test]
    fn test_usage_resets_on_next_policy_day() {
        let (engine, _store, _sink) = setup(vec![caller("EMP-1")]);
        let id = EmployeeId::new("EMP-1");

        engine.start_break(&id, ist(18, 0)).unwrap();
        engine.end_break(&id, ist(18, 30)).unwrap();

        let tomorrow = ist(18, 0) + chrono::Duration::days(1);
        assert_eq!(engine.daily_break_usage(&id, tomorrow).unwrap(), 0);
    }

    #[test]
    fn test_inactive_and_unknown_employees() {
        let mut gone = caller("EMP-9");
        gone.is_active = false;
        let (engine, _store, _sink) = setup(vec![gone]);

        assert!(matches!(
            engine.start_break(&"EMP-9".into(), ist(11, 0)),
            Err(CoreError::EmployeeInactive(_))
        ));
        assert!(matches!(
            engine.start_break(&"NOPE".into(), ist(11, 0)),
            Err(CoreError::EmployeeNotFound(_))
        ));
    }
}
