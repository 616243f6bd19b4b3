//! Employee directory maintenance

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use workday_api::{BreakLogStatus, Employee, EmployeeStatus};
use workday_store::{AuditEvent, AuditEventType, Store};
use workday_util::{whole_minutes_between, EmployeeId};

use crate::{CoreError, CoreResult};

/// Provisioning and deactivation of employee rows
pub struct Directory {
    store: Arc<dyn Store>,
}

impl Directory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Add an employee in WORKING status
    pub fn provision(&self, employee: Employee, actor: &str) -> CoreResult<Employee> {
        self.store.transaction(|tx| -> CoreResult<()> {
            if !tx.insert_employee(&employee)? {
                return Err(CoreError::EmployeeExists(employee.id.clone()));
            }
            tx.append_audit(&AuditEvent::by(
                actor,
                AuditEventType::EmployeeProvisioned {
                    employee_id: employee.id.clone(),
                    team: employee.team.clone(),
                },
            ))?;
            Ok(())
        })?;

        info!(employee_id = %employee.id, team = ?employee.team, actor, "Employee provisioned");
        Ok(employee)
    }

    /// Deactivate an employee. Any running break or lunch is closed as FORCED_END.
    pub fn deactivate(&self, employee_id: &EmployeeId, actor: &str, now: DateTime<Utc>) -> CoreResult<()> {
        self.store.transaction(|tx| -> CoreResult<()> {
            if !tx.set_employee_active(employee_id, false)? {
                return Err(CoreError::EmployeeNotFound(employee_id.clone()));
            }

            for entry in tx.active_break_logs(Some(employee_id), None)? {
                let duration = whole_minutes_between(entry.start_time, now);
                tx.finish_break_log(entry.id, BreakLogStatus::ForcedEnd, now, duration)?;
            }
            tx.set_status(employee_id, EmployeeStatus::Working)?;

            tx.append_audit(
                &AuditEvent::by(
                    actor,
                    AuditEventType::EmployeeDeactivated {
                        employee_id: employee_id.clone(),
                    },
                )
                .at(now),
            )?;
            Ok(())
        })?;

        info!(employee_id = %employee_id, actor, "Employee deactivated");
        Ok(())
    }

    pub fn get(&self, employee_id: &EmployeeId) -> CoreResult<Employee> {
        self.store
            .transaction(|tx| tx.get_employee(employee_id))?
            .ok_or_else(|| CoreError::EmployeeNotFound(employee_id.clone()))
    }

    pub fn list(&self) -> CoreResult<Vec<Employee>> {
        Ok(self.store.transaction(|tx| tx.list_employees())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ist, store_with};
    use crate::BreakEngine;
    use workday_config::BreakRules;

    #[test]
    fn test_provision_and_list() {
        let directory = Directory::new(store_with(vec![]));

        directory
            .provision(Employee::new("EMP-1", "Meera", Some("CALLER".into())), "admin")
            .unwrap();
        let err = directory
            .provision(Employee::new("EMP-1", "Again", None), "admin")
            .unwrap_err();
        assert!(matches!(err, CoreError::EmployeeExists(_)));

        let all = directory.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].current_status, EmployeeStatus::Working);
    }

    #[test]
    fn test_deactivate_closes_running_break() {
        let store = store_with(vec![Employee::new("EMP-1", "Meera", None)]);
        let directory = Directory::new(store.clone());
        let engine = BreakEngine::new(
            store.clone(),
            Arc::new(crate::testing::RecordingSink::default()),
            BreakRules::default(),
            chrono_tz::Asia::Kolkata,
        );

        engine.start_break(&"EMP-1".into(), ist(11, 0)).unwrap();
        directory.deactivate(&"EMP-1".into(), "admin", ist(11, 20)).unwrap();

        let employee = directory.get(&"EMP-1".into()).unwrap();
        assert!(!employee.is_active);
        assert_eq!(employee.current_status, EmployeeStatus::Working);
        assert!(store.transaction(|tx| tx.active_break_logs(None, None)).unwrap().is_empty());

        assert!(matches!(
            directory.deactivate(&"NOPE".into(), "admin", ist(11, 20)),
            Err(CoreError::EmployeeNotFound(_))
        ));
    }
}
