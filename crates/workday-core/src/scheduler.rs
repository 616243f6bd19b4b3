//! Daily trigger scheduler
//!
//! Three named jobs are derived from the stored office policy:
//!
//! | job           | fires at              | sweep                      |
//! |---------------|-----------------------|----------------------------|
//! | `lunch-start` | `break_window.start`  | [`start_lunch`]            |
//! | `lunch-end`   | `break_window.end`    | [`end_lunch`]              |
//! | `auto-absent` | `auto_absent_time`    | [`mark_absentees`]         |
//!
//! [`Scheduler::reschedule`] rebuilds all three from the latest stored policy.
//! Timers armed by an earlier schedule are inert once it returns; a firing
//! already dispatched runs to completion.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use workday_api::{Event, EventPayload};
use workday_config::{OfficeConfig, OfficePolicy, RawOfficeConfig};
use workday_store::{AuditEvent, AuditEventType, Store};
use workday_util::DailyTrigger;

use crate::{
    end_lunch, mark_absentees, start_lunch, stored_or_seeded, AbsenteeOutcome, ActivePolicy,
    EventSink, LunchEndOutcome, LunchStartOutcome, SchedulerError,
};

/// The fixed set of daily jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobKind {
    LunchStart,
    LunchEnd,
    AutoAbsent,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::LunchStart, JobKind::LunchEnd, JobKind::AutoAbsent];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::LunchStart => "lunch-start",
            JobKind::LunchEnd => "lunch-end",
            JobKind::AutoAbsent => "auto-absent",
        }
    }

    /// When this job fires under `policy`
    pub fn trigger(&self, policy: &OfficePolicy) -> DailyTrigger {
        match self {
            JobKind::LunchStart => policy.lunch_start_trigger(),
            JobKind::LunchEnd => policy.lunch_end_trigger(),
            JobKind::AutoAbsent => policy.auto_absent_trigger(),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown job '{}' (expected lunch-start, lunch-end or auto-absent)", s))
    }
}

/// What one firing did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "job", rename_all = "kebab-case")]
pub enum JobOutcome {
    LunchStart(LunchStartOutcome),
    LunchEnd(LunchEndOutcome),
    AutoAbsent(AbsenteeOutcome),
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::LunchStart(o) => o.fmt(f),
            JobOutcome::LunchEnd(o) => o.fmt(f),
            JobOutcome::AutoAbsent(o) => o.fmt(f),
        }
    }
}

/// A registered daily timer. Dropping the handle does not stop the timer.
#[derive(Debug)]
pub struct JobHandle {
    trigger: DailyTrigger,
    timezone: Tz,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn trigger(&self) -> DailyTrigger {
        self.trigger
    }

    /// Stop the timer. A handler already running is not interrupted.
    pub fn cancel(self) {
        self.task.abort();
    }
}

/// Arm a timer that calls `handler` with the scheduled instant once a day at
/// `trigger` in `timezone`. Firings missed while the process was not
/// running are skipped, not replayed.
pub fn register_daily<F, Fut>(
    runtime: &Handle,
    trigger: DailyTrigger,
    timezone: Tz,
    mut handler: F,
) -> JobHandle
where
    F: FnMut(DateTime<Utc>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let task = runtime.spawn(async move {
        let mut after = workday_util::now();
        loop {
            let Some(next) = trigger.next_fire_after(after, timezone) else {
                error!(trigger = %trigger, "Trigger has no upcoming firing, timer stopped");
                return;
            };

            let wait = (next - workday_util::now()).to_std().unwrap_or(Duration::ZERO);
            debug!(trigger = %trigger, next_fire = %next, wait_secs = wait.as_secs(), "Timer armed");
            tokio::time::sleep(wait).await;

            handler(next).await;
            after = next.max(workday_util::now());
        }
    });

    JobHandle {
        trigger,
        timezone,
        task,
    }
}

/// View of one registered job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledJob {
    pub name: &'static str,
    pub cron_expression: String,
    pub timezone: String,
    pub next_fire: Option<DateTime<Utc>>,
}

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Timezone every policy time is read in
    pub timezone: Tz,
    /// Upper bound on one firing
    pub job_timeout: Duration,
    /// Policy stored on first use when the store has none
    pub seed_policy: OfficeConfig,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            timezone: workday_util::DEFAULT_POLICY_TIMEZONE,
            job_timeout: Duration::from_secs(60),
            seed_policy: OfficeConfig::default(),
        }
    }
}

struct ScheduleState {
    generation: u64,
    policy_version: Option<i64>,
    jobs: Vec<(JobKind, JobHandle)>,
}

struct Shared {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    settings: SchedulerSettings,
    runtime: Handle,
    state: Mutex<ScheduleState>,
    in_flight: HashMap<JobKind, Arc<tokio::sync::Mutex<()>>>,
}

/// Owns the three daily jobs
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a scheduler with no jobs registered. Must be called inside a
    /// tokio runtime; call [`Scheduler::reschedule`] to arm the timers.
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        settings: SchedulerSettings,
    ) -> Result<Self, SchedulerError> {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let in_flight = JobKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(tokio::sync::Mutex::new(()))))
            .collect();

        Ok(Self {
            shared: Arc::new(Shared {
                store,
                events,
                settings,
                runtime,
                state: Mutex::new(ScheduleState {
                    generation: 0,
                    policy_version: None,
                    jobs: Vec::new(),
                }),
                in_flight,
            }),
        })
    }

    /// Rebuild every job from the latest stored policy.
    ///
    /// On error the previous jobs stay registered.
    pub fn reschedule(&self) -> Result<Vec<ScheduledJob>, SchedulerError> {
        let shared = &self.shared;
        let stored = stored_or_seeded(&*shared.store, &shared.settings.seed_policy)?;
        let active = ActivePolicy::from_stored(&stored).map_err(|errors| {
            warn!(version = stored.version, "Stored policy invalid, keeping previous schedule");
            SchedulerError::InvalidPolicy(errors)
        })?;

        let mut state = shared.lock_state();
        state.generation += 1;
        let generation = state.generation;

        for (kind, handle) in state.jobs.drain(..) {
            debug!(job = %kind, "Cancelling timer");
            handle.cancel();
        }

        for kind in JobKind::ALL {
            let trigger = kind.trigger(&active.policy);
            let worker = Arc::clone(shared);
            let handle = register_daily(
                &shared.runtime,
                trigger,
                shared.settings.timezone,
                move |scheduled_for| {
                    let _ = worker.dispatch(kind, generation, scheduled_for);
                    std::future::ready(())
                },
            );
            state.jobs.push((kind, handle));
        }
        state.policy_version = Some(active.version);

        let jobs = describe(&state.jobs);
        drop(state);

        info!(
            policy_version = active.version,
            generation,
            jobs = ?jobs.iter().map(|j| format!("{} @ {}", j.name, j.cron_expression)).collect::<Vec<_>>(),
            "Schedule installed"
        );
        shared.audit(AuditEvent::new(AuditEventType::Rescheduled {
            policy_version: active.version,
            triggers: jobs
                .iter()
                .map(|j| format!("{} {}", j.name, j.cron_expression))
                .collect(),
        }));

        Ok(jobs)
    }

    /// Validate and store a policy override, then reschedule.
    ///
    /// An invalid override is rejected without touching the stored policy or
    /// the running schedule.
    pub fn update_policy(
        &self,
        raw: &RawOfficeConfig,
        actor: &str,
    ) -> Result<ActivePolicy, SchedulerError> {
        let shared = &self.shared;
        let policy = OfficePolicy::from_override(raw).map_err(SchedulerError::InvalidPolicy)?;

        let stored = shared.store.save_policy(&policy.config, actor)?;
        shared.audit(AuditEvent::by(
            actor,
            AuditEventType::PolicyUpdated {
                version: stored.version,
            },
        ));
        info!(version = stored.version, actor, "Office policy updated");

        shared.events.publish(Event::new(EventPayload::PolicyUpdated {
            version: stored.version,
        }));

        self.reschedule()?;

        Ok(ActivePolicy {
            version: stored.version,
            policy,
        })
    }

    /// The policy in force, seeding the store if it has none
    pub fn current_policy(&self) -> Result<ActivePolicy, SchedulerError> {
        let stored = stored_or_seeded(&*self.shared.store, &self.shared.settings.seed_policy)?;
        ActivePolicy::from_stored(&stored).map_err(SchedulerError::InvalidPolicy)
    }

    /// Version the current timers were built from
    pub fn scheduled_policy_version(&self) -> Option<i64> {
        self.shared.lock_state().policy_version
    }

    pub fn active_jobs(&self) -> Vec<ScheduledJob> {
        describe(&self.shared.lock_state().jobs)
    }

    /// Run a job now, under the same in-flight guard and timeout as a timed firing
    pub async fn run_now(&self, kind: JobKind) -> Result<JobOutcome, SchedulerError> {
        Arc::clone(&self.shared).fire(kind).await
    }

    /// Cancel every timer
    pub fn shutdown(&self) {
        let mut state = self.shared.lock_state();
        state.generation += 1;
        for (kind, handle) in state.jobs.drain(..) {
            debug!(job = %kind, "Cancelling timer");
            handle.cancel();
        }
        info!("Scheduler stopped");
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ScheduleState> {
        // State stays consistent across a panic: every write is a single push or drain.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.store.append_audit(event) {
            warn!(error = %e, "Failed to write audit event");
        }
    }

    /// Start a firing unless its schedule has been replaced
    fn dispatch(
        self: &Arc<Self>,
        kind: JobKind,
        generation: u64,
        scheduled_for: DateTime<Utc>,
    ) -> Option<JoinHandle<Result<JobOutcome, SchedulerError>>> {
        let state = self.lock_state();
        if state.generation != generation {
            debug!(job = %kind, generation, "Stale timer fired, ignoring");
            return None;
        }

        info!(job = %kind, scheduled_for = %scheduled_for, "Job firing");
        // Detached so that cancelling the timer cannot interrupt the firing.
        let shared = Arc::clone(self);
        let firing = self.runtime.spawn(shared.fire(kind));
        drop(state);
        Some(firing)
    }

    async fn fire(self: Arc<Self>, kind: JobKind) -> Result<JobOutcome, SchedulerError> {
        let result = self.execute(kind).await;

        match &result {
            Ok(outcome) => info!(job = %kind, outcome = %outcome, "Job completed"),
            Err(SchedulerError::AlreadyRunning(_)) => {
                warn!(job = %kind, "Previous firing still running, skipped");
            }
            Err(e) => {
                error!(job = %kind, error = %e, transient = e.is_transient(), "Job failed");
                self.audit(AuditEvent::new(AuditEventType::JobFailed {
                    job: kind.name().to_string(),
                    error: e.to_string(),
                }));
            }
        }

        result
    }

    async fn execute(self: &Arc<Self>, kind: JobKind) -> Result<JobOutcome, SchedulerError> {
        let guard = Arc::clone(&self.in_flight[&kind])
            .try_lock_owned()
            .map_err(|_| SchedulerError::AlreadyRunning(kind))?;

        let worker = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || {
            // Held until the sweep really finishes, even past a timeout.
            let _guard = guard;
            worker.sweep(kind, workday_util::now())
        });

        let timeout = self.settings.job_timeout;
        match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(SchedulerError::JobTimedOut {
                job: kind,
                after: timeout,
            }),
            Ok(Err(join)) => Err(SchedulerError::JobPanicked {
                job: kind,
                message: join.to_string(),
            }),
            Ok(Ok(Err(source))) => Err(SchedulerError::JobFailed { job: kind, source }),
            Ok(Ok(Ok(outcome))) => Ok(outcome),
        }
    }

    fn sweep(&self, kind: JobKind, now: DateTime<Utc>) -> crate::CoreResult<JobOutcome> {
        let store = &*self.store;
        let events = &*self.events;
        match kind {
            JobKind::LunchStart => start_lunch(store, events, now).map(JobOutcome::LunchStart),
            JobKind::LunchEnd => end_lunch(store, events, now).map(JobOutcome::LunchEnd),
            JobKind::AutoAbsent => {
                mark_absentees(store, events, now, self.settings.timezone).map(JobOutcome::AutoAbsent)
            }
        }
    }
}

fn describe(jobs: &[(JobKind, JobHandle)]) -> Vec<ScheduledJob> {
    let now = workday_util::now();
    jobs.iter()
        .map(|(kind, handle)| ScheduledJob {
            name: kind.name(),
            cron_expression: handle.trigger.cron_expression(),
            timezone: handle.timezone.name().to_string(),
            next_fire: handle.trigger.next_fire_after(now, handle.timezone),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{store_with, RecordingSink};
    use workday_api::{Employee, EmployeeStatus};
    use workday_config::RawBreakWindow;

    fn scheduler(store: Arc<dyn Store>) -> (Scheduler, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = Scheduler::new(store, sink.clone(), SchedulerSettings::default()).unwrap();
        (scheduler, sink)
    }

    #[test]
    fn test_job_names_roundtrip() {
        for kind in JobKind::ALL {
            assert_eq!(kind.name().parse::<JobKind>().unwrap(), kind);
        }
        assert!("lunch".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_new_requires_runtime() {
        let result = Scheduler::new(
            store_with(vec![]),
            Arc::new(RecordingSink::default()),
            SchedulerSettings::default(),
        );
        assert!(matches!(result, Err(SchedulerError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_reschedule_twice_keeps_three_jobs() {
        let (scheduler, _sink) = scheduler(store_with(vec![]));

        scheduler.reschedule().unwrap();
        let jobs = scheduler.reschedule().unwrap();

        assert_eq!(jobs.len(), 3);
        assert_eq!(scheduler.active_jobs().len(), 3);

        let names: Vec<_> = jobs.iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["lunch-start", "lunch-end", "auto-absent"]);
        assert_eq!(jobs[0].cron_expression, "30 14 * * *");
        assert_eq!(jobs[1].cron_expression, "30 15 * * *");
        assert_eq!(jobs[2].cron_expression, "0 11 * * *");
        assert_eq!(jobs[0].timezone, "Asia/Kolkata");
        assert_eq!(scheduler.scheduled_policy_version(), Some(1));
    }

    #[tokio::test]
    async fn test_update_policy_moves_triggers() {
        let store = store_with(vec![]);
        let (scheduler, sink) = scheduler(store.clone());
        scheduler.reschedule().unwrap();

        let raw = RawOfficeConfig {
            break_window: Some(RawBreakWindow {
                start: Some("1:00 PM".into()),
                end: Some("1:45 PM".into()),
            }),
            ..Default::default()
        };
        let active = scheduler.update_policy(&raw, "admin").unwrap();

        assert_eq!(active.version, 2);
        let jobs = scheduler.active_jobs();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].cron_expression, "0 13 * * *");
        assert_eq!(jobs[1].cron_expression, "45 13 * * *");
        assert_eq!(scheduler.scheduled_policy_version(), Some(2));
        assert!(sink.names().contains(&"policyUpdated"));
        assert_eq!(store.load_policy().unwrap().unwrap().updated_by, "admin");
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_schedule() {
        let store = store_with(vec![]);
        let (scheduler, _sink) = scheduler(store.clone());
        scheduler.reschedule().unwrap();

        let raw = RawOfficeConfig {
            start_time: Some("25:00 AM".into()),
            ..Default::default()
        };
        let err = scheduler.update_policy(&raw, "admin").unwrap_err();

        assert!(matches!(err, SchedulerError::InvalidPolicy(_)));
        assert_eq!(scheduler.active_jobs().len(), 3);
        assert_eq!(scheduler.active_jobs()[0].cron_expression, "30 14 * * *");
        assert_eq!(store.policy_version().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_reschedule_with_bad_stored_policy_keeps_jobs() {
        let store = store_with(vec![]);
        let (scheduler, _sink) = scheduler(store.clone());
        scheduler.reschedule().unwrap();

        // Written by another process without validation
        let mut bad = OfficeConfig::default();
        bad.break_window.end = "2:00 PM".into();
        store.save_policy(&bad, "someone").unwrap();

        assert!(matches!(
            scheduler.reschedule(),
            Err(SchedulerError::InvalidPolicy(_))
        ));
        assert_eq!(scheduler.active_jobs().len(), 3);
        assert_eq!(scheduler.scheduled_policy_version(), Some(1));
    }

    #[tokio::test]
    async fn test_run_now_executes_sweep() {
        let store = store_with(vec![
            Employee::new("EMP-1", "Meera", None),
            Employee::new("EMP-2", "Karan", None),
        ]);
        let (scheduler, sink) = scheduler(store.clone());

        let outcome = scheduler.run_now(JobKind::LunchStart).await.unwrap();
        assert!(matches!(outcome, JobOutcome::LunchStart(ref o) if o.employees == 2));

        let employees = store.transaction(|tx| tx.list_employees()).unwrap();
        assert!(employees.iter().all(|e| e.current_status == EmployeeStatus::Lunch));

        let outcome = scheduler.run_now(JobKind::LunchEnd).await.unwrap();
        assert!(matches!(outcome, JobOutcome::LunchEnd(ref o) if o.closed == 2));
        assert_eq!(sink.names(), vec!["globalStatusUpdate", "globalStatusUpdate"]);
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let (scheduler, _sink) = scheduler(store_with(vec![]));

        let guard = scheduler.shared.in_flight[&JobKind::AutoAbsent]
            .clone()
            .try_lock_owned()
            .unwrap();
        let err = scheduler.run_now(JobKind::AutoAbsent).await.unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyRunning(JobKind::AutoAbsent)));
        assert_eq!(err.to_string(), "auto-absent is already running");
        assert!(err.is_transient());

        drop(guard);
        scheduler.run_now(JobKind::AutoAbsent).await.unwrap();
    }

    /// A trigger `minutes` ahead of the real clock, in UTC
    fn trigger_in(minutes: i64) -> DailyTrigger {
        let at = workday_util::now() + chrono::Duration::minutes(minutes);
        DailyTrigger {
            hour: chrono::Timelike::hour(&at) as u8,
            minute: chrono::Timelike::minute(&at) as u8,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_registered_trigger_calls_handler() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = register_daily(&Handle::current(), trigger_in(2), chrono_tz::UTC, move |at| {
            let _ = tx.send(at);
            std::future::ready(())
        });

        let fired_at = tokio::time::timeout(Duration::from_secs(600), rx.recv())
            .await
            .expect("trigger did not fire")
            .unwrap();
        assert_eq!(chrono::Timelike::second(&fired_at), 0);
        assert_eq!(chrono::Timelike::minute(&fired_at) as u8, handle.trigger().minute);

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let counter = |count: &Arc<AtomicUsize>| {
            let count = count.clone();
            move |_: DateTime<Utc>| {
                count.fetch_add(1, Ordering::SeqCst);
                std::future::ready(())
            }
        };
        let kept_count = Arc::new(AtomicUsize::new(0));
        let cancelled_count = Arc::new(AtomicUsize::new(0));

        let trigger = trigger_in(2);
        let kept = register_daily(&Handle::current(), trigger, chrono_tz::UTC, counter(&kept_count));
        let cancelled =
            register_daily(&Handle::current(), trigger, chrono_tz::UTC, counter(&cancelled_count));
        cancelled.cancel();

        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(kept_count.load(Ordering::SeqCst), 1);
        assert_eq!(cancelled_count.load(Ordering::SeqCst), 0);
        kept.cancel();
    }

    #[tokio::test]
    async fn test_stale_generation_does_not_sweep() {
        let store = store_with(vec![Employee::new("EMP-1", "Meera", None)]);
        let (scheduler, sink) = scheduler(store.clone());

        scheduler.reschedule().unwrap();
        let old_generation = scheduler.shared.lock_state().generation;
        scheduler.reschedule().unwrap();
        let generation = scheduler.shared.lock_state().generation;
        assert_ne!(old_generation, generation);

        let stale = scheduler
            .shared
            .dispatch(JobKind::LunchStart, old_generation, workday_util::now());
        assert!(stale.is_none());
        let employee = store.transaction(|tx| tx.get_employee(&"EMP-1".into())).unwrap().unwrap();
        assert_eq!(employee.current_status, EmployeeStatus::Working);
        assert!(sink.names().is_empty());

        let current = scheduler
            .shared
            .dispatch(JobKind::LunchStart, generation, workday_util::now())
            .unwrap();
        current.await.unwrap().unwrap();
        let employee = store.transaction(|tx| tx.get_employee(&"EMP-1".into())).unwrap().unwrap();
        assert_eq!(employee.current_status, EmployeeStatus::Lunch);
        assert_eq!(sink.names(), vec!["globalStatusUpdate"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_auto_absent_runs_sweep() {
        let store = store_with(vec![Employee::new("EMP-1", "Meera", None)]);
        let sink = Arc::new(RecordingSink::default());

        let trigger = trigger_in(2);
        let mut seed = OfficeConfig::default();
        seed.auto_absent_time = workday_util::WallClock::new(trigger.hour, trigger.minute)
            .unwrap()
            .format_12h();
        let settings = SchedulerSettings {
            timezone: chrono_tz::UTC,
            job_timeout: Duration::from_secs(86_400),
            seed_policy: seed,
        };
        let scheduler = Scheduler::new(store, sink.clone(), settings).unwrap();
        scheduler.reschedule().unwrap();

        for _ in 0..600 {
            if sink.names().contains(&"absenteesMarked") {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        // Lunch triggers may also fall inside the window; only the absentee sweep matters here.
        let events = sink.events.lock().unwrap().clone();
        let marked: Vec<_> = events
            .iter()
            .filter_map(|e| match e.payload {
                EventPayload::AbsenteesMarked { count, .. } => Some(count),
                _ => None,
            })
            .collect();
        assert_eq!(marked, vec![1]);
        scheduler.shutdown();
    }

    #[test]
    fn test_outcome_serializes_with_job_tag() {
        let outcome = JobOutcome::LunchEnd(LunchEndOutcome {
            closed: 3,
            employees: 4,
        });
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["job"], "lunch-end");
        assert_eq!(value["closed"], 3);
        assert_eq!(outcome.to_string(), LunchEndOutcome { closed: 3, employees: 4 }.to_string());
    }

    #[tokio::test]
    async fn test_shutdown_clears_jobs() {
        let (scheduler, _sink) = scheduler(store_with(vec![]));
        scheduler.reschedule().unwrap();
        scheduler.shutdown();
        assert!(scheduler.active_jobs().is_empty());
    }
}
