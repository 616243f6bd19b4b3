//! Admin subcommands
//!
//! Each command opens the store, performs one operation and prints the
//! result as JSON on stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;
use workday_api::{AttendanceStatus, Employee, Role};
use workday_config::{load_config, load_office_override, RawOfficeConfig};
use workday_core::{
    ActivePolicy, AttendanceOverride, AttendanceService, BreakEngine, Directory, JobKind,
};
use workday_util::{now_in_policy_timezone, EmployeeId};

use crate::App;

#[derive(Subcommand, Debug)]
pub enum EmployeeCommand {
    /// Provision a new employee in WORKING status
    Add {
        id: String,
        name: String,
        /// Team used for break caps and soft limits
        #[arg(short, long)]
        team: Option<String>,
        /// Create an ADMIN row (never touched by scheduled sweeps)
        #[arg(long)]
        admin: bool,
    },
    /// Deactivate an employee, closing any running break
    Deactivate { id: String },
    /// List every employee
    List,
}

#[derive(Subcommand, Debug)]
pub enum BreakCommand {
    Start { employee_id: String },
    End { employee_id: String },
    /// Current status and today's break usage
    Status { employee_id: String },
}

#[derive(Subcommand, Debug)]
pub enum AttendanceCommand {
    /// Replace a day's attendance status
    Override {
        employee_id: String,
        /// present, late, half_day, absent or leave
        status: AttendanceStatus,
        /// Reason for the change (required)
        remarks: String,
        /// Day to change (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record approved leave for a day
    Leave {
        employee_id: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show attendance for a day
    Show {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only this employee
        #[arg(long)]
        employee: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Print the stored office policy and its triggers
    Show,
    /// Replace the office policy from a .toml or .json file
    Set { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum JobCommand {
    /// Run lunch-start, lunch-end or auto-absent now
    Run { job: JobKind },
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Most recent audit events, newest first
    Tail {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

pub fn validate(path: &Path) -> Result<()> {
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    let office = &config.office;

    println!("✓ Configuration is valid");
    println!();
    println!("Office hours ({}):", config.service.timezone);
    println!("  Start: {} (+{} min grace)", office.start, office.late_grace_minutes);
    println!("  Late after: {}", office.late_threshold);
    println!("  Half day after: {}", office.half_day_threshold);
    println!("  Work end: {}", office.work_end);
    println!();
    println!("Schedule:");
    for kind in JobKind::ALL {
        println!("  {:<12} {}", kind.name(), kind.trigger(office).cron_expression());
    }
    Ok(())
}

pub fn employee(app: &App, cmd: EmployeeCommand) -> Result<()> {
    let directory = Directory::new(app.store.clone());

    match cmd {
        EmployeeCommand::Add {
            id,
            name,
            team,
            admin,
        } => {
            let mut employee = Employee::new(id, name, team);
            if admin {
                employee.role = Role::Admin;
            }
            print_json(&directory.provision(employee, &app.actor)?)
        }
        EmployeeCommand::Deactivate { id } => {
            let id = EmployeeId::new(id);
            directory.deactivate(&id, &app.actor, workday_util::now())?;
            print_json(&directory.get(&id)?)
        }
        EmployeeCommand::List => print_json(&directory.list()?),
    }
}

fn attendance_service(app: &App) -> AttendanceService {
    AttendanceService::new(
        app.store.clone(),
        app.events.clone(),
        app.config.service.timezone,
        app.config.office.config.clone(),
    )
}

pub fn check_in(app: &App, employee_id: String) -> Result<()> {
    let check_in = attendance_service(app).check_in(&EmployeeId::new(employee_id), workday_util::now())?;
    print_json(&check_in)
}

pub fn breaks(app: &App, cmd: BreakCommand) -> Result<()> {
    let engine = BreakEngine::new(
        app.store.clone(),
        app.events.clone(),
        app.config.breaks.clone(),
        app.config.service.timezone,
    );
    let now = workday_util::now();

    match cmd {
        BreakCommand::Start { employee_id } => {
            let started = engine.start_break(&EmployeeId::new(employee_id), now)?;
            if let Some(warning) = &started.warning {
                eprintln!("warning: {}", warning);
            }
            print_json(&started)
        }
        BreakCommand::End { employee_id } => {
            print_json(&engine.end_break(&EmployeeId::new(employee_id), now)?)
        }
        BreakCommand::Status { employee_id } => {
            print_json(&engine.status(&EmployeeId::new(employee_id), now)?)
        }
    }
}

pub fn attendance(app: &App, cmd: AttendanceCommand) -> Result<()> {
    let service = attendance_service(app);
    let now = workday_util::now();
    let today = now_in_policy_timezone(app.config.service.timezone).date;

    match cmd {
        AttendanceCommand::Override {
            employee_id,
            status,
            remarks,
            date,
        } => {
            let record = service.override_status(
                AttendanceOverride {
                    employee_id: EmployeeId::new(employee_id),
                    date: date.unwrap_or(today),
                    status,
                    remarks,
                    actor: app.actor.clone(),
                },
                now,
            )?;
            print_json(&record)
        }
        AttendanceCommand::Leave { employee_id, date } => {
            let record = service.record_approved_leave(
                &EmployeeId::new(employee_id),
                date.unwrap_or(today),
                &app.actor,
                now,
            )?;
            print_json(&record)
        }
        AttendanceCommand::Show { date, employee } => {
            let date = date.unwrap_or(today);
            match employee {
                Some(id) => print_json(&service.attendance_on(&EmployeeId::new(id), date)?),
                None => print_json(&service.attendance_for_day(date)?),
            }
        }
    }
}

pub fn policy(app: &App, cmd: PolicyCommand) -> Result<()> {
    match cmd {
        PolicyCommand::Show => {
            let active = ActivePolicy::load(&*app.store, &app.config.office.config)?;
            print_policy(app, &active)
        }
        PolicyCommand::Set { file } => {
            let policy = load_office_override(&file)
                .with_context(|| format!("Failed to load policy from {:?}", file))?;

            let scheduler = app.scheduler()?;
            let active = scheduler.update_policy(&RawOfficeConfig::from(policy.config), &app.actor)?;
            // Only this process's copy; the running service picks the change up on its next poll.
            scheduler.shutdown();

            info!(version = active.version, "Policy stored");
            print_policy(app, &active)
        }
    }
}

fn print_policy(app: &App, active: &ActivePolicy) -> Result<()> {
    let tz = app.config.service.timezone;
    let now = workday_util::now();
    let triggers: Vec<_> = JobKind::ALL
        .into_iter()
        .map(|kind| {
            let trigger = kind.trigger(&active.policy);
            json!({
                "job": kind.name(),
                "cron": trigger.cron_expression(),
                "next_fire": trigger.next_fire_after(now, tz),
            })
        })
        .collect();

    print_json(&json!({
        "version": active.version,
        "timezone": tz.name(),
        "policy": active.policy.config,
        "triggers": triggers,
    }))
}

pub async fn job(app: &App, cmd: JobCommand) -> Result<()> {
    let JobCommand::Run { job } = cmd;
    let scheduler = app.scheduler()?;
    let outcome = scheduler.run_now(job).await?;
    info!(job = %job, outcome = %outcome, "Job run manually");
    print_json(&outcome)
}

pub fn audit(app: &App, cmd: AuditCommand) -> Result<()> {
    let AuditCommand::Tail { limit } = cmd;
    if limit == 0 {
        bail!("limit must be at least 1");
    }
    print_json(&app.store.get_recent_audits(limit)?)
}
