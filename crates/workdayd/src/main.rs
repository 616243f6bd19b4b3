//! workdayd - The workday attendance service
//!
//! This is the main entry point for the workdayd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Scheduler (lunch start, lunch end, auto-absent)
//! - Event broadcast and logging
//!
//! Admin subcommands operate on the same store without the scheduler loop.

mod admin;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use workday_api::{Event, EventPayload};
use workday_config::{load_config, WorkdayConfig};
use workday_core::{BroadcastSink, EventSink, Scheduler, SchedulerSettings};
use workday_store::{AuditEvent, AuditEventType, SqliteStore, Store, StoreOptions};
use workday_util::{default_config_path, is_mock_time_active, DATABASE_FILENAME};

use crate::admin::{
    AttendanceCommand, AuditCommand, BreakCommand, EmployeeCommand, JobCommand, PolicyCommand,
};

/// workdayd - Attendance and break tracking service
#[derive(Parser, Debug)]
#[command(name = "workdayd")]
#[command(about = "Attendance and break tracking service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/workdayd/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set WORKDAY_DATA_DIR env var)
    #[arg(short, long, env = "WORKDAY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Name recorded in the audit log for admin changes
    #[arg(long, env = "WORKDAY_ACTOR", default_value = "admin")]
    actor: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler service (default)
    Run,
    /// Validate the configuration file and print the effective schedule
    Validate,
    /// Manage the employee directory
    #[command(subcommand)]
    Employee(EmployeeCommand),
    /// Record an employee's arrival for today
    CheckIn { employee_id: String },
    /// Start, end or inspect breaks
    #[command(subcommand)]
    Break(BreakCommand),
    /// Inspect and correct attendance records
    #[command(subcommand)]
    Attendance(AttendanceCommand),
    /// Show or replace the office policy
    #[command(subcommand)]
    Policy(PolicyCommand),
    /// Run a scheduled job immediately
    #[command(subcommand)]
    Job(JobCommand),
    /// Read the audit log
    #[command(subcommand)]
    Audit(AuditCommand),
}

/// Loaded configuration plus the opened store, shared by every subcommand
pub struct App {
    pub config: WorkdayConfig,
    pub store: Arc<dyn Store>,
    pub events: Arc<BroadcastSink>,
    pub actor: String,
}

impl App {
    fn open(args: &Args) -> Result<Self> {
        let mut config = if args.config.exists() {
            load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?
        } else {
            warn!(config_path = %args.config.display(), "Config file not found, using defaults");
            WorkdayConfig::default()
        };

        if let Some(data_dir) = &args.data_dir {
            config.service.data_dir = data_dir.clone();
        }

        info!(
            config_path = %args.config.display(),
            timezone = %config.service.timezone,
            "Configuration loaded"
        );

        let data_dir = &config.service.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(DATABASE_FILENAME);
        let options = StoreOptions {
            timeout: config.service.store_timeout,
        };
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open_with(&db_path, options)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        debug!(db_path = %db_path.display(), "Store initialized");

        Ok(Self {
            config,
            store,
            events: Arc::new(BroadcastSink::default()),
            actor: args.actor.clone(),
        })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            timezone: self.config.service.timezone,
            job_timeout: self.config.service.job_timeout,
            seed_policy: self.config.office.config.clone(),
        }
    }

    pub fn scheduler(&self) -> Result<Scheduler> {
        let events: Arc<dyn EventSink> = self.events.clone();
        Ok(Scheduler::new(self.store.clone(), events, self.scheduler_settings())?)
    }
}

/// The long-running scheduler service
struct Service {
    app: App,
    scheduler: Scheduler,
}

impl Service {
    fn new(app: App) -> Result<Self> {
        let scheduler = app.scheduler()?;
        let jobs = scheduler
            .reschedule()
            .context("Failed to install the daily schedule")?;

        for job in &jobs {
            info!(
                job = job.name,
                cron = %job.cron_expression,
                timezone = %job.timezone,
                next_fire = ?job.next_fire,
                "Job scheduled"
            );
        }

        app.store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        Ok(Self { app, scheduler })
    }

    async fn run(self) -> Result<()> {
        let mut events = self.app.events.subscribe();

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut policy_poll = tokio::time::interval(self.app.config.service.policy_poll_interval);
        // The first tick completes immediately; the schedule is already fresh.
        policy_poll.tick().await;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // SIGHUP - reload the stored policy
                _ = sighup.recv() => {
                    info!("Received SIGHUP, rescheduling");
                    self.reschedule();
                }

                _ = policy_poll.tick() => {
                    self.poll_policy();
                }

                received = events.recv() => match received {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event logger lagged behind");
                    }
                    Err(RecvError::Closed) => {
                        error!("Event channel closed");
                        break;
                    }
                },
            }
        }

        self.shutdown()
    }

    // Store calls below may wait up to `store_timeout` for the SQLite lock.
    fn reschedule(&self) {
        if let Err(e) = tokio::task::block_in_place(|| self.scheduler.reschedule()) {
            error!(error = %e, "Reschedule failed, previous schedule kept");
        }
    }

    /// Reschedule when another process stored a new policy version
    fn poll_policy(&self) {
        match tokio::task::block_in_place(|| self.app.store.policy_version()) {
            Ok(stored) if stored != self.scheduler.scheduled_policy_version() => {
                info!(
                    stored = ?stored,
                    scheduled = ?self.scheduler.scheduled_policy_version(),
                    "Stored policy changed"
                );
                self.reschedule();
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read policy version"),
        }
    }

    fn shutdown(self) -> Result<()> {
        self.scheduler.shutdown();
        self.app.events.publish(Event::new(EventPayload::Shutdown));

        if let Err(e) = self
            .app
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to record service stop");
        }

        info!("Service stopped");
        Ok(())
    }
}

fn log_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(json) => info!(event = event.name(), payload = %json, "Event"),
        Err(e) => warn!(event = event.name(), error = %e, "Failed to serialize event"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "workdayd starting");

    if is_mock_time_active() {
        warn!(now = %workday_util::now(), "Mock time active, all policy times follow the shifted clock");
    }

    if let Some(Command::Validate) = &args.command {
        return admin::validate(&args.config);
    }

    let app = App::open(&args)?;

    match args.command {
        None | Some(Command::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "workdayd service starting");
            Service::new(app)?.run().await
        }
        Some(Command::Validate) => Ok(()),
        Some(Command::Employee(cmd)) => admin::employee(&app, cmd),
        Some(Command::CheckIn { employee_id }) => admin::check_in(&app, employee_id),
        Some(Command::Break(cmd)) => admin::breaks(&app, cmd),
        Some(Command::Attendance(cmd)) => admin::attendance(&app, cmd),
        Some(Command::Policy(cmd)) => admin::policy(&app, cmd),
        Some(Command::Job(cmd)) => admin::job(&app, cmd).await,
        Some(Command::Audit(cmd)) => admin::audit(&app, cmd),
    }
}
