//! Policy validation CLI tool
//!
//! Validates a workdayd service configuration (`.toml`) or a standalone
//! office policy override (`.json`) and prints the effective schedule.

use std::path::PathBuf;
use std::process::ExitCode;
use workday_config::{ConfigError, OfficePolicy};
use workday_util::default_config_path;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-policy [config-file]");
            eprintln!();
            eprintln!("Validates a workdayd configuration or office policy file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-policy {}", default_path.display());
            eprintln!("  validate-policy office.json");
            return ExitCode::from(2);
        }
    };

    if !path.exists() {
        eprintln!("Error: file not found: {}", path.display());
        return ExitCode::from(1);
    }

    let is_override = path.extension().and_then(|e| e.to_str()) == Some("json");

    let result = if is_override {
        workday_config::load_office_override(&path).map(|office| (office, None))
    } else {
        workday_config::load_config(&path).map(|config| (config.office.clone(), Some(config)))
    };

    match result {
        Ok((office, config)) => {
            println!("✓ Policy is valid");
            println!();
            print_office(&office);

            if let Some(config) = config {
                println!();
                println!("Service:");
                println!("  Timezone: {}", config.service.timezone);
                println!("  Data dir: {}", config.service.data_dir.display());
                println!("  Job timeout: {}s", config.service.job_timeout.as_secs());
                println!();
                println!("Break rules:");
                for cap in &config.breaks.concurrency_caps {
                    println!("  - {}: at most {} on break", cap.team, cap.max_on_break);
                }
                for limit in &config.breaks.soft_limits {
                    println!("  - {}: {} min/day advisory", limit.team, limit.daily_minutes);
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Policy validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::JsonError(parse_err) => {
                    eprintln!("JSON parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        workday_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

fn print_office(office: &OfficePolicy) {
    println!("Office policy:");
    println!("  Start:        {}", office.start);
    println!("  Late after:   {}", office.late_threshold);
    println!("  Half day:     {}", office.half_day_threshold);
    println!("  Auto-absent:  {} ({})", office.auto_absent, office.auto_absent_trigger().cron_expression());
    println!("  Work end:     {}", office.work_end);
    println!(
        "  Lunch:        {} - {} ({} / {})",
        office.lunch_start,
        office.lunch_end,
        office.lunch_start_trigger().cron_expression(),
        office.lunch_end_trigger().cron_expression()
    );
}
