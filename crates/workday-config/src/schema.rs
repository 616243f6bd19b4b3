//! Raw configuration schema (as parsed from TOML or stored JSON)
//!
//! Every field is optional here; missing values are filled from defaults
//! when the raw form is normalized into the policy types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw service configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Office policy used to seed the store when no policy is stored yet
    #[serde(default)]
    pub office: Option<RawOfficeConfig>,

    /// Break concurrency caps and soft limits
    #[serde(default)]
    pub breaks: Option<RawBreakRules>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// IANA timezone all policy times are interpreted in
    pub timezone: Option<String>,

    /// Upper bound on waiting for the store, in milliseconds
    pub store_timeout_ms: Option<u64>,

    /// Upper bound on one scheduled job firing, in seconds
    pub job_timeout_seconds: Option<u64>,

    /// How often the running service checks for a new stored policy version
    pub policy_poll_seconds: Option<u64>,
}

/// Partial office policy override.
///
/// Accepts snake_case keys as well as the legacy upper-case keys
/// (`START_TIME`, `BREAK_WINDOW.START`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawOfficeConfig {
    #[serde(alias = "START_TIME", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(alias = "LATE_GRACE_MINUTES", skip_serializing_if = "Option::is_none")]
    pub late_grace_minutes: Option<u32>,

    #[serde(alias = "LATE_THRESHOLD", skip_serializing_if = "Option::is_none")]
    pub late_threshold: Option<String>,

    #[serde(alias = "HALF_DAY_THRESHOLD", skip_serializing_if = "Option::is_none")]
    pub half_day_threshold: Option<String>,

    #[serde(alias = "AUTO_ABSENT_TIME", skip_serializing_if = "Option::is_none")]
    pub auto_absent_time: Option<String>,

    #[serde(alias = "WORK_END_TIME", skip_serializing_if = "Option::is_none")]
    pub work_end_time: Option<String>,

    #[serde(alias = "BREAK_WINDOW", skip_serializing_if = "Option::is_none")]
    pub break_window: Option<RawBreakWindow>,
}

/// Partial lunch window; each bound merges independently
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawBreakWindow {
    #[serde(alias = "START", skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(alias = "END", skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Break rules per team
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBreakRules {
    /// Hard caps on simultaneous breaks. Omitted means the built-in defaults.
    pub concurrency_caps: Option<Vec<RawConcurrencyCap>>,

    /// Advisory daily break budgets. Omitted means the built-in defaults.
    pub soft_limits: Option<Vec<RawSoftLimit>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConcurrencyCap {
    pub team: String,
    pub max_on_break: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSoftLimit {
    pub team: String,
    pub daily_minutes: u32,
}
