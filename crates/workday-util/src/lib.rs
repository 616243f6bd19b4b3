//! Shared utilities for workdayd
//!
//! This crate provides:
//! - ID types (EmployeeId, BreakLogId)
//! - Time arithmetic in the policy timezone (12-hour parsing, daily triggers)
//! - Error types for time parsing
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
