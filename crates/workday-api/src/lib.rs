//! Shared types for workdayd
//!
//! This crate defines the vocabulary shared by the store, the core engine
//! and anything that consumes workdayd events:
//! - Employee status and directory records
//! - Break/lunch log entries
//! - Attendance records
//! - Events (service -> subscribers)
//! - Versioning

mod events;
mod types;

pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
