//! Attendance and break state engine for workdayd
//!
//! This crate is the heart of workdayd, containing:
//! - Attendance classification (present / late / half day) and check-in
//! - Break state machine (WORKING -> ON_BREAK -> WORKING) with team caps
//! - Bulk sweeps (lunch start, lunch end, auto-absent)
//! - The daily trigger scheduler and its reschedule-on-policy-change logic

mod attendance;
mod breaks;
mod classifier;
mod directory;
mod error;
mod events;
mod policy;
mod scheduler;
mod sweeps;

#[cfg(test)]
mod testing;

pub use attendance::*;
pub use breaks::*;
pub use classifier::*;
pub use directory::*;
pub use error::*;
pub use events::*;
pub use policy::*;
pub use scheduler::*;
pub use sweeps::*;
