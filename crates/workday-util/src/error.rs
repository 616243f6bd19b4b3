//! Error types for time arithmetic

use thiserror::Error;

/// Errors produced while parsing policy times and timezones
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("Invalid 12-hour time string '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

impl TimeError {
    pub fn invalid(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTimeFormat {
            value: value.into(),
            message: message.into(),
        }
    }
}

pub type TimeResult<T> = std::result::Result<T, TimeError>;
