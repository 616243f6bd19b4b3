//! Strongly-typed identifiers for workdayd

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable employee identifier (the directory's employee code, e.g. "EMP-042")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EmployeeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EmployeeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a break or lunch log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BreakLogId(Uuid);

impl BreakLogId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for BreakLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BreakLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_id_equality() {
        let id1 = EmployeeId::new("EMP-1");
        let id2 = EmployeeId::new("EMP-1");
        let id3 = EmployeeId::new("EMP-2");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn break_log_id_uniqueness() {
        let a = BreakLogId::new();
        let b = BreakLogId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn break_log_id_parses_its_display_form() {
        let id = BreakLogId::new();
        assert_eq!(BreakLogId::parse(&id.to_string()), Some(id));
        assert_eq!(BreakLogId::parse("not-a-uuid"), None);
    }

    #[test]
    fn ids_serialize_deserialize() {
        let employee_id = EmployeeId::new("EMP-7");
        let json = serde_json::to_string(&employee_id).unwrap();
        assert_eq!(json, "\"EMP-7\"");
        let parsed: EmployeeId = serde_json::from_str(&json).unwrap();
        assert_eq!(employee_id, parsed);
    }
}
