use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Single-use identifier for one coordination record.
///
/// Assigned by the publisher for debounce references and by the concurrency
/// store when a lock is granted. Never reused across records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceKey(String);

impl InstanceKey {
    /// Generate a fresh unique instance key.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstanceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for InstanceKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Composite key under which every coordination record is namespaced.
///
/// Combining the wire type tag with the user-chosen type key keeps two
/// distinct callable types from sharing records when their users picked the
/// same grouping string.
pub fn coordination_key(type_tag: &str, type_key: &str) -> String {
    format!("{type_tag}+{type_key}")
}
