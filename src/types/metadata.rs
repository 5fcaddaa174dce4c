use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Reserved key: how many times the retry shell has republished the item.
pub const RETRY_COUNT_KEY: &str = "callable-retry-count";

/// Reserved key: flag suppressing the retry ladder for this item.
pub const NO_RETRY_KEY: &str = "callable-no-retry";

/// String-to-string metadata carried alongside a work item by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(HashMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Retry attempts so far; absent or unparsable reads as zero.
    pub fn retry_count(&self) -> u32 {
        self.get(RETRY_COUNT_KEY)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.insert(RETRY_COUNT_KEY, count.to_string());
        self
    }

    pub fn no_retry(&self) -> bool {
        self.get(NO_RETRY_KEY).is_some_and(|raw| raw == "true")
    }

    pub fn set_no_retry(&mut self) {
        self.insert(NO_RETRY_KEY, "true");
    }
}

impl From<HashMap<String, String>> for Metadata {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}
