use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::InstanceKey;

/// Latest-wins suppression of publish bursts sharing a type key.
///
/// The publisher stamps a fresh `instance_key` on every publish and records
/// it in the debounce store; on the consumer only the instance whose key
/// still matches the store survives the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debounce {
    pub type_key: String,

    pub interval_secs: u64,

    /// Single-use key assigned at publish time; never set by hand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_key: Option<InstanceKey>,
}

impl Debounce {
    pub fn new(type_key: impl Into<String>, interval: Duration) -> Self {
        Self {
            type_key: type_key.into(),
            interval_secs: interval.as_secs(),
            instance_key: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Rolling-window cap: at most `per_period` invocations per `period_secs`
/// across every callable sharing the type key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub type_key: String,
    pub per_period: u32,
    pub period_secs: u64,
}

impl RateLimit {
    pub fn new(type_key: impl Into<String>, per_period: u32, period: Duration) -> Self {
        Self {
            type_key: type_key.into(),
            per_period,
            period_secs: period.as_secs(),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Cap on bodies in flight at once across every callable sharing the type key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyCap {
    pub type_key: String,
    pub limit: u32,
}

impl ConcurrencyCap {
    pub fn new(type_key: impl Into<String>, limit: u32) -> Self {
        Self {
            type_key: type_key.into(),
            limit,
        }
    }
}

/// Bounded self-republication: after a successful invocation the dispatcher
/// bumps `current_call` and republishes the mutated callable with
/// `interval_secs` of delay, until `max_calls` is reached or the body sets
/// `should_continue` to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repeat {
    pub max_calls: u32,

    pub interval_secs: u64,

    /// Dispatcher-owned counter; `None` until the first invocation completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_call: Option<u32>,

    /// Cleared by the body (via [`Repeat::stop`]) to end the sequence early.
    #[serde(default = "default_should_continue", skip_serializing_if = "is_true")]
    pub should_continue: bool,
}

impl Repeat {
    pub fn new(max_calls: u32, interval: Duration) -> Self {
        Self {
            max_calls,
            interval_secs: interval.as_secs(),
            current_call: None,
            should_continue: true,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Invocations completed so far.
    pub fn calls_made(&self) -> u32 {
        self.current_call.unwrap_or(0)
    }

    /// End the sequence after the current invocation.
    pub fn stop(&mut self) {
        self.should_continue = false;
    }
}

fn default_should_continue() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_true(value: &bool) -> bool {
    *value
}
