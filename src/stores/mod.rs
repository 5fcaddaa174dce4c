//! Contracts for the external coordination layer.
//!
//! Records live under the composite key produced by
//! [`coordination_key`](crate::types::coordination_key) and carry TTLs so a
//! crashed consumer can never wedge a key forever. Implementations must be
//! atomic at record granularity and break contention ties deterministically.

pub mod memory;
pub mod passthrough;

pub use memory::MemoryCoordinationStore;
pub use passthrough::PassthroughStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CourierResult;
use crate::types::InstanceKey;

/// Caps concurrently running bodies per coordination key.
#[async_trait]
pub trait ConcurrencyStore: Send + Sync {
    /// Atomically admit one more holder when fewer than `limit` unexpired
    /// locks exist for `key`, returning the granted instance key. `None`
    /// means the cap is reached. A race that over-admits must resolve by
    /// `(set_at, instance_key)` ordering: losers self-delete and report
    /// `None`.
    async fn try_set_lock(&self, key: &str, limit: u32) -> CourierResult<Option<InstanceKey>>;

    /// Best-effort release; TTL expiry is the fallback cleanup.
    async fn release_lock(&self, key: &str, instance_key: &InstanceKey) -> CourierResult<()>;
}

/// Holds the single latest-wins reference per coordination key.
#[async_trait]
pub trait DebounceStore: Send + Sync {
    /// Upsert the reference for `key`; the record must not expire sooner
    /// than twice the debounce interval.
    async fn set_reference(
        &self,
        key: &str,
        instance_key: &InstanceKey,
        interval: Duration,
    ) -> CourierResult<()>;

    /// Delete the reference iff it still carries `instance_key`. A missing
    /// record re-installs one under the caller's key and counts as owned, so
    /// a backlog of queued duplicates behind the caller stays gated. `false`
    /// means a newer instance superseded the caller: discard the message.
    async fn try_remove_own_reference(
        &self,
        key: &str,
        instance_key: &InstanceKey,
        interval: Duration,
    ) -> CourierResult<bool>;
}

/// Tracks rolling-window usage per coordination key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// `None` admits the caller and consumes a slot expiring after one
    /// `period`. `Some(delay)` is the wait until the oldest slot frees:
    /// `period - (now - oldest.set_at)`, never below one second.
    async fn next_available_run_time(
        &self,
        key: &str,
        per_period: u32,
        period: Duration,
    ) -> CourierResult<Option<Duration>>;
}
