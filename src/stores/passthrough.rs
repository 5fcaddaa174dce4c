use std::time::Duration;

use async_trait::async_trait;

use crate::error::CourierResult;
use crate::stores::{ConcurrencyStore, DebounceStore, RateLimitStore};
use crate::types::InstanceKey;

/// Coordination store that coordinates nothing.
///
/// Every lock is granted, every debounce reference is owned, every rate
/// limit window is open. The default store for local and offline execution,
/// where gating work items against a shared namespace has no meaning.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughStore;

impl PassthroughStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConcurrencyStore for PassthroughStore {
    async fn try_set_lock(&self, _key: &str, _limit: u32) -> CourierResult<Option<InstanceKey>> {
        Ok(Some(InstanceKey::new()))
    }

    async fn release_lock(&self, _key: &str, _instance_key: &InstanceKey) -> CourierResult<()> {
        Ok(())
    }
}

#[async_trait]
impl DebounceStore for PassthroughStore {
    async fn set_reference(
        &self,
        _key: &str,
        _instance_key: &InstanceKey,
        _interval: Duration,
    ) -> CourierResult<()> {
        Ok(())
    }

    async fn try_remove_own_reference(
        &self,
        _key: &str,
        _instance_key: &InstanceKey,
        _interval: Duration,
    ) -> CourierResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl RateLimitStore for PassthroughStore {
    async fn next_available_run_time(
        &self,
        _key: &str,
        _per_period: u32,
        _period: Duration,
    ) -> CourierResult<Option<Duration>> {
        Ok(None)
    }
}
