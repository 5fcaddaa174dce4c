use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::CourierResult;
use crate::stores::{ConcurrencyStore, DebounceStore, RateLimitStore};
use crate::types::InstanceKey;

#[derive(Debug, Clone)]
struct StoreRecord {
    instance_key: InstanceKey,
    set_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl StoreRecord {
    fn new(instance_key: InstanceKey, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(3650));
        Self {
            instance_key,
            set_at: now,
            expires_at: now + ttl,
        }
    }

    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Linearizable in-memory coordination store.
///
/// Implements the full record semantics - TTL expiration, latest-wins
/// debounce references, `(set_at, instance_key)` tie-breaks - behind
/// process-local mutexes. Suitable for single-process deployments and for
/// exercising the dispatcher's temporal behavior in tests; distributed
/// deployments plug in a KV-backed implementation of the same traits.
#[derive(Default)]
pub struct MemoryCoordinationStore {
    locks: Mutex<HashMap<String, Vec<StoreRecord>>>,
    references: Mutex<HashMap<String, StoreRecord>>,
    slots: Mutex<HashMap<String, Vec<StoreRecord>>>,
    lock_ttl: Option<Duration>,
}

/// Fail-safe expiry for leaked concurrency locks.
const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

impl MemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the concurrency-lock TTL (default five minutes). Set it
    /// above the worst-case invocation wall clock.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = Some(ttl);
        self
    }

    fn lock_ttl(&self) -> Duration {
        self.lock_ttl.unwrap_or(DEFAULT_LOCK_TTL)
    }

    /// Unexpired locks currently held for `key`.
    pub fn lock_count(&self, key: &str) -> usize {
        let now = Utc::now();
        self.locks
            .lock()
            .get(key)
            .map(|records| records.iter().filter(|r| !r.expired(now)).count())
            .unwrap_or(0)
    }

    /// Whether a live debounce reference exists for `key`.
    pub fn has_reference(&self, key: &str) -> bool {
        let now = Utc::now();
        self.references
            .lock()
            .get(key)
            .is_some_and(|r| !r.expired(now))
    }

    /// Unexpired rate-limit slots consumed for `key`.
    pub fn slot_count(&self, key: &str) -> usize {
        let now = Utc::now();
        self.slots
            .lock()
            .get(key)
            .map(|records| records.iter().filter(|r| !r.expired(now)).count())
            .unwrap_or(0)
    }

    /// Test helper: age every record for `key` past its expiry.
    pub fn force_expire(&self, key: &str) {
        let past = Utc::now() - chrono::Duration::seconds(1);
        if let Some(records) = self.locks.lock().get_mut(key) {
            for record in records.iter_mut() {
                record.expires_at = past;
            }
        }
        if let Some(record) = self.references.lock().get_mut(key) {
            record.expires_at = past;
        }
        if let Some(records) = self.slots.lock().get_mut(key) {
            for record in records.iter_mut() {
                record.expires_at = past;
            }
        }
    }
}

fn prune(records: &mut Vec<StoreRecord>, now: DateTime<Utc>) {
    records.retain(|r| !r.expired(now));
}

#[async_trait]
impl ConcurrencyStore for MemoryCoordinationStore {
    async fn try_set_lock(&self, key: &str, limit: u32) -> CourierResult<Option<InstanceKey>> {
        let now = Utc::now();
        let mut locks = self.locks.lock();
        let records = locks.entry(key.to_string()).or_default();
        prune(records, now);

        let instance_key = InstanceKey::new();
        records.push(StoreRecord::new(instance_key.clone(), self.lock_ttl()));

        // Deterministic admission: oldest first, instance key breaks ties.
        records.sort_by(|a, b| {
            a.set_at
                .cmp(&b.set_at)
                .then_with(|| a.instance_key.cmp(&b.instance_key))
        });

        let position = records
            .iter()
            .position(|r| r.instance_key == instance_key)
            .unwrap_or(records.len());

        if position >= limit as usize {
            records.retain(|r| r.instance_key != instance_key);
            debug!(%key, limit, "concurrency cap reached");
            return Ok(None);
        }

        Ok(Some(instance_key))
    }

    async fn release_lock(&self, key: &str, instance_key: &InstanceKey) -> CourierResult<()> {
        let mut locks = self.locks.lock();
        if let Some(records) = locks.get_mut(key) {
            records.retain(|r| &r.instance_key != instance_key);
            if records.is_empty() {
                locks.remove(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DebounceStore for MemoryCoordinationStore {
    async fn set_reference(
        &self,
        key: &str,
        instance_key: &InstanceKey,
        interval: Duration,
    ) -> CourierResult<()> {
        let mut references = self.references.lock();
        references.insert(
            key.to_string(),
            StoreRecord::new(instance_key.clone(), interval * 2),
        );
        Ok(())
    }

    async fn try_remove_own_reference(
        &self,
        key: &str,
        instance_key: &InstanceKey,
        interval: Duration,
    ) -> CourierResult<bool> {
        let now = Utc::now();
        let mut references = self.references.lock();

        match references.get(key) {
            Some(record) if !record.expired(now) => {
                if &record.instance_key == instance_key {
                    references.remove(key);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            // Expired or never set: re-install under the caller's key so the
            // queued backlog behind this message stays gated.
            _ => {
                references.insert(
                    key.to_string(),
                    StoreRecord::new(instance_key.clone(), interval * 2),
                );
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl RateLimitStore for MemoryCoordinationStore {
    async fn next_available_run_time(
        &self,
        key: &str,
        per_period: u32,
        period: Duration,
    ) -> CourierResult<Option<Duration>> {
        let now = Utc::now();
        let mut slots = self.slots.lock();
        let records = slots.entry(key.to_string()).or_default();
        prune(records, now);

        if records.len() < per_period as usize {
            records.push(StoreRecord::new(InstanceKey::new(), period));
            return Ok(None);
        }

        let oldest = records
            .iter()
            .min_by(|a, b| {
                a.set_at
                    .cmp(&b.set_at)
                    .then_with(|| a.instance_key.cmp(&b.instance_key))
            })
            .cloned();

        let delay = match oldest {
            Some(record) => {
                let elapsed = (now - record.set_at).to_std().unwrap_or(Duration::ZERO);
                period.saturating_sub(elapsed).max(Duration::from_secs(1))
            }
            None => Duration::from_secs(1),
        };

        debug!(%key, per_period, delay_secs = delay.as_secs(), "rate limit window full");
        Ok(Some(delay))
    }
}
