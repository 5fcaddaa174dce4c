use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{CourierError, CourierResult};
use crate::transport::{delay_secs, QueueProvider};
use crate::types::Metadata;

#[derive(Debug, Clone)]
struct QueuedItem {
    bytes: Vec<u8>,
    metadata: Metadata,
    visible_at: DateTime<Utc>,
}

/// In-process queue transport for local execution and tests.
///
/// Items become visible once their delay elapses; consumers drain with
/// [`pop_ready`](MemoryTransport::pop_ready) or await new work with
/// [`recv_ready`](MemoryTransport::recv_ready). Dead-letter queues are wired
/// explicitly per queue.
pub struct MemoryTransport {
    queues: Mutex<HashMap<String, VecDeque<QueuedItem>>>,
    dead_letter: HashMap<String, String>,
    notify: Notify,
    max_delay: Duration,
}

/// Matches the common cloud-queue delay ceiling.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(900);

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            dead_letter: HashMap::new(),
            notify: Notify::new(),
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Wire a dead-letter queue for `queue`.
    pub fn with_dead_letter(mut self, queue: impl Into<String>, dlq: impl Into<String>) -> Self {
        self.dead_letter.insert(queue.into(), dlq.into());
        self
    }

    /// Override the maximum accepted delay (default 900 s).
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Pop the next visible item from `queue`.
    pub fn pop_ready(&self, queue: &str) -> Option<(Vec<u8>, Metadata)> {
        let now = Utc::now();
        let mut queues = self.queues.lock();
        let items = queues.get_mut(queue)?;
        let position = items.iter().position(|item| item.visible_at <= now)?;
        let item = items.remove(position)?;
        Some((item.bytes, item.metadata))
    }

    /// Await the next visible item from `queue`.
    pub async fn recv_ready(&self, queue: &str) -> (Vec<u8>, Metadata) {
        loop {
            if let Some(item) = self.pop_ready(queue) {
                return item;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        }
    }

    /// Items sitting in `queue`, visible or not.
    pub fn len(&self, queue: &str) -> usize {
        self.queues.lock().get(queue).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Test helper: strip visibility delays so delayed items pop immediately.
    pub fn make_visible_now(&self, queue: &str) {
        let now = Utc::now();
        if let Some(items) = self.queues.lock().get_mut(queue) {
            for item in items.iter_mut() {
                item.visible_at = now;
            }
        }
    }

    fn push(&self, queue: &str, item: QueuedItem) {
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .push_back(item);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl QueueProvider for MemoryTransport {
    async fn enqueue(&self, bytes: Vec<u8>, queue: &str, metadata: Metadata) -> CourierResult<()> {
        self.push(
            queue,
            QueuedItem {
                bytes,
                metadata,
                visible_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        bytes: Vec<u8>,
        delay: Duration,
        queue: &str,
        metadata: Metadata,
    ) -> CourierResult<()> {
        let secs = delay_secs(delay);
        if secs > self.max_delay.as_secs() {
            return Err(CourierError::DelayTooLong {
                requested: secs,
                max: self.max_delay.as_secs(),
            });
        }

        debug!(queue, delay_secs = secs, "enqueueing delayed item");
        self.push(
            queue,
            QueuedItem {
                bytes,
                metadata,
                visible_at: Utc::now() + chrono::Duration::seconds(secs as i64),
            },
        );
        Ok(())
    }

    async fn enqueue_bulk(&self, batch: Vec<Vec<u8>>, queue: &str) -> CourierResult<()> {
        let now = Utc::now();
        {
            let mut queues = self.queues.lock();
            let items = queues.entry(queue.to_string()).or_default();
            for bytes in batch {
                items.push_back(QueuedItem {
                    bytes,
                    metadata: Metadata::new(),
                    visible_at: now,
                });
            }
        }
        self.notify.notify_waiters();
        Ok(())
    }

    fn dead_letter_queue(&self, queue: &str) -> Option<String> {
        self.dead_letter.get(queue).cloned()
    }
}
