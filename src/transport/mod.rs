//! Contract between the library and the queue transport.
//!
//! Concrete cloud transports live outside this crate; the in-process
//! [`MemoryTransport`] covers local development and tests.

pub mod memory;

pub use memory::MemoryTransport;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CourierResult;
use crate::types::Metadata;

/// Round a delay up to whole seconds, the transport delay unit.
pub fn delay_secs(delay: Duration) -> u64 {
    let secs = delay.as_secs();
    if delay.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Queue provider surface the publisher, dispatcher, and retry shell use.
///
/// Delivery is at-least-once; nothing here dedupes or orders.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Enqueue for immediate delivery.
    async fn enqueue(&self, bytes: Vec<u8>, queue: &str, metadata: Metadata) -> CourierResult<()>;

    /// Enqueue with a visibility delay. Precision is whole seconds, ceiling
    /// rounded; providers with a delay cap must report
    /// [`DelayTooLong`](crate::CourierError::DelayTooLong) beyond it.
    async fn enqueue_delayed(
        &self,
        bytes: Vec<u8>,
        delay: Duration,
        queue: &str,
        metadata: Metadata,
    ) -> CourierResult<()>;

    /// Enqueue a batch for immediate delivery.
    async fn enqueue_bulk(&self, batch: Vec<Vec<u8>>, queue: &str) -> CourierResult<()>;

    /// The dead-letter queue wired for `queue`, if any.
    fn dead_letter_queue(&self, _queue: &str) -> Option<String> {
        None
    }
}
