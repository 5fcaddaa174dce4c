use std::sync::Arc;
use std::time::Duration;

use tracing::{error, instrument, warn};

use crate::context::ConsumerContext;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::{CourierError, CourierResult};
use crate::transport::QueueProvider;
use crate::types::Metadata;

/// Backoff ladder for redelivered work items, in seconds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    intervals: Vec<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            intervals: vec![15, 60, 120, 240],
        }
    }
}

impl RetryPolicy {
    pub fn new(intervals: Vec<u64>) -> Self {
        Self { intervals }
    }

    /// Delay before the given attempt (zero-based); `None` once the ladder
    /// is exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        self.intervals
            .get(attempt as usize)
            .map(|secs| Duration::from_secs(*secs))
    }

    pub fn max_attempts(&self) -> u32 {
        self.intervals.len() as u32
    }
}

/// How the retry shell settled a consumed work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The dispatcher handled it; see the inner outcome.
    Dispatched(DispatchOutcome),

    /// Republished with a ladder delay and a bumped retry counter.
    Retried { attempt: u32, delay: Duration },

    /// Routed to the queue's dead-letter queue.
    DeadLettered,

    /// No dead-letter queue is wired for the queue; logged and dropped.
    Dropped,
}

/// Wraps the dispatcher at the host boundary and classifies its terminal
/// errors into retry-with-backoff or dead-letter routing.
///
/// Only transient failures climb the ladder; frame, validation, capability,
/// and `no_retry`-tagged errors go straight to the dead-letter queue. Errors
/// raised by the shell's own republish and DLQ calls propagate to the host.
pub struct RetryShell {
    dispatcher: Dispatcher,
    provider: Arc<dyn QueueProvider>,
    policy: RetryPolicy,
}

impl RetryShell {
    pub fn new(dispatcher: Dispatcher, provider: Arc<dyn QueueProvider>) -> Self {
        Self {
            dispatcher,
            provider,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Consume one work item: dispatch, then settle any failure.
    #[instrument(skip_all, fields(queue = %queue))]
    pub async fn consume(
        &self,
        bytes: &[u8],
        queue: &str,
        metadata: &Metadata,
        ctx: &ConsumerContext,
    ) -> CourierResult<ConsumeOutcome> {
        match self.dispatcher.dispatch(bytes, queue, metadata, ctx).await {
            Ok(outcome) => Ok(ConsumeOutcome::Dispatched(outcome)),
            Err(err) => self.settle_failure(bytes, queue, metadata, err).await,
        }
    }

    async fn settle_failure(
        &self,
        bytes: &[u8],
        queue: &str,
        metadata: &Metadata,
        err: CourierError,
    ) -> CourierResult<ConsumeOutcome> {
        if err.is_no_retry() || metadata.no_retry() {
            return self.dead_letter(bytes, queue, metadata, &err).await;
        }

        let attempt = metadata.retry_count();
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                let next_metadata = metadata.clone().with_retry_count(attempt + 1);
                self.provider
                    .enqueue_delayed(bytes.to_vec(), delay, queue, next_metadata)
                    .await?;
                warn!(
                    attempt = attempt + 1,
                    of = self.policy.max_attempts(),
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "retrying work item"
                );
                Ok(ConsumeOutcome::Retried {
                    attempt: attempt + 1,
                    delay,
                })
            }
            None => self.dead_letter(bytes, queue, metadata, &err).await,
        }
    }

    async fn dead_letter(
        &self,
        bytes: &[u8],
        queue: &str,
        metadata: &Metadata,
        err: &CourierError,
    ) -> CourierResult<ConsumeOutcome> {
        match self.provider.dead_letter_queue(queue) {
            Some(dlq) => {
                error!(%dlq, error = %err, "routing work item to dead-letter queue");
                self.provider
                    .enqueue(bytes.to_vec(), &dlq, metadata.clone())
                    .await?;
                Ok(ConsumeOutcome::DeadLettered)
            }
            None => {
                error!(error = %err, "no dead-letter queue wired for '{queue}'; dropping work item");
                Ok(ConsumeOutcome::Dropped)
            }
        }
    }
}
