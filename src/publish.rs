use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::callable::{encode, Callable};
use crate::error::{CourierError, CourierResult};
use crate::stores::DebounceStore;
use crate::transport::QueueProvider;
use crate::types::{coordination_key, InstanceKey, Metadata};
use crate::validate;

/// Queue name used when the caller does not pick one.
pub const DEFAULT_QUEUE: &str = "courier";

/// Per-publish options.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Visibility delay; ignored for debounced callables, whose delay is
    /// always their debounce interval.
    pub delay: Option<Duration>,

    /// Target queue; the publisher default applies when absent.
    pub queue: Option<String>,

    pub metadata: Metadata,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Serializes callables and hands them to the queue provider.
///
/// Debounced callables additionally get a fresh single-use instance key and
/// a debounce-store reference before they are enqueued with their interval
/// as the delivery delay.
pub struct Publisher {
    provider: Arc<dyn QueueProvider>,
    debounce_store: Option<Arc<dyn DebounceStore>>,
    default_queue: String,
}

impl Publisher {
    pub fn new(provider: Arc<dyn QueueProvider>) -> Self {
        Self {
            provider,
            debounce_store: None,
            default_queue: DEFAULT_QUEUE.to_string(),
        }
    }

    /// Required before publishing any debounced callable.
    pub fn with_debounce_store(mut self, store: Arc<dyn DebounceStore>) -> Self {
        self.debounce_store = Some(store);
        self
    }

    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = queue.into();
        self
    }

    /// Serialize and enqueue one callable.
    #[instrument(skip(self, callable), fields(type_tag = C::TYPE_TAG))]
    pub async fn publish<C: Callable>(
        &self,
        callable: &mut C,
        opts: PublishOptions,
    ) -> CourierResult<()> {
        self.validate_capabilities(callable)?;

        let queue = opts.queue.as_deref().unwrap_or(&self.default_queue);

        // Instance keys are single-use: stamp a fresh one on every publish,
        // overwriting whatever the caller left behind.
        let mut debounce_plan: Option<(String, InstanceKey, Duration)> = None;
        if let Some(spec) = callable.debounce_mut() {
            let fresh = InstanceKey::new();
            spec.instance_key = Some(fresh.clone());
            debounce_plan = Some((spec.type_key.clone(), fresh, spec.interval()));
        }

        let bytes = encode(&*callable)?;

        match debounce_plan {
            Some((type_key, instance_key, interval)) => {
                let store = self.debounce_store.as_ref().ok_or_else(|| {
                    CourierError::MissingCapability(
                        "debounced callable published without a debounce store".to_string(),
                    )
                })?;

                let key = coordination_key(C::TYPE_TAG, &type_key);
                store.set_reference(&key, &instance_key, interval).await?;
                self.provider
                    .enqueue_delayed(bytes, interval, queue, opts.metadata)
                    .await?;
                info!(queue, %key, delay_secs = interval.as_secs(), "published debounced item");
            }
            None => {
                match opts.delay.filter(|delay| !delay.is_zero()) {
                    Some(delay) => {
                        self.provider
                            .enqueue_delayed(bytes, delay, queue, opts.metadata)
                            .await?;
                        debug!(queue, delay_secs = delay.as_secs(), "published delayed item");
                    }
                    None => {
                        self.provider.enqueue(bytes, queue, opts.metadata).await?;
                        debug!(queue, "published item");
                    }
                }
            }
        }

        Ok(())
    }

    /// Enqueue a batch. Debounced callables go one at a time so each gets
    /// its own debounce pointer; the rest take the provider's bulk path.
    #[instrument(skip(self, callables), fields(type_tag = C::TYPE_TAG, count = callables.len()))]
    pub async fn publish_batch<C: Callable>(
        &self,
        callables: &mut [C],
        queue: Option<&str>,
    ) -> CourierResult<()> {
        let queue = queue.unwrap_or(&self.default_queue);
        let mut bulk = Vec::new();

        for callable in callables.iter_mut() {
            if callable.debounce().is_some() {
                self.publish(callable, PublishOptions::new().queue(queue))
                    .await?;
            } else {
                self.validate_capabilities(callable)?;
                bulk.push(encode(&*callable)?);
            }
        }

        if !bulk.is_empty() {
            let count = bulk.len();
            self.provider.enqueue_bulk(bulk, queue).await?;
            debug!(queue, count, "published bulk items");
        }

        Ok(())
    }

    fn validate_capabilities<C: Callable>(&self, callable: &C) -> CourierResult<()> {
        if let Some(spec) = callable.debounce() {
            validate::debounce(spec)?;
        }
        if let Some(spec) = callable.rate_limit() {
            validate::rate_limit(spec)?;
        }
        if let Some(spec) = callable.concurrency_cap() {
            validate::concurrency_cap(spec)?;
        }
        if let Some(spec) = callable.repeat() {
            validate::repeat(spec)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::{CallResult, Debounce};
    use crate::context::CallContext;
    use crate::stores::MemoryCoordinationStore;
    use crate::transport::MemoryTransport;
    use crate::types::Frame;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Plain {
        note: String,
    }

    #[async_trait]
    impl Callable for Plain {
        const TYPE_TAG: &'static str = "Plain, app";

        async fn invoke(&mut self, _ctx: &CallContext) -> CallResult<()> {
            Ok(())
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Debounced {
        #[serde(flatten)]
        debounce: Debounce,
    }

    #[async_trait]
    impl Callable for Debounced {
        const TYPE_TAG: &'static str = "Debounced, app";

        async fn invoke(&mut self, _ctx: &CallContext) -> CallResult<()> {
            Ok(())
        }

        fn debounce(&self) -> Option<&Debounce> {
            Some(&self.debounce)
        }

        fn debounce_mut(&mut self) -> Option<&mut Debounce> {
            Some(&mut self.debounce)
        }
    }

    #[tokio::test]
    async fn plain_publish_is_immediate() {
        let transport = Arc::new(MemoryTransport::new());
        let publisher = Publisher::new(transport.clone());

        let mut item = Plain {
            note: "hi".to_string(),
        };
        publisher
            .publish(&mut item, PublishOptions::new())
            .await
            .unwrap();

        let (bytes, _) = transport.pop_ready(DEFAULT_QUEUE).unwrap();
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.type_tag, "Plain, app");
    }

    #[tokio::test]
    async fn debounced_publish_stamps_key_and_delays() {
        let transport = Arc::new(MemoryTransport::new());
        let store = Arc::new(MemoryCoordinationStore::new());
        let publisher = Publisher::new(transport.clone()).with_debounce_store(store.clone());

        let mut item = Debounced {
            debounce: Debounce::new("reports", Duration::from_secs(10)),
        };
        publisher
            .publish(&mut item, PublishOptions::new())
            .await
            .unwrap();

        let key = coordination_key("Debounced, app", "reports");
        assert!(store.has_reference(&key));
        assert!(item.debounce.instance_key.is_some());

        // Delivery is delayed by the debounce interval.
        assert!(transport.pop_ready(DEFAULT_QUEUE).is_none());
        assert_eq!(transport.len(DEFAULT_QUEUE), 1);
    }

    #[tokio::test]
    async fn each_publish_gets_a_fresh_instance_key() {
        let transport = Arc::new(MemoryTransport::new());
        let store = Arc::new(MemoryCoordinationStore::new());
        let publisher = Publisher::new(transport).with_debounce_store(store);

        let mut item = Debounced {
            debounce: Debounce::new("reports", Duration::from_secs(10)),
        };
        publisher
            .publish(&mut item, PublishOptions::new())
            .await
            .unwrap();
        let first = item.debounce.instance_key.clone();

        publisher
            .publish(&mut item, PublishOptions::new())
            .await
            .unwrap();
        assert_ne!(first, item.debounce.instance_key);
    }

    #[tokio::test]
    async fn debounced_publish_without_store_fails() {
        let publisher = Publisher::new(Arc::new(MemoryTransport::new()));
        let mut item = Debounced {
            debounce: Debounce::new("reports", Duration::from_secs(10)),
        };
        let err = publisher
            .publish(&mut item, PublishOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::MissingCapability(_)));
    }

    #[tokio::test]
    async fn batch_splits_debounced_from_bulk() {
        let transport = Arc::new(MemoryTransport::new());
        let publisher = Publisher::new(transport.clone());

        let mut items = vec![
            Plain {
                note: "a".to_string(),
            },
            Plain {
                note: "b".to_string(),
            },
        ];
        publisher
            .publish_batch(&mut items, Some("bulk"))
            .await
            .unwrap();
        assert_eq!(transport.len("bulk"), 2);
    }
}
