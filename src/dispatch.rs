use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::callable::{CallResult, CallableRegistry, DynCallable};
use crate::context::{CallContext, ConsumerContext};
use crate::error::{CourierError, CourierResult};
use crate::stores::{ConcurrencyStore, DebounceStore, PassthroughStore, RateLimitStore};
use crate::transport::QueueProvider;
use crate::types::{coordination_key, InstanceKey, Metadata};
use crate::validate;

/// Dispatcher tunables.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Delay applied when the concurrency gate turns a message away.
    pub contention_requeue_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            contention_requeue_delay: Duration::from_secs(1),
        }
    }
}

/// User hooks around the invocation. Every method defaults to a no-op.
#[async_trait]
pub trait DispatchHooks: Send + Sync {
    /// Runs after capability injection, immediately before `invoke`.
    async fn before_call(&self, _callable: &dyn DynCallable, _queue: &str) -> CallResult<()> {
        Ok(())
    }

    /// Runs after a successful `invoke`, before the repeat branch.
    async fn after_call(&self, _callable: &dyn DynCallable, _queue: &str) -> CallResult<()> {
        Ok(())
    }

    /// Runs at the end of every dispatch, error or not.
    async fn finalize_call(&self, _queue: &str) -> CallResult<()> {
        Ok(())
    }
}

/// The default hook set.
pub struct NoopHooks;

#[async_trait]
impl DispatchHooks for NoopHooks {}

/// How a dispatch that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The callable body ran to completion.
    Completed,

    /// A newer debounced instance superseded this one; discarded quietly.
    Superseded,

    /// Turned away by a gate and republished with a delay.
    Requeued {
        reason: RequeueReason,
        delay: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueReason {
    ConcurrencyCap,
    RateLimit,
}

/// The consumer-side pipeline.
///
/// One `dispatch` call owns a work item from decode until the finalize stage
/// returns. Stage order is fixed: decode, repeat validation, debounce gate,
/// concurrency gate, rate-limit gate, logger injection, service binding,
/// pre-call hook, invoke, post-call hook and repeat branch, error path,
/// finalize. The gates run before any capability injection so a discarded or
/// requeued message never touches user facilities, and the debounce gate
/// runs before the lock and rate-limit gates so a superseded message can
/// neither hold a lock nor burn a rate-limit slot.
pub struct Dispatcher {
    registry: Arc<CallableRegistry>,
    provider: Arc<dyn QueueProvider>,
    concurrency_store: Arc<dyn ConcurrencyStore>,
    debounce_store: Arc<dyn DebounceStore>,
    rate_limit_store: Arc<dyn RateLimitStore>,
    hooks: Arc<dyn DispatchHooks>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// A dispatcher with passthrough stores and no-op hooks.
    pub fn new(registry: Arc<CallableRegistry>, provider: Arc<dyn QueueProvider>) -> Self {
        Self {
            registry,
            provider,
            concurrency_store: Arc::new(PassthroughStore::new()),
            debounce_store: Arc::new(PassthroughStore::new()),
            rate_limit_store: Arc::new(PassthroughStore::new()),
            hooks: Arc::new(NoopHooks),
            config: DispatchConfig::default(),
        }
    }

    pub fn with_concurrency_store(mut self, store: Arc<dyn ConcurrencyStore>) -> Self {
        self.concurrency_store = store;
        self
    }

    pub fn with_debounce_store(mut self, store: Arc<dyn DebounceStore>) -> Self {
        self.debounce_store = store;
        self
    }

    pub fn with_rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limit_store = store;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn DispatchHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one work item through the pipeline.
    #[instrument(skip_all, fields(queue = %queue))]
    pub async fn dispatch(
        &self,
        bytes: &[u8],
        queue: &str,
        metadata: &Metadata,
        ctx: &ConsumerContext,
    ) -> CourierResult<DispatchOutcome> {
        // Decode failures abort before a callable exists, so no on_error and
        // no finalize hooks run for them.
        let mut callable = self.registry.decode(bytes)?;

        let mut held_lock: Option<(String, InstanceKey)> = None;
        let result = self
            .run(callable.as_mut(), bytes, queue, metadata, ctx, &mut held_lock)
            .await;

        let finalize_result = self.finalize(held_lock, queue).await;

        match result {
            Ok(outcome) => {
                finalize_result?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(finalize_err) = finalize_result {
                    warn!(error = %finalize_err, "finalize failed after a pipeline error");
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        callable: &mut dyn DynCallable,
        raw: &[u8],
        queue: &str,
        metadata: &Metadata,
        ctx: &ConsumerContext,
        held_lock: &mut Option<(String, InstanceKey)>,
    ) -> CourierResult<DispatchOutcome> {
        let call_ctx = CallContext::new(queue, ctx.cancellation.clone());

        match self
            .pipeline(callable, raw, queue, metadata, ctx, &call_ctx, held_lock)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // The callable exists, so it gets its compensation hook; a
                // failing hook is logged and swallowed so it cannot mask the
                // original error.
                if let Err(hook_err) = callable.on_error(&call_ctx).await {
                    warn!(
                        type_tag = callable.type_tag(),
                        error = %hook_err,
                        "on_error hook failed"
                    );
                }
                Err(CourierError::Callable {
                    type_tag: callable.type_tag().to_string(),
                    source: Box::new(err),
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn pipeline(
        &self,
        callable: &mut dyn DynCallable,
        raw: &[u8],
        queue: &str,
        metadata: &Metadata,
        ctx: &ConsumerContext,
        call_ctx: &CallContext,
        held_lock: &mut Option<(String, InstanceKey)>,
    ) -> CourierResult<DispatchOutcome> {
        if let Some(spec) = callable.repeat() {
            validate::repeat(spec)?;
        }

        // Debounce gate: only the instance the store still points at survives.
        if let Some(spec) = callable.debounce() {
            validate::debounce(spec)?;
            let instance_key = validate::debounce_instance(spec)?.clone();
            let key = coordination_key(callable.type_tag(), &spec.type_key);
            let interval = spec.interval();

            let owned = gated(
                ctx,
                self.debounce_store
                    .try_remove_own_reference(&key, &instance_key, interval),
            )
            .await?;

            if !owned {
                info!(%key, "superseded by a newer debounced instance; discarding");
                return Ok(DispatchOutcome::Superseded);
            }
        }

        // Concurrency gate: contention requeues with a short fixed delay
        // rather than blocking the consumer.
        if let Some(spec) = callable.concurrency_cap() {
            validate::concurrency_cap(spec)?;
            let key = coordination_key(callable.type_tag(), &spec.type_key);

            match gated(ctx, self.concurrency_store.try_set_lock(&key, spec.limit)).await? {
                Some(instance_key) => {
                    debug!(%key, %instance_key, "concurrency lock acquired");
                    *held_lock = Some((key, instance_key));
                }
                None => {
                    let delay = self.config.contention_requeue_delay;
                    info!(%key, delay_secs = delay.as_secs(), "concurrency cap reached; requeueing");
                    self.provider
                        .enqueue_delayed(raw.to_vec(), delay, queue, metadata.clone())
                        .await?;
                    return Ok(DispatchOutcome::Requeued {
                        reason: RequeueReason::ConcurrencyCap,
                        delay,
                    });
                }
            }
        }

        // Rate-limit gate. Runs under any held lock so a delay-requeue here
        // releases the lock in finalize instead of inflating the window.
        if let Some(spec) = callable.rate_limit() {
            validate::rate_limit(spec)?;
            let key = coordination_key(callable.type_tag(), &spec.type_key);

            if let Some(delay) = gated(
                ctx,
                self.rate_limit_store
                    .next_available_run_time(&key, spec.per_period, spec.period()),
            )
            .await?
            {
                info!(%key, delay_secs = delay.as_secs(), "rate limit window full; requeueing");
                self.provider
                    .enqueue_delayed(raw.to_vec(), delay, queue, metadata.clone())
                    .await?;
                return Ok(DispatchOutcome::Requeued {
                    reason: RequeueReason::RateLimit,
                    delay,
                });
            }
        }

        if callable.wants_logger() {
            let logger = ctx.logger.clone().ok_or_else(|| {
                CourierError::MissingCapability(format!(
                    "callable '{}' wants a logger but the consumer has none",
                    callable.type_tag()
                ))
            })?;
            callable.attach_logger(logger);
        }

        if callable.wants_services() {
            let services = ctx.services.clone().ok_or_else(|| {
                CourierError::MissingCapability(format!(
                    "callable '{}' wants services but the consumer has no locator",
                    callable.type_tag()
                ))
            })?;
            callable.bind_services(&services)?;
        }

        self.hooks.before_call(&*callable, queue).await?;

        gated(ctx, async {
            callable.invoke(call_ctx).await.map_err(CourierError::from)
        })
        .await?;

        self.hooks.after_call(&*callable, queue).await?;

        self.repeat_branch(callable, queue, metadata, call_ctx).await?;

        Ok(DispatchOutcome::Completed)
    }

    async fn repeat_branch(
        &self,
        callable: &mut dyn DynCallable,
        queue: &str,
        metadata: &Metadata,
        call_ctx: &CallContext,
    ) -> CourierResult<()> {
        let (max_calls, interval, should_continue, calls_made) = match callable.repeat() {
            Some(spec) => (
                spec.max_calls,
                spec.interval(),
                spec.should_continue,
                spec.calls_made(),
            ),
            None => return Ok(()),
        };
        let type_tag = callable.type_tag();

        if !should_continue {
            debug!(type_tag, "repeat sequence stopped by the callable");
            callable.repeat_completed(false, call_ctx).await?;
            return Ok(());
        }

        let next = calls_made + 1;
        if let Some(spec) = callable.repeat_mut() {
            spec.current_call = Some(next);
        }

        if next >= max_calls {
            debug!(type_tag, calls = next, "repeat sequence reached its cap");
            callable.repeat_completed(true, call_ctx).await?;
        } else {
            let bytes = callable.encode_frame()?;
            self.provider
                .enqueue_delayed(bytes, interval, queue, metadata.clone())
                .await?;
            debug!(
                type_tag,
                call = next,
                of = max_calls,
                delay_secs = interval.as_secs(),
                "republished repeating item"
            );
        }

        Ok(())
    }

    /// Always runs, even after a pipeline error or cancellation: releases any
    /// held concurrency lock, then the user finalize hook. The first error is
    /// reported to the caller only when the pipeline itself succeeded.
    async fn finalize(
        &self,
        held_lock: Option<(String, InstanceKey)>,
        queue: &str,
    ) -> CourierResult<()> {
        let mut result = Ok(());

        if let Some((key, instance_key)) = held_lock {
            if let Err(err) = self.concurrency_store.release_lock(&key, &instance_key).await {
                warn!(%key, error = %err, "lock release failed; expiry will reclaim it");
                result = Err(err);
            } else {
                debug!(%key, "concurrency lock released");
            }
        }

        if let Err(err) = self.hooks.finalize_call(queue).await {
            warn!(error = %err, "finalize hook failed");
            if result.is_ok() {
                result = Err(CourierError::from(err));
            }
        }

        result
    }
}

/// Race a pipeline suspension point against host cancellation. The finalize
/// stage is the one suspension point deliberately not routed through here.
async fn gated<T>(
    ctx: &ConsumerContext,
    operation: impl Future<Output = CourierResult<T>>,
) -> CourierResult<T> {
    tokio::select! {
        biased;
        _ = ctx.cancellation.cancelled() => Err(CourierError::Cancelled),
        result = operation => result,
    }
}
