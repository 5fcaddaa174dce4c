//! # courier
//!
//! Queue work items that carry their own dispatch behavior.
//!
//! A published callable serializes to a `<type_tag>::<payload>` frame; any
//! correctly-linked consumer resolves the tag through its registry, rehydrates
//! the callable, and runs it through a capability-driven pipeline. Callables
//! opt into debounce, rate limiting, concurrency caps, logger injection,
//! service binding, and bounded repetition by exposing embedded capability
//! state; a retry shell above the pipeline classifies terminal failures into
//! a backoff ladder or dead-letter routing.
//!
//! Transports and distributed coordination stores are contracts here, not
//! implementations: the bundled [`MemoryTransport`] and coordination stores
//! cover local execution and tests, while production deployments plug cloud
//! queues and a KV store into the same traits.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use courier::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Ping {
//!     note: String,
//! }
//!
//! #[async_trait]
//! impl Callable for Ping {
//!     const TYPE_TAG: &'static str = "Ping, app";
//!
//!     async fn invoke(&mut self, _ctx: &CallContext) -> CallResult<()> {
//!         println!("{}", self.note);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CourierError> {
//!     let mut registry = CallableRegistry::new();
//!     registry.register::<Ping>()?;
//!
//!     let transport = Arc::new(MemoryTransport::new());
//!     let publisher = Publisher::new(transport.clone());
//!     let shell = RetryShell::new(
//!         Dispatcher::new(Arc::new(registry), transport.clone()),
//!         transport.clone(),
//!     );
//!
//!     let mut ping = Ping { note: "hi".to_string() };
//!     publisher.publish(&mut ping, PublishOptions::new()).await?;
//!
//!     let (bytes, metadata) = transport.recv_ready(courier::publish::DEFAULT_QUEUE).await;
//!     shell
//!         .consume(&bytes, courier::publish::DEFAULT_QUEUE, &metadata, &ConsumerContext::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod callable;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod publish;
pub mod retry;
pub mod runtime;
pub mod stores;
pub mod transport;
pub mod types;
pub mod validate;

pub use callable::{
    encode, CallResult, Callable, CallableRegistry, ConcurrencyCap, Debounce, DynCallable,
    RateLimit, Repeat,
};
pub use context::{CallContext, ConsumerContext, LogLevel, LogSink, Logger, ServiceLocator};
pub use dispatch::{
    DispatchConfig, DispatchHooks, DispatchOutcome, Dispatcher, NoopHooks, RequeueReason,
};
pub use error::{CallError, CourierError, CourierResult};
pub use publish::{PublishOptions, Publisher, DEFAULT_QUEUE};
pub use retry::{ConsumeOutcome, RetryPolicy, RetryShell};
pub use runtime::Runtime;
pub use stores::{
    ConcurrencyStore, DebounceStore, MemoryCoordinationStore, PassthroughStore, RateLimitStore,
};
pub use transport::{MemoryTransport, QueueProvider};
pub use types::{coordination_key, Frame, InstanceKey, Metadata};

/// The common imports for defining and running callables.
pub mod prelude {
    pub use crate::callable::{
        CallResult, Callable, CallableRegistry, ConcurrencyCap, Debounce, RateLimit, Repeat,
    };
    pub use crate::context::{CallContext, ConsumerContext, Logger, ServiceLocator};
    pub use crate::dispatch::{DispatchOutcome, Dispatcher};
    pub use crate::error::{CallError, CourierError, CourierResult};
    pub use crate::publish::{PublishOptions, Publisher};
    pub use crate::retry::{ConsumeOutcome, RetryShell};
    pub use crate::stores::{MemoryCoordinationStore, PassthroughStore};
    pub use crate::transport::MemoryTransport;
    pub use crate::types::Metadata;

    pub use async_trait::async_trait;
}
