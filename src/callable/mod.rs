pub mod capabilities;
pub mod registry;

pub use capabilities::{ConcurrencyCap, Debounce, RateLimit, Repeat};
pub use registry::{encode, CallableRegistry};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::{CallContext, Logger, ServiceLocator};
use crate::error::{CallError, CourierResult};

/// Result type for callable bodies and user hooks.
pub type CallResult<T> = Result<T, CallError>;

/// A unit of work whose serialized form carries its own dispatch identity.
///
/// The payload is the struct's own serde representation (camel-case your
/// field names for wire compatibility); the type tag prefixes it on the wire
/// and resolves back to this type through the [`CallableRegistry`].
///
/// Capabilities are declared by overriding the accessors below to expose
/// state embedded in the struct. The dispatcher detects them at runtime and
/// adjusts the pipeline per declared capability.
#[async_trait]
pub trait Callable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Registry-resolvable wire identity. Convention: `"<QualifiedName>, <bundle>"`.
    const TYPE_TAG: &'static str;

    /// The work itself.
    async fn invoke(&mut self, ctx: &CallContext) -> CallResult<()>;

    /// Compensation hook run when a later pipeline stage fails.
    async fn on_error(&mut self, _ctx: &CallContext) -> CallResult<()> {
        Ok(())
    }

    fn debounce(&self) -> Option<&Debounce> {
        None
    }

    fn debounce_mut(&mut self) -> Option<&mut Debounce> {
        None
    }

    fn rate_limit(&self) -> Option<&RateLimit> {
        None
    }

    fn concurrency_cap(&self) -> Option<&ConcurrencyCap> {
        None
    }

    fn repeat(&self) -> Option<&Repeat> {
        None
    }

    fn repeat_mut(&mut self) -> Option<&mut Repeat> {
        None
    }

    /// Called exactly once when a repeat sequence ends. `reached_max` is true
    /// when the counter ran out, false when the body stopped the sequence.
    async fn repeat_completed(&mut self, _reached_max: bool, _ctx: &CallContext) -> CallResult<()> {
        Ok(())
    }

    /// Opt into logger injection. The consumer context must then carry one.
    fn wants_logger(&self) -> bool {
        false
    }

    /// Receives the injected logger; store it in a `#[serde(skip)]` slot.
    fn attach_logger(&mut self, _logger: Logger) {}

    /// Opt into service binding. The consumer context must then carry a locator.
    fn wants_services(&self) -> bool {
        false
    }

    /// Resolve dependencies into `#[serde(skip)]` slots before invocation.
    fn bind_services(&mut self, _services: &ServiceLocator) -> CallResult<()> {
        Ok(())
    }
}

/// Object-safe mirror of [`Callable`] used past the registry boundary.
///
/// The registry hydrates payloads into boxed `DynCallable` values so the
/// dispatcher can run the pipeline without knowing concrete types.
#[async_trait]
pub trait DynCallable: Send + Sync {
    fn type_tag(&self) -> &'static str;

    /// Re-serialize the (possibly mutated) callable into a wire frame.
    fn encode_frame(&self) -> CourierResult<Vec<u8>>;

    async fn invoke(&mut self, ctx: &CallContext) -> CallResult<()>;
    async fn on_error(&mut self, ctx: &CallContext) -> CallResult<()>;

    fn debounce(&self) -> Option<&Debounce>;
    fn debounce_mut(&mut self) -> Option<&mut Debounce>;
    fn rate_limit(&self) -> Option<&RateLimit>;
    fn concurrency_cap(&self) -> Option<&ConcurrencyCap>;
    fn repeat(&self) -> Option<&Repeat>;
    fn repeat_mut(&mut self) -> Option<&mut Repeat>;
    async fn repeat_completed(&mut self, reached_max: bool, ctx: &CallContext) -> CallResult<()>;

    fn wants_logger(&self) -> bool;
    fn attach_logger(&mut self, logger: Logger);
    fn wants_services(&self) -> bool;
    fn bind_services(&mut self, services: &ServiceLocator) -> CallResult<()>;
}

impl std::fmt::Debug for dyn DynCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynCallable")
            .field("type_tag", &self.type_tag())
            .finish()
    }
}

pub(crate) struct Erased<C: Callable>(pub(crate) C);

#[async_trait]
impl<C: Callable> DynCallable for Erased<C> {
    fn type_tag(&self) -> &'static str {
        C::TYPE_TAG
    }

    fn encode_frame(&self) -> CourierResult<Vec<u8>> {
        encode(&self.0)
    }

    async fn invoke(&mut self, ctx: &CallContext) -> CallResult<()> {
        self.0.invoke(ctx).await
    }

    async fn on_error(&mut self, ctx: &CallContext) -> CallResult<()> {
        self.0.on_error(ctx).await
    }

    fn debounce(&self) -> Option<&Debounce> {
        self.0.debounce()
    }

    fn debounce_mut(&mut self) -> Option<&mut Debounce> {
        self.0.debounce_mut()
    }

    fn rate_limit(&self) -> Option<&RateLimit> {
        self.0.rate_limit()
    }

    fn concurrency_cap(&self) -> Option<&ConcurrencyCap> {
        self.0.concurrency_cap()
    }

    fn repeat(&self) -> Option<&Repeat> {
        self.0.repeat()
    }

    fn repeat_mut(&mut self) -> Option<&mut Repeat> {
        self.0.repeat_mut()
    }

    async fn repeat_completed(&mut self, reached_max: bool, ctx: &CallContext) -> CallResult<()> {
        self.0.repeat_completed(reached_max, ctx).await
    }

    fn wants_logger(&self) -> bool {
        self.0.wants_logger()
    }

    fn attach_logger(&mut self, logger: Logger) {
        self.0.attach_logger(logger);
    }

    fn wants_services(&self) -> bool {
        self.0.wants_services()
    }

    fn bind_services(&mut self, services: &ServiceLocator) -> CallResult<()> {
        self.0.bind_services(services)
    }
}
