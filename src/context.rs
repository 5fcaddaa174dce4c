use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::CallError;

/// Severity levels understood by [`Logger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink behind a [`Logger`] handle.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Cloneable logging handle injected into callables that want one.
///
/// Never serialized; the dispatcher attaches it between decode and invoke.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// A logger forwarding to the `tracing` subscriber.
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.sink.log(LogLevel::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.sink.log(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.sink.log(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.sink.log(LogLevel::Error, message.as_ref());
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
    }
}

/// Runtime service lookup for dependency-bound callables.
///
/// Services are registered by concrete type and resolved with a typed
/// downcast; a missing registration is a programming error on the operator
/// side and reports as no-retry.
#[derive(Default)]
pub struct ServiceLocator {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServiceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service instance under its concrete type.
    pub fn provide<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.services.insert(TypeId::of::<T>(), service);
        self
    }

    /// Look up a service by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|any| any.clone().downcast::<T>().ok())
    }

    /// Look up a service by type, failing with a no-retry error when absent.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, CallError> {
        self.get::<T>().ok_or_else(|| {
            CallError::no_retry(format!(
                "service '{}' not provided to the consumer",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLocator")
            .field("services", &self.services.len())
            .finish()
    }
}

/// Facilities the host makes available to one consumer.
#[derive(Debug, Clone, Default)]
pub struct ConsumerContext {
    /// Injected into callables that want a logger.
    pub logger: Option<Logger>,

    /// Handed to dependency-bound callables before invocation.
    pub services: Option<Arc<ServiceLocator>>,

    /// Host-driven cancellation; the finalize stage runs regardless.
    pub cancellation: CancellationToken,
}

impl ConsumerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_services(mut self, services: Arc<ServiceLocator>) -> Self {
        self.services = Some(services);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Per-invocation information handed to the callable body.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Queue the work item was consumed from.
    pub queue: String,

    /// Mirrors the consumer's cancellation token so long bodies can yield.
    pub cancellation: CancellationToken,
}

impl CallContext {
    pub fn new(queue: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            queue: queue.into(),
            cancellation,
        }
    }
}
