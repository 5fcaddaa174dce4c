//! Process-wide wiring.
//!
//! The explicit [`Runtime`] value is the primary API: build one at startup
//! and thread it into publishers and consumers. The global accessor is a
//! convenience for hosts that cannot thread a value through their entry
//! points; it is set once and read-only afterwards.

use std::sync::{Arc, OnceLock};

use crate::callable::CallableRegistry;
use crate::dispatch::Dispatcher;
use crate::error::{CourierError, CourierResult};
use crate::publish::Publisher;
use crate::stores::DebounceStore;
use crate::transport::QueueProvider;

/// Handles shared by every publish and consume in a process.
#[derive(Clone)]
pub struct Runtime {
    pub registry: Arc<CallableRegistry>,
    pub provider: Arc<dyn QueueProvider>,
    pub debounce_store: Option<Arc<dyn DebounceStore>>,
}

impl Runtime {
    pub fn new(registry: Arc<CallableRegistry>, provider: Arc<dyn QueueProvider>) -> Self {
        Self {
            registry,
            provider,
            debounce_store: None,
        }
    }

    /// Wire the debounce store used by the publisher side.
    pub fn with_debounce_store(mut self, store: Arc<dyn DebounceStore>) -> Self {
        self.debounce_store = Some(store);
        self
    }

    /// A publisher over this runtime's provider and debounce store.
    pub fn publisher(&self) -> Publisher {
        let publisher = Publisher::new(self.provider.clone());
        match &self.debounce_store {
            Some(store) => publisher.with_debounce_store(store.clone()),
            None => publisher,
        }
    }

    /// A dispatcher over this runtime's registry and provider. Concurrency
    /// and rate-limit stores are wired by the caller.
    pub fn dispatcher(&self) -> Dispatcher {
        let dispatcher = Dispatcher::new(self.registry.clone(), self.provider.clone());
        match &self.debounce_store {
            Some(store) => dispatcher.with_debounce_store(store.clone()),
            None => dispatcher,
        }
    }
}

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// Install the process-wide runtime. Fails if called twice.
pub fn init(runtime: Runtime) -> CourierResult<()> {
    GLOBAL
        .set(runtime)
        .map_err(|_| CourierError::AlreadyInitialized)
}

/// The process-wide runtime, or a classified error before [`init`].
pub fn global() -> CourierResult<&'static Runtime> {
    GLOBAL.get().ok_or(CourierError::Uninitialized)
}

/// A publisher over the process-wide runtime.
pub fn publisher() -> CourierResult<Publisher> {
    Ok(global()?.publisher())
}
