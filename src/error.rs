use thiserror::Error;

/// Result type for courier operations.
pub type CourierResult<T> = Result<T, CourierError>;

/// Infrastructure errors raised by the codec, stores, transport, and the
/// dispatch pipeline.
#[derive(Error, Debug)]
pub enum CourierError {
    /// The wire frame could not be decoded: missing delimiter, unknown type
    /// tag, or a payload that did not hydrate. Unrecoverable for this message.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A callable could not be serialized for publication.
    #[error("serialization failed for '{type_tag}': {reason}")]
    Serialization { type_tag: String, reason: String },

    /// A type tag is already bound to a different callable type.
    #[error("type tag '{0}' is already registered to a different callable type")]
    Registration(String),

    /// A capability is declared on the callable but the consumer context is
    /// missing the matching facility (logger, service locator, store).
    #[error("missing consumer capability: {0}")]
    MissingCapability(String),

    /// Capability parameters failed the pre-flight checks.
    #[error("invalid {what} parameters: {reason}")]
    Validation { what: &'static str, reason: String },

    /// A coordination store call failed.
    #[error("coordination store failure: {0}")]
    Store(String),

    /// The queue provider failed during enqueue, requeue, or DLQ routing.
    #[error("queue transport failure: {0}")]
    Transport(String),

    /// The requested delivery delay exceeds what the provider supports.
    #[error("delay of {requested}s exceeds the provider maximum of {max}s")]
    DelayTooLong { requested: u64, max: u64 },

    /// The host cancelled the dispatcher while a stage was in flight.
    #[error("dispatch cancelled by host")]
    Cancelled,

    /// The process-wide runtime was read before `runtime::init`.
    #[error("courier runtime not initialized; call runtime::init first")]
    Uninitialized,

    /// The process-wide runtime was installed twice.
    #[error("courier runtime already initialized")]
    AlreadyInitialized,

    /// An error raised by a callable body, its binding hooks, or a
    /// user-supplied dispatch hook.
    #[error("callable body failed: {0}")]
    User(#[from] CallError),

    /// Wrapper attached at the dispatcher boundary: the pipeline failed while
    /// `type_tag` owned the message.
    #[error("callable '{type_tag}' failed: {source}")]
    Callable {
        type_tag: String,
        #[source]
        source: Box<CourierError>,
    },
}

impl CourierError {
    /// Whether the retry shell must bypass the interval ladder and route the
    /// message straight to the dead-letter queue.
    pub fn is_no_retry(&self) -> bool {
        match self {
            Self::MalformedFrame(_) | Self::Serialization { .. } => true,
            Self::Registration(_)
            | Self::MissingCapability(_)
            | Self::Validation { .. }
            | Self::DelayTooLong { .. }
            | Self::Uninitialized
            | Self::AlreadyInitialized => true,
            Self::User(err) => err.is_no_retry(),
            Self::Callable { source, .. } => source.is_no_retry(),
            Self::Store(_) | Self::Transport(_) | Self::Cancelled => false,
        }
    }

    /// Whether this error is eligible for the retry ladder.
    pub fn is_retryable(&self) -> bool {
        !self.is_no_retry()
    }
}

/// Outcome of a callable body - determines retry behavior.
///
/// Errors are retryable by default; `no_retry` marks failures that can never
/// succeed on redelivery (bad input, broken invariants).
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct CallError {
    message: String,
    no_retry: bool,
}

impl CallError {
    /// A retryable failure.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            no_retry: false,
        }
    }

    /// A failure that must not be retried.
    pub fn no_retry(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            no_retry: true,
        }
    }

    pub fn is_no_retry(&self) -> bool {
        self.no_retry
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
