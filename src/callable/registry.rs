use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::callable::{Callable, DynCallable, Erased};
use crate::error::{CourierError, CourierResult};
use crate::types::Frame;

type Constructor = dyn Fn(&[u8]) -> CourierResult<Box<dyn DynCallable>> + Send + Sync;

struct Registration {
    type_id: TypeId,
    construct: Arc<Constructor>,
}

/// Maps wire type tags to callable constructors.
///
/// Populated once at startup, read-only afterwards. Registration is
/// idempotent per concrete type; binding a second type to an occupied tag is
/// a startup error.
#[derive(Default)]
pub struct CallableRegistry {
    constructors: HashMap<String, Registration>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `C::TYPE_TAG` to `C`'s constructor.
    pub fn register<C: Callable>(&mut self) -> CourierResult<()> {
        let tag = C::TYPE_TAG;

        if let Some(existing) = self.constructors.get(tag) {
            if existing.type_id == TypeId::of::<C>() {
                return Ok(());
            }
            return Err(CourierError::Registration(tag.to_string()));
        }

        self.constructors.insert(
            tag.to_string(),
            Registration {
                type_id: TypeId::of::<C>(),
                construct: Arc::new(|payload| {
                    let callable: C = serde_json::from_slice(payload).map_err(|err| {
                        CourierError::MalformedFrame(format!(
                            "payload for '{}' did not hydrate: {err}",
                            C::TYPE_TAG
                        ))
                    })?;
                    Ok(Box::new(Erased(callable)))
                }),
            },
        );

        Ok(())
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.constructors.contains_key(type_tag)
    }

    pub fn registered_tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Turn raw frame bytes into an invocable object.
    pub fn decode(&self, bytes: &[u8]) -> CourierResult<Box<dyn DynCallable>> {
        let frame = Frame::parse(bytes)?;
        let registration = self.constructors.get(&frame.type_tag).ok_or_else(|| {
            CourierError::MalformedFrame(format!("unknown type tag '{}'", frame.type_tag))
        })?;
        (registration.construct)(&frame.payload)
    }
}

/// Serialize a callable into its wire frame.
///
/// Payload fields holding default values are elided by the capability
/// structs' serde attributes; logger and dependency slots never serialize.
pub fn encode<C: Callable>(callable: &C) -> CourierResult<Vec<u8>> {
    let payload = serde_json::to_vec(callable).map_err(|err| CourierError::Serialization {
        type_tag: C::TYPE_TAG.to_string(),
        reason: err.to_string(),
    })?;
    Ok(Frame::new(C::TYPE_TAG, payload).encode())
}
