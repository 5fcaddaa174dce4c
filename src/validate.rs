//! Pre-flight checks on capability parameters.
//!
//! All checks are pure and run before any coordination store or transport
//! call, so a misconfigured callable fails fast with a classified error.

use crate::callable::{ConcurrencyCap, Debounce, RateLimit, Repeat};
use crate::error::{CourierError, CourierResult};
use crate::types::InstanceKey;

fn invalid(what: &'static str, reason: impl Into<String>) -> CourierError {
    CourierError::Validation {
        what,
        reason: reason.into(),
    }
}

pub fn debounce(spec: &Debounce) -> CourierResult<()> {
    if spec.type_key.trim().is_empty() {
        return Err(invalid("debounce", "type key must not be empty"));
    }
    if spec.interval_secs == 0 {
        return Err(invalid("debounce", "interval must be positive"));
    }
    Ok(())
}

/// Consumer-side check: the publisher must have stamped an instance key.
pub fn debounce_instance(spec: &Debounce) -> CourierResult<&InstanceKey> {
    match &spec.instance_key {
        Some(key) if !key.as_str().is_empty() => Ok(key),
        _ => Err(invalid(
            "debounce",
            "instance key missing; the item was not published through the courier publisher",
        )),
    }
}

pub fn rate_limit(spec: &RateLimit) -> CourierResult<()> {
    if spec.type_key.trim().is_empty() {
        return Err(invalid("rate limit", "type key must not be empty"));
    }
    if spec.per_period == 0 {
        return Err(invalid("rate limit", "per-period count must be at least 1"));
    }
    if spec.period_secs == 0 {
        return Err(invalid("rate limit", "period must be positive"));
    }
    Ok(())
}

pub fn concurrency_cap(spec: &ConcurrencyCap) -> CourierResult<()> {
    if spec.type_key.trim().is_empty() {
        return Err(invalid("concurrency cap", "type key must not be empty"));
    }
    if spec.limit == 0 {
        return Err(invalid("concurrency cap", "limit must be at least 1"));
    }
    Ok(())
}

pub fn repeat(spec: &Repeat) -> CourierResult<()> {
    if spec.max_calls == 0 {
        return Err(invalid("repeat", "max calls must be at least 1"));
    }
    if spec.interval_secs == 0 {
        return Err(invalid("repeat", "interval must be positive"));
    }
    if let Some(current) = spec.current_call {
        if current >= spec.max_calls {
            return Err(invalid(
                "repeat",
                format!(
                    "current call {current} is out of range for {} max calls",
                    spec.max_calls
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn debounce_rejects_bad_parameters() {
        assert!(debounce(&Debounce::new("", Duration::from_secs(5))).is_err());
        assert!(debounce(&Debounce::new("key", Duration::ZERO)).is_err());
        assert!(debounce(&Debounce::new("key", Duration::from_secs(5))).is_ok());
    }

    #[test]
    fn debounce_instance_requires_publisher_stamp() {
        let mut spec = Debounce::new("key", Duration::from_secs(5));
        assert!(debounce_instance(&spec).is_err());

        spec.instance_key = Some(InstanceKey::new());
        assert!(debounce_instance(&spec).is_ok());
    }

    #[test]
    fn rate_limit_bounds() {
        assert!(rate_limit(&RateLimit::new("key", 0, Duration::from_secs(5))).is_err());
        assert!(rate_limit(&RateLimit::new("key", 1, Duration::ZERO)).is_err());
        assert!(rate_limit(&RateLimit::new("key", 1, Duration::from_secs(5))).is_ok());
    }

    #[test]
    fn concurrency_bounds() {
        assert!(concurrency_cap(&ConcurrencyCap::new("key", 0)).is_err());
        assert!(concurrency_cap(&ConcurrencyCap::new("", 2)).is_err());
        assert!(concurrency_cap(&ConcurrencyCap::new("key", 2)).is_ok());
    }

    #[test]
    fn repeat_counter_must_stay_in_range() {
        let mut spec = Repeat::new(3, Duration::from_secs(1));
        assert!(repeat(&spec).is_ok());

        spec.current_call = Some(2);
        assert!(repeat(&spec).is_ok());

        spec.current_call = Some(3);
        assert!(repeat(&spec).is_err());
    }
}
