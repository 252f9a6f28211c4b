//! Infrastructure-backed bus implementations.
//!
//! The bus abstraction lives in `operator-events`; this module adds Redis.

pub mod redis_pubsub;

pub use redis_pubsub::{RedisBusError, RedisPubSubEventBus};
