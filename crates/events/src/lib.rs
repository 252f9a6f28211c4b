//! `operator-events`: cross-service message distribution.
//!
//! The core service publishes purchase confirmations as [`Envelope`]s; the
//! notification service consumes them through a [`Subscription`]. Transports
//! implement [`EventBus`] (in-memory here, Redis pub/sub in `operator-infra`).

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::Envelope;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
