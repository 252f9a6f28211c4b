//! Infrastructure layer: configuration, relational store, Redis bus, workers.

pub mod config;
pub mod event_bus;
pub mod store;
pub mod workers;
