//! Purchase-order service: a thin front that forwards purchase intents to the
//! core service and keeps a record of every one that failed.

pub mod app;
pub mod error_record;
pub mod gateway;
pub mod order;
