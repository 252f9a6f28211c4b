//! Core service: customers, accounts, sub-packages and purchases over HTTP.

pub mod app;
