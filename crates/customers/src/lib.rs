//! Customers domain module (customers and the accounts they own).
//!
//! This crate contains business rules for customers and accounts, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod account;
pub mod credentials;
pub mod customer;

pub use account::{Account, AccountCreateRequest, AccountUpdateRequest, TariffType};
pub use credentials::hash_password;
pub use customer::{Customer, CustomerCreateRequest, CustomerUpdateRequest};
