//! `operator-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the customer,
//! package and purchasing contexts (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod validation;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{parse_or_not_found, AccountId, CustomerId, PurchaseId, SubPackageId};
pub use validation::{FieldViolation, ValidationErrors};
