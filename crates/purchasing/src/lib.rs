//! `operator-purchasing`: executed purchases and the rules that settle them
//! against an account balance.

pub mod purchase;
pub mod settlement;

pub use purchase::{Purchase, PurchaseCreateRequest};
pub use settlement::{ensure_purchasable, refund, settle};
