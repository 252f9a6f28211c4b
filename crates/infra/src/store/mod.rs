//! Relational store for the core service.
//!
//! One trait covers the four core entities because several operations span
//! them (cascading deletes, purchase settlement) and must run in a single
//! transaction. Implementations:
//! - [`InMemoryCoreStore`]: one lock over all tables (tests, dev)
//! - [`PostgresCoreStore`]: sqlx transactions, row locks on balance changes

use async_trait::async_trait;
use thiserror::Error;

use operator_core::{AccountId, CustomerId, DomainError, PurchaseId, SubPackageId};
use operator_customers::{Account, AccountUpdateRequest, Customer};
use operator_packages::{PackageRequest, SubPackage};
use operator_purchasing::Purchase;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryCoreStore;
pub use postgres::PostgresCoreStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A business rule rejected the operation (not found, validation, funds).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backing database failed.
    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CoreStore: Send + Sync {
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()>;

    async fn get_customer(&self, id: CustomerId) -> StoreResult<Customer>;

    async fn list_customers(&self) -> StoreResult<Vec<Customer>>;

    /// Persist new credentials for an existing customer.
    async fn update_customer(&self, customer: &Customer) -> StoreResult<()>;

    /// Delete a customer with all of its accounts and their purchases.
    async fn delete_customer(&self, id: CustomerId) -> StoreResult<()>;

    /// Insert an account. Fails with not-found when its customer is missing.
    async fn insert_account(&self, account: &Account) -> StoreResult<()>;

    async fn get_account(&self, id: AccountId) -> StoreResult<Account>;

    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    async fn accounts_of_customer(&self, id: CustomerId) -> StoreResult<Vec<Account>>;

    /// Apply an update under a row lock and return the new state.
    async fn update_account(
        &self,
        id: AccountId,
        request: &AccountUpdateRequest,
    ) -> StoreResult<Account>;

    /// Delete an account and its purchases.
    async fn delete_account(&self, id: AccountId) -> StoreResult<()>;

    /// Validate the request and insert a package under the next sequential id.
    async fn create_package(&self, request: &PackageRequest) -> StoreResult<SubPackage>;

    async fn get_package(&self, id: SubPackageId) -> StoreResult<SubPackage>;

    async fn list_packages(&self) -> StoreResult<Vec<SubPackage>>;

    async fn replace_package(
        &self,
        id: SubPackageId,
        request: &PackageRequest,
    ) -> StoreResult<SubPackage>;

    /// Delete a package and every purchase of it.
    async fn delete_package(&self, id: SubPackageId) -> StoreResult<()>;

    /// Distinct accounts holding at least one purchase of the package.
    async fn accounts_of_package(&self, id: SubPackageId) -> StoreResult<Vec<Account>>;

    /// Settle and store a purchase in one transaction.
    ///
    /// Lookup order is package, then account, so an unknown package is
    /// reported before an unknown account. Returns the package as read inside
    /// the transaction, so callers never look it up again after commit.
    async fn record_purchase(
        &self,
        account_id: AccountId,
        package_id: SubPackageId,
        price: i16,
    ) -> StoreResult<(Purchase, SubPackage)>;

    async fn get_purchase(&self, id: PurchaseId) -> StoreResult<Purchase>;

    async fn purchases_of_account(&self, id: AccountId) -> StoreResult<Vec<Purchase>>;

    /// Delete a purchase and refund its price to the owning account.
    async fn delete_purchase(&self, id: PurchaseId) -> StoreResult<()>;
}

pub(crate) const CUSTOMER: &str = "customer";
pub(crate) const ACCOUNT: &str = "account";
pub(crate) const PACKAGE: &str = "package";
pub(crate) const PURCHASE: &str = "purchase";
