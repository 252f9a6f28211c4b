//! In-memory core store.
//!
//! All four tables live behind one `RwLock`, so every multi-table operation
//! (cascade, settlement, refund) is atomic with respect to other callers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use operator_core::{AccountId, CustomerId, DomainError, Entity, PurchaseId, SubPackageId};
use operator_customers::{Account, AccountUpdateRequest, Customer};
use operator_packages::{PackageRequest, SubPackage};
use operator_purchasing::{Purchase, ensure_purchasable, refund, settle};

use super::{ACCOUNT, CUSTOMER, CoreStore, PACKAGE, PURCHASE, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    customers: HashMap<CustomerId, Customer>,
    accounts: HashMap<AccountId, Account>,
    packages: BTreeMap<SubPackageId, SubPackage>,
    purchases: HashMap<PurchaseId, Purchase>,
    last_package_id: i64,
}

impl Tables {
    fn account(&self, id: AccountId) -> StoreResult<&Account> {
        self.accounts
            .get(&id)
            .ok_or_else(|| DomainError::not_found(ACCOUNT, id).into())
    }

    fn package(&self, id: SubPackageId) -> StoreResult<&SubPackage> {
        self.packages
            .get(&id)
            .ok_or_else(|| DomainError::not_found(PACKAGE, id).into())
    }

    fn remove_purchases_where(&mut self, pred: impl Fn(&Purchase) -> bool) {
        self.purchases.retain(|_, p| !pred(p));
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCoreStore {
    tables: RwLock<Tables>,
}

impl InMemoryCoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".into()))
    }
}

fn sorted_accounts<'a>(accounts: impl Iterator<Item = &'a Account>) -> Vec<Account> {
    let mut out: Vec<Account> = accounts.cloned().collect();
    out.sort_by_key(|a| (a.creation_date(), a.id().to_string()));
    out
}

#[async_trait]
impl CoreStore for InMemoryCoreStore {
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        self.write()?.customers.insert(customer.id(), customer.clone());
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> StoreResult<Customer> {
        self.read()?
            .customers
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(CUSTOMER, id).into())
    }

    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let mut out: Vec<Customer> = self.read()?.customers.values().cloned().collect();
        out.sort_by_key(|c| (c.creation_date(), c.id().to_string()));
        Ok(out)
    }

    async fn update_customer(&self, customer: &Customer) -> StoreResult<()> {
        let mut tables = self.write()?;
        match tables.customers.get_mut(&customer.id()) {
            Some(slot) => {
                *slot = customer.clone();
                Ok(())
            }
            None => Err(DomainError::not_found(CUSTOMER, customer.id()).into()),
        }
    }

    async fn delete_customer(&self, id: CustomerId) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !tables.customers.contains_key(&id) {
            return Err(DomainError::not_found(CUSTOMER, id).into());
        }

        let owned: Vec<AccountId> = tables
            .accounts
            .values()
            .filter(|a| a.customer_id() == id)
            .map(|a| a.id())
            .collect();
        tables.remove_purchases_where(|p| owned.contains(&p.account_id()));
        tables.accounts.retain(|_, a| a.customer_id() != id);
        tables.customers.remove(&id);
        Ok(())
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !tables.customers.contains_key(&account.customer_id()) {
            return Err(DomainError::not_found(CUSTOMER, account.customer_id()).into());
        }
        tables.accounts.insert(account.id(), account.clone());
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Account> {
        self.read()?.account(id).cloned()
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        Ok(sorted_accounts(self.read()?.accounts.values()))
    }

    async fn accounts_of_customer(&self, id: CustomerId) -> StoreResult<Vec<Account>> {
        let tables = self.read()?;
        if !tables.customers.contains_key(&id) {
            return Err(DomainError::not_found(CUSTOMER, id).into());
        }
        Ok(sorted_accounts(
            tables.accounts.values().filter(|a| a.customer_id() == id),
        ))
    }

    async fn update_account(
        &self,
        id: AccountId,
        request: &AccountUpdateRequest,
    ) -> StoreResult<Account> {
        let mut tables = self.write()?;
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(ACCOUNT, id))?;
        let mut updated = account.clone();
        updated.apply_update(request)?;
        *account = updated.clone();
        Ok(updated)
    }

    async fn delete_account(&self, id: AccountId) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables.account(id)?;
        tables.remove_purchases_where(|p| p.account_id() == id);
        tables.accounts.remove(&id);
        Ok(())
    }

    async fn create_package(&self, request: &PackageRequest) -> StoreResult<SubPackage> {
        let mut tables = self.write()?;
        let id = SubPackageId(tables.last_package_id + 1);
        let package = SubPackage::define(id, request)?;
        tables.last_package_id = id.get();
        tables.packages.insert(id, package.clone());
        Ok(package)
    }

    async fn get_package(&self, id: SubPackageId) -> StoreResult<SubPackage> {
        self.read()?.package(id).cloned()
    }

    async fn list_packages(&self) -> StoreResult<Vec<SubPackage>> {
        Ok(self.read()?.packages.values().cloned().collect())
    }

    async fn replace_package(
        &self,
        id: SubPackageId,
        request: &PackageRequest,
    ) -> StoreResult<SubPackage> {
        let mut tables = self.write()?;
        let package = tables
            .packages
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(PACKAGE, id))?;
        package.replace(request)?;
        Ok(package.clone())
    }

    async fn delete_package(&self, id: SubPackageId) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables.package(id)?;
        tables.remove_purchases_where(|p| p.package_id() == id);
        tables.packages.remove(&id);
        Ok(())
    }

    async fn accounts_of_package(&self, id: SubPackageId) -> StoreResult<Vec<Account>> {
        let tables = self.read()?;
        tables.package(id)?;
        let mut holders: Vec<AccountId> = tables
            .purchases
            .values()
            .filter(|p| p.package_id() == id)
            .map(|p| p.account_id())
            .collect();
        holders.sort_by_key(|a| a.to_string());
        holders.dedup();
        Ok(sorted_accounts(
            holders.iter().filter_map(|a| tables.accounts.get(a)),
        ))
    }

    async fn record_purchase(
        &self,
        account_id: AccountId,
        package_id: SubPackageId,
        price: i16,
    ) -> StoreResult<(Purchase, SubPackage)> {
        let mut tables = self.write()?;
        let package = tables.package(package_id)?.clone();
        ensure_purchasable(&package)?;
        let mut account = tables.account(account_id)?.clone();

        let purchase = settle(&mut account, &package, price, Utc::now())?;
        tables.accounts.insert(account.id(), account);
        tables.purchases.insert(purchase.id(), purchase.clone());
        Ok((purchase, package))
    }

    async fn get_purchase(&self, id: PurchaseId) -> StoreResult<Purchase> {
        self.read()?
            .purchases
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(PURCHASE, id).into())
    }

    async fn purchases_of_account(&self, id: AccountId) -> StoreResult<Vec<Purchase>> {
        let tables = self.read()?;
        tables.account(id)?;
        let mut out: Vec<Purchase> = tables
            .purchases
            .values()
            .filter(|p| p.account_id() == id)
            .cloned()
            .collect();
        out.sort_by_key(|p| (p.purchase_date(), p.id().to_string()));
        Ok(out)
    }

    async fn delete_purchase(&self, id: PurchaseId) -> StoreResult<()> {
        let mut tables = self.write()?;
        let purchase = tables
            .purchases
            .remove(&id)
            .ok_or_else(|| DomainError::not_found(PURCHASE, id))?;
        if let Some(account) = tables.accounts.get_mut(&purchase.account_id()) {
            refund(account, &purchase)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_customers::{AccountCreateRequest, CustomerCreateRequest, TariffType};
    use operator_packages::PackageType;
    use rust_decimal::Decimal;

    async fn customer(store: &InMemoryCoreStore) -> Customer {
        let c = Customer::register(
            &CustomerCreateRequest {
                name: "Ada".into(),
                surname: "Lovelace".into(),
                email: "ada@example.com".into(),
                password: "secret123".into(),
            },
            "hash".into(),
            Utc::now(),
        )
        .unwrap();
        store.insert_customer(&c).await.unwrap();
        c
    }

    async fn account(store: &InMemoryCoreStore, owner: CustomerId, balance: i64) -> Account {
        let a = Account::open(
            &AccountCreateRequest {
                customer_id: owner.to_string(),
                account_balance: Decimal::from(balance),
                tariff_type: TariffType::Premium,
            },
            owner,
            Utc::now(),
        )
        .unwrap();
        store.insert_account(&a).await.unwrap();
        a
    }

    async fn package(store: &InMemoryCoreStore, purchasable: bool) -> SubPackage {
        store
            .create_package(&PackageRequest {
                name: "Gold".into(),
                package_type: PackageType::Combo,
                duration: 30,
                purchasable,
            })
            .await
            .unwrap()
    }

    fn is_not_found<T: std::fmt::Debug>(res: StoreResult<T>) -> bool {
        matches!(res, Err(StoreError::Domain(DomainError::NotFound(_))))
    }

    #[tokio::test]
    async fn package_ids_are_sequential() {
        let store = InMemoryCoreStore::new();
        assert_eq!(package(&store, true).await.id(), SubPackageId(1));
        assert_eq!(package(&store, true).await.id(), SubPackageId(2));
    }

    #[tokio::test]
    async fn account_requires_existing_customer() {
        let store = InMemoryCoreStore::new();
        let ghost = CustomerId::new();
        let a = Account::open(
            &AccountCreateRequest {
                customer_id: ghost.to_string(),
                account_balance: Decimal::ZERO,
                tariff_type: TariffType::Standard,
            },
            ghost,
            Utc::now(),
        )
        .unwrap();
        assert!(is_not_found(store.insert_account(&a).await));
    }

    #[tokio::test]
    async fn deleting_customer_cascades_to_accounts_and_purchases() {
        let store = InMemoryCoreStore::new();
        let c = customer(&store).await;
        let a = account(&store, c.id(), 100).await;
        let p = package(&store, true).await;
        let (purchase, _) = store.record_purchase(a.id(), p.id(), 10).await.unwrap();

        store.delete_customer(c.id()).await.unwrap();

        assert!(is_not_found(store.get_customer(c.id()).await));
        assert!(is_not_found(store.get_account(a.id()).await));
        assert!(is_not_found(store.get_purchase(purchase.id()).await));
        assert!(store.get_package(p.id()).await.is_ok());
    }

    #[tokio::test]
    async fn deleting_package_removes_its_purchases_only() {
        let store = InMemoryCoreStore::new();
        let c = customer(&store).await;
        let a = account(&store, c.id(), 100).await;
        let gold = package(&store, true).await;
        let silver = package(&store, true).await;
        let (gone, _) = store.record_purchase(a.id(), gold.id(), 10).await.unwrap();
        let (kept, _) = store.record_purchase(a.id(), silver.id(), 10).await.unwrap();

        store.delete_package(gold.id()).await.unwrap();

        assert!(is_not_found(store.get_purchase(gone.id()).await));
        assert!(store.get_purchase(kept.id()).await.is_ok());
        assert!(store.get_account(a.id()).await.is_ok());
    }

    #[tokio::test]
    async fn purchase_debits_and_delete_refunds() {
        let store = InMemoryCoreStore::new();
        let c = customer(&store).await;
        let a = account(&store, c.id(), 100).await;
        let p = package(&store, true).await;

        let (purchase, bought) = store.record_purchase(a.id(), p.id(), 30).await.unwrap();
        assert_eq!(bought, p);
        assert_eq!(
            store.get_account(a.id()).await.unwrap().account_balance(),
            Decimal::from(70)
        );

        store.delete_purchase(purchase.id()).await.unwrap();
        assert_eq!(
            store.get_account(a.id()).await.unwrap().account_balance(),
            Decimal::from(100)
        );
        assert!(is_not_found(store.delete_purchase(purchase.id()).await));
    }

    #[tokio::test]
    async fn purchase_failures_leave_balance_untouched() {
        let store = InMemoryCoreStore::new();
        let c = customer(&store).await;
        let a = account(&store, c.id(), 5).await;
        let open = package(&store, true).await;
        let closed = package(&store, false).await;

        let err = store.record_purchase(a.id(), open.id(), 10).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::InsufficientFunds(_))));

        let err = store.record_purchase(a.id(), closed.id(), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::PurchaseNotPossible(_))));

        assert_eq!(
            store.get_account(a.id()).await.unwrap().account_balance(),
            Decimal::from(5)
        );
    }

    #[tokio::test]
    async fn unknown_package_is_reported_before_unknown_account() {
        let store = InMemoryCoreStore::new();
        let err = store
            .record_purchase(AccountId::new(), SubPackageId(99), 1)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Domain(DomainError::NotFound(
                "No package found with this id: 99".into()
            ))
        );
    }

    #[tokio::test]
    async fn accounts_of_package_are_distinct() {
        let store = InMemoryCoreStore::new();
        let c = customer(&store).await;
        let a = account(&store, c.id(), 100).await;
        let b = account(&store, c.id(), 100).await;
        let p = package(&store, true).await;
        store.record_purchase(a.id(), p.id(), 1).await.unwrap();
        store.record_purchase(a.id(), p.id(), 1).await.unwrap();
        store.record_purchase(b.id(), p.id(), 1).await.unwrap();

        let holders = store.accounts_of_package(p.id()).await.unwrap();
        assert_eq!(holders.len(), 2);
    }

    #[tokio::test]
    async fn failed_account_update_keeps_previous_state() {
        let store = InMemoryCoreStore::new();
        let c = customer(&store).await;
        let a = account(&store, c.id(), 100).await;

        let res = store
            .update_account(
                a.id(),
                &AccountUpdateRequest {
                    account_balance: Decimal::NEGATIVE_ONE,
                    tariff_type: TariffType::Economy,
                },
            )
            .await;
        assert!(matches!(res, Err(StoreError::Domain(DomainError::Validation(_)))));
        assert_eq!(store.get_account(a.id()).await.unwrap(), a);
    }
}
