use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use validator::Validate;

use operator_core::{
    parse_or_not_found, AccountId, CustomerId, DomainError, Entity, PurchaseId, SubPackageId,
};
use operator_customers::{
    hash_password, Account, AccountCreateRequest, AccountUpdateRequest, Customer,
    CustomerCreateRequest, CustomerUpdateRequest,
};
use operator_events::{Envelope, EventBus, InMemoryEventBus};
use operator_infra::config::CoreConfig;
use operator_infra::event_bus::RedisPubSubEventBus;
use operator_infra::store::{CoreStore, InMemoryCoreStore, PostgresCoreStore, StoreError, StoreResult};
use operator_packages::{PackageRequest, SubPackage};
use operator_purchasing::{ensure_purchasable, PurchaseCreateRequest};

use super::dto::{
    account_dto, customer_dto, holder_dto, owned_account_dto, package_dto, purchase_dto,
    AccountDto, CustomerDto, OwnedAccountDto, PackageDto, PackageHolderDto, PurchaseDto,
};

const CUSTOMER: &str = "customer";
const ACCOUNT: &str = "account";
const PACKAGE: &str = "package";
const PURCHASE: &str = "purchase";

/// Publishes confirmed purchases for the notification service.
///
/// Delivery is best effort: a failed publish is logged and never fails the
/// purchase that triggered it.
#[derive(Clone)]
pub enum PurchaseNotifier {
    InMemory {
        bus: Arc<InMemoryEventBus<Envelope>>,
        channel: String,
    },
    Redis(Arc<RedisPubSubEventBus>),
}

impl PurchaseNotifier {
    pub fn in_memory(bus: Arc<InMemoryEventBus<Envelope>>, channel: impl Into<String>) -> Self {
        Self::InMemory {
            bus,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        match self {
            Self::InMemory { channel, .. } => channel,
            Self::Redis(bus) => bus.channel(),
        }
    }

    pub async fn publish(&self, purchase: &PurchaseDto) {
        let envelope = match Envelope::wrap(self.channel(), purchase) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(purchase_id = %purchase.id, error = %e, "failed to encode purchase notification");
                return;
            }
        };

        let result = match self {
            Self::InMemory { bus, .. } => bus.publish(envelope).map_err(|e| e.to_string()),
            Self::Redis(bus) => {
                // PUBLISH is a blocking round trip.
                let bus = Arc::clone(bus);
                match tokio::task::spawn_blocking(move || bus.publish(envelope)).await {
                    Ok(res) => res.map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                }
            }
        };

        match result {
            Ok(()) => info!(purchase_id = %purchase.id, channel = self.channel(), "purchase notification published"),
            Err(e) => warn!(purchase_id = %purchase.id, error = %e, "failed to publish purchase notification"),
        }
    }
}

/// Use cases of the core service, on top of a [`CoreStore`].
///
/// Path ids arrive as raw strings; an id that does not parse is reported the
/// same way as one that names no row.
pub struct AppServices {
    store: Arc<dyn CoreStore>,
    notifier: PurchaseNotifier,
}

impl AppServices {
    pub fn new(store: Arc<dyn CoreStore>, notifier: PurchaseNotifier) -> Self {
        Self { store, notifier }
    }

    /// In-memory store with an in-process bus.
    pub fn in_memory(bus: Arc<InMemoryEventBus<Envelope>>, channel: impl Into<String>) -> Self {
        Self::new(
            Arc::new(InMemoryCoreStore::new()),
            PurchaseNotifier::in_memory(bus, channel),
        )
    }

    // -------------------------
    // Customers
    // -------------------------

    pub async fn create_customer(&self, request: CustomerCreateRequest) -> StoreResult<CustomerDto> {
        request.validate().map_err(DomainError::from)?;
        let hash = hash_off_thread(request.password.clone()).await?;
        let customer = Customer::register(&request, hash, Utc::now())?;
        self.store.insert_customer(&customer).await?;
        info!(customer_id = %customer.id(), "customer created");
        Ok(customer_dto(&customer, Vec::new()))
    }

    pub async fn list_customers(&self) -> StoreResult<Vec<CustomerDto>> {
        let customers = self.store.list_customers().await?;
        let mut out = Vec::with_capacity(customers.len());
        for customer in &customers {
            out.push(self.customer_view(customer).await?);
        }
        Ok(out)
    }

    pub async fn get_customer(&self, id: &str) -> StoreResult<CustomerDto> {
        let id: CustomerId = parse_or_not_found(id, CUSTOMER)?;
        let customer = self.store.get_customer(id).await?;
        self.customer_view(&customer).await
    }

    pub async fn update_customer(
        &self,
        id: &str,
        request: CustomerUpdateRequest,
    ) -> StoreResult<CustomerDto> {
        request.validate().map_err(DomainError::from)?;
        let id: CustomerId = parse_or_not_found(id, CUSTOMER)?;
        let mut customer = self.store.get_customer(id).await?;

        let hash = hash_off_thread(request.password.clone()).await?;
        customer.change_credentials(&request, hash)?;
        self.store.update_customer(&customer).await?;
        info!(customer_id = %id, "customer credentials updated");
        self.customer_view(&customer).await
    }

    pub async fn delete_customer(&self, id: &str) -> StoreResult<()> {
        let id: CustomerId = parse_or_not_found(id, CUSTOMER)?;
        self.store.delete_customer(id).await?;
        info!(customer_id = %id, "customer deleted");
        Ok(())
    }

    pub async fn customer_accounts(&self, id: &str) -> StoreResult<Vec<OwnedAccountDto>> {
        let id: CustomerId = parse_or_not_found(id, CUSTOMER)?;
        let accounts = self.store.accounts_of_customer(id).await?;
        let mut out = Vec::with_capacity(accounts.len());
        for account in &accounts {
            out.push(owned_account_dto(account, self.purchase_views(account.id()).await?));
        }
        Ok(out)
    }

    // -------------------------
    // Accounts
    // -------------------------

    pub async fn create_account(&self, request: AccountCreateRequest) -> StoreResult<AccountDto> {
        request.validate().map_err(DomainError::from)?;
        let owner_id: CustomerId = parse_or_not_found(&request.customer_id, CUSTOMER)?;
        let owner = self.store.get_customer(owner_id).await?;

        let account = Account::open(&request, owner_id, Utc::now())?;
        self.store.insert_account(&account).await?;
        info!(account_id = %account.id(), customer_id = %owner_id, "account opened");
        Ok(account_dto(&account, &owner, Vec::new()))
    }

    pub async fn list_accounts(&self) -> StoreResult<Vec<AccountDto>> {
        let accounts = self.store.list_accounts().await?;
        let mut owners: HashMap<CustomerId, Customer> = HashMap::new();
        let mut out = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let owner = match owners.get(&account.customer_id()) {
                Some(owner) => owner.clone(),
                None => {
                    let owner = self.store.get_customer(account.customer_id()).await?;
                    owners.insert(owner.id(), owner.clone());
                    owner
                }
            };
            out.push(account_dto(account, &owner, self.purchase_views(account.id()).await?));
        }
        Ok(out)
    }

    pub async fn get_account(&self, id: &str) -> StoreResult<AccountDto> {
        let id: AccountId = parse_or_not_found(id, ACCOUNT)?;
        let account = self.store.get_account(id).await?;
        self.account_view(&account).await
    }

    pub async fn update_account(
        &self,
        id: &str,
        request: AccountUpdateRequest,
    ) -> StoreResult<AccountDto> {
        request.validate().map_err(DomainError::from)?;
        let id: AccountId = parse_or_not_found(id, ACCOUNT)?;
        let account = self.store.update_account(id, &request).await?;
        info!(account_id = %id, tariff = account.tariff_type().as_str(), "account updated");
        self.account_view(&account).await
    }

    pub async fn delete_account(&self, id: &str) -> StoreResult<()> {
        let id: AccountId = parse_or_not_found(id, ACCOUNT)?;
        self.store.delete_account(id).await?;
        info!(account_id = %id, "account deleted");
        Ok(())
    }

    pub async fn account_purchases(&self, id: &str) -> StoreResult<Vec<PurchaseDto>> {
        let id: AccountId = parse_or_not_found(id, ACCOUNT)?;
        self.purchase_views(id).await
    }

    // -------------------------
    // Packages
    // -------------------------

    pub async fn create_package(&self, request: PackageRequest) -> StoreResult<PackageDto> {
        let package = self.store.create_package(&request).await?;
        info!(package_id = %package.id(), name = package.name(), "package created");
        Ok(package_dto(&package))
    }

    pub async fn list_packages(&self) -> StoreResult<Vec<PackageDto>> {
        Ok(self.store.list_packages().await?.iter().map(package_dto).collect())
    }

    pub async fn get_package(&self, id: &str) -> StoreResult<PackageDto> {
        let id: SubPackageId = parse_or_not_found(id, PACKAGE)?;
        Ok(package_dto(&self.store.get_package(id).await?))
    }

    pub async fn replace_package(&self, id: &str, request: PackageRequest) -> StoreResult<PackageDto> {
        let id: SubPackageId = parse_or_not_found(id, PACKAGE)?;
        let package = self.store.replace_package(id, &request).await?;
        info!(package_id = %id, "package replaced");
        Ok(package_dto(&package))
    }

    pub async fn delete_package(&self, id: &str) -> StoreResult<()> {
        let id: SubPackageId = parse_or_not_found(id, PACKAGE)?;
        self.store.delete_package(id).await?;
        info!(package_id = %id, "package deleted");
        Ok(())
    }

    pub async fn package_accounts(&self, id: &str) -> StoreResult<Vec<PackageHolderDto>> {
        let id: SubPackageId = parse_or_not_found(id, PACKAGE)?;
        let holders = self.store.accounts_of_package(id).await?;
        let mut out = Vec::with_capacity(holders.len());
        for account in &holders {
            let owner = self.store.get_customer(account.customer_id()).await?;
            out.push(holder_dto(account, &owner));
        }
        Ok(out)
    }

    // -------------------------
    // Purchases
    // -------------------------

    /// Settle a purchase, then publish it to the notification channel.
    ///
    /// Returns the purchase together with the id of the account that paid.
    pub async fn create_purchase(
        &self,
        request: PurchaseCreateRequest,
    ) -> StoreResult<(PurchaseDto, AccountId)> {
        info!(
            account_id = %request.account_id,
            sub_package_id = request.sub_package_id,
            package_price = request.package_price,
            "Received order"
        );
        request.validated()?;

        let package_id = SubPackageId(request.sub_package_id);
        let account_id = match request.account_id.parse::<AccountId>() {
            Ok(id) => id,
            Err(_) => {
                // Package problems are reported before account problems.
                let package = self.store.get_package(package_id).await?;
                ensure_purchasable(&package)?;
                return Err(DomainError::not_found(ACCOUNT, request.account_id.trim()).into());
            }
        };

        let (purchase, package) = self
            .store
            .record_purchase(account_id, package_id, request.package_price)
            .await?;
        let dto = purchase_dto(&purchase, &package);
        info!(purchase_id = %purchase.id(), account_id = %account_id, "purchase settled");

        self.notifier.publish(&dto).await;
        Ok((dto, account_id))
    }

    pub async fn get_purchase(&self, id: &str) -> StoreResult<(PurchaseDto, AccountId)> {
        let id: PurchaseId = parse_or_not_found(id, PURCHASE)?;
        let purchase = self.store.get_purchase(id).await?;
        let package = self.store.get_package(purchase.package_id()).await?;
        Ok((purchase_dto(&purchase, &package), purchase.account_id()))
    }

    pub async fn delete_purchase(&self, id: &str) -> StoreResult<()> {
        let id: PurchaseId = parse_or_not_found(id, PURCHASE)?;
        self.store.delete_purchase(id).await?;
        info!(purchase_id = %id, "purchase deleted and refunded");
        Ok(())
    }

    // -------------------------
    // Graph loading
    // -------------------------

    async fn customer_view(&self, customer: &Customer) -> StoreResult<CustomerDto> {
        let accounts = self.store.accounts_of_customer(customer.id()).await?;
        let mut owned = Vec::with_capacity(accounts.len());
        for account in &accounts {
            owned.push(owned_account_dto(account, self.purchase_views(account.id()).await?));
        }
        Ok(customer_dto(customer, owned))
    }

    async fn account_view(&self, account: &Account) -> StoreResult<AccountDto> {
        let owner = self.store.get_customer(account.customer_id()).await?;
        let purchases = self.purchase_views(account.id()).await?;
        Ok(account_dto(account, &owner, purchases))
    }

    async fn purchase_views(&self, account: AccountId) -> StoreResult<Vec<PurchaseDto>> {
        let purchases = self.store.purchases_of_account(account).await?;
        let mut packages: HashMap<SubPackageId, SubPackage> = HashMap::new();
        let mut out = Vec::with_capacity(purchases.len());
        for purchase in &purchases {
            let package = match packages.get(&purchase.package_id()) {
                Some(package) => package.clone(),
                None => {
                    let package = self.store.get_package(purchase.package_id()).await?;
                    packages.insert(package.id(), package.clone());
                    package
                }
            };
            out.push(purchase_dto(purchase, &package));
        }
        Ok(out)
    }
}

async fn hash_off_thread(password: String) -> StoreResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| StoreError::Database(format!("password hashing task failed: {e}")))?
        .map_err(StoreError::from)
}

/// Wire the services from configuration: Postgres and Redis when persistent
/// stores are enabled, otherwise in-memory store and bus.
pub async fn build_services(config: &CoreConfig) -> anyhow::Result<AppServices> {
    match &config.persistent {
        Some(stores) => {
            let store = PostgresCoreStore::connect(&stores.database_url).await?;
            let bus = RedisPubSubEventBus::new(&stores.redis_url, &config.notification_channel)?;
            info!(channel = %config.notification_channel, "using postgres store and redis pub/sub");
            Ok(AppServices::new(
                Arc::new(store),
                PurchaseNotifier::Redis(Arc::new(bus)),
            ))
        }
        None => {
            warn!("USE_PERSISTENT_STORES is off; data lives in memory and notifications stay in-process");
            Ok(AppServices::in_memory(
                Arc::new(InMemoryEventBus::new()),
                config.notification_channel.clone(),
            ))
        }
    }
}
