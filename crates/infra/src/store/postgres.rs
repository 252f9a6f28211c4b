//! Postgres-backed core store.
//!
//! Multi-row operations run in one transaction; an uncommitted transaction is
//! rolled back when dropped, so every early `?` return leaves the database
//! untouched. Balance changes lock the account row with `FOR UPDATE`.
//!
//! Row locks are always taken in the order customer, accounts (by id), then
//! purchases. Deleting a row with dependants locks the dependants' owners
//! first, so no transaction waits on a purchase while holding its account.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError |
//! |------------|-----------------|------------|
//! | Database (foreign key violation) | `23503` | `Database` (callers check references first) |
//! | Database (check constraint violation) | `23514` | `Database` |
//! | Database (other) / PoolClosed / other | any | `Database` |

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use operator_core::{AccountId, CustomerId, DomainError, Entity, PurchaseId, SubPackageId};
use operator_customers::{Account, AccountUpdateRequest, Customer, TariffType};
use operator_packages::{PackageRequest, PackageType, SubPackage};
use operator_purchasing::{Purchase, ensure_purchasable, refund, settle};
use validator::Validate;

use super::{ACCOUNT, CUSTOMER, CoreStore, PACKAGE, PURCHASE, StoreError, StoreResult};

const ACCOUNT_COLUMNS: &str = "id, customer_id, creation_date, account_balance, tariff_type";
const PURCHASE_COLUMNS: &str = "id, account_id, package_id, purchase_date, package_price";

#[derive(Debug, Clone)]
pub struct PostgresCoreStore {
    pool: Arc<PgPool>,
}

impl PostgresCoreStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        info!("core schema migrations applied");

        Ok(Self::new(pool))
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> StoreResult<()> {
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }
}

#[async_trait]
impl CoreStore for PostgresCoreStore {
    #[instrument(skip(self, customer), fields(customer_id = %customer.id()), err)]
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, creation_date, name, surname, email, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(customer.id().as_uuid())
        .bind(customer.creation_date())
        .bind(customer.name())
        .bind(customer.surname())
        .bind(customer.email())
        .bind(customer.password_hash())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, id), fields(customer_id = %id), err)]
    async fn get_customer(&self, id: CustomerId) -> StoreResult<Customer> {
        let row = sqlx::query(
            "SELECT id, creation_date, name, surname, email, password_hash FROM customers WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_customer", e))?
        .ok_or_else(|| DomainError::not_found(CUSTOMER, id))?;
        customer_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list_customers(&self) -> StoreResult<Vec<Customer>> {
        let rows = sqlx::query(
            "SELECT id, creation_date, name, surname, email, password_hash FROM customers ORDER BY creation_date, id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_customers", e))?;
        rows.iter().map(customer_from_row).collect()
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id()), err)]
    async fn update_customer(&self, customer: &Customer) -> StoreResult<()> {
        let done = sqlx::query("UPDATE customers SET email = $2, password_hash = $3 WHERE id = $1")
            .bind(customer.id().as_uuid())
            .bind(customer.email())
            .bind(customer.password_hash())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_customer", e))?;
        if done.rows_affected() == 0 {
            return Err(DomainError::not_found(CUSTOMER, customer.id()).into());
        }
        Ok(())
    }

    #[instrument(skip(self, id), fields(customer_id = %id), err)]
    async fn delete_customer(&self, id: CustomerId) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        let exists = sqlx::query("SELECT id FROM customers WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_customer", e))?;
        if exists.is_none() {
            return Err(DomainError::not_found(CUSTOMER, id).into());
        }

        // Purchases settled against these accounts wait for us from here on.
        sqlx::query("SELECT id FROM accounts WHERE customer_id = $1 ORDER BY id FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_customer_accounts", e))?;

        sqlx::query(
            "DELETE FROM purchases WHERE account_id IN (SELECT id FROM accounts WHERE customer_id = $1)",
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_customer_purchases", e))?;

        sqlx::query("DELETE FROM accounts WHERE customer_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_customer_accounts", e))?;

        sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_customer", e))?;

        Self::commit(tx).await
    }

    #[instrument(skip(self, account), fields(account_id = %account.id(), customer_id = %account.customer_id()), err)]
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        // Key-share lock keeps the owner from being deleted before commit.
        let owner = sqlx::query("SELECT id FROM customers WHERE id = $1 FOR KEY SHARE")
            .bind(account.customer_id().as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_customer", e))?;
        if owner.is_none() {
            return Err(DomainError::not_found(CUSTOMER, account.customer_id()).into());
        }

        sqlx::query(
            r#"
            INSERT INTO accounts (id, customer_id, creation_date, account_balance, tariff_type)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.id().as_uuid())
        .bind(account.customer_id().as_uuid())
        .bind(account.creation_date())
        .bind(account.account_balance())
        .bind(account.tariff_type().as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;

        Self::commit(tx).await
    }

    #[instrument(skip(self, id), fields(account_id = %id), err)]
    async fn get_account(&self, id: AccountId) -> StoreResult<Account> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_account", e))?
            .ok_or_else(|| DomainError::not_found(ACCOUNT, id))?;
        account_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY creation_date, id"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;
        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self, id), fields(customer_id = %id), err)]
    async fn accounts_of_customer(&self, id: CustomerId) -> StoreResult<Vec<Account>> {
        self.get_customer(id).await?;
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE customer_id = $1 ORDER BY creation_date, id"
        ))
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts_of_customer", e))?;
        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self, id), fields(account_id = %id), err)]
    async fn update_account(
        &self,
        id: AccountId,
        request: &AccountUpdateRequest,
    ) -> StoreResult<Account> {
        let mut tx = self.begin().await?;
        let mut account = lock_account(&mut tx, id).await?;
        account.apply_update(request)?;
        write_account(&mut tx, &account).await?;
        Self::commit(tx).await?;
        Ok(account)
    }

    #[instrument(skip(self, id), fields(account_id = %id), err)]
    async fn delete_account(&self, id: AccountId) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        lock_account(&mut tx, id).await?;

        sqlx::query("DELETE FROM purchases WHERE account_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_account_purchases", e))?;

        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_account", e))?;

        Self::commit(tx).await
    }

    #[instrument(skip(self), err)]
    async fn create_package(&self, request: &PackageRequest) -> StoreResult<SubPackage> {
        request.validate().map_err(DomainError::from)?;

        let row = sqlx::query(
            r#"
            INSERT INTO sub_packages (name, package_type, duration, purchasable)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(request.name.trim())
        .bind(request.package_type.as_str())
        .bind(request.duration)
        .bind(request.purchasable)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_package", e))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("create_package", e))?;
        Ok(SubPackage::define(SubPackageId(id), request)?)
    }

    #[instrument(skip(self, id), fields(package_id = %id), err)]
    async fn get_package(&self, id: SubPackageId) -> StoreResult<SubPackage> {
        let row = sqlx::query(
            "SELECT id, name, package_type, duration, purchasable FROM sub_packages WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_package", e))?
        .ok_or_else(|| DomainError::not_found(PACKAGE, id))?;
        package_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn list_packages(&self) -> StoreResult<Vec<SubPackage>> {
        let rows = sqlx::query(
            "SELECT id, name, package_type, duration, purchasable FROM sub_packages ORDER BY id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_packages", e))?;
        rows.iter().map(package_from_row).collect()
    }

    #[instrument(skip(self, id), fields(package_id = %id), err)]
    async fn replace_package(
        &self,
        id: SubPackageId,
        request: &PackageRequest,
    ) -> StoreResult<SubPackage> {
        let mut tx = self.begin().await?;
        let row = sqlx::query(
            "SELECT id, name, package_type, duration, purchasable FROM sub_packages WHERE id = $1 FOR UPDATE",
        )
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_package", e))?
        .ok_or_else(|| DomainError::not_found(PACKAGE, id))?;

        let mut package = package_from_row(&row)?;
        package.replace(request)?;

        sqlx::query(
            r#"
            UPDATE sub_packages
            SET name = $2, package_type = $3, duration = $4, purchasable = $5
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(package.name())
        .bind(package.package_type().as_str())
        .bind(package.duration())
        .bind(package.is_purchasable())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace_package", e))?;

        Self::commit(tx).await?;
        Ok(package)
    }

    #[instrument(skip(self, id), fields(package_id = %id), err)]
    async fn delete_package(&self, id: SubPackageId) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        let exists = sqlx::query("SELECT id FROM sub_packages WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_package", e))?;
        if exists.is_none() {
            return Err(DomainError::not_found(PACKAGE, id).into());
        }

        sqlx::query("DELETE FROM purchases WHERE package_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_package_purchases", e))?;

        sqlx::query("DELETE FROM sub_packages WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_package", e))?;

        Self::commit(tx).await
    }

    #[instrument(skip(self, id), fields(package_id = %id), err)]
    async fn accounts_of_package(&self, id: SubPackageId) -> StoreResult<Vec<Account>> {
        self.get_package(id).await?;
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS} FROM accounts
            WHERE id IN (SELECT DISTINCT account_id FROM purchases WHERE package_id = $1)
            ORDER BY creation_date, id
            "#
        ))
        .bind(id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts_of_package", e))?;
        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self, account_id, package_id), fields(account_id = %account_id, package_id = %package_id), err)]
    async fn record_purchase(
        &self,
        account_id: AccountId,
        package_id: SubPackageId,
        price: i16,
    ) -> StoreResult<(Purchase, SubPackage)> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(
            "SELECT id, name, package_type, duration, purchasable FROM sub_packages WHERE id = $1 FOR SHARE",
        )
        .bind(package_id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_package", e))?
        .ok_or_else(|| DomainError::not_found(PACKAGE, package_id))?;
        let package = package_from_row(&row)?;
        ensure_purchasable(&package)?;

        let mut account = lock_account(&mut tx, account_id).await?;
        let purchase = settle(&mut account, &package, price, Utc::now())?;
        write_account(&mut tx, &account).await?;

        sqlx::query(&format!(
            "INSERT INTO purchases ({PURCHASE_COLUMNS}) VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(purchase.id().as_uuid())
        .bind(purchase.account_id().as_uuid())
        .bind(purchase.package_id().get())
        .bind(purchase.purchase_date())
        .bind(purchase.package_price())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_purchase", e))?;

        Self::commit(tx).await?;
        Ok((purchase, package))
    }

    #[instrument(skip(self, id), fields(purchase_id = %id), err)]
    async fn get_purchase(&self, id: PurchaseId) -> StoreResult<Purchase> {
        let row = sqlx::query(&format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_purchase", e))?
            .ok_or_else(|| DomainError::not_found(PURCHASE, id))?;
        purchase_from_row(&row)
    }

    #[instrument(skip(self, id), fields(account_id = %id), err)]
    async fn purchases_of_account(&self, id: AccountId) -> StoreResult<Vec<Purchase>> {
        self.get_account(id).await?;
        let rows = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE account_id = $1 ORDER BY purchase_date, id"
        ))
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("purchases_of_account", e))?;
        rows.iter().map(purchase_from_row).collect()
    }

    #[instrument(skip(self, id), fields(purchase_id = %id), err)]
    async fn delete_purchase(&self, id: PurchaseId) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        // Unlocked read to find the owner; the account is locked before the
        // purchase row is touched.
        let owner: Uuid = sqlx::query("SELECT account_id FROM purchases WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("find_purchase", e))?
            .ok_or_else(|| DomainError::not_found(PURCHASE, id))?
            .try_get("account_id")
            .map_err(|e| map_sqlx_error("find_purchase", e))?;

        // A vanished account took the purchase with it.
        let mut account = match lock_account(&mut tx, AccountId::from_uuid(owner)).await {
            Err(StoreError::Domain(DomainError::NotFound(_))) => {
                return Err(DomainError::not_found(PURCHASE, id).into());
            }
            other => other?,
        };

        let row = sqlx::query(&format!(
            "DELETE FROM purchases WHERE id = $1 RETURNING {PURCHASE_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_purchase", e))?
        .ok_or_else(|| DomainError::not_found(PURCHASE, id))?;
        let purchase = purchase_from_row(&row)?;

        refund(&mut account, &purchase)?;
        write_account(&mut tx, &account).await?;

        Self::commit(tx).await
    }
}

async fn lock_account(tx: &mut Transaction<'static, Postgres>, id: AccountId) -> StoreResult<Account> {
    let row = sqlx::query(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_account", e))?
    .ok_or_else(|| DomainError::not_found(ACCOUNT, id))?;
    account_from_row(&row)
}

async fn write_account(tx: &mut Transaction<'static, Postgres>, account: &Account) -> StoreResult<()> {
    sqlx::query("UPDATE accounts SET account_balance = $2, tariff_type = $3 WHERE id = $1")
        .bind(account.id().as_uuid())
        .bind(account.account_balance())
        .bind(account.tariff_type().as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_account", e))?;
    Ok(())
}

fn customer_from_row(row: &PgRow) -> StoreResult<Customer> {
    let decode = |e| map_sqlx_error("decode_customer", e);
    Ok(Customer::restore(
        CustomerId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        row.try_get::<DateTime<Utc>, _>("creation_date").map_err(decode)?,
        row.try_get("name").map_err(decode)?,
        row.try_get("surname").map_err(decode)?,
        row.try_get("email").map_err(decode)?,
        row.try_get("password_hash").map_err(decode)?,
    ))
}

fn account_from_row(row: &PgRow) -> StoreResult<Account> {
    let decode = |e| map_sqlx_error("decode_account", e);
    let tariff: String = row.try_get("tariff_type").map_err(decode)?;
    Ok(Account::restore(
        AccountId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id").map_err(decode)?),
        row.try_get::<DateTime<Utc>, _>("creation_date").map_err(decode)?,
        row.try_get::<Decimal, _>("account_balance").map_err(decode)?,
        TariffType::from_str(&tariff).map_err(corrupt_column)?,
    ))
}

fn package_from_row(row: &PgRow) -> StoreResult<SubPackage> {
    let decode = |e| map_sqlx_error("decode_package", e);
    let package_type: String = row.try_get("package_type").map_err(decode)?;
    Ok(SubPackage::restore(
        SubPackageId(row.try_get::<i64, _>("id").map_err(decode)?),
        row.try_get("name").map_err(decode)?,
        PackageType::from_str(&package_type).map_err(corrupt_column)?,
        row.try_get::<i64, _>("duration").map_err(decode)?,
        row.try_get::<bool, _>("purchasable").map_err(decode)?,
    ))
}

fn purchase_from_row(row: &PgRow) -> StoreResult<Purchase> {
    let decode = |e| map_sqlx_error("decode_purchase", e);
    Ok(Purchase::restore(
        PurchaseId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        AccountId::from_uuid(row.try_get::<Uuid, _>("account_id").map_err(decode)?),
        SubPackageId(row.try_get::<i64, _>("package_id").map_err(decode)?),
        row.try_get::<DateTime<Utc>, _>("purchase_date").map_err(decode)?,
        row.try_get::<i16, _>("package_price").map_err(decode)?,
    ))
}

fn corrupt_column(err: DomainError) -> StoreError {
    StoreError::Database(format!("corrupt enum column: {err}"))
}

/// Map SQLx errors to store errors with operation context.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            let kind = match code.as_str() {
                "23503" => "foreign key violation",
                "23514" => "check constraint violation",
                "23505" => "unique violation",
                _ => "database error",
            };
            StoreError::Database(format!("{kind} in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Database(format!("sqlx error in {operation}: {other}")),
    }
}
