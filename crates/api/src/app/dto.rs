//! Response representations and their hypermedia links.
//!
//! Each traversal path gets its own type, so a nested representation only
//! carries the fields that path shows: a customer seen from an account has no
//! `accounts`, an account seen from a customer has no `customer`. Mapping is
//! done from already-loaded entities and never reaches back into the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use operator_core::{AccountId, CustomerId, Entity, PurchaseId, SubPackageId};
use operator_customers::{Account, Customer, TariffType};
use operator_packages::{PackageType, SubPackage};
use operator_purchasing::Purchase;

// -------------------------
// Links
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
}

pub type Links = BTreeMap<&'static str, Link>;

/// A representation plus its `_links`.
#[derive(Debug, Clone, Serialize)]
pub struct Resource<T> {
    #[serde(flatten)]
    pub body: T,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl<T> Resource<T> {
    pub fn new(body: T) -> Self {
        Self {
            body,
            links: Links::new(),
        }
    }

    pub fn link(mut self, rel: &'static str, href: String) -> Self {
        self.links.insert(rel, Link { href });
        self
    }
}

/// A list of resources under `_embedded.<rel>`, with a `self` link.
#[derive(Debug, Clone, Serialize)]
pub struct Collection<T> {
    #[serde(rename = "_embedded")]
    pub embedded: BTreeMap<&'static str, Vec<T>>,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl<T> Collection<T> {
    pub fn new(rel: &'static str, items: Vec<T>, self_href: String) -> Self {
        let mut links = Links::new();
        links.insert("self", Link { href: self_href });
        Self {
            embedded: BTreeMap::from([(rel, items)]),
            links,
        }
    }
}

pub mod href {
    use super::*;

    pub fn customers() -> String {
        "/v1/customers".to_string()
    }

    pub fn customer(id: CustomerId) -> String {
        format!("/v1/customers/{id}")
    }

    pub fn customer_accounts(id: CustomerId) -> String {
        format!("/v1/customers/{id}/accounts")
    }

    pub fn accounts() -> String {
        "/v1/accounts".to_string()
    }

    pub fn account(id: AccountId) -> String {
        format!("/v1/accounts/{id}")
    }

    pub fn account_purchases(id: AccountId) -> String {
        format!("/v1/accounts/{id}/purchases")
    }

    pub fn packages() -> String {
        "/v1/packages".to_string()
    }

    pub fn package(id: SubPackageId) -> String {
        format!("/v1/packages/{id}")
    }

    pub fn package_accounts(id: SubPackageId) -> String {
        format!("/v1/packages/{id}/accounts")
    }

    pub fn purchase(id: PurchaseId) -> String {
        format!("/v1/purchases/{id}")
    }
}

// -------------------------
// Representations
// -------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDto {
    pub id: SubPackageId,
    pub name: String,
    pub package_type: PackageType,
    pub duration: i64,
    pub purchasable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDto {
    pub id: PurchaseId,
    pub purchase_date: DateTime<Utc>,
    pub package_price: i16,
    pub sub_package: PackageDto,
}

/// Customer as seen from one of its accounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummaryDto {
    pub id: CustomerId,
    pub creation_date: DateTime<Utc>,
    pub name: String,
    pub surname: String,
    pub email: String,
}

/// Account as seen from its owning customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedAccountDto {
    pub id: AccountId,
    pub creation_date: DateTime<Utc>,
    pub tariff_type: TariffType,
    pub account_balance: Decimal,
    pub purchases: Vec<PurchaseDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    pub id: CustomerId,
    pub creation_date: DateTime<Utc>,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub accounts: Vec<OwnedAccountDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub id: AccountId,
    pub creation_date: DateTime<Utc>,
    pub customer: CustomerSummaryDto,
    pub tariff_type: TariffType,
    pub account_balance: Decimal,
    pub purchases: Vec<PurchaseDto>,
}

/// Account as seen from a package it bought.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageHolderDto {
    pub id: AccountId,
    pub customer: CustomerSummaryDto,
}

// -------------------------
// Mapping
// -------------------------

pub fn package_dto(package: &SubPackage) -> PackageDto {
    PackageDto {
        id: package.id(),
        name: package.name().to_string(),
        package_type: package.package_type(),
        duration: package.duration(),
        purchasable: package.is_purchasable(),
    }
}

pub fn purchase_dto(purchase: &Purchase, package: &SubPackage) -> PurchaseDto {
    PurchaseDto {
        id: purchase.id(),
        purchase_date: purchase.purchase_date(),
        package_price: purchase.package_price(),
        sub_package: package_dto(package),
    }
}

pub fn customer_summary(customer: &Customer) -> CustomerSummaryDto {
    CustomerSummaryDto {
        id: customer.id(),
        creation_date: customer.creation_date(),
        name: customer.name().to_string(),
        surname: customer.surname().to_string(),
        email: customer.email().to_string(),
    }
}

pub fn owned_account_dto(account: &Account, purchases: Vec<PurchaseDto>) -> OwnedAccountDto {
    OwnedAccountDto {
        id: account.id(),
        creation_date: account.creation_date(),
        tariff_type: account.tariff_type(),
        account_balance: account.account_balance(),
        purchases,
    }
}

pub fn customer_dto(customer: &Customer, accounts: Vec<OwnedAccountDto>) -> CustomerDto {
    CustomerDto {
        id: customer.id(),
        creation_date: customer.creation_date(),
        name: customer.name().to_string(),
        surname: customer.surname().to_string(),
        email: customer.email().to_string(),
        accounts,
    }
}

pub fn account_dto(account: &Account, owner: &Customer, purchases: Vec<PurchaseDto>) -> AccountDto {
    AccountDto {
        id: account.id(),
        creation_date: account.creation_date(),
        customer: customer_summary(owner),
        tariff_type: account.tariff_type(),
        account_balance: account.account_balance(),
        purchases,
    }
}

pub fn holder_dto(account: &Account, owner: &Customer) -> PackageHolderDto {
    PackageHolderDto {
        id: account.id(),
        customer: customer_summary(owner),
    }
}

// -------------------------
// Linked resources
// -------------------------

pub fn customer_resource(dto: CustomerDto) -> Resource<CustomerDto> {
    let id = dto.id;
    Resource::new(dto)
        .link("self", href::customer(id))
        .link("collection", href::customers())
        .link("accounts", href::customer_accounts(id))
}

pub fn owned_account_resource(dto: OwnedAccountDto) -> Resource<OwnedAccountDto> {
    let id = dto.id;
    Resource::new(dto).link("self", href::account(id))
}

pub fn account_resource(dto: AccountDto) -> Resource<AccountDto> {
    let id = dto.id;
    Resource::new(dto)
        .link("self", href::account(id))
        .link("collection", href::accounts())
        .link("purchases", href::account_purchases(id))
}

pub fn package_resource(dto: PackageDto) -> Resource<PackageDto> {
    let id = dto.id;
    Resource::new(dto)
        .link("self", href::package(id))
        .link("collection", href::packages())
        .link("accounts", href::package_accounts(id))
}

pub fn holder_resource(dto: PackageHolderDto) -> Resource<PackageHolderDto> {
    let id = dto.id;
    Resource::new(dto)
        .link("self", href::account(id))
        .link("collection", href::accounts())
        .link("purchases", href::account_purchases(id))
}

pub fn purchase_resource(dto: PurchaseDto, account: AccountId) -> Resource<PurchaseDto> {
    let id = dto.id;
    let package = dto.sub_package.id;
    Resource::new(dto)
        .link("self", href::purchase(id))
        .link("account", href::account(account))
        .link("subPackage", href::package(package))
}
