use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use operator_core::validation::not_blank;
use operator_core::{AccountId, DomainResult, Entity, PurchaseId, SubPackageId};

/// An executed purchase of one sub-package by one account.
///
/// Both references are fixed at creation; the recorded price is what was
/// debited and what a deletion refunds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    id: PurchaseId,
    account_id: AccountId,
    package_id: SubPackageId,
    purchase_date: DateTime<Utc>,
    package_price: i16,
}

impl Purchase {
    pub(crate) fn record(
        account_id: AccountId,
        package_id: SubPackageId,
        package_price: i16,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PurchaseId::new(),
            account_id,
            package_id,
            purchase_date: now,
            package_price,
        }
    }

    pub fn restore(
        id: PurchaseId,
        account_id: AccountId,
        package_id: SubPackageId,
        purchase_date: DateTime<Utc>,
        package_price: i16,
    ) -> Self {
        Self {
            id,
            account_id,
            package_id,
            purchase_date,
            package_price,
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn package_id(&self) -> SubPackageId {
        self.package_id
    }

    pub fn purchase_date(&self) -> DateTime<Utc> {
        self.purchase_date
    }

    pub fn package_price(&self) -> i16 {
        self.package_price
    }
}

impl Entity for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> PurchaseId {
        self.id
    }
}

/// Request: buy a sub-package for an account.
///
/// Also the wire contract the purchase-order service forwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseCreateRequest {
    #[validate(custom(function = "not_blank"))]
    pub account_id: String,

    #[validate(range(min = 1, message = "must be greater than or equal to 1"))]
    pub sub_package_id: i64,

    #[validate(range(min = 0, message = "must be greater than or equal to 0"))]
    pub package_price: i16,
}

impl PurchaseCreateRequest {
    pub fn validated(&self) -> DomainResult<()> {
        self.validate()?;
        Ok(())
    }
}
