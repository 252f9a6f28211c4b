use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use operator_core::validation::{non_negative, not_blank};
use operator_core::{AccountId, CustomerId, DomainError, DomainResult, Entity};

/// Pricing tier assigned to an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TariffType {
    Economy,
    #[default]
    Standard,
    Premium,
}

impl TariffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TariffType::Economy => "ECONOMY",
            TariffType::Standard => "STANDARD",
            TariffType::Premium => "PREMIUM",
        }
    }
}

impl core::str::FromStr for TariffType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ECONOMY" => Ok(TariffType::Economy),
            "STANDARD" => Ok(TariffType::Standard),
            "PREMIUM" => Ok(TariffType::Premium),
            other => Err(DomainError::validation(
                "tariffType",
                "enum",
                format!("unknown tariff type '{other}'"),
            )),
        }
    }
}

/// An account belonging to exactly one customer.
///
/// Invariant: `account_balance >= 0` at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    customer_id: CustomerId,
    creation_date: DateTime<Utc>,
    account_balance: Decimal,
    tariff_type: TariffType,
}

impl Account {
    /// Open a new account for an existing customer.
    ///
    /// The caller resolves `request.customer_id` to `customer_id` (and reports a
    /// missing customer); this validates the rest of the request.
    pub fn open(
        request: &AccountCreateRequest,
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        request.validate()?;
        Ok(Self {
            id: AccountId::new(),
            customer_id,
            creation_date: now,
            account_balance: request.account_balance,
            tariff_type: request.tariff_type,
        })
    }

    /// Rebuild an account from persisted state.
    pub fn restore(
        id: AccountId,
        customer_id: CustomerId,
        creation_date: DateTime<Utc>,
        account_balance: Decimal,
        tariff_type: TariffType,
    ) -> Self {
        Self {
            id,
            customer_id,
            creation_date,
            account_balance,
            tariff_type,
        }
    }

    /// Apply an update request (balance and tariff only).
    pub fn apply_update(&mut self, request: &AccountUpdateRequest) -> DomainResult<()> {
        request.validate()?;
        self.account_balance = request.account_balance;
        self.tariff_type = request.tariff_type;
        Ok(())
    }

    /// Set a new balance computed by settlement logic. Rejects negative values.
    pub fn set_balance(&mut self, balance: Decimal) -> DomainResult<()> {
        non_negative(&balance).map_err(|_| {
            DomainError::validation(
                "accountBalance",
                "range",
                "must be greater than or equal to 0",
            )
        })?;
        self.account_balance = balance;
        Ok(())
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    pub fn account_balance(&self) -> Decimal {
        self.account_balance
    }

    pub fn tariff_type(&self) -> TariffType {
        self.tariff_type
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> AccountId {
        self.id
    }
}

/// Request: open an account for a customer.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreateRequest {
    #[validate(custom(function = "not_blank"))]
    pub customer_id: String,

    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub account_balance: Decimal,

    #[serde(default)]
    pub tariff_type: TariffType,
}

/// Request: update an account's mutable fields.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdateRequest {
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub account_balance: Decimal,

    #[serde(default)]
    pub tariff_type: TariffType,
}
