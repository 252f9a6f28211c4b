//! Settlement: pure rules deciding whether an account may buy a package, and
//! how its balance moves. Stores call these inside their own transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use operator_core::{DomainError, DomainResult, Entity};
use operator_customers::Account;
use operator_packages::SubPackage;

use crate::purchase::Purchase;

/// Debit `account` by `price` for `package` and return the new purchase.
///
/// Checks, in order: the package is purchasable, then the balance covers the
/// price. On error the account is not modified.
pub fn settle(
    account: &mut Account,
    package: &SubPackage,
    price: i16,
    now: DateTime<Utc>,
) -> DomainResult<Purchase> {
    ensure_purchasable(package)?;

    let price_amount = Decimal::from(price);
    if account.account_balance() < price_amount {
        return Err(DomainError::insufficient_funds(format!(
            "Insufficient account balance to make this purchase: {} with the price of {}. Payment Required.",
            package.name(),
            price
        )));
    }

    account.set_balance(account.account_balance() - price_amount)?;
    Ok(Purchase::record(account.id(), package.id(), price, now))
}

/// Reject packages that are currently closed for sale.
pub fn ensure_purchasable(package: &SubPackage) -> DomainResult<()> {
    if package.is_purchasable() {
        Ok(())
    } else {
        Err(DomainError::purchase_not_possible(
            "This package can not be purchased at this moment!",
        ))
    }
}

/// Credit the price of a deleted purchase back to its account.
pub fn refund(account: &mut Account, purchase: &Purchase) -> DomainResult<()> {
    account.set_balance(account.account_balance() + Decimal::from(purchase.package_price()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_core::{CustomerId, SubPackageId};
    use operator_customers::{AccountCreateRequest, TariffType};
    use operator_packages::{PackageRequest, PackageType};
    use proptest::prelude::*;

    fn account(balance: Decimal) -> Account {
        Account::open(
            &AccountCreateRequest {
                customer_id: "c".into(),
                account_balance: balance,
                tariff_type: TariffType::Standard,
            },
            CustomerId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    fn package(purchasable: bool) -> SubPackage {
        SubPackage::define(
            SubPackageId(1),
            &PackageRequest {
                name: "Gold".into(),
                package_type: PackageType::Combo,
                duration: 30,
                purchasable,
            },
        )
        .unwrap()
    }

    #[test]
    fn settle_debits_balance_and_links_purchase() {
        let mut acc = account(Decimal::new(10_000, 2));
        let purchase = settle(&mut acc, &package(true), 25, Utc::now()).unwrap();

        assert_eq!(acc.account_balance(), Decimal::new(7_500, 2));
        assert_eq!(purchase.account_id(), acc.id());
        assert_eq!(purchase.package_id(), SubPackageId(1));
        assert_eq!(purchase.package_price(), 25);
    }

    #[test]
    fn settle_refuses_unpurchasable_package_before_checking_funds() {
        let mut acc = account(Decimal::ZERO);
        let err = settle(&mut acc, &package(false), 25, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::PurchaseNotPossible(
                "This package can not be purchased at this moment!".into()
            )
        );
    }

    #[test]
    fn settle_reports_insufficient_funds_with_package_name_and_price() {
        let mut acc = account(Decimal::new(1_000, 2));
        let err = settle(&mut acc, &package(true), 25, Utc::now()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient account balance to make this purchase: Gold with the price of 25. Payment Required."
        );
        assert_eq!(acc.account_balance(), Decimal::new(1_000, 2));
    }

    #[test]
    fn exact_balance_can_be_spent() {
        let mut acc = account(Decimal::from(25));
        settle(&mut acc, &package(true), 25, Utc::now()).unwrap();
        assert_eq!(acc.account_balance(), Decimal::ZERO);
    }

    #[test]
    fn refund_restores_the_debited_amount() {
        let start = Decimal::new(5_050, 2);
        let mut acc = account(start);
        let purchase = settle(&mut acc, &package(true), 40, Utc::now()).unwrap();
        refund(&mut acc, &purchase).unwrap();
        assert_eq!(acc.account_balance(), start);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: settlement never leaves a negative balance, and succeeds
        /// exactly when the balance covers the price.
        #[test]
        fn debit_never_goes_negative(cents in 0i64..5_000_000, price in 0i16..i16::MAX) {
            let balance = Decimal::new(cents, 2);
            let mut acc = account(balance);
            let result = settle(&mut acc, &package(true), price, Utc::now());

            prop_assert!(acc.account_balance() >= Decimal::ZERO);
            if balance >= Decimal::from(price) {
                prop_assert!(result.is_ok());
                prop_assert_eq!(acc.account_balance(), balance - Decimal::from(price));
            } else {
                let is_insufficient = matches!(result, Err(DomainError::InsufficientFunds(_)));
                prop_assert!(is_insufficient);
                prop_assert_eq!(acc.account_balance(), balance);
            }
        }
    }
}
