use serde::{Deserialize, Serialize};
use validator::Validate;

use operator_core::validation::not_blank;
use operator_core::ValidationErrors;

/// A purchase intent. Forwarded unchanged as the core service's
/// purchase-creation body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderRequest {
    #[validate(custom(function = "not_blank"))]
    pub account_id: String,

    #[validate(range(min = 1, message = "must be greater than or equal to 1"))]
    pub sub_package_id: i64,

    #[validate(range(min = 0, message = "must be greater than or equal to 0"))]
    pub package_price: i16,
}

impl PurchaseOrderRequest {
    pub fn validated(&self) -> Result<(), ValidationErrors> {
        self.validate().map_err(ValidationErrors::from)
    }
}
