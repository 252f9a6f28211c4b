use serde::{Deserialize, Serialize};
use validator::Validate;

use operator_core::validation::not_blank;
use operator_core::{DomainError, DomainResult, Entity, SubPackageId};

/// Category of a sub-package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageType {
    #[default]
    Combo,
    Call,
    Internet,
    Social,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Combo => "COMBO",
            PackageType::Call => "CALL",
            PackageType::Internet => "INTERNET",
            PackageType::Social => "SOCIAL",
        }
    }
}

impl core::str::FromStr for PackageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMBO" => Ok(PackageType::Combo),
            "CALL" => Ok(PackageType::Call),
            "INTERNET" => Ok(PackageType::Internet),
            "SOCIAL" => Ok(PackageType::Social),
            other => Err(DomainError::validation(
                "packageType",
                "enum",
                format!("unknown package type '{other}'"),
            )),
        }
    }
}

/// A purchasable offering. Ids are assigned sequentially by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPackage {
    id: SubPackageId,
    name: String,
    package_type: PackageType,
    duration: i64,
    purchasable: bool,
}

impl SubPackage {
    /// Build a package under a store-assigned id from a create request.
    pub fn define(id: SubPackageId, request: &PackageRequest) -> DomainResult<Self> {
        request.validate()?;
        Ok(Self {
            id,
            name: request.name.trim().to_string(),
            package_type: request.package_type,
            duration: request.duration,
            purchasable: request.purchasable,
        })
    }

    pub fn restore(
        id: SubPackageId,
        name: String,
        package_type: PackageType,
        duration: i64,
        purchasable: bool,
    ) -> Self {
        Self {
            id,
            name,
            package_type,
            duration,
            purchasable,
        }
    }

    /// Replace every mutable field. The id is kept.
    pub fn replace(&mut self, request: &PackageRequest) -> DomainResult<()> {
        *self = Self::define(self.id, request)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn is_purchasable(&self) -> bool {
        self.purchasable
    }
}

impl Entity for SubPackage {
    type Id = SubPackageId;

    fn id(&self) -> SubPackageId {
        self.id
    }
}

fn default_purchasable() -> bool {
    true
}

/// Request: create or replace a sub-package.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PackageRequest {
    #[validate(custom(function = "not_blank"))]
    pub name: String,

    #[serde(default)]
    pub package_type: PackageType,

    #[serde(default)]
    #[validate(range(min = 0, message = "must be greater than or equal to 0"))]
    pub duration: i64,

    #[serde(default = "default_purchasable")]
    pub purchasable: bool,
}
