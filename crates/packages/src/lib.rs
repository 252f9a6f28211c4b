//! `operator-packages`: purchasable subscription package definitions.

pub mod package;

pub use package::{PackageRequest, PackageType, SubPackage};
