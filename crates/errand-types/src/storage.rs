//! Storage layout of the order buckets.

use std::str::FromStr;

use crate::ServiceType;

/// Storage keys for the per-service order buckets.
///
/// Each key holds a JSON array of orders, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	ExpressOrders,
	TakeoutOrders,
	SupermarketOrders,
	SubstituteOrders,
	BrushOrders,
	OtherOrders,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::ExpressOrders => "expressOrders",
			StorageKey::TakeoutOrders => "takeoutOrders",
			StorageKey::SupermarketOrders => "supermarketOrders",
			StorageKey::SubstituteOrders => "substituteOrders",
			StorageKey::BrushOrders => "brushOrders",
			StorageKey::OtherOrders => "otherOrders",
		}
	}

	/// The bucket holding orders of the given service type.
	pub fn for_service(service_type: ServiceType) -> Self {
		match service_type {
			ServiceType::Express => Self::ExpressOrders,
			ServiceType::Takeout => Self::TakeoutOrders,
			ServiceType::Supermarket => Self::SupermarketOrders,
			ServiceType::Substitute => Self::SubstituteOrders,
			ServiceType::CourseBrush => Self::BrushOrders,
			ServiceType::Other => Self::OtherOrders,
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		ServiceType::all().map(Self::for_service)
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
