//! Service types and their payloads.
//!
//! Each service carries its own strongly typed payload. The lifecycle layer
//! treats payloads as opaque and carries them through unchanged.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of errand the platform offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceType {
	/// Parcel pickup from the express station.
	Express,
	/// Takeout fetch from the delivery point.
	Takeout,
	/// Supermarket shopping run.
	Supermarket,
	/// Attending a class on someone's behalf.
	Substitute,
	/// Watching online course videos on someone's behalf.
	CourseBrush,
	/// Anything else.
	Other,
}

impl ServiceType {
	/// Returns an iterator over all service types, in bucket order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Express,
			Self::Takeout,
			Self::Supermarket,
			Self::Substitute,
			Self::CourseBrush,
			Self::Other,
		]
		.into_iter()
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Express => "express",
			Self::Takeout => "takeout",
			Self::Supermarket => "supermarket",
			Self::Substitute => "substitute",
			Self::CourseBrush => "courseBrush",
			Self::Other => "other",
		}
	}

	/// Prefix of the human-readable order number.
	pub fn order_no_prefix(&self) -> &'static str {
		match self {
			Self::Express => "DD",
			Self::Takeout => "WM",
			Self::Supermarket => "SM",
			Self::Substitute => "DK",
			Self::CourseBrush => "SK",
			Self::Other => "OT",
		}
	}

	/// Default display name stored on new orders.
	pub fn default_service_name(&self) -> &'static str {
		match self {
			Self::Express => "代取快递",
			Self::Takeout => "外卖代取",
			Self::Supermarket => "超市代买",
			Self::Substitute => "代课服务",
			Self::CourseBrush => "刷课服务",
			Self::Other => "其他服务",
		}
	}
}

impl fmt::Display for ServiceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ServiceType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|t| t.as_str() == s)
			.ok_or_else(|| format!("unknown service type: {}", s))
	}
}

/// Service-specific payload, tagged by `serviceType` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "serviceType", rename_all = "camelCase")]
pub enum ServiceDetails {
	Express(ExpressDetails),
	Takeout(TakeoutDetails),
	Supermarket(SupermarketDetails),
	Substitute(SubstituteDetails),
	CourseBrush(CourseBrushDetails),
	Other(OtherDetails),
}

impl ServiceDetails {
	pub fn service_type(&self) -> ServiceType {
		match self {
			Self::Express(_) => ServiceType::Express,
			Self::Takeout(_) => ServiceType::Takeout,
			Self::Supermarket(_) => ServiceType::Supermarket,
			Self::Substitute(_) => ServiceType::Substitute,
			Self::CourseBrush(_) => ServiceType::CourseBrush,
			Self::Other(_) => ServiceType::Other,
		}
	}

	/// An empty payload of the given type.
	pub fn empty(service_type: ServiceType) -> Self {
		match service_type {
			ServiceType::Express => Self::Express(Default::default()),
			ServiceType::Takeout => Self::Takeout(Default::default()),
			ServiceType::Supermarket => Self::Supermarket(Default::default()),
			ServiceType::Substitute => Self::Substitute(Default::default()),
			ServiceType::CourseBrush => Self::CourseBrush(Default::default()),
			ServiceType::Other => Self::Other(Default::default()),
		}
	}
}

/// Parcel size classes used for express pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParcelSize {
	#[default]
	Small,
	Medium,
	Large,
	/// Oversized parcels are priced by customer service.
	Heavy,
}

impl FromStr for ParcelSize {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"small" => Ok(Self::Small),
			"medium" => Ok(Self::Medium),
			"large" => Ok(Self::Large),
			"heavy" => Ok(Self::Heavy),
			other => Err(format!("unknown parcel size: {}", other)),
		}
	}
}

/// Optional extras on class-related services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AddOns {
	pub exam: bool,
	pub homework: bool,
	pub discussion: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpressDetails {
	pub pickup_address: String,
	pub pickup_code: String,
	pub express_company: String,
	pub delivery_address: String,
	pub phone: String,
	pub weight: ParcelSize,
	pub special_note: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TakeoutDetails {
	pub takeout_location: String,
	pub shop_name: String,
	pub pickup_code: String,
	pub delivery_address: String,
	pub phone: String,
	pub special_request: String,
	pub delivery_time: String,
}

/// One line of a supermarket shopping list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodsItem {
	pub name: String,
	pub price: Decimal,
	pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupermarketDetails {
	pub goods_list: Vec<GoodsItem>,
	pub remark: String,
	pub phone: String,
	pub delivery_address: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubstituteDetails {
	pub building: String,
	pub classroom: String,
	pub subject: String,
	pub student_name: String,
	pub student_id: String,
	pub phone: String,
	pub class_time: String,
	pub additional_services: AddOns,
	pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CourseBrushDetails {
	pub subject: String,
	pub school: String,
	pub student_name: String,
	pub student_id: String,
	pub phone: String,
	pub platform_account: String,
	pub platform_password: String,
	pub additional_services: AddOns,
	pub remark: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OtherDetails {
	pub requirements: String,
	pub address: String,
	pub phone: String,
	pub expected_time: String,
	pub remarks: String,
}
