//! Order records for the errand system.
//!
//! An order is published by one user, grabbed by another and then moves
//! through its lifecycle until it reaches a terminal status. Orders are never
//! physically deleted; terminal orders remain as history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ServiceDetails, ServiceType};

/// Longest countdown window an order can carry (one year).
pub const MAX_WINDOW_SECONDS: u64 = 366 * 24 * 3600;

/// A single errand order.
///
/// The JSON shape is camelCase and flattens the service payload into the
/// record, tagged by `serviceType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Unique identifier, derived from the creation timestamp.
	pub id: u64,
	/// Human-readable order number prefixed by service type.
	pub order_no: String,
	/// Display name of the service.
	#[serde(default)]
	pub service_name: String,
	/// Price fixed at creation.
	#[serde(default)]
	pub price: Decimal,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Payment status.
	#[serde(default)]
	pub pay_status: PayStatus,
	/// Identifier of the user who published the order.
	pub publisher_id: String,
	/// Display name of the publisher.
	#[serde(default)]
	pub publisher_name: String,
	/// Identifier of the user who grabbed the order.
	#[serde(default)]
	pub acceptor_id: Option<String>,
	/// Display name of the acceptor.
	#[serde(default)]
	pub acceptor_name: Option<String>,
	/// Remaining seconds in the current phase, as of the last read.
	#[serde(default)]
	pub countdown: u64,
	/// Absolute end of the current phase. `countdown` is derived from it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub deadline: Option<DateTime<Utc>>,
	/// End of the initial acceptance window, for display.
	#[serde(
		default,
		deserialize_with = "crate::utils::timestamps::deserialize_opt",
		skip_serializing_if = "Option::is_none"
	)]
	pub accept_deadline: Option<DateTime<Utc>>,
	/// Creation timestamp. Older records call it `createTime`.
	#[serde(
		alias = "createTime",
		deserialize_with = "crate::utils::timestamps::deserialize"
	)]
	pub created_at: DateTime<Utc>,
	/// Timestamp of the last mutation.
	#[serde(deserialize_with = "crate::utils::timestamps::deserialize")]
	pub updated_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub accepted_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub canceled_at: Option<DateTime<Utc>>,
	/// Service-specific payload.
	#[serde(flatten)]
	pub details: ServiceDetails,
}

impl Order {
	/// Returns the service type carried by the payload.
	pub fn service_type(&self) -> ServiceType {
		self.details.service_type()
	}

	/// Seconds left until `deadline`, saturating at zero.
	///
	/// Orders without a deadline report their stored countdown.
	pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
		match self.deadline {
			Some(deadline) => (deadline - now).num_seconds().max(0) as u64,
			None => self.countdown,
		}
	}

	/// Refreshes the countdown snapshot from the deadline.
	///
	/// Terminal orders keep their frozen countdown.
	pub fn refresh_countdown(&mut self, now: DateTime<Utc>) {
		if self.status.is_active() {
			self.countdown = self.remaining_at(now);
		}
	}

	/// Starts a new phase of `seconds` from `now`.
	///
	/// Windows are capped at [`MAX_WINDOW_SECONDS`].
	pub fn set_window(&mut self, now: DateTime<Utc>, seconds: u64) {
		let seconds = seconds.min(MAX_WINDOW_SECONDS);
		self.countdown = seconds;
		self.deadline = chrono::Duration::try_seconds(seconds as i64)
			.and_then(|window| now.checked_add_signed(window));
	}

	/// Freezes the countdown at zero and clears the deadline.
	pub fn freeze_countdown(&mut self) {
		self.countdown = 0;
		self.deadline = None;
	}

	/// Day string (`YYYY-MM-DD`) of the creation time at the given UTC offset.
	pub fn created_day(&self, offset: chrono::FixedOffset) -> String {
		self.created_at
			.with_timezone(&offset)
			.format("%Y-%m-%d")
			.to_string()
	}
}

/// Status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Published and waiting for someone to grab it.
	Pending,
	/// Grabbed by an acceptor.
	Accepted,
	/// The acceptor has started working on it.
	InProgress,
	/// Finished. Terminal.
	Completed,
	/// Canceled by the publisher. Terminal.
	Canceled,
	/// Nobody grabbed it in time. Terminal.
	Expired,
}

impl OrderStatus {
	/// Statuses whose countdown keeps running.
	pub fn is_active(&self) -> bool {
		matches!(self, Self::Pending | Self::Accepted | Self::InProgress)
	}

	pub fn is_terminal(&self) -> bool {
		!self.is_active()
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Accepted => "accepted",
			Self::InProgress => "in_progress",
			Self::Completed => "completed",
			Self::Canceled => "canceled",
			Self::Expired => "expired",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(Self::Pending),
			"accepted" => Ok(Self::Accepted),
			"in_progress" => Ok(Self::InProgress),
			"completed" => Ok(Self::Completed),
			"canceled" => Ok(Self::Canceled),
			"expired" => Ok(Self::Expired),
			other => Err(format!("unknown order status: {}", other)),
		}
	}
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayStatus {
	#[default]
	Paid,
	Unpaid,
	Refunded,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ExpressDetails, ParcelSize};
	use chrono::TimeZone;

	fn sample() -> Order {
		let created = Utc.with_ymd_and_hms(2024, 5, 20, 10, 30, 0).unwrap();
		Order {
			id: 1,
			order_no: "DD1".into(),
			service_name: "代取快递".into(),
			price: Decimal::new(250, 2),
			status: OrderStatus::Pending,
			pay_status: PayStatus::Paid,
			publisher_id: "A".into(),
			publisher_name: "Alice".into(),
			acceptor_id: None,
			acceptor_name: None,
			countdown: 600,
			deadline: Some(created + chrono::Duration::seconds(600)),
			accept_deadline: None,
			created_at: created,
			updated_at: created,
			accepted_at: None,
			completed_at: None,
			canceled_at: None,
			details: ServiceDetails::Express(ExpressDetails {
				pickup_code: "8-2-1034".into(),
				weight: ParcelSize::Small,
				..Default::default()
			}),
		}
	}

	#[test]
	fn test_json_shape_is_flat_and_tagged() {
		let value = serde_json::to_value(sample()).unwrap();
		assert_eq!(value["serviceType"], "express");
		assert_eq!(value["status"], "pending");
		assert_eq!(value["payStatus"], "paid");
		assert_eq!(value["pickupCode"], "8-2-1034");
		assert_eq!(value["publisherId"], "A");
		assert!(value["acceptorId"].is_null());
	}

	#[test]
	fn test_deserialize_legacy_record() {
		let json = serde_json::json!({
			"id": 7,
			"orderNo": "WM7",
			"serviceType": "takeout",
			"status": "in_progress",
			"publisherId": "A",
			"acceptorId": "B",
			"countdown": 42,
			"createdAt": "2024-05-20T10:30:00Z",
			"updatedAt": "2024-05-20T10:30:00Z",
			"shopName": "Noodles",
			"someUnknownField": true
		});
		let order: Order = serde_json::from_value(json).unwrap();
		assert_eq!(order.service_type(), ServiceType::Takeout);
		assert_eq!(order.status, OrderStatus::InProgress);
		assert_eq!(order.pay_status, PayStatus::Paid);
		assert_eq!(order.remaining_at(Utc::now()), 42);
		match order.details {
			ServiceDetails::Takeout(details) => assert_eq!(details.shop_name, "Noodles"),
			other => panic!("unexpected payload: {:?}", other),
		}
	}

	#[test]
	fn test_remaining_saturates_at_zero() {
		let order = sample();
		let later = order.created_at + chrono::Duration::seconds(601);
		assert_eq!(order.remaining_at(later), 0);
		let earlier = order.created_at + chrono::Duration::seconds(100);
		assert_eq!(order.remaining_at(earlier), 500);
	}

	#[test]
	fn test_locale_timestamps_are_accepted() {
		let json = serde_json::json!({
			"id": 1716201000000u64,
			"orderNo": "DD1716201000000",
			"serviceType": "express",
			"createTime": "2024/5/20 18:30:00",
			"updatedAt": 1716201000000u64,
			"price": 2.5,
			"status": "pending",
			"payStatus": "paid",
			"publisherId": "A",
			"acceptorId": null,
			"weight": "small",
			"countdown": 600,
			"acceptDeadline": "2024/5/20 18:40:00"
		});
		let order: Order = serde_json::from_value(json).unwrap();
		let created = Utc.with_ymd_and_hms(2024, 5, 20, 10, 30, 0).unwrap();
		assert_eq!(order.created_at, created);
		assert_eq!(order.updated_at, created);
		assert_eq!(
			order.accept_deadline,
			Some(created + chrono::Duration::seconds(600))
		);
		assert_eq!(order.price, Decimal::new(25, 1));

		// Written back in the current shape
		let value = serde_json::to_value(&order).unwrap();
		assert_eq!(value["createdAt"], "2024-05-20T10:30:00Z");
		assert!(value.get("createTime").is_none());
	}

	#[test]
	fn test_unreadable_accept_deadline_is_dropped() {
		let mut value = serde_json::to_value(sample()).unwrap();
		value["acceptDeadline"] = "sometime soon".into();
		let order: Order = serde_json::from_value(value).unwrap();
		assert_eq!(order.accept_deadline, None);
	}

	#[test]
	fn test_huge_window_is_capped() {
		let mut order = sample();
		let now = order.created_at;
		order.set_window(now, 10_000_000_000_000);
		assert_eq!(order.countdown, MAX_WINDOW_SECONDS);
		assert_eq!(order.remaining_at(now), MAX_WINDOW_SECONDS);
	}

	#[test]
	fn test_terminal_countdown_is_frozen() {
		let mut order = sample();
		order.status = OrderStatus::Canceled;
		order.freeze_countdown();
		order.refresh_countdown(order.created_at);
		assert_eq!(order.countdown, 0);
	}

	#[test]
	fn test_created_day_uses_offset() {
		let mut order = sample();
		order.created_at = Utc.with_ymd_and_hms(2024, 5, 20, 20, 0, 0).unwrap();
		let utc = chrono::FixedOffset::east_opt(0).unwrap();
		let beijing = chrono::FixedOffset::east_opt(8 * 3600).unwrap();
		assert_eq!(order.created_day(utc), "2024-05-20");
		assert_eq!(order.created_day(beijing), "2024-05-21");
	}
}
