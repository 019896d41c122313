//! Classified order views.
//!
//! A user sees orders through three views recomputed on every read: the
//! orders they published, pending orders from other users they could grab,
//! and orders they accepted. Nothing here is persisted.

use chrono::FixedOffset;
use errand_types::{Order, OrderStatus, ServiceType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The three views of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classified {
	/// Orders published by the user.
	pub mine: Vec<Order>,
	/// Pending orders from other users.
	pub available: Vec<Order>,
	/// Orders accepted by the user.
	pub accepted: Vec<Order>,
}

impl Classified {
	pub fn len(&self) -> usize {
		self.mine.len() + self.available.len() + self.accepted.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Filters applied on top of classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
	/// Exact service type, or every type when unset.
	pub service_type: Option<ServiceType>,
	/// Status tab. Applies to the mine and accepted views only, since the
	/// available view is pending by definition.
	pub status: Option<OrderStatus>,
	/// Creation day as `YYYY-MM-DD`.
	pub date: Option<String>,
}

impl OrderFilter {
	fn matches(&self, order: &Order, offset: FixedOffset, with_status: bool) -> bool {
		if self
			.service_type
			.is_some_and(|wanted| order.service_type() != wanted)
		{
			return false;
		}
		if with_status && self.status.is_some_and(|wanted| order.status != wanted) {
			return false;
		}
		match &self.date {
			Some(day) => order.created_day(offset) == *day,
			None => true,
		}
	}
}

/// Sort order of every view. Both keys sort descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
	/// Newest first.
	#[default]
	Time,
	/// Most expensive first.
	Price,
}

impl fmt::Display for SortKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SortKey::Time => write!(f, "time"),
			SortKey::Price => write!(f, "price"),
		}
	}
}

impl FromStr for SortKey {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"time" => Ok(SortKey::Time),
			"price" => Ok(SortKey::Price),
			other => Err(format!("unknown sort key: {}", other)),
		}
	}
}

fn newest_first(a: &Order, b: &Order) -> Ordering {
	b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

fn sort_orders(orders: &mut [Order], sort: SortKey) {
	match sort {
		SortKey::Time => orders.sort_by(newest_first),
		SortKey::Price => orders.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| newest_first(a, b))),
	}
}

/// Splits orders into the views of `user_id`.
///
/// An order published and accepted by different users shows up in each of
/// their views; a user never sees their own order as available.
pub fn classify(
	orders: impl IntoIterator<Item = Order>,
	user_id: &str,
	filter: &OrderFilter,
	sort: SortKey,
	offset: FixedOffset,
) -> Classified {
	let mut view = Classified::default();
	for order in orders {
		let is_mine = order.publisher_id == user_id;
		let is_accepted = order.acceptor_id.as_deref() == Some(user_id);
		let is_available = order.status == OrderStatus::Pending && !is_mine;

		if is_mine && filter.matches(&order, offset, true) {
			view.mine.push(order.clone());
		}
		if is_accepted && filter.matches(&order, offset, true) {
			view.accepted.push(order.clone());
		}
		if is_available && filter.matches(&order, offset, false) {
			view.available.push(order);
		}
	}

	sort_orders(&mut view.mine, sort);
	sort_orders(&mut view.available, sort);
	sort_orders(&mut view.accepted, sort);
	view
}
