//! Order transition table.
//!
//! pending -> accepted -> in_progress -> completed is the happy path. Pending
//! orders expire when their acceptance window runs out; active orders can be
//! canceled. completed, canceled and expired are terminal.

use errand_types::{Order, OrderStatus};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

// Static transition table - each status maps to its allowed next statuses
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Pending,
		HashSet::from([
			OrderStatus::Accepted,
			OrderStatus::Expired,
			OrderStatus::Canceled,
		]),
	);
	m.insert(
		OrderStatus::Accepted,
		HashSet::from([
			OrderStatus::InProgress,
			OrderStatus::Completed,
			OrderStatus::Canceled,
		]),
	);
	m.insert(
		OrderStatus::InProgress,
		HashSet::from([OrderStatus::Completed, OrderStatus::Canceled]),
	);
	m.insert(OrderStatus::Completed, HashSet::new()); // terminal
	m.insert(OrderStatus::Canceled, HashSet::new()); // terminal
	m.insert(OrderStatus::Expired, HashSet::new()); // terminal
	m
});

/// Checks if a status transition is allowed.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|next| next.contains(&to))
}

/// Why a lifecycle operation left the order untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
	/// No bucket holds the order.
	NotFound,
	/// The order's current status does not allow the move.
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	/// Publishers cannot grab their own orders.
	OwnOrder,
	/// Only the publisher can cancel an order.
	NotPublisher,
	/// The acceptance window has not run out yet.
	NotYetDue { remaining: u64 },
}

impl fmt::Display for RejectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RejectReason::NotFound => write!(f, "order not found"),
			RejectReason::InvalidTransition { from, to } => {
				write!(f, "cannot move from {} to {}", from, to)
			},
			RejectReason::OwnOrder => write!(f, "cannot grab your own order"),
			RejectReason::NotPublisher => write!(f, "only the publisher can cancel"),
			RejectReason::NotYetDue { remaining } => {
				write!(f, "acceptance window still open ({}s left)", remaining)
			},
		}
	}
}

/// Result of a lifecycle operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
	/// The order moved; carries its new state.
	Applied(Order),
	/// Preconditions failed and nothing was written.
	Rejected(RejectReason),
}

impl TransitionOutcome {
	pub fn is_applied(&self) -> bool {
		matches!(self, TransitionOutcome::Applied(_))
	}

	pub fn order(&self) -> Option<&Order> {
		match self {
			TransitionOutcome::Applied(order) => Some(order),
			TransitionOutcome::Rejected(_) => None,
		}
	}

	pub fn rejection(&self) -> Option<&RejectReason> {
		match self {
			TransitionOutcome::Applied(_) => None,
			TransitionOutcome::Rejected(reason) => Some(reason),
		}
	}
}
