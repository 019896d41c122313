//! Order identifiers.

use chrono::{DateTime, Utc};
use errand_types::ServiceType;
use std::collections::HashSet;

/// Picks an order id derived from the creation time in milliseconds.
///
/// Ids already in `taken` are skipped by counting upwards, so two orders
/// created within the same millisecond still get distinct ids.
pub fn next_order_id(now: DateTime<Utc>, taken: &HashSet<u64>) -> u64 {
	let mut candidate = now.timestamp_millis().max(0) as u64;
	while taken.contains(&candidate) {
		candidate += 1;
	}
	candidate
}

/// Human-readable order number, e.g. `DD1716200000000`.
pub fn order_no(service_type: ServiceType, id: u64) -> String {
	format!("{}{}", service_type.order_no_prefix(), id)
}
