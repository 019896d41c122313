//! Plain-text rendering of orders and views.

use errand_core::{Classified, PriceQuote};
use errand_types::{format_countdown, truncate_id, Order, ServiceDetails, ServiceType};
use std::fmt::Write;

/// One-line summary of an order.
pub fn order(order: &Order) -> String {
	let countdown = if order.status.is_active() {
		format_countdown(order.countdown)
	} else {
		"--:--".to_string()
	};
	let acceptor = order
		.acceptor_id
		.as_deref()
		.map(truncate_id)
		.unwrap_or_else(|| "-".to_string());
	format!(
		"{:<18} {:<12} {:<11} {:>8} {:>7}  {} -> {}",
		order.order_no,
		order.service_name,
		order.status.as_str(),
		order.price,
		countdown,
		order.publisher_name,
		acceptor
	)
}

pub fn quote(quote: &PriceQuote) -> String {
	format!(
		"total {} (base {}, add-ons {}, boost {}); platform {} at {}, rider {}",
		quote.total,
		quote.base,
		quote.additional,
		quote.boost,
		quote.platform_commission,
		quote.commission_rate,
		quote.rider_earnings
	)
}

pub fn classified(view: &Classified) -> String {
	let mut out = String::new();
	for (title, orders) in [
		("Mine", &view.mine),
		("Available", &view.available),
		("Accepted", &view.accepted),
	] {
		let _ = writeln!(out, "== {} ({})", title, orders.len());
		for o in orders {
			let _ = writeln!(out, "{}", order(o));
		}
	}
	out
}

/// Parses a JSON payload into the details of `service_type`.
pub fn parse_details(
	service_type: ServiceType,
	json: &str,
) -> Result<ServiceDetails, serde_json::Error> {
	let mut value: serde_json::Value = serde_json::from_str(json)?;
	if let Some(object) = value.as_object_mut() {
		object.insert(
			"serviceType".into(),
			serde_json::Value::from(service_type.as_str()),
		);
	}
	serde_json::from_value(value)
}
