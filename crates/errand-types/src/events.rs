//! Lifecycle events.
//!
//! Events are broadcast whenever an order changes state so that every open
//! view can refresh itself.

use serde::{Deserialize, Serialize};

use crate::{Order, ServiceType};

/// Events emitted by the order lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order was published.
	Published { order: Order },
	/// A pending order was grabbed.
	Grabbed {
		order_id: u64,
		acceptor_id: String,
	},
	/// The acceptor started working on the order.
	Started { order_id: u64 },
	/// The order was completed and can now be rated.
	Completed {
		order_id: u64,
		service_type: ServiceType,
	},
	/// The publisher canceled the order and was refunded.
	Canceled { order_id: u64 },
	/// The acceptance window ran out.
	Expired { order_id: u64 },
}

impl OrderEvent {
	pub fn order_id(&self) -> u64 {
		match self {
			OrderEvent::Published { order } => order.id,
			OrderEvent::Grabbed { order_id, .. }
			| OrderEvent::Started { order_id }
			| OrderEvent::Completed { order_id, .. }
			| OrderEvent::Canceled { order_id }
			| OrderEvent::Expired { order_id } => *order_id,
		}
	}
}
