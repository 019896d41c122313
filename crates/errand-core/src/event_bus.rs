//! Broadcast bus for order lifecycle events.

use errand_types::OrderEvent;
use tokio::sync::broadcast;

/// Fan-out channel for [`OrderEvent`]s. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event. Having no subscribers is not an error.
	pub fn publish(&self, event: OrderEvent) {
		let order_id = event.order_id();
		match self.sender.send(event) {
			Ok(receivers) => {
				tracing::trace!(order_id, receivers, "Published order event");
			},
			Err(_) => {
				tracing::trace!(order_id, "No subscribers for order event");
			},
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}
