//! Builder for assembling the order lifecycle from configuration.
//!
//! Resolves the primary storage backend through the storage factories, wraps
//! it in the order repository and hands back a ready [`OrderLifecycle`].
//! Tests and embedders can swap in their own backend or clock.

use crate::clock::{Clock, SystemClock};
use crate::event_bus::EventBus;
use crate::repository::OrderStore;
use crate::state::OrderLifecycle;
use errand_config::Config;
use errand_storage::{StorageInterface, StorageService};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while building the lifecycle.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Builds an [`OrderLifecycle`] from a [`Config`].
pub struct LifecycleBuilder {
	config: Config,
	clock: Option<Arc<dyn Clock>>,
	backend: Option<Box<dyn StorageInterface>>,
	events: Option<EventBus>,
}

impl LifecycleBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: None,
			backend: None,
			events: None,
		}
	}

	/// Uses `clock` instead of the system clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	/// Uses `backend` instead of the configured primary storage.
	pub fn with_backend(mut self, backend: Box<dyn StorageInterface>) -> Self {
		self.backend = Some(backend);
		self
	}

	/// Shares an existing event bus.
	pub fn with_events(mut self, events: EventBus) -> Self {
		self.events = Some(events);
		self
	}

	pub fn build(self) -> Result<OrderLifecycle, BuilderError> {
		let backend = match self.backend {
			Some(backend) => backend,
			None => {
				let primary = &self.config.storage.primary;
				let table = self.config.storage.primary_config().ok_or_else(|| {
					BuilderError::Config(format!(
						"Primary storage '{}' has no configuration",
						primary
					))
				})?;
				let backend = errand_storage::create_backend(primary, table).map_err(|e| {
					tracing::error!(
						component = "storage",
						implementation = %primary,
						error = %e,
						"Failed to create storage implementation"
					);
					BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						primary, e
					))
				})?;
				tracing::info!(component = "storage", implementation = %primary, "Loaded");
				backend
			},
		};

		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
		let storage = Arc::new(StorageService::new(backend));
		let store = Arc::new(OrderStore::new(
			storage,
			clock.clone(),
			self.config.lifecycle.acceptance_window_seconds,
		));

		Ok(OrderLifecycle::new(
			store,
			clock,
			self.config.lifecycle.clone(),
			self.config.utc_offset(),
			self.events.unwrap_or_default(),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::classify::{OrderFilter, SortKey};
	use crate::state::OrderDraft;
	use errand_types::{OtherDetails, ServiceDetails, UserIdentity};

	const CONFIG: &str = r#"
[storage]
primary = "memory"
[storage.implementations.memory]

[lifecycle]
acceptance_window_seconds = 120
"#;

	#[tokio::test]
	async fn test_build_from_config() {
		let config: Config = CONFIG.parse().unwrap();
		let lifecycle = LifecycleBuilder::new(config).build().unwrap();

		let mut draft = OrderDraft::new(ServiceDetails::Other(OtherDetails::default()));
		draft.extras.base_price = Some(rust_decimal::Decimal::from(15));
		let (order, quote) = lifecycle
			.publish(draft, &UserIdentity::new("A", "Alice"))
			.await
			.unwrap();
		assert_eq!(order.countdown, 120);
		assert_eq!(quote.platform_commission, rust_decimal::Decimal::from(3));

		let view = lifecycle
			.list_classified("B", &OrderFilter::default(), SortKey::Time)
			.await;
		assert_eq!(view.available.len(), 1);
	}

	#[test]
	fn test_file_backend_from_config() {
		let dir = tempfile::tempdir().unwrap();
		let toml = format!(
			r#"
[storage]
primary = "file"
[storage.implementations.file]
storage_path = "{}"
"#,
			dir.path().display()
		);
		let config: Config = toml.parse().unwrap();
		assert!(LifecycleBuilder::new(config).build().is_ok());
	}
}
