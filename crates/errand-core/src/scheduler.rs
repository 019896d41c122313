//! Countdown scheduler.
//!
//! Each open order list owns one scheduler. On every tick it expires pending
//! orders whose acceptance window ran out, rebuilds the list's views and
//! publishes them on a watch channel. Countdowns come from absolute deadlines,
//! so a missed or late tick never makes them drift; the first tick runs
//! immediately to catch up with time that passed while the list was closed.

use crate::classify::{Classified, OrderFilter, SortKey};
use crate::state::{LifecycleError, OrderLifecycle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// The list a scheduler keeps fresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
	pub user_id: String,
	pub filter: OrderFilter,
	pub sort: SortKey,
}

impl ViewQuery {
	pub fn new(user_id: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			..Default::default()
		}
	}
}

/// Runs a single tick: expire overdue orders, then rebuild the views.
pub async fn tick(
	lifecycle: &OrderLifecycle,
	query: &ViewQuery,
) -> Result<Classified, LifecycleError> {
	let expired = lifecycle.expire_overdue().await?;
	if !expired.is_empty() {
		tracing::debug!(count = expired.len(), "Expired overdue orders");
	}
	Ok(lifecycle
		.list_classified(&query.user_id, &query.filter, query.sort)
		.await)
}

/// Handle to a running countdown timer. Dropping it stops the timer.
pub struct CountdownScheduler {
	handle: Option<JoinHandle<()>>,
	view: watch::Receiver<Classified>,
}

impl CountdownScheduler {
	/// Spawns the timer task. Must be called within a tokio runtime.
	pub fn start(lifecycle: Arc<OrderLifecycle>, query: ViewQuery, period: Duration) -> Self {
		let period = period.max(Duration::from_millis(1));
		let (tx, rx) = watch::channel(Classified::default());

		let handle = tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
			loop {
				interval.tick().await;
				match tick(&lifecycle, &query).await {
					Ok(view) => {
						if tx.send(view).is_err() {
							break;
						}
					},
					Err(e) => {
						tracing::warn!(user_id = %query.user_id, error = %e, "Countdown tick failed");
					},
				}
			}
		});

		tracing::debug!(period_ms = period.as_millis() as u64, "Countdown scheduler started");
		Self {
			handle: Some(handle),
			view: rx,
		}
	}

	/// Subscribes to refreshed views.
	pub fn view(&self) -> watch::Receiver<Classified> {
		self.view.clone()
	}

	/// The most recently published views.
	pub fn current(&self) -> Classified {
		self.view.borrow().clone()
	}

	pub fn is_running(&self) -> bool {
		self.handle.as_ref().is_some_and(|h| !h.is_finished())
	}

	/// Stops the timer. Stopping twice is a no-op.
	pub fn stop(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.abort();
			tracing::debug!("Countdown scheduler stopped");
		}
	}
}

impl Drop for CountdownScheduler {
	fn drop(&mut self) {
		self.stop();
	}
}
