//! Order lifecycle manager.
//!
//! Every operation reads the order under its bucket lock, checks the
//! transition table and the caller's identity, and writes the order back only
//! when the move is allowed. Precondition failures come back as
//! [`TransitionOutcome::Rejected`]; errors are reserved for storage failures.

use super::transitions::{is_valid_transition, RejectReason, TransitionOutcome};
use crate::classify::{classify, Classified, OrderFilter, SortKey};
use crate::clock::Clock;
use crate::event_bus::EventBus;
use crate::ids::order_no;
use crate::pricing::{quote, PriceExtras, PriceQuote, PricingError};
use crate::repository::{Mutation, OrderStore, StoreError};
use chrono::{DateTime, FixedOffset, Utc};
use errand_config::LifecycleConfig;
use errand_types::{
	Order, OrderEvent, OrderStatus, PayStatus, ServiceDetails, UserIdentity,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error("Store error: {0}")]
	Store(#[from] StoreError),
	#[error("Pricing error: {0}")]
	Pricing(#[from] PricingError),
}

/// What a publisher submits to create an order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
	pub details: ServiceDetails,
	pub extras: PriceExtras,
	/// Display name; defaults to the service type's name.
	pub service_name: Option<String>,
}

impl OrderDraft {
	pub fn new(details: ServiceDetails) -> Self {
		Self {
			details,
			extras: PriceExtras::default(),
			service_name: None,
		}
	}
}

/// Manages order state transitions and the views built on them.
pub struct OrderLifecycle {
	store: Arc<OrderStore>,
	clock: Arc<dyn Clock>,
	config: LifecycleConfig,
	utc_offset: FixedOffset,
	events: EventBus,
}

impl OrderLifecycle {
	pub fn new(
		store: Arc<OrderStore>,
		clock: Arc<dyn Clock>,
		config: LifecycleConfig,
		utc_offset: FixedOffset,
		events: EventBus,
	) -> Self {
		Self {
			store,
			clock,
			config,
			utc_offset,
			events,
		}
	}

	pub fn events(&self) -> &EventBus {
		&self.events
	}

	pub fn store(&self) -> &Arc<OrderStore> {
		&self.store
	}

	/// Prices and stores a new pending order.
	pub async fn publish(
		&self,
		draft: OrderDraft,
		publisher: &UserIdentity,
	) -> Result<(Order, PriceQuote), LifecycleError> {
		let price = quote(&draft.details, &draft.extras)?;
		let service_type = draft.details.service_type();
		let window = self.config.acceptance_window_seconds;
		let now = self.clock.now();

		let order = self
			.store
			.create_order(|id| {
				let mut order = Order {
					id,
					order_no: order_no(service_type, id),
					service_name: draft
						.service_name
						.unwrap_or_else(|| service_type.default_service_name().to_string()),
					price: price.total,
					status: OrderStatus::Pending,
					pay_status: PayStatus::Paid,
					publisher_id: publisher.id.clone(),
					publisher_name: publisher.name.clone(),
					acceptor_id: None,
					acceptor_name: None,
					countdown: 0,
					deadline: None,
					accept_deadline: None,
					created_at: now,
					updated_at: now,
					accepted_at: None,
					completed_at: None,
					canceled_at: None,
					details: draft.details,
				};
				order.set_window(now, window);
				order.accept_deadline = order.deadline;
				order
			})
			.await?;

		tracing::info!(
			order_id = order.id,
			order_no = %order.order_no,
			service_type = %service_type,
			price = %order.price,
			"Order published"
		);
		self.events.publish(OrderEvent::Published {
			order: order.clone(),
		});
		Ok((order, price))
	}

	/// A non-publisher accepts a pending order.
	pub async fn grab(
		&self,
		order_id: u64,
		user: &UserIdentity,
	) -> Result<TransitionOutcome, LifecycleError> {
		let grab_windows = self.config.grab_windows.clone();
		let acceptor = user.clone();
		self.transition(
			order_id,
			OrderStatus::Accepted,
			|order, _| {
				if order.publisher_id == user.id {
					return Err(RejectReason::OwnOrder);
				}
				Ok(())
			},
			move |order, now| {
				order.acceptor_id = Some(acceptor.id);
				order.acceptor_name = Some(acceptor.name);
				order.accepted_at = Some(now);
				order.set_window(now, grab_windows.for_service(order.service_type()));
			},
			|order| OrderEvent::Grabbed {
				order_id: order.id,
				acceptor_id: user.id.clone(),
			},
		)
		.await
	}

	/// The acceptor starts working on an accepted order.
	pub async fn start_progress(&self, order_id: u64) -> Result<TransitionOutcome, LifecycleError> {
		let progress_windows = self.config.progress_windows.clone();
		self.transition(
			order_id,
			OrderStatus::InProgress,
			|_, _| Ok(()),
			move |order, now| {
				order.set_window(now, progress_windows.for_service(order.service_type()));
			},
			|order| OrderEvent::Started { order_id: order.id },
		)
		.await
	}

	/// Marks an accepted or in-progress order as completed.
	///
	/// Completion makes the order eligible for rating.
	pub async fn confirm_complete(
		&self,
		order_id: u64,
	) -> Result<TransitionOutcome, LifecycleError> {
		self.transition(
			order_id,
			OrderStatus::Completed,
			|_, _| Ok(()),
			|order, now| {
				order.completed_at = Some(now);
				order.freeze_countdown();
			},
			|order| OrderEvent::Completed {
				order_id: order.id,
				service_type: order.service_type(),
			},
		)
		.await
	}

	/// The publisher cancels a pending order and is refunded.
	pub async fn cancel(
		&self,
		order_id: u64,
		user_id: &str,
	) -> Result<TransitionOutcome, LifecycleError> {
		self.transition(
			order_id,
			OrderStatus::Canceled,
			|order, _| {
				if order.publisher_id != user_id {
					return Err(RejectReason::NotPublisher);
				}
				if order.status != OrderStatus::Pending {
					return Err(RejectReason::InvalidTransition {
						from: order.status,
						to: OrderStatus::Canceled,
					});
				}
				Ok(())
			},
			|order, now| {
				order.pay_status = PayStatus::Refunded;
				order.canceled_at = Some(now);
				order.freeze_countdown();
			},
			|order| OrderEvent::Canceled { order_id: order.id },
		)
		.await
	}

	/// Expires a pending order whose acceptance window has run out.
	pub async fn expire(&self, order_id: u64) -> Result<TransitionOutcome, LifecycleError> {
		self.transition(
			order_id,
			OrderStatus::Expired,
			|order, now| match order.remaining_at(now) {
				0 => Ok(()),
				remaining => Err(RejectReason::NotYetDue { remaining }),
			},
			|order, _| order.freeze_countdown(),
			|order| OrderEvent::Expired { order_id: order.id },
		)
		.await
	}

	/// Expires every overdue pending order and returns their ids.
	pub async fn expire_overdue(&self) -> Result<Vec<u64>, LifecycleError> {
		let now = self.clock.now();
		let overdue: Vec<u64> = self
			.store
			.load_all()
			.await
			.into_iter()
			.filter(|o| o.status == OrderStatus::Pending && o.remaining_at(now) == 0)
			.map(|o| o.id)
			.collect();

		let mut expired = Vec::with_capacity(overdue.len());
		for order_id in overdue {
			// Another writer may have moved the order since the scan
			if self.expire(order_id).await?.is_applied() {
				expired.push(order_id);
			}
		}
		Ok(expired)
	}

	/// Looks up an order with its countdown refreshed.
	pub async fn get(&self, order_id: u64) -> Option<Order> {
		let now = self.clock.now();
		self.store.find_by_id(order_id).await.map(|mut order| {
			order.refresh_countdown(now);
			order
		})
	}

	/// Builds the views of `user_id` from every bucket.
	pub async fn list_classified(
		&self,
		user_id: &str,
		filter: &OrderFilter,
		sort: SortKey,
	) -> Classified {
		let now = self.clock.now();
		let orders = self.store.load_all().await.into_iter().map(|mut order| {
			order.refresh_countdown(now);
			order
		});
		classify(orders, user_id, filter, sort, self.utc_offset)
	}

	/// Runs one guarded transition.
	///
	/// `guard` runs after the transition table accepts the move. A pending
	/// order found past its deadline is expired on contact and the requested
	/// move is rejected.
	async fn transition<G, A, E>(
		&self,
		order_id: u64,
		to: OrderStatus,
		guard: G,
		apply: A,
		event: E,
	) -> Result<TransitionOutcome, LifecycleError>
	where
		G: FnOnce(&Order, DateTime<Utc>) -> Result<(), RejectReason>,
		A: FnOnce(&mut Order, DateTime<Utc>),
		E: FnOnce(&Order) -> OrderEvent,
	{
		let now = self.clock.now();
		let result = self
			.store
			.update_order_with(order_id, |order| {
				order.refresh_countdown(now);
				let from = order.status;

				let overdue = from == OrderStatus::Pending
					&& to != OrderStatus::Expired
					&& order.deadline.is_some()
					&& order.remaining_at(now) == 0;
				if overdue {
					order.status = OrderStatus::Expired;
					order.updated_at = now;
					order.freeze_countdown();
					return Mutation::Commit((
						TransitionOutcome::Rejected(RejectReason::InvalidTransition {
							from: OrderStatus::Expired,
							to,
						}),
						true,
					));
				}

				if !is_valid_transition(from, to) {
					return Mutation::Abort((
						TransitionOutcome::Rejected(RejectReason::InvalidTransition { from, to }),
						false,
					));
				}
				if let Err(reason) = guard(order, now) {
					return Mutation::Abort((TransitionOutcome::Rejected(reason), false));
				}

				apply(order, now);
				order.status = to;
				order.updated_at = now;
				Mutation::Commit((TransitionOutcome::Applied(order.clone()), false))
			})
			.await?;

		let Some((outcome, expired_on_contact)) = result else {
			tracing::debug!(order_id, to = %to, "Order not found");
			return Ok(TransitionOutcome::Rejected(RejectReason::NotFound));
		};

		if expired_on_contact {
			tracing::info!(order_id, "Order expired");
			self.events.publish(OrderEvent::Expired { order_id });
		}

		match &outcome {
			TransitionOutcome::Applied(order) => {
				tracing::info!(
					order_id,
					status = %order.status,
					countdown = order.countdown,
					"Order transitioned"
				);
				self.events.publish(event(order));
			},
			TransitionOutcome::Rejected(reason) => {
				tracing::debug!(order_id, to = %to, reason = %reason, "Transition rejected");
			},
		}
		Ok(outcome)
	}
}
