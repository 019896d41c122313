//! Order lifecycle core for the campus errand system.
//!
//! Orders are kept in per-service buckets of a key-value store. The
//! [`OrderLifecycle`] moves them through pending, accepted, in progress and
//! completed (or expired and canceled) while [`CountdownScheduler`] keeps an
//! open order list fresh and expires orders nobody grabbed in time.

pub mod builder;
pub mod classify;
pub mod clock;
pub mod event_bus;
pub mod ids;
pub mod pricing;
pub mod repository;
pub mod scheduler;
pub mod state;

pub use builder::{BuilderError, LifecycleBuilder};
pub use classify::{classify, Classified, OrderFilter, SortKey};
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::ManualClock;
pub use event_bus::EventBus;
pub use pricing::{quote, PriceExtras, PriceQuote, PricingError};
pub use repository::{Mutation, OrderStore, StoreError};
pub use scheduler::{CountdownScheduler, ViewQuery};
pub use state::{
	LifecycleError, OrderDraft, OrderLifecycle, RejectReason, TransitionOutcome,
};
