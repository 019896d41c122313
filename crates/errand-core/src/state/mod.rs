//! Order state management.

pub mod lifecycle;
pub mod transitions;

pub use lifecycle::{LifecycleError, OrderDraft, OrderLifecycle};
pub use transitions::{is_valid_transition, RejectReason, TransitionOutcome};
