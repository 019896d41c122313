//! Common types for the campus errand order system.
//!
//! This crate defines the data model shared by every other crate: orders and
//! their service-specific payloads, the storage bucket layout, lifecycle
//! events and configuration validation primitives.

/// Lifecycle events published when orders change state.
pub mod events;
/// Identity of the user acting on orders.
pub mod identity;
/// Order records, statuses and payment states.
pub mod order;
/// Base trait for self-registering implementations.
pub mod registry;
/// Service types and their strongly typed payloads.
pub mod service;
/// Storage keys for the per-service order buckets.
pub mod storage;
/// Formatting and timestamp parsing helpers.
pub mod utils;
/// Configuration validation types.
pub mod validation;

pub use events::*;
pub use identity::*;
pub use order::*;
pub use registry::*;
pub use service::*;
pub use storage::*;
pub use utils::{format_countdown, parse_timestamp, truncate_id};
pub use validation::*;
