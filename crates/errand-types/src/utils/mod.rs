//! Utility functions for display formatting and stored-data parsing.

pub mod formatting;
pub mod timestamps;

pub use formatting::{format_countdown, truncate_id};
pub use timestamps::parse_timestamp;
