//! Time source for countdowns.
//!
//! Countdowns are derived from absolute deadlines, so everything that needs
//! "now" asks a [`Clock`]. Tests substitute a manually advanced clock.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct ManualClock {
	now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "testing"))]
impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: std::sync::Mutex::new(start),
		}
	}

	/// Moves the clock forward by `seconds`.
	pub fn advance(&self, seconds: i64) {
		let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
		*now += chrono::Duration::seconds(seconds);
	}

	pub fn set(&self, to: DateTime<Utc>) {
		*self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
	}
}

#[cfg(any(test, feature = "testing"))]
impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock().unwrap_or_else(|e| e.into_inner())
	}
}
