//! User identity as provided by the session layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
	/// Stable user identifier.
	pub id: String,
	/// Display name, stored on orders as publisher or acceptor name.
	pub name: String,
}

impl UserIdentity {
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
		}
	}
}

impl fmt::Display for UserIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.name, self.id)
	}
}
