#![forbid(unsafe_code)]

use std::collections::HashSet;

use parley_domain::UserId;

/// Set of identities the server currently reports online.
///
/// Every broadcast is a full snapshot: it replaces the set, it is never merged.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
	online: HashSet<UserId>,
}

impl PresenceTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the online set with a broadcast snapshot. Duplicates collapse.
	pub fn replace<I>(&mut self, users: I)
	where
		I: IntoIterator<Item = UserId>,
	{
		self.online = users.into_iter().collect();
	}

	pub fn is_online(&self, user: &UserId) -> bool {
		self.online.contains(user)
	}

	pub fn len(&self) -> usize {
		self.online.len()
	}

	pub fn is_empty(&self) -> bool {
		self.online.is_empty()
	}

	/// Online identities in a stable order, for display.
	pub fn online(&self) -> Vec<UserId> {
		let mut users: Vec<UserId> = self.online.iter().cloned().collect();
		users.sort();
		users
	}

	pub fn clear(&mut self) {
		self.online.clear();
	}
}
