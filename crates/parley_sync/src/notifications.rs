#![forbid(unsafe_code)]

use parley_domain::{Notification, NotificationId};

/// Notifications for the current user, newest first, unique by id.
#[derive(Debug, Clone, Default)]
pub struct NotificationCenter {
	items: Vec<Notification>,
	loaded: bool,
}

impl NotificationCenter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn all(&self) -> &[Notification] {
		&self.items
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn is_loaded(&self) -> bool {
		self.loaded
	}

	pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
		self.items.iter().find(|n| &n.id == id)
	}

	/// Replace everything with a server snapshot.
	pub fn set_all(&mut self, items: Vec<Notification>) {
		let mut seen = std::collections::HashSet::new();
		let mut items: Vec<Notification> = items.into_iter().filter(|n| seen.insert(n.id.clone())).collect();
		items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		self.items = items;
		self.loaded = true;
	}

	/// Mark the center as loaded without content (first load failed).
	pub fn mark_loaded_empty(&mut self) {
		if !self.loaded {
			self.items.clear();
			self.loaded = true;
		}
	}

	/// Prepend a pushed notification. Returns `false` for ids already held.
	pub fn add(&mut self, notification: Notification) -> bool {
		if self.get(&notification.id).is_some() {
			return false;
		}
		self.items.insert(0, notification);
		true
	}

	/// Returns `false` if the id is unknown.
	pub fn mark_read(&mut self, id: &NotificationId) -> bool {
		match self.items.iter_mut().find(|n| &n.id == id) {
			Some(n) => {
				n.read = true;
				true
			}
			None => false,
		}
	}

	/// Mark everything read; returns how many changed.
	pub fn mark_all_read(&mut self) -> usize {
		let mut changed = 0;
		for n in self.items.iter_mut().filter(|n| !n.read) {
			n.read = true;
			changed += 1;
		}
		changed
	}

	/// Returns `false` if the id is unknown.
	pub fn remove(&mut self, id: &NotificationId) -> bool {
		let before = self.items.len();
		self.items.retain(|n| &n.id != id);
		self.items.len() != before
	}

	pub fn unread_count(&self) -> usize {
		self.items.iter().filter(|n| !n.read).count()
	}

	pub fn clear(&mut self) {
		self.items.clear();
		self.loaded = false;
	}
}

#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Utc};
	use parley_domain::{NotificationKind, UserId};

	use super::*;

	fn nid(s: &str) -> NotificationId {
		NotificationId::new(s).unwrap()
	}

	fn note(id: &str, min: u32, read: bool) -> Notification {
		Notification {
			id: nid(id),
			recipient: UserId::new("u1").unwrap(),
			message: format!("notification {id}"),
			kind: NotificationKind::StatusChange,
			read,
			created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, min, 0).unwrap(),
		}
	}

	#[test]
	fn add_prepends_and_ignores_duplicates() {
		let mut c = NotificationCenter::new();
		c.set_all(vec![note("n1", 1, false)]);
		assert!(c.add(note("n2", 2, false)));
		assert!(!c.add(note("n1", 1, false)));
		let ids: Vec<&str> = c.all().iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, vec!["n2", "n1"]);
	}

	#[test]
	fn set_all_orders_newest_first() {
		let mut c = NotificationCenter::new();
		c.set_all(vec![note("n1", 1, false), note("n3", 3, true), note("n2", 2, false)]);
		let ids: Vec<&str> = c.all().iter().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, vec!["n3", "n2", "n1"]);
		assert_eq!(c.unread_count(), 2);
	}

	#[test]
	fn mark_and_remove() {
		let mut c = NotificationCenter::new();
		c.set_all(vec![note("n1", 1, false), note("n2", 2, false), note("n3", 3, true)]);

		assert!(c.mark_read(&nid("n1")));
		assert!(!c.mark_read(&nid("nope")));
		assert_eq!(c.unread_count(), 1);

		assert_eq!(c.mark_all_read(), 1);
		assert_eq!(c.unread_count(), 0);

		assert!(c.remove(&nid("n2")));
		assert!(!c.remove(&nid("n2")));
		assert_eq!(c.len(), 2);
	}
}
