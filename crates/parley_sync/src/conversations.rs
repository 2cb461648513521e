#![forbid(unsafe_code)]

use parley_domain::{Conversation, ConversationId, Message, UserId};

use crate::matching;

/// Identifies one selection of one conversation.
///
/// Every `select` (and `deselect`) advances the generation, so a ticket taken
/// before a fetch tells whether the user is still looking at the same thread
/// when the fetch resolves. Re-selecting the same conversation also invalidates
/// older tickets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
	pub conversation: ConversationId,
	pub generation: u64,
}

/// Conversation summaries ordered by most recent activity, plus the selection.
///
/// Invariants kept by every mutation:
/// - the list is sorted by `updated_at`, newest first;
/// - ids are unique;
/// - the selected conversation, if any, has `unread_count == 0`.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
	conversations: Vec<Conversation>,
	selected: Option<ConversationId>,
	generation: u64,
	loaded: bool,
}

impl ConversationStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn all(&self) -> &[Conversation] {
		&self.conversations
	}

	pub fn len(&self) -> usize {
		self.conversations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.conversations.is_empty()
	}

	/// A list was received from the server at least once.
	pub fn is_loaded(&self) -> bool {
		self.loaded
	}

	pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
		self.conversations.iter().find(|c| &c.id == id)
	}

	fn position(&self, id: &ConversationId) -> Option<usize> {
		self.conversations.iter().position(|c| &c.id == id)
	}

	pub fn selected_id(&self) -> Option<&ConversationId> {
		self.selected.as_ref()
	}

	pub fn selected(&self) -> Option<&Conversation> {
		self.selected.as_ref().and_then(|id| self.get(id))
	}

	pub fn is_selected(&self, id: &ConversationId) -> bool {
		self.selected.as_ref() == Some(id)
	}

	/// Replace the whole list with a server snapshot.
	///
	/// Duplicate ids keep their first occurrence. The selection survives if the
	/// selected conversation is still listed; otherwise it is cleared.
	pub fn set_all(&mut self, conversations: Vec<Conversation>) {
		let mut seen = std::collections::HashSet::new();
		let mut list: Vec<Conversation> = conversations.into_iter().filter(|c| seen.insert(c.id.clone())).collect();
		list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

		self.conversations = list;
		self.loaded = true;

		match self.selected.clone() {
			Some(id) if self.position(&id).is_some() => self.zero_unread(&id),
			Some(_) => {
				self.selected = None;
				self.generation = self.generation.wrapping_add(1);
			}
			None => {}
		}
	}

	/// Mark the list as loaded without content (first load failed).
	pub fn mark_loaded_empty(&mut self) {
		if !self.loaded {
			self.conversations.clear();
			self.loaded = true;
		}
	}

	/// Select a conversation and clear its unread count.
	///
	/// Returns `None` for ids that are not in the list.
	pub fn select(&mut self, id: &ConversationId) -> Option<SelectionTicket> {
		self.position(id)?;
		self.selected = Some(id.clone());
		self.generation = self.generation.wrapping_add(1);
		self.zero_unread(id);
		Some(SelectionTicket {
			conversation: id.clone(),
			generation: self.generation,
		})
	}

	pub fn deselect(&mut self) {
		if self.selected.take().is_some() {
			self.generation = self.generation.wrapping_add(1);
		}
	}

	/// Ticket for the current selection, without starting a new one.
	pub fn current_ticket(&self) -> Option<SelectionTicket> {
		self.selected.as_ref().map(|id| SelectionTicket {
			conversation: id.clone(),
			generation: self.generation,
		})
	}

	/// The ticket still names the current selection.
	pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
		self.generation == ticket.generation && self.selected.as_ref() == Some(&ticket.conversation)
	}

	pub fn zero_unread(&mut self, id: &ConversationId) {
		if let Some(conv) = self.conversations.iter_mut().find(|c| &c.id == id) {
			conv.unread_count = 0;
		}
	}

	/// Conversation a message that is not shown live belongs to.
	///
	/// Prefers the most specific scope match among related conversations, then
	/// falls back to the message's own conversation id.
	pub fn find_for_message(&self, msg: &Message, me: &UserId) -> Option<ConversationId> {
		matching::best_match(&self.conversations, msg, me)
			.map(|c| c.id.clone())
			.or_else(|| self.get(&msg.conversation_id).map(|c| c.id.clone()))
	}

	/// Fold a message into an existing summary and move it to its new position.
	///
	/// `last_message` and `updated_at` only move forward in time. The unread
	/// count grows by one when `count_unread` is set, except for the selected
	/// conversation, which always stays at zero. Returns whether the unread
	/// count grew.
	pub fn record_message(&mut self, id: &ConversationId, msg: &Message, count_unread: bool) -> bool {
		let Some(idx) = self.position(id) else {
			return false;
		};
		let selected = self.is_selected(id);

		let mut conv = self.conversations.remove(idx);
		if msg.created_at >= conv.updated_at {
			conv.last_message = Some(msg.content.clone());
			conv.updated_at = msg.created_at;
		}
		let counted = count_unread && !selected;
		if selected {
			conv.unread_count = 0;
		} else if counted {
			conv.unread_count = conv.unread_count.saturating_add(1);
		}
		self.insert_sorted(conv);
		counted
	}

	/// Add a conversation not seen before. Existing ids are left untouched.
	pub fn insert(&mut self, conv: Conversation) -> bool {
		if self.position(&conv.id).is_some() {
			return false;
		}
		let mut conv = conv;
		if self.is_selected(&conv.id) {
			conv.unread_count = 0;
		}
		self.insert_sorted(conv);
		true
	}

	/// Insert ahead of every conversation not newer than `conv`.
	fn insert_sorted(&mut self, conv: Conversation) {
		let at = self
			.conversations
			.iter()
			.position(|c| c.updated_at <= conv.updated_at)
			.unwrap_or(self.conversations.len());
		self.conversations.insert(at, conv);
	}

	/// Sum of unread counts across all conversations.
	pub fn total_unread(&self) -> u64 {
		self.conversations.iter().map(|c| u64::from(c.unread_count)).sum()
	}

	pub fn clear(&mut self) {
		self.conversations.clear();
		self.deselect();
		self.loaded = false;
	}
}
