#![forbid(unsafe_code)]

use parley_domain::{Conversation, ConversationId, Message, Notification, UserId};

use crate::conversations::ConversationStore;
use crate::messages::MessageStreams;
use crate::notifications::NotificationCenter;
use crate::presence::PresenceTracker;

/// Everything the engine knows for one logged-in identity.
#[derive(Debug, Clone)]
pub struct EngineState {
	current_user: UserId,
	pub presence: PresenceTracker,
	pub conversations: ConversationStore,
	pub messages: MessageStreams,
	pub notifications: NotificationCenter,
}

impl EngineState {
	pub fn new(current_user: UserId) -> Self {
		Self {
			current_user,
			presence: PresenceTracker::new(),
			conversations: ConversationStore::new(),
			messages: MessageStreams::new(),
			notifications: NotificationCenter::new(),
		}
	}

	pub fn current_user(&self) -> &UserId {
		&self.current_user
	}

	/// Forget everything learned for this identity; the selection goes too.
	pub fn clear(&mut self) {
		self.presence.clear();
		self.conversations.clear();
		self.messages.clear();
		self.notifications.clear();
	}

	/// Peer of a listed conversation.
	pub fn peer_of(&self, id: &ConversationId) -> Option<&UserId> {
		self.conversations.get(id).map(|c| c.peer_of(&self.current_user))
	}

	/// The conversation's peer is in the current presence snapshot.
	pub fn is_peer_online(&self, id: &ConversationId) -> bool {
		self.peer_of(id).is_some_and(|peer| self.presence.is_online(peer))
	}

	/// Messages of the selected conversation; empty when nothing is selected.
	pub fn selected_messages(&self) -> &[Message] {
		match self.conversations.selected_id() {
			Some(id) => self.messages.messages(id),
			None => &[],
		}
	}

	pub fn snapshot(&self) -> EngineSnapshot {
		let conversations = self
			.conversations
			.all()
			.iter()
			.map(|c| {
				let peer = c.peer_of(&self.current_user).clone();
				ConversationView {
					peer_online: self.presence.is_online(&peer),
					selected: self.conversations.is_selected(&c.id),
					conversation: c.clone(),
					peer,
				}
			})
			.collect();

		EngineSnapshot {
			current_user: self.current_user.clone(),
			conversations,
			selected: self.conversations.selected_id().cloned(),
			messages: self.selected_messages().to_vec(),
			notifications: self.notifications.all().to_vec(),
			unread_messages: self.conversations.total_unread(),
			unread_notifications: self.notifications.unread_count(),
			online: self.presence.online(),
		}
	}
}

/// One conversation row as shown in a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
	pub conversation: Conversation,
	pub peer: UserId,
	pub peer_online: bool,
	pub selected: bool,
}

/// Read-only copy of derived state for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
	pub current_user: UserId,
	pub conversations: Vec<ConversationView>,
	pub selected: Option<ConversationId>,
	/// Stream of the selected conversation.
	pub messages: Vec<Message>,
	pub notifications: Vec<Notification>,
	pub unread_messages: u64,
	pub unread_notifications: usize,
	pub online: Vec<UserId>,
}
