#![forbid(unsafe_code)]

//! Applies pushed channel events to [`EngineState`].
//!
//! Routing is synchronous and side-effect free apart from the state mutation;
//! the returned outcome tells the caller which follow-ups (mark-read, toasts,
//! change notifications) are due.

use parley_domain::{Conversation, ConversationId, Message, Notification, UserId};
use parley_protocol::ServerEvent;
use tracing::debug;

use crate::matching;
use crate::state::EngineState;

/// What happened to one pushed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRoute {
	/// Conversation whose summary was updated.
	pub conversation: ConversationId,
	/// The message belongs to the selected conversation.
	pub open: bool,
	/// The message was new to the open stream.
	pub appended: bool,
	/// The conversation was created from this message.
	pub created: bool,
	pub unread_incremented: bool,
}

impl MessageRoute {
	fn disposition(&self) -> &'static str {
		match (self.open, self.appended, self.created) {
			(true, true, _) => "open",
			(true, false, _) => "duplicate",
			(false, _, true) => "created",
			(false, _, false) => "background",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
	Presence { online: usize },
	Message(MessageRoute),
	Notification { added: bool, notification: Notification },
}

pub fn route_event(state: &mut EngineState, event: ServerEvent) -> Routed {
	match event {
		ServerEvent::PresenceUpdate(users) => {
			state.presence.replace(users);
			debug!(online = state.presence.len(), "presence replaced");
			Routed::Presence {
				online: state.presence.len(),
			}
		}
		ServerEvent::NewMessage(msg) => Routed::Message(route_message(state, msg)),
		ServerEvent::NewNotification(n) => {
			let added = state.notifications.add(n.clone());
			debug!(notification = %n.id, kind = %n.kind, added, "notification routed");
			Routed::Notification { added, notification: n }
		}
	}
}

/// The selected conversation, if `msg` belongs to it.
pub fn open_conversation_for(state: &EngineState, msg: &Message) -> Option<ConversationId> {
	let selected = state.conversations.selected()?;
	matching::matches(selected, msg, state.current_user()).map(|_| selected.id.clone())
}

pub fn route_message(state: &mut EngineState, msg: Message) -> MessageRoute {
	let me: UserId = state.current_user().clone();
	let open = open_conversation_for(state, &msg);
	let from_peer = msg.sender_id != me;

	let route = match open {
		Some(id) => {
			state.conversations.record_message(&id, &msg, false);
			let appended = state.messages.append(&id, msg.clone());
			MessageRoute {
				conversation: id,
				open: true,
				appended,
				created: false,
				unread_incremented: false,
			}
		}
		None => match state.conversations.find_for_message(&msg, &me) {
			Some(id) => {
				let unread_incremented = state.conversations.record_message(&id, &msg, from_peer);
				if state.messages.is_loaded(&id) {
					state.messages.append(&id, msg.clone());
				}
				MessageRoute {
					conversation: id,
					open: false,
					appended: false,
					created: false,
					unread_incremented,
				}
			}
			None => {
				let conv = Conversation::from_first_message(&msg, &me);
				let id = conv.id.clone();
				let unread_incremented = conv.unread_count > 0;
				state.conversations.insert(conv);
				MessageRoute {
					conversation: id,
					open: false,
					appended: false,
					created: true,
					unread_incremented,
				}
			}
		},
	};

	debug!(
		message = %msg.id,
		conversation = %route.conversation,
		scope = %msg.scope(),
		disposition = route.disposition(),
		unread_incremented = route.unread_incremented,
		"message routed"
	);
	metrics::counter!("parley_router_messages_total", "disposition" => route.disposition()).increment(1);

	route
}
