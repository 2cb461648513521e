#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};

use parley_domain::{ConversationId, Message, MessageId};

/// Ordered messages of one conversation, unique by id.
#[derive(Debug, Clone, Default)]
pub struct MessageStream {
	messages: Vec<Message>,
	ids: HashSet<MessageId>,
}

impl MessageStream {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn messages(&self) -> &[Message] {
		&self.messages
	}

	pub fn len(&self) -> usize {
		self.messages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}

	pub fn contains(&self, id: &MessageId) -> bool {
		self.ids.contains(id)
	}

	/// Replace the content with a fetched history, oldest first.
	///
	/// Later duplicates of an id are dropped.
	pub fn replace_all(&mut self, history: Vec<Message>) {
		self.messages.clear();
		self.ids.clear();
		for msg in history {
			self.push_unique(msg);
		}
		self.messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
	}

	/// Replace with `history`, keeping live messages the fetch did not include.
	///
	/// Messages pushed while the fetch was in flight are not in its snapshot;
	/// they are re-appended after the history in their receipt order.
	pub fn merge_history(&mut self, history: Vec<Message>) {
		let previous = std::mem::take(&mut self.messages);
		self.replace_all(history);
		for msg in previous {
			self.push_unique(msg);
		}
	}

	/// Append a live message. Returns `false` if the id is already present.
	pub fn append(&mut self, msg: Message) -> bool {
		let appended = self.push_unique(msg);
		if !appended {
			metrics::counter!("parley_duplicate_messages_total").increment(1);
		}
		appended
	}

	fn push_unique(&mut self, msg: Message) -> bool {
		if !self.ids.insert(msg.id.clone()) {
			return false;
		}
		self.messages.push(msg);
		true
	}
}

/// Message streams keyed by conversation.
#[derive(Debug, Clone, Default)]
pub struct MessageStreams {
	streams: HashMap<ConversationId, MessageStream>,
}

impl MessageStreams {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, conversation: &ConversationId) -> Option<&MessageStream> {
		self.streams.get(conversation)
	}

	/// Messages of `conversation`; empty if nothing was loaded yet.
	pub fn messages(&self, conversation: &ConversationId) -> &[Message] {
		self.streams.get(conversation).map(MessageStream::messages).unwrap_or(&[])
	}

	pub fn is_loaded(&self, conversation: &ConversationId) -> bool {
		self.streams.contains_key(conversation)
	}

	pub fn replace_all(&mut self, conversation: &ConversationId, history: Vec<Message>) {
		self.streams.entry(conversation.clone()).or_default().replace_all(history);
	}

	pub fn merge_history(&mut self, conversation: &ConversationId, history: Vec<Message>) {
		self.streams.entry(conversation.clone()).or_default().merge_history(history);
	}

	/// Make sure `conversation` has a (possibly empty) stream.
	pub fn ensure(&mut self, conversation: &ConversationId) {
		self.streams.entry(conversation.clone()).or_default();
	}

	pub fn append(&mut self, conversation: &ConversationId, msg: Message) -> bool {
		self.streams.entry(conversation.clone()).or_default().append(msg)
	}

	pub fn clear(&mut self) {
		self.streams.clear();
	}
}
