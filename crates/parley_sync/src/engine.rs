#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use parley_client_core::ClientCoreError;
use parley_domain::{ConversationId, Message, NotificationId, UserId};
use parley_protocol::ServerEvent;
use parley_protocol::rest::{HistoryQuery, SendMessageRequest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::ChatApi;
use crate::connection::ChannelEvent;
use crate::conversations::SelectionTicket;
use crate::error::SyncError;
use crate::events::{EngineEvent, ToastKind};
use crate::router::{self, Routed};
use crate::state::{EngineSnapshot, EngineState};

/// Result of a history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
	/// The stream now holds `messages` messages.
	Applied { messages: usize },
	/// The selection moved on while the fetch was in flight.
	Discarded,
}

#[derive(Debug, Default)]
struct LinkState {
	connected: bool,
	connected_once: bool,
}

struct Inner {
	state: Mutex<EngineState>,
	link: Mutex<LinkState>,
	api: Arc<dyn ChatApi>,
	events_tx: mpsc::UnboundedSender<EngineEvent>,
}

/// Sync engine for one logged-in identity.
///
/// Cheap to clone; clones share state. Every mutation takes the state lock
/// briefly and never across a REST call, so pushed events and user actions are
/// applied one at a time.
#[derive(Clone)]
pub struct SyncEngine {
	inner: Arc<Inner>,
}

impl SyncEngine {
	pub fn new(current_user: UserId, api: Arc<dyn ChatApi>, events_tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(EngineState::new(current_user)),
				link: Mutex::new(LinkState::default()),
				api,
				events_tx,
			}),
		}
	}

	pub fn current_user(&self) -> UserId {
		self.inner.state.lock().current_user().clone()
	}

	pub fn is_connected(&self) -> bool {
		self.inner.link.lock().connected
	}

	/// Run `f` against the current state.
	pub fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
		f(&*self.inner.state.lock())
	}

	pub fn snapshot(&self) -> EngineSnapshot {
		self.inner.state.lock().snapshot()
	}

	/// Drop all state at logout. Clones held elsewhere see an empty engine.
	pub fn reset(&self) {
		self.inner.state.lock().clear();
		self.inner.link.lock().connected = false;
		debug!("engine state cleared");
	}

	fn emit(&self, ev: EngineEvent) {
		if self.inner.events_tx.send(ev).is_err() {
			debug!("engine event receiver dropped");
		}
	}

	fn toast(&self, kind: ToastKind, message: impl Into<String>) {
		self.emit(EngineEvent::toast(kind, message));
	}

	/// Log, toast, and convert a failed user action.
	fn action_failed(&self, what: &str, e: ClientCoreError) -> SyncError {
		warn!(action = what, error = %e, "action failed");
		self.toast(ToastKind::Error, format!("{what} failed: {e}"));
		SyncError::Client(e)
	}

	/// Fetch the conversation list and replace the local one.
	///
	/// On failure the previous list stays (an empty one on first load) and a
	/// warning toast is emitted.
	pub async fn load_conversations(&self) -> Result<(), SyncError> {
		match self.inner.api.list_conversations().await {
			Ok(list) => {
				let count = list.len();
				self.inner.state.lock().conversations.set_all(list);
				debug!(count, "conversations loaded");
				self.emit(EngineEvent::ConversationsChanged);
				Ok(())
			}
			Err(e) => {
				self.inner.state.lock().conversations.mark_loaded_empty();
				warn!(error = %e, "conversation list fetch failed");
				self.toast(ToastKind::Warning, format!("could not load conversations: {e}"));
				Err(e.into())
			}
		}
	}

	/// Select a conversation: its unread count drops to zero and a server
	/// mark-read is fired in the background.
	pub fn select(&self, id: &ConversationId) -> Result<SelectionTicket, SyncError> {
		let ticket = self
			.inner
			.state
			.lock()
			.conversations
			.select(id)
			.ok_or_else(|| SyncError::UnknownConversation(id.clone()))?;
		debug!(conversation = %id, generation = ticket.generation, "conversation selected");
		self.emit(EngineEvent::ConversationsChanged);
		self.spawn_mark_read(id.clone());
		Ok(ticket)
	}

	/// Clear the selection; later messages for that thread count as unread.
	pub fn deselect(&self) {
		self.inner.state.lock().conversations.deselect();
		self.emit(EngineEvent::ConversationsChanged);
	}

	/// Fetch history for the conversation named by `ticket`.
	///
	/// The result is applied only if the ticket still names the current
	/// selection when the fetch resolves; otherwise it is dropped.
	pub async fn load_history(&self, ticket: &SelectionTicket) -> Result<HistoryOutcome, SyncError> {
		let (peer, query) = {
			let st = self.inner.state.lock();
			let conv = st
				.conversations
				.get(&ticket.conversation)
				.ok_or_else(|| SyncError::UnknownConversation(ticket.conversation.clone()))?;
			let query = HistoryQuery {
				job_id: conv.job_id.clone(),
				application_id: conv.application_id.clone(),
			};
			(conv.peer_of(st.current_user()).clone(), query)
		};

		let result = self.inner.api.fetch_history(&peer, &query).await;

		let applied = {
			let mut st = self.inner.state.lock();
			if !st.conversations.is_current(ticket) {
				None
			} else {
				Some(match result {
					Ok(history) => {
						st.messages.merge_history(&ticket.conversation, history);
						Ok(st.messages.messages(&ticket.conversation).len())
					}
					Err(e) => {
						st.messages.ensure(&ticket.conversation);
						Err(e)
					}
				})
			}
		};

		match applied {
			None => {
				debug!(conversation = %ticket.conversation, generation = ticket.generation, "stale history discarded");
				metrics::counter!("parley_stale_history_discarded_total").increment(1);
				Ok(HistoryOutcome::Discarded)
			}
			Some(Ok(messages)) => {
				debug!(conversation = %ticket.conversation, messages, "history applied");
				self.emit(EngineEvent::MessagesChanged {
					conversation: ticket.conversation.clone(),
				});
				Ok(HistoryOutcome::Applied { messages })
			}
			Some(Err(e)) => {
				warn!(conversation = %ticket.conversation, error = %e, "history fetch failed");
				self.toast(ToastKind::Warning, format!("could not load messages: {e}"));
				Err(e.into())
			}
		}
	}

	/// Select a conversation and load its history.
	pub async fn open(&self, id: &ConversationId) -> Result<HistoryOutcome, SyncError> {
		let ticket = self.select(id)?;
		self.load_history(&ticket).await
	}

	/// Send `body` to the selected conversation.
	///
	/// Failures are surfaced as an error toast and returned; the text is never
	/// dropped silently.
	pub async fn send_message(&self, body: &str) -> Result<Message, SyncError> {
		let body = body.trim();
		if body.is_empty() {
			return Err(SyncError::EmptyMessage);
		}

		let request = {
			let st = self.inner.state.lock();
			let conv = st.conversations.selected().ok_or(SyncError::NoConversationSelected)?;
			SendMessageRequest {
				conversation_id: conv.id.clone(),
				receiver_id: conv.peer_of(st.current_user()).clone(),
				content: body.to_string(),
				job_id: conv.job_id.clone(),
				application_id: conv.application_id.clone(),
				client_message_id: Uuid::new_v4().to_string(),
			}
		};

		let msg = match self.inner.api.send_message(&request).await {
			Ok(msg) => msg,
			Err(e) => {
				warn!(conversation = %request.conversation_id, key = %request.client_message_id, error = %e, "send failed");
				self.toast(ToastKind::Error, format!("message not sent: {e}"));
				return Err(e.into());
			}
		};

		let route = router::route_message(&mut self.inner.state.lock(), msg.clone());
		info!(message = %msg.id, conversation = %route.conversation, "message sent");
		self.emit(EngineEvent::ConversationsChanged);
		if route.appended {
			self.emit(EngineEvent::MessagesChanged {
				conversation: route.conversation,
			});
		}
		Ok(msg)
	}

	/// Apply one pushed event.
	pub fn handle_server_event(&self, event: ServerEvent) {
		let routed = router::route_event(&mut self.inner.state.lock(), event);
		match routed {
			Routed::Presence { .. } => self.emit(EngineEvent::PresenceChanged),
			Routed::Message(route) => {
				self.emit(EngineEvent::ConversationsChanged);
				if route.appended {
					self.emit(EngineEvent::MessagesChanged {
						conversation: route.conversation.clone(),
					});
				}
				if route.open {
					self.spawn_mark_read(route.conversation);
				}
			}
			Routed::Notification { added, notification } => {
				if added {
					self.emit(EngineEvent::NotificationsChanged);
					self.toast(ToastKind::Info, notification.message);
				}
			}
		}
	}

	/// Apply one item from the connection task.
	///
	/// Items tagged with another identity belong to a previous login and are
	/// dropped.
	pub fn handle_channel_event(&self, event: ChannelEvent) {
		let me = self.current_user();
		match event {
			ChannelEvent::Event { identity, event } => {
				if identity != me {
					debug!(%identity, event = event.name(), "push event for another identity dropped");
					return;
				}
				self.handle_server_event(event);
			}
			ChannelEvent::Connecting { identity } if identity == me => {
				self.emit(EngineEvent::Connecting { identity });
			}
			ChannelEvent::Connected { identity } if identity == me => {
				let reconnected = {
					let mut link = self.inner.link.lock();
					let again = link.connected_once;
					link.connected = true;
					link.connected_once = true;
					again
				};
				self.emit(EngineEvent::Connected { identity });
				if reconnected {
					self.spawn_catch_up();
				}
			}
			ChannelEvent::Reconnecting {
				identity,
				attempt,
				next_retry_in_ms,
			} if identity == me => {
				self.emit(EngineEvent::Reconnecting {
					attempt,
					next_retry_in_ms,
				});
			}
			ChannelEvent::Disconnected { identity, reason } if identity.as_ref().is_none_or(|i| i == &me) => {
				self.inner.link.lock().connected = false;
				self.emit(EngineEvent::Disconnected { reason });
			}
			other => debug!(?other, "status for another identity dropped"),
		}
	}

	/// Re-fetch what may have been missed while the channel was down.
	pub async fn catch_up(&self) {
		info!("catching up after reconnect");
		if let Err(e) = self.load_conversations().await {
			debug!(error = %e, "catch-up: conversations not refreshed");
		}
		if let Err(e) = self.load_notifications().await {
			debug!(error = %e, "catch-up: notifications not refreshed");
		}

		let ticket = self.inner.state.lock().conversations.current_ticket();
		if let Some(ticket) = ticket {
			if let Err(e) = self.load_history(&ticket).await {
				debug!(conversation = %ticket.conversation, error = %e, "catch-up: history not refreshed");
			}
		}
	}

	/// Load conversations and notifications in the background.
	pub fn spawn_initial_load(&self) {
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			warn!("no async runtime; initial load skipped");
			return;
		};
		let engine = self.clone();
		handle.spawn(async move {
			if let Err(e) = engine.load_conversations().await {
				debug!(error = %e, "initial conversation load failed");
			}
			if let Err(e) = engine.load_notifications().await {
				debug!(error = %e, "initial notification load failed");
			}
		});
	}

	fn spawn_catch_up(&self) {
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			warn!("no async runtime; catch-up skipped");
			return;
		};
		let engine = self.clone();
		handle.spawn(async move { engine.catch_up().await });
	}

	fn spawn_mark_read(&self, conversation: ConversationId) {
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			warn!(%conversation, "no async runtime; mark-read skipped");
			return;
		};
		let api = Arc::clone(&self.inner.api);
		handle.spawn(async move {
			match api.mark_conversation_read(&conversation).await {
				Ok(()) => debug!(%conversation, "conversation marked read"),
				Err(e) => warn!(%conversation, error = %e, "mark read failed"),
			}
		});
	}

	/// Fetch the notification feed and replace the local one.
	pub async fn load_notifications(&self) -> Result<(), SyncError> {
		match self.inner.api.list_notifications().await {
			Ok(items) => {
				self.inner.state.lock().notifications.set_all(items);
				self.emit(EngineEvent::NotificationsChanged);
				Ok(())
			}
			Err(e) => {
				self.inner.state.lock().notifications.mark_loaded_empty();
				warn!(error = %e, "notification fetch failed");
				self.toast(ToastKind::Warning, format!("could not load notifications: {e}"));
				Err(e.into())
			}
		}
	}

	pub async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), SyncError> {
		if let Err(e) = self.inner.api.mark_notification_read(id).await {
			return Err(self.action_failed("mark notification read", e));
		}
		if self.inner.state.lock().notifications.mark_read(id) {
			self.emit(EngineEvent::NotificationsChanged);
		}
		Ok(())
	}

	pub async fn mark_all_notifications_read(&self) -> Result<(), SyncError> {
		if let Err(e) = self.inner.api.mark_all_notifications_read().await {
			return Err(self.action_failed("mark all notifications read", e));
		}
		if self.inner.state.lock().notifications.mark_all_read() > 0 {
			self.emit(EngineEvent::NotificationsChanged);
		}
		Ok(())
	}

	pub async fn remove_notification(&self, id: &NotificationId) -> Result<(), SyncError> {
		if let Err(e) = self.inner.api.delete_notification(id).await {
			return Err(self.action_failed("delete notification", e));
		}
		if self.inner.state.lock().notifications.remove(id) {
			self.emit(EngineEvent::NotificationsChanged);
		}
		Ok(())
	}
}
