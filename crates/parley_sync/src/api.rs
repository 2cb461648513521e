#![forbid(unsafe_code)]

use std::future::Future;
use std::pin::Pin;

use parley_client_core::{ChannelControl, ChannelEvents, ClientCoreError, RestClient};
use parley_domain::{Conversation, ConversationId, Message, Notification, NotificationId, UserId};
use parley_protocol::ServerEvent;
use parley_protocol::rest::{HistoryQuery, SendMessageRequest};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type BoxedChannelSession = Box<dyn ChannelSessionApi>;
pub type BoxedChannelEvents = Box<dyn ChannelEventsApi>;

/// REST operations the engine depends on.
pub trait ChatApi: Send + Sync {
	fn list_conversations(&self) -> BoxFuture<'_, Result<Vec<Conversation>, ClientCoreError>>;

	fn fetch_history<'a>(
		&'a self,
		peer: &'a UserId,
		query: &'a HistoryQuery,
	) -> BoxFuture<'a, Result<Vec<Message>, ClientCoreError>>;

	fn send_message<'a>(&'a self, body: &'a SendMessageRequest) -> BoxFuture<'a, Result<Message, ClientCoreError>>;

	fn mark_conversation_read<'a>(&'a self, conversation: &'a ConversationId) -> BoxFuture<'a, Result<(), ClientCoreError>>;

	fn list_notifications(&self) -> BoxFuture<'_, Result<Vec<Notification>, ClientCoreError>>;

	fn mark_notification_read<'a>(&'a self, id: &'a NotificationId) -> BoxFuture<'a, Result<(), ClientCoreError>>;

	fn mark_all_notifications_read(&self) -> BoxFuture<'_, Result<(), ClientCoreError>>;

	fn delete_notification<'a>(&'a self, id: &'a NotificationId) -> BoxFuture<'a, Result<(), ClientCoreError>>;
}

/// Control half of an open push channel.
pub trait ChannelSessionApi: Send {
	fn identity(&self) -> &UserId;

	fn open_events_stream(&mut self) -> Result<BoxedChannelEvents, ClientCoreError>;

	fn ping(&mut self) -> BoxFuture<'_, Result<(), ClientCoreError>>;

	fn close<'a>(&'a mut self, reason: &'a str) -> BoxFuture<'a, ()>;
}

/// Reader half of an open push channel.
pub trait ChannelEventsApi: Send {
	fn run_events_loop<'a>(
		&'a mut self,
		on_event: Box<dyn FnMut(ServerEvent) + Send + 'a>,
	) -> BoxFuture<'a, Result<(), ClientCoreError>>;
}

impl ChatApi for RestClient {
	fn list_conversations(&self) -> BoxFuture<'_, Result<Vec<Conversation>, ClientCoreError>> {
		Box::pin(RestClient::list_conversations(self))
	}

	fn fetch_history<'a>(
		&'a self,
		peer: &'a UserId,
		query: &'a HistoryQuery,
	) -> BoxFuture<'a, Result<Vec<Message>, ClientCoreError>> {
		Box::pin(RestClient::fetch_history(self, peer, query))
	}

	fn send_message<'a>(&'a self, body: &'a SendMessageRequest) -> BoxFuture<'a, Result<Message, ClientCoreError>> {
		Box::pin(RestClient::send_message(self, body))
	}

	fn mark_conversation_read<'a>(&'a self, conversation: &'a ConversationId) -> BoxFuture<'a, Result<(), ClientCoreError>> {
		Box::pin(RestClient::mark_conversation_read(self, conversation))
	}

	fn list_notifications(&self) -> BoxFuture<'_, Result<Vec<Notification>, ClientCoreError>> {
		Box::pin(RestClient::list_notifications(self))
	}

	fn mark_notification_read<'a>(&'a self, id: &'a NotificationId) -> BoxFuture<'a, Result<(), ClientCoreError>> {
		Box::pin(RestClient::mark_notification_read(self, id))
	}

	fn mark_all_notifications_read(&self) -> BoxFuture<'_, Result<(), ClientCoreError>> {
		Box::pin(RestClient::mark_all_notifications_read(self))
	}

	fn delete_notification<'a>(&'a self, id: &'a NotificationId) -> BoxFuture<'a, Result<(), ClientCoreError>> {
		Box::pin(RestClient::delete_notification(self, id))
	}
}

impl ChannelSessionApi for ChannelControl {
	fn identity(&self) -> &UserId {
		ChannelControl::identity(self)
	}

	fn open_events_stream(&mut self) -> Result<BoxedChannelEvents, ClientCoreError> {
		ChannelControl::open_events_stream(self).map(|e| Box::new(e) as BoxedChannelEvents)
	}

	fn ping(&mut self) -> BoxFuture<'_, Result<(), ClientCoreError>> {
		Box::pin(ChannelControl::ping(self))
	}

	fn close<'a>(&'a mut self, reason: &'a str) -> BoxFuture<'a, ()> {
		Box::pin(ChannelControl::close(self, reason))
	}
}

impl ChannelEventsApi for ChannelEvents {
	fn run_events_loop<'a>(
		&'a mut self,
		mut on_event: Box<dyn FnMut(ServerEvent) + Send + 'a>,
	) -> BoxFuture<'a, Result<(), ClientCoreError>> {
		Box::pin(async move { ChannelEvents::run_events_loop(self, &mut on_event).await })
	}
}
