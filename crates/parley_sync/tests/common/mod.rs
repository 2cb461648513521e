#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use parley_client_core::{ClientCoreError, Identity};
use parley_domain::{
	ApplicationId, Conversation, ConversationId, JobId, Message, MessageId, Notification, NotificationId, NotificationKind,
	UserId,
};
use parley_protocol::ServerEvent;
use parley_protocol::rest::{HistoryQuery, SendMessageRequest};
use parley_sync::api::{BoxFuture, BoxedChannelEvents, BoxedChannelSession, ChannelEventsApi, ChannelSessionApi, ChatApi};
use parley_sync::connection::ConnectFuture;
use parley_sync::{EngineEvent, SyncEngine};
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;

pub fn uid(s: &str) -> UserId {
	UserId::new(s).expect("valid user id")
}

pub fn cid(s: &str) -> ConversationId {
	ConversationId::new(s).expect("valid conversation id")
}

pub fn nid(s: &str) -> NotificationId {
	NotificationId::new(s).expect("valid notification id")
}

pub fn at(min: i64) -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::minutes(min)
}

/// Conversation between `me` and `peer`, optionally scoped.
pub fn conv(id: &str, me: &str, peer: &str, job: Option<&str>, app: Option<&str>, min: i64) -> Conversation {
	Conversation {
		id: cid(id),
		participants: [uid(me), uid(peer)],
		job_id: job.map(|j| JobId::new(j).unwrap()),
		application_id: app.map(|a| ApplicationId::new(a).unwrap()),
		last_message: None,
		updated_at: at(min),
		unread_count: 0,
	}
}

pub fn msg(id: &str, conv: &str, from: &str, to: &str, job: Option<&str>, app: Option<&str>, min: i64) -> Message {
	Message {
		id: MessageId::new(id).unwrap(),
		conversation_id: cid(conv),
		sender_id: uid(from),
		receiver_id: uid(to),
		job: job.map(|j| JobId::new(j).unwrap()),
		application: app.map(|a| ApplicationId::new(a).unwrap()),
		content: format!("text of {id}"),
		created_at: at(min),
	}
}

pub fn note(id: &str, recipient: &str, min: i64, read: bool) -> Notification {
	Notification {
		id: nid(id),
		recipient: uid(recipient),
		message: format!("notification {id}"),
		kind: NotificationKind::StatusChange,
		read,
		created_at: at(min),
	}
}

fn history_key(peer: &UserId, query: &HistoryQuery) -> String {
	format!(
		"{peer}|{}|{}",
		query.job_id.as_ref().map(JobId::as_str).unwrap_or("-"),
		query.application_id.as_ref().map(ApplicationId::as_str).unwrap_or("-")
	)
}

/// In-memory REST API that records calls.
#[derive(Default)]
pub struct FakeApi {
	pub conversations: Mutex<Vec<Conversation>>,
	pub notifications: Mutex<Vec<Notification>>,
	history: Mutex<HashMap<String, Vec<Message>>>,
	pub calls: Mutex<Vec<String>>,
	pub sent: Mutex<Vec<SendMessageRequest>>,
	failing: Mutex<HashSet<&'static str>>,
	hold_history: AtomicBool,
	history_release: Notify,
	next_sent: AtomicUsize,
}

impl FakeApi {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn set_history(&self, peer: &str, job: Option<&str>, app: Option<&str>, messages: Vec<Message>) {
		let query = HistoryQuery {
			job_id: job.map(|j| JobId::new(j).unwrap()),
			application_id: app.map(|a| ApplicationId::new(a).unwrap()),
		};
		self.history.lock().insert(history_key(&uid(peer), &query), messages);
	}

	pub fn fail(&self, op: &'static str) {
		self.failing.lock().insert(op);
	}

	pub fn heal(&self, op: &'static str) {
		self.failing.lock().remove(op);
	}

	/// History fetches wait for `release_history` until switched off.
	pub fn hold_history(&self) {
		self.hold_history.store(true, Ordering::SeqCst);
	}

	pub fn release_history(&self) {
		self.hold_history.store(false, Ordering::SeqCst);
		self.history_release.notify_one();
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().clone()
	}

	pub fn count_calls(&self, call: &str) -> usize {
		self.calls.lock().iter().filter(|c| c.as_str() == call).count()
	}

	fn record(&self, call: String) {
		self.calls.lock().push(call);
	}

	fn check(&self, op: &'static str) -> Result<(), ClientCoreError> {
		if self.failing.lock().contains(op) {
			Err(ClientCoreError::Api {
				status: 500,
				detail: format!("{op} unavailable"),
			})
		} else {
			Ok(())
		}
	}
}

impl ChatApi for FakeApi {
	fn list_conversations(&self) -> BoxFuture<'_, Result<Vec<Conversation>, ClientCoreError>> {
		Box::pin(async move {
			self.record("list_conversations".to_string());
			self.check("list_conversations")?;
			Ok(self.conversations.lock().clone())
		})
	}

	fn fetch_history<'a>(
		&'a self,
		peer: &'a UserId,
		query: &'a HistoryQuery,
	) -> BoxFuture<'a, Result<Vec<Message>, ClientCoreError>> {
		Box::pin(async move {
			let key = history_key(peer, query);
			self.record(format!("history {key}"));
			if self.hold_history.load(Ordering::SeqCst) {
				self.history_release.notified().await;
			}
			self.check("history")?;
			Ok(self.history.lock().get(&key).cloned().unwrap_or_default())
		})
	}

	fn send_message<'a>(&'a self, body: &'a SendMessageRequest) -> BoxFuture<'a, Result<Message, ClientCoreError>> {
		Box::pin(async move {
			self.record(format!("send {}", body.conversation_id));
			self.check("send")?;
			self.sent.lock().push(body.clone());
			let n = self.next_sent.fetch_add(1, Ordering::SeqCst);
			Ok(Message {
				id: MessageId::new(format!("sent-{n}")).unwrap(),
				conversation_id: body.conversation_id.clone(),
				sender_id: uid("u1"),
				receiver_id: body.receiver_id.clone(),
				job: body.job_id.clone(),
				application: body.application_id.clone(),
				content: body.content.clone(),
				created_at: at(500 + n as i64),
			})
		})
	}

	fn mark_conversation_read<'a>(&'a self, conversation: &'a ConversationId) -> BoxFuture<'a, Result<(), ClientCoreError>> {
		Box::pin(async move {
			self.record(format!("mark_read {conversation}"));
			self.check("mark_read")
		})
	}

	fn list_notifications(&self) -> BoxFuture<'_, Result<Vec<Notification>, ClientCoreError>> {
		Box::pin(async move {
			self.record("list_notifications".to_string());
			self.check("list_notifications")?;
			Ok(self.notifications.lock().clone())
		})
	}

	fn mark_notification_read<'a>(&'a self, id: &'a NotificationId) -> BoxFuture<'a, Result<(), ClientCoreError>> {
		Box::pin(async move {
			self.record(format!("notification_read {id}"));
			self.check("notification_read")
		})
	}

	fn mark_all_notifications_read(&self) -> BoxFuture<'_, Result<(), ClientCoreError>> {
		Box::pin(async move {
			self.record("notifications_read_all".to_string());
			self.check("notifications_read_all")
		})
	}

	fn delete_notification<'a>(&'a self, id: &'a NotificationId) -> BoxFuture<'a, Result<(), ClientCoreError>> {
		Box::pin(async move {
			self.record(format!("notification_delete {id}"));
			self.check("notification_delete")
		})
	}
}

pub fn engine_for(user: &str, api: &Arc<FakeApi>) -> (SyncEngine, mpsc::UnboundedReceiver<EngineEvent>) {
	let (tx, rx) = mpsc::unbounded_channel();
	let api: Arc<dyn ChatApi> = Arc::clone(api) as Arc<dyn ChatApi>;
	(SyncEngine::new(uid(user), api, tx), rx)
}

/// Drain everything currently queued.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
	let mut out = Vec::new();
	while let Ok(ev) = rx.try_recv() {
		out.push(ev);
	}
	out
}

pub async fn wait_until<P: Fn() -> bool>(what: &str, pred: P) {
	timeout(Duration::from_secs(2), async {
		while !pred() {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

pub async fn next_event<P>(rx: &mut mpsc::UnboundedReceiver<EngineEvent>, mut pred: P) -> EngineEvent
where
	P: FnMut(&EngineEvent) -> bool,
{
	timeout(Duration::from_secs(2), async {
		loop {
			let ev = rx.recv().await.expect("engine events open");
			if pred(&ev) {
				return ev;
			}
		}
	})
	.await
	.expect("expected engine event within timeout")
}

/// `None` closes the channel from the server side.
pub type PushTx = mpsc::UnboundedSender<Option<ServerEvent>>;

/// In-memory push channel endpoint.
#[derive(Default)]
pub struct FakeChannelServer {
	pub log: Mutex<Vec<String>>,
	pushers: Mutex<Vec<(UserId, PushTx)>>,
}

impl FakeChannelServer {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn log(&self) -> Vec<String> {
		self.log.lock().clone()
	}

	/// Push to the most recent channel opened by `user`.
	pub fn push_to(&self, user: &str, ev: ServerEvent) {
		let pushers = self.pushers.lock();
		let (_, tx) = pushers
			.iter()
			.rev()
			.find(|(u, _)| u.as_str() == user)
			.expect("channel opened for user");
		let _ = tx.send(Some(ev));
	}

	pub fn connector(self: &Arc<Self>) -> impl FnMut(Identity) -> ConnectFuture + Send + 'static {
		let server = Arc::clone(self);
		move |identity: Identity| -> ConnectFuture {
			let server = Arc::clone(&server);
			Box::pin(async move {
				let (tx, rx) = mpsc::unbounded_channel();
				server.pushers.lock().push((identity.user_id.clone(), tx));
				server.log.lock().push(format!("connect {}", identity.user_id));
				Ok(Box::new(FakeChannel {
					user: identity.user_id,
					server,
					events: Some(FakeChannelEvents { rx }),
				}) as BoxedChannelSession)
			})
		}
	}
}

struct FakeChannel {
	user: UserId,
	server: Arc<FakeChannelServer>,
	events: Option<FakeChannelEvents>,
}

struct FakeChannelEvents {
	rx: mpsc::UnboundedReceiver<Option<ServerEvent>>,
}

impl ChannelSessionApi for FakeChannel {
	fn identity(&self) -> &UserId {
		&self.user
	}

	fn open_events_stream(&mut self) -> Result<BoxedChannelEvents, ClientCoreError> {
		self.events
			.take()
			.map(|e| Box::new(e) as BoxedChannelEvents)
			.ok_or_else(|| ClientCoreError::Other("already opened".to_string()))
	}

	fn ping(&mut self) -> BoxFuture<'_, Result<(), ClientCoreError>> {
		Box::pin(async { Ok(()) })
	}

	fn close<'a>(&'a mut self, _reason: &'a str) -> BoxFuture<'a, ()> {
		Box::pin(async move {
			self.server.log.lock().push(format!("close {}", self.user));
		})
	}
}

impl ChannelEventsApi for FakeChannelEvents {
	fn run_events_loop<'a>(
		&'a mut self,
		mut on_event: Box<dyn FnMut(ServerEvent) + Send + 'a>,
	) -> BoxFuture<'a, Result<(), ClientCoreError>> {
		Box::pin(async move {
			while let Some(Some(ev)) = self.rx.recv().await {
				on_event(ev);
			}
			Ok(())
		})
	}
}
