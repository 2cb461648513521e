#![forbid(unsafe_code)]

use parley_client_core::Identity;
use parley_domain::UserId;
use parley_protocol::ServerEvent;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::reconnect::schedule_reconnect;
use super::{ChannelEvent, ConnCommand, ConnectFuture, ConnectionTuning};
use crate::api::{BoxedChannelEvents, BoxedChannelSession};

/// Report sent by an events loop when its stream ends.
struct LoopEnded {
	generation: u64,
	reason: String,
}

struct Connection<F> {
	connect_fn: F,
	out_tx: mpsc::UnboundedSender<ChannelEvent>,
	ended_tx: mpsc::UnboundedSender<LoopEnded>,
	tuning: ConnectionTuning,

	identity: Option<Identity>,
	session: Option<BoxedChannelSession>,
	events_task: Option<JoinHandle<()>>,
	/// Bumped per opened channel; stale loop reports are ignored.
	generation: u64,

	reconnect_attempt: u32,
	reconnect_deadline: Option<Instant>,
	keepalive_failures: u32,
	last_successful_connect: Option<Instant>,
	ever_connected: bool,
}

impl<F> Connection<F>
where
	F: FnMut(Identity) -> ConnectFuture + Send + 'static,
{
	fn emit(&self, ev: ChannelEvent) {
		if self.out_tx.send(ev).is_err() {
			debug!("channel event receiver dropped");
		}
	}

	fn identity_id(&self) -> Option<UserId> {
		self.identity.as_ref().map(|i| i.user_id.clone())
	}

	/// Abort the reader and close the channel. Does not touch the identity.
	async fn teardown(&mut self, reason: &str) {
		if let Some(t) = self.events_task.take() {
			t.abort();
		}
		if let Some(mut s) = self.session.take() {
			s.close(reason).await;
		}
		self.keepalive_failures = 0;
	}

	fn bump_reconnect_attempt(&mut self) -> u32 {
		let stable = self
			.last_successful_connect
			.is_some_and(|last| Instant::now().duration_since(last) > self.tuning.reconnect_reset_after);
		self.reconnect_attempt = if stable {
			1
		} else {
			self.reconnect_attempt.saturating_add(1).max(1)
		};
		self.reconnect_attempt
	}

	fn schedule_reconnect(&mut self) {
		let Some(identity) = self.identity_id() else {
			return;
		};
		let attempt = self.bump_reconnect_attempt();
		let (deadline, ms) = schedule_reconnect(attempt, self.tuning.reconnect_base, self.tuning.reconnect_max);
		self.reconnect_deadline = Some(deadline);
		info!(%identity, attempt, next_retry_in_ms = ms, "channel reconnect scheduled");
		self.emit(ChannelEvent::Reconnecting {
			identity,
			attempt,
			next_retry_in_ms: ms,
		});
	}

	async fn connect(&mut self) {
		let Some(identity) = self.identity.clone() else {
			return;
		};
		self.reconnect_deadline = None;
		let user = identity.user_id.clone();
		self.emit(ChannelEvent::Connecting { identity: user.clone() });

		let mut session = match (self.connect_fn)(identity).await {
			Ok(s) => s,
			Err(e) => {
				warn!(identity = %user, error = %e, "channel connect failed");
				self.emit(ChannelEvent::Disconnected {
					identity: Some(user),
					reason: e.to_string(),
				});
				self.schedule_reconnect();
				return;
			}
		};

		let events = match session.open_events_stream() {
			Ok(events) => events,
			Err(e) => {
				warn!(identity = %user, error = %e, "open events stream failed");
				session.close("events stream failed").await;
				self.emit(ChannelEvent::Disconnected {
					identity: Some(user),
					reason: e.to_string(),
				});
				self.schedule_reconnect();
				return;
			}
		};

		if self.ever_connected {
			metrics::counter!("parley_channel_reconnects_total").increment(1);
		}
		self.ever_connected = true;
		self.generation = self.generation.wrapping_add(1);
		self.session = Some(session);
		self.last_successful_connect = Some(Instant::now());
		self.reconnect_attempt = 0;
		self.keepalive_failures = 0;

		info!(identity = %user, generation = self.generation, "channel open");
		self.emit(ChannelEvent::Connected { identity: user.clone() });
		self.events_task = Some(spawn_events_loop(
			events,
			self.generation,
			user,
			self.out_tx.clone(),
			self.ended_tx.clone(),
		));
	}

	async fn on_start(&mut self, identity: Identity) {
		let active = self.session.is_some() || self.reconnect_deadline.is_some();
		if active && self.identity.as_ref() == Some(&identity) {
			debug!(identity = %identity.user_id, "channel already started for identity");
			return;
		}

		if let Some(previous) = self.identity_id() {
			info!(%previous, next = %identity.user_id, "identity changed; closing previous channel");
			self.teardown("identity changed").await;
			self.emit(ChannelEvent::Disconnected {
				identity: Some(previous),
				reason: "identity changed".to_string(),
			});
		}

		self.identity = Some(identity);
		self.reconnect_attempt = 0;
		self.reconnect_deadline = None;
		self.last_successful_connect = None;
		self.connect().await;
	}

	async fn on_stop(&mut self, reason: String) {
		let identity = self.identity.take().map(|i| i.user_id);
		self.teardown(&reason).await;
		self.reconnect_attempt = 0;
		self.reconnect_deadline = None;
		info!(identity = ?identity.as_ref().map(UserId::as_str), %reason, "channel stopped");
		self.emit(ChannelEvent::Disconnected { identity, reason });
	}

	async fn on_keepalive(&mut self) {
		let Some(session) = self.session.as_mut() else {
			return;
		};
		match tokio::time::timeout(self.tuning.keepalive_timeout, session.ping()).await {
			Ok(Ok(())) => {
				self.keepalive_failures = 0;
				return;
			}
			Ok(Err(e)) => {
				self.keepalive_failures = self.keepalive_failures.saturating_add(1);
				warn!(failure = self.keepalive_failures, error = %e, "keepalive failed");
			}
			Err(_) => {
				self.keepalive_failures = self.keepalive_failures.saturating_add(1);
				warn!(failure = self.keepalive_failures, "keepalive timeout");
			}
		}

		if self.keepalive_failures >= self.tuning.keepalive_max_failures {
			self.teardown("keepalive failed").await;
			self.emit(ChannelEvent::Disconnected {
				identity: self.identity_id(),
				reason: "keepalive failed; reconnecting".to_string(),
			});
			self.schedule_reconnect();
		}
	}

	async fn on_loop_ended(&mut self, ended: LoopEnded) {
		if ended.generation != self.generation || self.session.is_none() {
			debug!(generation = ended.generation, "stale events loop report ignored");
			return;
		}
		warn!(reason = %ended.reason, "channel lost");
		self.teardown("channel lost").await;
		self.emit(ChannelEvent::Disconnected {
			identity: self.identity_id(),
			reason: ended.reason,
		});
		self.schedule_reconnect();
	}
}

pub(crate) async fn run_connection_task<F>(
	mut cmd_rx: mpsc::Receiver<ConnCommand>,
	out_tx: mpsc::UnboundedSender<ChannelEvent>,
	mut shutdown_rx: oneshot::Receiver<()>,
	tuning: ConnectionTuning,
	connect_fn: F,
) where
	F: FnMut(Identity) -> ConnectFuture + Send + 'static,
{
	let (ended_tx, mut ended_rx) = mpsc::unbounded_channel::<LoopEnded>();

	let mut keepalive_tick = tokio::time::interval(tuning.keepalive_interval);
	keepalive_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

	let mut conn = Connection {
		connect_fn,
		out_tx,
		ended_tx,
		tuning,
		identity: None,
		session: None,
		events_task: None,
		generation: 0,
		reconnect_attempt: 0,
		reconnect_deadline: None,
		keepalive_failures: 0,
		last_successful_connect: None,
		ever_connected: false,
	};

	loop {
		let reconnect_deadline = conn.reconnect_deadline;
		let connected = conn.session.is_some();

		tokio::select! {
			_ = &mut shutdown_rx => {
				let identity = conn.identity_id();
				conn.teardown("shutdown").await;
				conn.emit(ChannelEvent::Disconnected { identity, reason: "shutdown".to_string() });
				break;
			}

			_ = keepalive_tick.tick(), if connected => {
				conn.on_keepalive().await;
			}

			Some(ended) = ended_rx.recv() => {
				conn.on_loop_ended(ended).await;
			}

			cmd = cmd_rx.recv() => {
				let Some(cmd) = cmd else {
					let identity = conn.identity_id();
					conn.teardown("manager dropped").await;
					conn.emit(ChannelEvent::Disconnected { identity, reason: "manager dropped".to_string() });
					break;
				};

				match cmd {
					ConnCommand::Start { identity } => conn.on_start(identity).await,
					ConnCommand::Stop { reason } => conn.on_stop(reason).await,
				}
			}

			_ = async {
				if let Some(deadline) = reconnect_deadline {
					tokio::time::sleep_until(deadline).await;
				}
			}, if reconnect_deadline.is_some() => {
				conn.connect().await;
			}
		}
	}
}

fn spawn_events_loop(
	mut events: BoxedChannelEvents,
	generation: u64,
	identity: UserId,
	out_tx: mpsc::UnboundedSender<ChannelEvent>,
	ended_tx: mpsc::UnboundedSender<LoopEnded>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		let tx = out_tx.clone();
		let user = identity.clone();
		let res = events
			.run_events_loop(Box::new(move |event: ServerEvent| {
				debug!(identity = %user, event = event.name(), "push event received");
				if let Err(e) = tx.send(ChannelEvent::Event {
					identity: user.clone(),
					event,
				}) {
					warn!(error = ?e, "failed to forward push event; receiver dropped");
				}
			}))
			.await;

		let reason = match res {
			Ok(()) => "channel closed by server".to_string(),
			Err(e) => e.to_string(),
		};
		debug!(%identity, generation, %reason, "events loop ended");
		let _ = ended_tx.send(LoopEnded { generation, reason });
	})
}
