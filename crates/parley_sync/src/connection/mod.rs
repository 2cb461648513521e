#![forbid(unsafe_code)]

//! Process-wide push channel scoped to the logged-in identity.
//!
//! A single task owns the channel. It is driven by `start(identity)` /
//! `stop()` commands and reports status and pushed events on an unbounded
//! channel. Transport loss is handled inside the task (keepalive, backoff
//! reconnect); consumers keep the same receiver across reconnects.

use std::time::Duration;

use parley_client_core::{ChannelControl, ClientConfig, ClientCoreError, Identity};
use parley_domain::UserId;
use parley_protocol::ServerEvent;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::{BoxFuture, BoxedChannelSession};
use crate::error::SyncError;

pub mod backend;
pub mod reconnect;


pub type ConnectFuture = BoxFuture<'static, Result<BoxedChannelSession, ClientCoreError>>;

/// Output of the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
	Connecting {
		identity: UserId,
	},
	Connected {
		identity: UserId,
	},
	Reconnecting {
		identity: UserId,
		attempt: u32,
		next_retry_in_ms: u64,
	},
	Disconnected {
		identity: Option<UserId>,
		reason: String,
	},
	/// A decoded push event, tagged with the identity of the channel it arrived on.
	Event {
		identity: UserId,
		event: ServerEvent,
	},
}

/// Timers of the connection task.
#[derive(Debug, Clone)]
pub struct ConnectionTuning {
	pub keepalive_interval: Duration,
	pub keepalive_timeout: Duration,
	pub keepalive_max_failures: u32,
	pub reconnect_base: Duration,
	pub reconnect_max: Duration,
	/// A connection that lived this long resets the backoff attempt counter.
	pub reconnect_reset_after: Duration,
}

impl Default for ConnectionTuning {
	fn default() -> Self {
		Self {
			keepalive_interval: Duration::from_secs(15),
			keepalive_timeout: Duration::from_secs(10),
			keepalive_max_failures: 3,
			reconnect_base: Duration::from_millis(500),
			reconnect_max: Duration::from_secs(30),
			reconnect_reset_after: Duration::from_secs(60 * 5),
		}
	}
}

#[derive(Debug)]
pub(crate) enum ConnCommand {
	Start { identity: Identity },
	Stop { reason: String },
}

struct ShutdownHandle {
	shutdown_tx: oneshot::Sender<()>,
	join_handle: JoinHandle<()>,
}

/// Handle to the connection task.
///
/// Dropping the manager tells the task to close the channel and exit, so the
/// channel is released on every exit path of the owner.
pub struct ConnectionManager {
	cmd_tx: mpsc::Sender<ConnCommand>,
	shutdown: Option<ShutdownHandle>,
}

impl ConnectionManager {
	/// Spawn the task with the websocket transport from `cfg`.
	pub fn spawn(cfg: ClientConfig, tuning: ConnectionTuning) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
		Self::spawn_with_connector(tuning, move |identity: Identity| -> ConnectFuture {
			let cfg = cfg.clone();
			Box::pin(async move {
				ChannelControl::connect(&cfg, &identity)
					.await
					.map(|c| Box::new(c) as BoxedChannelSession)
			})
		})
	}

	/// Spawn the task with a custom channel connector.
	pub fn spawn_with_connector<F>(tuning: ConnectionTuning, connect_fn: F) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>)
	where
		F: FnMut(Identity) -> ConnectFuture + Send + 'static,
	{
		let (cmd_tx, cmd_rx) = mpsc::channel::<ConnCommand>(32);
		let (out_tx, out_rx) = mpsc::unbounded_channel::<ChannelEvent>();
		let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

		let join_handle = tokio::spawn(backend::run_connection_task(cmd_rx, out_tx, shutdown_rx, tuning, connect_fn));

		let manager = Self {
			cmd_tx,
			shutdown: Some(ShutdownHandle {
				shutdown_tx,
				join_handle,
			}),
		};
		(manager, out_rx)
	}

	/// Open the channel as `identity`.
	///
	/// A no-op if that identity is already connected or reconnecting. Any other
	/// open channel is fully closed before the new one is opened.
	pub async fn start(&self, identity: Identity) -> Result<(), SyncError> {
		self.cmd_tx
			.send(ConnCommand::Start { identity })
			.await
			.map_err(|_| SyncError::ConnectionClosed)
	}

	/// Close the channel and stop reconnecting.
	pub async fn stop(&self, reason: impl Into<String>) -> Result<(), SyncError> {
		self.cmd_tx
			.send(ConnCommand::Stop { reason: reason.into() })
			.await
			.map_err(|_| SyncError::ConnectionClosed)
	}

	/// Close the channel and wait for the task to exit.
	pub async fn shutdown(mut self) {
		if let Some(handle) = self.shutdown.take() {
			let _ = handle.shutdown_tx.send(());
			if let Err(e) = handle.join_handle.await {
				debug!(error = %e, "connection task ended abnormally");
			}
		}
	}
}

impl Drop for ConnectionManager {
	fn drop(&mut self) {
		if let Some(handle) = self.shutdown.take() {
			let _ = handle.shutdown_tx.send(());
		}
	}
}
