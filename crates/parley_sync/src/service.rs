#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::RwLock;
use parley_client_core::{ClientConfig, ClientCoreError, Identity, RestClient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ChatApi;
use crate::connection::{ChannelEvent, ConnectionManager, ConnectionTuning};
use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::events::EngineEvent;

/// Builds the REST client for a freshly started identity.
pub type ApiFactory = Box<dyn Fn(&Identity) -> Result<Arc<dyn ChatApi>, ClientCoreError> + Send + Sync>;

struct Active {
	identity: Identity,
	engine: SyncEngine,
}

/// The push channel plus the engine of the logged-in identity.
///
/// Constructed once per process and handed to consumers. `start` swaps in a
/// fresh engine when the identity changes; `stop` drops it and closes the
/// channel. All engines publish on the one receiver returned by the
/// constructor.
pub struct SyncService {
	connection: ConnectionManager,
	active: Arc<RwLock<Option<Active>>>,
	events_tx: mpsc::UnboundedSender<EngineEvent>,
	api_factory: ApiFactory,
	dispatcher: JoinHandle<()>,
}

impl SyncService {
	/// Websocket channel and REST client from `cfg`.
	pub fn new(
		cfg: ClientConfig,
		tuning: ConnectionTuning,
	) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), SyncError> {
		cfg.validate()?;
		let (connection, channel_rx) = ConnectionManager::spawn(cfg.clone(), tuning);
		let api_factory: ApiFactory = Box::new(move |identity: &Identity| {
			let client = RestClient::new(&cfg, identity.clone())?;
			Ok(Arc::new(client) as Arc<dyn ChatApi>)
		});
		Ok(Self::with_parts(connection, channel_rx, api_factory))
	}

	/// Assemble from an existing connection manager and REST factory.
	pub fn with_parts(
		connection: ConnectionManager,
		mut channel_rx: mpsc::UnboundedReceiver<ChannelEvent>,
		api_factory: ApiFactory,
	) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
		let (events_tx, events_rx) = mpsc::unbounded_channel::<EngineEvent>();
		let active: Arc<RwLock<Option<Active>>> = Arc::new(RwLock::new(None));

		let current = Arc::clone(&active);
		let dispatcher = tokio::spawn(async move {
			while let Some(ev) = channel_rx.recv().await {
				let engine = current.read().as_ref().map(|a| a.engine.clone());
				match engine {
					Some(engine) => engine.handle_channel_event(ev),
					None => debug!(?ev, "channel event with no active engine"),
				}
			}
			debug!("channel event stream ended");
		});

		let service = Self {
			connection,
			active,
			events_tx,
			api_factory,
			dispatcher,
		};
		(service, events_rx)
	}

	/// Log in as `identity`, returning its engine.
	///
	/// Starting the identity that is already active returns the existing
	/// engine. Any other identity gets a fresh engine with empty state; the
	/// previous channel is closed before the new one opens.
	pub async fn start(&self, identity: Identity) -> Result<SyncEngine, SyncError> {
		let existing = self
			.active
			.read()
			.as_ref()
			.filter(|a| a.identity == identity)
			.map(|a| a.engine.clone());
		if let Some(engine) = existing {
			self.connection.start(identity).await?;
			return Ok(engine);
		}

		let api = (self.api_factory)(&identity)?;
		let engine = SyncEngine::new(identity.user_id.clone(), api, self.events_tx.clone());
		info!(identity = %identity.user_id, "sync session starting");
		let previous = self.active.write().replace(Active {
			identity: identity.clone(),
			engine: engine.clone(),
		});
		if let Some(previous) = previous {
			info!(identity = %previous.identity.user_id, "previous sync session replaced");
			previous.engine.reset();
		}

		self.connection.start(identity).await?;
		engine.spawn_initial_load();
		Ok(engine)
	}

	/// Log out: clear and drop the engine, then close the channel.
	pub async fn stop(&self, reason: impl Into<String>) -> Result<(), SyncError> {
		let previous = self.active.write().take();
		if let Some(previous) = previous {
			info!(identity = %previous.identity.user_id, "sync session stopping");
			previous.engine.reset();
		}
		self.connection.stop(reason).await
	}

	pub fn engine(&self) -> Option<SyncEngine> {
		self.active.read().as_ref().map(|a| a.engine.clone())
	}

	/// Close the channel and wait for background tasks to finish.
	pub async fn shutdown(self) {
		self.active.write().take();
		self.connection.shutdown().await;
		let _ = self.dispatcher.await;
	}
}
