#![forbid(unsafe_code)]

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt as _, StreamExt as _};
use parley_domain::UserId;
use parley_protocol::version::{IDENTITY_QUERY_PARAM, PROTOCOL_VERSION, PROTOCOL_VERSION_HEADER};
use parley_protocol::{ServerEvent, decode_server_event};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::{ClientConfig, ClientCoreError, Identity};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Control half of a push channel (keepalive, close).
pub struct ChannelControl {
	sink: SplitSink<WsStream, Message>,
	events: Option<SplitStream<WsStream>>,
	identity: UserId,
	max_event_bytes: usize,
}

/// Events reader half of a push channel.
pub struct ChannelEvents {
	stream: SplitStream<WsStream>,
	identity: UserId,
	max_event_bytes: usize,
}

/// Channel URL with the identity announced in the handshake query.
pub fn channel_url_for(cfg: &ClientConfig, user: &UserId) -> Result<Url, ClientCoreError> {
	let mut url = cfg.channel_endpoint()?;
	url.query_pairs_mut().append_pair(IDENTITY_QUERY_PARAM, user.as_str());
	Ok(url)
}

impl ChannelControl {
	/// Connect and perform the websocket handshake as `identity`.
	pub async fn connect(cfg: &ClientConfig, identity: &Identity) -> Result<Self, ClientCoreError> {
		let url = channel_url_for(cfg, &identity.user_id)?;

		let mut request = url
			.as_str()
			.into_client_request()
			.map_err(|e| ClientCoreError::Connect(format!("build handshake request: {e}")))?;

		let headers = request.headers_mut();
		headers.insert(PROTOCOL_VERSION_HEADER, HeaderValue::from(PROTOCOL_VERSION));
		if let Ok(agent) = HeaderValue::from_str(&cfg.client_name) {
			headers.insert("user-agent", agent);
		}
		if let Some(bearer) = identity.bearer() {
			let value = HeaderValue::from_str(&bearer)
				.map_err(|_| ClientCoreError::Connect("auth token is not a valid header value".to_string()))?;
			headers.insert("authorization", value);
		}

		let connect_timeout = cfg.connect_timeout;
		let (ws, response) = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request))
			.await
			.map_err(|_| {
				ClientCoreError::Connect(format!(
					"handshake timeout after {connect_timeout:?} (server={})",
					cfg.channel_hostport()
				))
			})?
			.map_err(|e| ClientCoreError::Connect(format!("handshake failed (server={}): {e}", cfg.channel_hostport())))?;

		info!(
			server = %cfg.channel_hostport(),
			identity = %identity.user_id,
			status = %response.status(),
			"channel connected"
		);

		let (sink, stream) = ws.split();

		Ok(Self {
			sink,
			events: Some(stream),
			identity: identity.user_id.clone(),
			max_event_bytes: cfg.max_event_bytes,
		})
	}

	pub fn identity(&self) -> &UserId {
		&self.identity
	}

	/// Hand out the events half. Only one reader may exist per channel.
	pub fn open_events_stream(&mut self) -> Result<ChannelEvents, ClientCoreError> {
		let stream = self.events.take().ok_or_else(|| {
			ClientCoreError::Other("events stream already opened; reuse the existing ChannelEvents".to_string())
		})?;

		debug!(identity = %self.identity, "events stream opened");

		Ok(ChannelEvents {
			stream,
			identity: self.identity.clone(),
			max_event_bytes: self.max_event_bytes,
		})
	}

	/// Send a websocket ping; a failed write means the transport is gone.
	pub async fn ping(&mut self) -> Result<(), ClientCoreError> {
		self.sink
			.send(Message::Ping(Default::default()))
			.await
			.map_err(|e| ClientCoreError::Io(format!("ping failed: {e}")))
	}

	/// Close the channel with a normal close frame.
	pub async fn close(&mut self, reason: &str) {
		let frame = CloseFrame {
			code: CloseCode::Normal,
			reason: reason.to_string().into(),
		};
		if let Err(e) = self.sink.send(Message::Close(Some(frame))).await {
			debug!(identity = %self.identity, error = %e, "close frame not delivered");
		}
		let _ = self.sink.close().await;
		info!(identity = %self.identity, reason, "channel closed");
	}
}

impl ChannelEvents {
	/// Run the events loop until the server closes the channel or the transport fails.
	///
	/// Undecodable frames are logged and skipped.
	pub async fn run_events_loop<F>(&mut self, mut on_event: F) -> Result<(), ClientCoreError>
	where
		F: FnMut(ServerEvent),
	{
		while let Some(frame) = self.stream.next().await {
			match frame {
				Ok(Message::Text(text)) => match decode_server_event(&text, self.max_event_bytes) {
					Ok(ev) => {
						debug!(identity = %self.identity, event = ev.name(), "channel event decoded");
						on_event(ev);
					}
					Err(e) => warn!(identity = %self.identity, error = %e, "skipping undecodable channel event"),
				},
				Ok(Message::Close(frame)) => {
					info!(identity = %self.identity, ?frame, "channel closed by server");
					return Ok(());
				}
				Ok(Message::Binary(bytes)) => {
					warn!(identity = %self.identity, len = bytes.len(), "unexpected binary frame on channel");
				}
				Ok(_) => {}
				Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
				Err(e) => return Err(ClientCoreError::Io(e.to_string())),
			}
		}

		info!(identity = %self.identity, "events stream ended");
		Ok(())
	}
}
