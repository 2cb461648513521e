#![forbid(unsafe_code)]

use parley_domain::{Message, Notification, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum size of a single push-channel text frame.
pub const DEFAULT_MAX_EVENT_BYTES: usize = 512 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("event exceeds maximum size: len={len} max={max}")]
	EventTooLarge {
		len: usize,
		max: usize,
	},

	#[error("unknown event: {0}")]
	UnknownEvent(String),

	#[error("malformed {event} payload: {source}")]
	Payload {
		event: &'static str,
		#[source]
		source: serde_json::Error,
	},

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Events pushed by the server over the channel.
///
/// On the wire each event is a JSON text frame `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
	/// Full set of currently connected users.
	PresenceUpdate(Vec<UserId>),
	NewMessage(Message),
	NewNotification(Notification),
}

impl ServerEvent {
	pub const PRESENCE_UPDATE: &'static str = "presenceUpdate";
	pub const NEW_MESSAGE: &'static str = "newMessage";
	pub const NEW_NOTIFICATION: &'static str = "newNotification";

	pub fn name(&self) -> &'static str {
		match self {
			ServerEvent::PresenceUpdate(_) => Self::PRESENCE_UPDATE,
			ServerEvent::NewMessage(_) => Self::NEW_MESSAGE,
			ServerEvent::NewNotification(_) => Self::NEW_NOTIFICATION,
		}
	}
}

#[derive(Deserialize)]
struct RawEvent {
	event: String,
	#[serde(default)]
	data: serde_json::Value,
}

/// Decode one text frame into a `ServerEvent`.
pub fn decode_server_event(text: &str, max_event_bytes: usize) -> Result<ServerEvent, ProtocolError> {
	if text.len() > max_event_bytes {
		return Err(ProtocolError::EventTooLarge {
			len: text.len(),
			max: max_event_bytes,
		});
	}

	let raw: RawEvent = serde_json::from_str(text)?;

	match raw.event.as_str() {
		ServerEvent::PRESENCE_UPDATE => serde_json::from_value(raw.data)
			.map(ServerEvent::PresenceUpdate)
			.map_err(|source| ProtocolError::Payload {
				event: ServerEvent::PRESENCE_UPDATE,
				source,
			}),
		ServerEvent::NEW_MESSAGE => serde_json::from_value(raw.data)
			.map(ServerEvent::NewMessage)
			.map_err(|source| ProtocolError::Payload {
				event: ServerEvent::NEW_MESSAGE,
				source,
			}),
		ServerEvent::NEW_NOTIFICATION => serde_json::from_value(raw.data)
			.map(ServerEvent::NewNotification)
			.map_err(|source| ProtocolError::Payload {
				event: ServerEvent::NEW_NOTIFICATION,
				source,
			}),
		other => Err(ProtocolError::UnknownEvent(other.to_string())),
	}
}

/// Encode a `ServerEvent` into its text frame.
pub fn encode_server_event(ev: &ServerEvent) -> Result<String, ProtocolError> {
	Ok(serde_json::to_string(ev)?)
}
