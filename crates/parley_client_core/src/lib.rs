#![forbid(unsafe_code)]

use std::fmt;
use std::time::Duration;

use parley_domain::UserId;
use parley_protocol::{DEFAULT_MAX_EVENT_BYTES, ProtocolError};
use parley_util::endpoint::{hostport, validate_http_endpoint, validate_ws_endpoint};
use url::Url;

pub mod channel;
pub mod rest;

pub use channel::{ChannelControl, ChannelEvents};
pub use rest::RestClient;

/// Local dev REST base used when nothing is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api";

/// Local dev push-channel endpoint used when nothing is configured.
pub const DEFAULT_CHANNEL_URL: &str = "ws://127.0.0.1:5000/ws";

/// Client configuration shared by the channel and REST halves.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// REST base URL (`http://` or `https://`, may carry a path prefix).
	pub api_base_url: String,

	/// Push-channel URL (`ws://` or `wss://`).
	pub channel_url: String,

	/// Client identifier sent as the user agent.
	pub client_name: String,

	/// Maximum accepted size of a single push event.
	pub max_event_bytes: usize,

	/// Timeout for the channel handshake.
	pub connect_timeout: Duration,

	/// Timeout for a single REST request.
	pub request_timeout: Duration,
}

impl ClientConfig {
	/// Parse and validate both endpoints.
	pub fn validate(&self) -> Result<(), ClientCoreError> {
		self.api_endpoint()?;
		self.channel_endpoint()?;
		Ok(())
	}

	/// Validated REST base URL.
	pub fn api_endpoint(&self) -> Result<Url, ClientCoreError> {
		validate_http_endpoint(&self.api_base_url)
			.map_err(|msg| ClientCoreError::Endpoint(format!("invalid api base url: {msg}")))
	}

	/// Validated push-channel URL.
	pub fn channel_endpoint(&self) -> Result<Url, ClientCoreError> {
		validate_ws_endpoint(&self.channel_url)
			.map_err(|msg| ClientCoreError::Endpoint(format!("invalid channel url: {msg}")))
	}

	/// Channel endpoint host:port, for logs.
	pub fn channel_hostport(&self) -> String {
		self.channel_endpoint()
			.ok()
			.as_ref()
			.and_then(hostport)
			.unwrap_or_else(|| self.channel_url.clone())
	}
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			api_base_url: DEFAULT_API_BASE_URL.to_string(),
			channel_url: DEFAULT_CHANNEL_URL.to_string(),
			client_name: format!("parley-client-core/{}", env!("CARGO_PKG_VERSION")),
			max_event_bytes: DEFAULT_MAX_EVENT_BYTES,
			connect_timeout: Duration::from_secs(15),
			request_timeout: Duration::from_secs(20),
		}
	}
}

/// Wrapper that redacts in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
	pub fn new(s: impl Into<String>) -> Self {
		Self(s.into())
	}

	/// Access the inner secret string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretString(<redacted>)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<redacted>")
	}
}

/// Authenticated identity a channel and REST client act on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
	pub user_id: UserId,
	pub auth_token: Option<SecretString>,
}

impl Identity {
	pub fn new(user_id: UserId, auth_token: Option<SecretString>) -> Self {
		Self { user_id, auth_token }
	}

	pub(crate) fn bearer(&self) -> Option<String> {
		self.auth_token
			.as_ref()
			.map(|t| t.expose().trim())
			.filter(|t| !t.is_empty())
			.map(|t| format!("Bearer {t}"))
	}
}

/// Errors for client core operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientCoreError {
	/// Endpoint configuration is invalid.
	#[error("invalid endpoint: {0}")]
	Endpoint(String),

	/// Connection establishment failed.
	#[error("failed to connect: {0}")]
	Connect(String),

	/// Push event decoding failed.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),

	/// Non-success HTTP status.
	#[error("api error: status={status} detail={detail}")]
	Api { status: u16, detail: String },

	/// The server answered with `success: false`.
	#[error("request rejected: {0}")]
	Rejected(String),

	/// IO / transport error.
	#[error("io error: {0}")]
	Io(String),

	/// Other error.
	#[error("error: {0}")]
	Other(String),
}

impl From<anyhow::Error> for ClientCoreError {
	fn from(e: anyhow::Error) -> Self {
		ClientCoreError::Other(format!("{e:#}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_is_sane() {
		let cfg = ClientConfig::default();
		assert!(cfg.validate().is_ok());
		assert!(cfg.max_event_bytes > 0);
		assert_eq!(cfg.channel_hostport(), "127.0.0.1:5000");
	}

	#[test]
	fn validate_rejects_swapped_endpoints() {
		let cfg = ClientConfig {
			api_base_url: DEFAULT_CHANNEL_URL.to_string(),
			..ClientConfig::default()
		};
		assert!(matches!(cfg.validate(), Err(ClientCoreError::Endpoint(_))));
	}

	#[test]
	fn channel_hostport_keeps_ipv6_brackets_and_default_port() {
		let v6 = ClientConfig {
			channel_url: "ws://[::1]:8080/ws".to_string(),
			..ClientConfig::default()
		};
		assert!(v6.validate().is_ok());
		assert_eq!(v6.channel_hostport(), "[::1]:8080");

		let tls = ClientConfig {
			channel_url: "wss://chat.example.com/ws".to_string(),
			..ClientConfig::default()
		};
		assert_eq!(tls.channel_hostport(), "chat.example.com:443");
		assert_eq!(tls.channel_endpoint().unwrap().path(), "/ws");
	}

	#[test]
	fn validate_rejects_credentials_in_channel_url() {
		let cfg = ClientConfig {
			channel_url: "ws://user:pw@chat.example.com/ws".to_string(),
			..ClientConfig::default()
		};
		assert!(matches!(cfg.validate(), Err(ClientCoreError::Endpoint(_))));
		assert_eq!(cfg.channel_hostport(), cfg.channel_url);
	}

	#[test]
	fn secret_is_redacted() {
		let s = SecretString::new("tok");
		assert_eq!(format!("{s:?}"), "SecretString(<redacted>)");
		assert_eq!(s.to_string(), "<redacted>");
		assert_eq!(s.expose(), "tok");
	}

	#[test]
	fn bearer_skips_blank_tokens() {
		let user = UserId::new("u1").unwrap();
		assert_eq!(Identity::new(user.clone(), None).bearer(), None);
		assert_eq!(Identity::new(user.clone(), Some(SecretString::new("  "))).bearer(), None);
		assert_eq!(
			Identity::new(user, Some(SecretString::new("abc"))).bearer().as_deref(),
			Some("Bearer abc")
		);
	}
}
