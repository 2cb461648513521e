#![forbid(unsafe_code)]

pub mod event;
pub mod rest;

pub use event::{DEFAULT_MAX_EVENT_BYTES, ProtocolError, ServerEvent, decode_server_event, encode_server_event};

/// Protocol version constants.
pub mod version {
	/// Current push-channel protocol version, sent in the handshake.
	pub const PROTOCOL_VERSION: u32 = 1;

	/// Handshake header carrying the protocol version.
	pub const PROTOCOL_VERSION_HEADER: &str = "x-parley-protocol";

	/// Handshake query parameter announcing the connecting identity.
	pub const IDENTITY_QUERY_PARAM: &str = "userId";
}
