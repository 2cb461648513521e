#![forbid(unsafe_code)]

use parley_client_core::ClientCoreError;
use parley_domain::ConversationId;

/// Errors returned by engine actions.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	/// The action needs a selected conversation.
	#[error("no conversation selected")]
	NoConversationSelected,

	/// The id is not in the conversation list.
	#[error("unknown conversation: {0}")]
	UnknownConversation(ConversationId),

	/// Blank message bodies are not sent.
	#[error("message body is empty")]
	EmptyMessage,

	/// The connection task is gone.
	#[error("connection manager is not running")]
	ConnectionClosed,

	/// REST or channel failure.
	#[error(transparent)]
	Client(#[from] ClientCoreError),
}
