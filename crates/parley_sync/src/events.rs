#![forbid(unsafe_code)]

use core::fmt;

use parley_domain::{ConversationId, UserId};

/// Severity of a user-facing toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
	Info,
	Warning,
	Error,
}

impl ToastKind {
	pub fn as_str(self) -> &'static str {
		match self {
			ToastKind::Info => "info",
			ToastKind::Warning => "warning",
			ToastKind::Error => "error",
		}
	}
}

impl fmt::Display for ToastKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Short transient message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
	pub kind: ToastKind,
	pub message: String,
}

impl Toast {
	pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}
}

/// Change notifications emitted by the engine.
///
/// State itself is read through the engine; these only say what moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
	Connecting {
		identity: UserId,
	},
	Connected {
		identity: UserId,
	},
	Reconnecting {
		attempt: u32,
		next_retry_in_ms: u64,
	},
	Disconnected {
		reason: String,
	},
	ConversationsChanged,
	MessagesChanged {
		conversation: ConversationId,
	},
	NotificationsChanged,
	PresenceChanged,
	Toast(Toast),
}

impl EngineEvent {
	pub fn toast(kind: ToastKind, message: impl Into<String>) -> Self {
		EngineEvent::Toast(Toast::new(kind, message))
	}
}
