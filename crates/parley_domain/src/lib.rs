#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("invalid format: {0}")]
	InvalidFormat(String),
}

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Create a non-empty identifier.
			pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
				let id = id.into();
				if id.trim().is_empty() {
					return Err(ParseIdError::Empty);
				}
				if id.chars().any(char::is_whitespace) {
					return Err(ParseIdError::InvalidFormat(format!("whitespace in id: {id:?}")));
				}
				Ok(Self(id))
			}
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl FromStr for $name {
			type Err = ParseIdError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				$name::new(s.trim().to_string())
			}
		}
	};
}

string_id!(
	/// Account identifier (also the handle a peer is addressed by).
	UserId
);
string_id!(
	/// Server-assigned conversation identifier.
	ConversationId
);
string_id!(
	/// Server-assigned message identifier.
	MessageId
);
string_id!(
	/// Server-assigned notification identifier.
	NotificationId
);
string_id!(
	/// Job posting a conversation may be scoped to.
	JobId
);
string_id!(
	/// Job application a conversation may be scoped to.
	ApplicationId
);

/// Scoping keys that disambiguate threads between the same pair of users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
	pub job: Option<JobId>,
	pub application: Option<ApplicationId>,
}

impl Scope {
	pub fn new(job: Option<JobId>, application: Option<ApplicationId>) -> Self {
		Self { job, application }
	}

	pub fn is_direct(&self) -> bool {
		self.job.is_none() && self.application.is_none()
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (&self.job, &self.application) {
			(None, None) => f.write_str("direct"),
			(Some(job), None) => write!(f, "job:{job}"),
			(None, Some(app)) => write!(f, "application:{app}"),
			(Some(job), Some(app)) => write!(f, "job:{job}/application:{app}"),
		}
	}
}

/// Conversation summary as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
	pub id: ConversationId,
	pub participants: [UserId; 2],
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub job_id: Option<JobId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub application_id: Option<ApplicationId>,
	#[serde(default)]
	pub last_message: Option<String>,
	pub updated_at: DateTime<Utc>,
	#[serde(default)]
	pub unread_count: u32,
}

impl Conversation {
	pub fn scope(&self) -> Scope {
		Scope::new(self.job_id.clone(), self.application_id.clone())
	}

	pub fn involves(&self, user: &UserId) -> bool {
		self.participants.iter().any(|p| p == user)
	}

	/// The participant that is not `me`.
	///
	/// Self-conversations (both participants equal) return `me`.
	pub fn peer_of(&self, me: &UserId) -> &UserId {
		if &self.participants[0] == me {
			&self.participants[1]
		} else {
			&self.participants[0]
		}
	}

	/// Seed a summary from the first message seen for an unknown thread.
	pub fn from_first_message(msg: &Message, current_user: &UserId) -> Self {
		Self {
			id: msg.conversation_id.clone(),
			participants: [msg.sender_id.clone(), msg.receiver_id.clone()],
			job_id: msg.job.clone(),
			application_id: msg.application.clone(),
			last_message: Some(msg.content.clone()),
			updated_at: msg.created_at,
			unread_count: u32::from(&msg.sender_id != current_user),
		}
	}
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
	pub id: MessageId,
	pub conversation_id: ConversationId,
	pub sender_id: UserId,
	pub receiver_id: UserId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub job: Option<JobId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub application: Option<ApplicationId>,
	pub content: String,
	pub created_at: DateTime<Utc>,
}

impl Message {
	pub fn scope(&self) -> Scope {
		Scope::new(self.job.clone(), self.application.clone())
	}

	pub fn involves(&self, user: &UserId) -> bool {
		&self.sender_id == user || &self.receiver_id == user
	}

	pub fn is_scoped(&self) -> bool {
		self.job.is_some() || self.application.is_some()
	}
}

/// Kind of an asynchronous notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
	StatusChange,
	NewApplicant,
	NewMessage,
	System,
	#[serde(other)]
	Other,
}

impl NotificationKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			NotificationKind::StatusChange => "status_change",
			NotificationKind::NewApplicant => "new_applicant",
			NotificationKind::NewMessage => "new_message",
			NotificationKind::System => "system",
			NotificationKind::Other => "other",
		}
	}
}

impl fmt::Display for NotificationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
	pub id: NotificationId,
	pub recipient: UserId,
	pub message: String,
	#[serde(rename = "type")]
	pub kind: NotificationKind,
	#[serde(default)]
	pub read: bool,
	pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn uid(s: &str) -> UserId {
		UserId::new(s).unwrap()
	}

	fn msg(sender: &str, receiver: &str) -> Message {
		Message {
			id: MessageId::new("m1").unwrap(),
			conversation_id: ConversationId::new("c1").unwrap(),
			sender_id: uid(sender),
			receiver_id: uid(receiver),
			job: None,
			application: Some(ApplicationId::new("app1").unwrap()),
			content: "hello".to_string(),
			created_at: Utc::now(),
		}
	}

	#[test]
	fn rejects_empty_ids() {
		assert_eq!(UserId::new(""), Err(ParseIdError::Empty));
		assert_eq!(ConversationId::new("   "), Err(ParseIdError::Empty));
		assert!("".parse::<MessageId>().is_err());
		assert!(matches!(JobId::new("a b"), Err(ParseIdError::InvalidFormat(_))));
	}

	#[test]
	fn id_parse_and_display() {
		let id: UserId = " u1 ".parse().unwrap();
		assert_eq!(id.as_str(), "u1");
		assert_eq!(id.to_string(), "u1");
	}

	#[test]
	fn scope_display() {
		assert_eq!(Scope::default().to_string(), "direct");
		let s = Scope::new(Some(JobId::new("j1").unwrap()), Some(ApplicationId::new("a1").unwrap()));
		assert_eq!(s.to_string(), "job:j1/application:a1");
		assert!(!s.is_direct());
	}

	#[test]
	fn peer_of_returns_other_participant() {
		let conv = Conversation::from_first_message(&msg("u2", "u1"), &uid("u1"));
		assert_eq!(conv.peer_of(&uid("u1")), &uid("u2"));
		assert_eq!(conv.peer_of(&uid("u2")), &uid("u1"));
		assert!(conv.involves(&uid("u2")));
		assert!(!conv.involves(&uid("u3")));
	}

	#[test]
	fn first_message_seeds_unread_only_for_inbound() {
		let inbound = Conversation::from_first_message(&msg("u2", "u1"), &uid("u1"));
		assert_eq!(inbound.unread_count, 1);
		assert_eq!(inbound.application_id.as_ref().map(|a| a.as_str()), Some("app1"));

		let outbound = Conversation::from_first_message(&msg("u1", "u2"), &uid("u1"));
		assert_eq!(outbound.unread_count, 0);
	}

	#[test]
	fn message_json_uses_camel_case() {
		let json = r#"{
			"id": "m9",
			"conversationId": "c9",
			"senderId": "u2",
			"receiverId": "u1",
			"job": "j7",
			"content": "hi",
			"createdAt": "2024-05-01T10:00:00Z"
		}"#;
		let m: Message = serde_json::from_str(json).unwrap();
		assert_eq!(m.conversation_id.as_str(), "c9");
		assert_eq!(m.job.as_ref().map(|j| j.as_str()), Some("j7"));
		assert!(m.application.is_none());
		assert!(m.is_scoped());
	}

	#[test]
	fn unknown_notification_kind_maps_to_other() {
		let json = r#"{
			"id": "n1",
			"recipient": "u1",
			"message": "interview scheduled",
			"type": "interview_reminder",
			"createdAt": "2024-05-01T10:00:00Z"
		}"#;
		let n: Notification = serde_json::from_str(json).unwrap();
		assert_eq!(n.kind, NotificationKind::Other);
		assert!(!n.read);
	}
}
