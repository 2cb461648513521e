#![forbid(unsafe_code)]

//! REST request bodies and the uniform `{ success, ...payload }` response envelope.

use parley_domain::{ApplicationId, Conversation, ConversationId, JobId, Message, Notification, UserId};
use serde::{Deserialize, Serialize};

/// Uniform response envelope.
///
/// A missing `success` field is treated as failure.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
	#[serde(default)]
	pub success: bool,
	#[serde(default, alias = "message")]
	pub error: Option<String>,
	#[serde(flatten)]
	pub payload: T,
}

impl<T> Envelope<T> {
	/// Payload on `success == true`, otherwise the server-supplied detail.
	pub fn into_result(self) -> Result<T, String> {
		if self.success {
			Ok(self.payload)
		} else {
			Err(self.error.unwrap_or_else(|| "request was not successful".to_string()))
		}
	}
}

/// Payload of endpoints that return nothing but the envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationsPayload {
	#[serde(default)]
	pub conversations: Vec<Conversation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesPayload {
	#[serde(default)]
	pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentMessagePayload {
	#[serde(default, rename = "data")]
	pub message: Option<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsPayload {
	#[serde(default)]
	pub notifications: Vec<Notification>,
}

/// Body of the send-message call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
	pub conversation_id: ConversationId,
	pub receiver_id: UserId,
	pub content: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub job_id: Option<JobId>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub application_id: Option<ApplicationId>,
	/// Client-generated idempotency key.
	pub client_message_id: String,
}

/// Query of the history call; unset keys are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
	pub job_id: Option<JobId>,
	pub application_id: Option<ApplicationId>,
}

impl HistoryQuery {
	pub fn pairs(&self) -> Vec<(&'static str, &str)> {
		let mut out = Vec::with_capacity(2);
		if let Some(job) = &self.job_id {
			out.push(("jobId", job.as_str()));
		}
		if let Some(app) = &self.application_id {
			out.push(("applicationId", app.as_str()));
		}
		out
	}
}
