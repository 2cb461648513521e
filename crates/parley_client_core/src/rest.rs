#![forbid(unsafe_code)]

use parley_domain::{Conversation, ConversationId, Message, Notification, NotificationId, UserId};
use parley_protocol::rest::{
	Ack, ConversationsPayload, Envelope, HistoryQuery, MessagesPayload, NotificationsPayload, SendMessageRequest,
	SentMessagePayload,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{ClientConfig, ClientCoreError, Identity};

/// Credentialed client for the conversation and notification REST resources.
#[derive(Debug, Clone)]
pub struct RestClient {
	base_url: Url,
	identity: Identity,
	client: reqwest::Client,
}

impl RestClient {
	pub fn new(cfg: &ClientConfig, identity: Identity) -> Result<Self, ClientCoreError> {
		let base_url = cfg.api_endpoint()?;

		let client = reqwest::Client::builder()
			.user_agent(cfg.client_name.clone())
			.timeout(cfg.request_timeout)
			.build()
			.map_err(|e| ClientCoreError::Other(format!("build http client: {e}")))?;

		Ok(Self {
			base_url,
			identity,
			client,
		})
	}

	pub fn identity(&self) -> &Identity {
		&self.identity
	}

	fn url(&self, segments: &[&str]) -> Result<Url, ClientCoreError> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|_| ClientCoreError::Endpoint(format!("api base url cannot carry paths: {}", self.base_url)))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	fn request(&self, method: Method, url: Url) -> RequestBuilder {
		let mut req = self.client.request(method, url);
		if let Some(bearer) = self.identity.bearer() {
			req = req.header("Authorization", bearer);
		}
		req
	}

	async fn call<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T, ClientCoreError> {
		let resp = req
			.send()
			.await
			.map_err(|e| ClientCoreError::Io(format!("{what}: {e}")))?;

		let status = resp.status();
		debug!(%status, what, "rest response");

		if !status.is_success() {
			let detail = resp.text().await.unwrap_or_default();
			let detail = detail.trim();
			return Err(ClientCoreError::Api {
				status: status.as_u16(),
				detail: if detail.is_empty() {
					status.canonical_reason().unwrap_or("request failed").to_string()
				} else {
					format!("{what}: {detail}")
				},
			});
		}

		let env: Envelope<T> = resp
			.json()
			.await
			.map_err(|e| ClientCoreError::Io(format!("parse {what} response: {e}")))?;

		env.into_result()
			.map_err(|detail| ClientCoreError::Rejected(format!("{what}: {detail}")))
	}

	pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ClientCoreError> {
		let url = self.url(&["messages", "conversations"])?;
		let payload: ConversationsPayload = self.call(self.request(Method::GET, url), "list conversations").await?;
		Ok(payload.conversations)
	}

	pub async fn fetch_history(&self, peer: &UserId, query: &HistoryQuery) -> Result<Vec<Message>, ClientCoreError> {
		let mut url = self.url(&["messages", "history", peer.as_str()])?;
		let pairs = query.pairs();
		if !pairs.is_empty() {
			url.query_pairs_mut().extend_pairs(pairs);
		}
		let payload: MessagesPayload = self.call(self.request(Method::GET, url), "fetch history").await?;
		Ok(payload.messages)
	}

	pub async fn send_message(&self, body: &SendMessageRequest) -> Result<Message, ClientCoreError> {
		let url = self.url(&["messages", "send"])?;
		let payload: SentMessagePayload = self
			.call(self.request(Method::POST, url).json(body), "send message")
			.await?;
		payload
			.message
			.ok_or_else(|| ClientCoreError::Rejected("send message: response carried no message".to_string()))
	}

	pub async fn mark_conversation_read(&self, conversation: &ConversationId) -> Result<(), ClientCoreError> {
		let url = self.url(&["messages", "read", conversation.as_str()])?;
		let _: Ack = self.call(self.request(Method::PUT, url), "mark conversation read").await?;
		Ok(())
	}

	pub async fn list_notifications(&self) -> Result<Vec<Notification>, ClientCoreError> {
		let url = self.url(&["notifications"])?;
		let payload: NotificationsPayload = self.call(self.request(Method::GET, url), "list notifications").await?;
		Ok(payload.notifications)
	}

	pub async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), ClientCoreError> {
		let url = self.url(&["notifications", id.as_str(), "read"])?;
		let _: Ack = self.call(self.request(Method::PUT, url), "mark notification read").await?;
		Ok(())
	}

	pub async fn mark_all_notifications_read(&self) -> Result<(), ClientCoreError> {
		let url = self.url(&["notifications", "read-all"])?;
		let _: Ack = self.call(self.request(Method::PUT, url), "mark all notifications read").await?;
		Ok(())
	}

	pub async fn delete_notification(&self, id: &NotificationId) -> Result<(), ClientCoreError> {
		let url = self.url(&["notifications", id.as_str()])?;
		let _: Ack = self.call(self.request(Method::DELETE, url), "delete notification").await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn client(base: &str) -> RestClient {
		let cfg = ClientConfig {
			api_base_url: base.to_string(),
			..ClientConfig::default()
		};
		RestClient::new(&cfg, Identity::new(UserId::new("u1").unwrap(), None)).unwrap()
	}

	#[test]
	fn url_appends_segments_to_base_path() {
		let c = client("https://api.example.com/api/");
		let url = c.url(&["messages", "read", "c1"]).unwrap();
		assert_eq!(url.as_str(), "https://api.example.com/api/messages/read/c1");
	}

	#[test]
	fn url_escapes_segments() {
		let c = client("https://api.example.com");
		let url = c.url(&["notifications", "a/b", "read"]).unwrap();
		assert_eq!(url.as_str(), "https://api.example.com/notifications/a%2Fb/read");
	}

	#[test]
	fn rejects_non_http_base_urls() {
		let cfg = ClientConfig {
			api_base_url: "mailto:someone@example.com".to_string(),
			..ClientConfig::default()
		};
		assert!(RestClient::new(&cfg, Identity::new(UserId::new("u1").unwrap(), None)).is_err());
	}
}
