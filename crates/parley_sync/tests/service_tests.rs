mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use parley_client_core::Identity;
use parley_protocol::ServerEvent;
use parley_sync::service::ApiFactory;
use parley_sync::{ChatApi, ConnectionManager, ConnectionTuning, EngineEvent, SyncService};
use tokio::sync::mpsc;

fn tuning() -> ConnectionTuning {
	ConnectionTuning {
		keepalive_interval: Duration::from_secs(3600),
		keepalive_timeout: Duration::from_millis(100),
		keepalive_max_failures: 3,
		reconnect_base: Duration::from_millis(10),
		reconnect_max: Duration::from_millis(50),
		reconnect_reset_after: Duration::from_secs(300),
	}
}

fn identity(user: &str) -> Identity {
	Identity::new(uid(user), None)
}

fn service_with(
	server: &Arc<FakeChannelServer>,
	api: &Arc<FakeApi>,
) -> (SyncService, mpsc::UnboundedReceiver<EngineEvent>) {
	let (connection, channel_rx) = ConnectionManager::spawn_with_connector(tuning(), server.connector());
	let api = Arc::clone(api);
	let factory: ApiFactory = Box::new(move |_identity: &Identity| Ok(Arc::clone(&api) as Arc<dyn ChatApi>));
	SyncService::with_parts(connection, channel_rx, factory)
}

fn seed(api: &FakeApi) {
	*api.conversations.lock() = vec![
		conv("A", "u1", "u2", None, Some("app1"), 10),
		conv("B", "u1", "u2", None, Some("app2"), 20),
	];
	*api.notifications.lock() = vec![note("n1", "u1", 5, false)];
}

#[tokio::test]
async fn start_loads_state_and_routes_pushed_events() {
	let server = FakeChannelServer::new();
	let api = FakeApi::new();
	seed(&api);
	let (service, mut rx) = service_with(&server, &api);

	let engine = service.start(identity("u1")).await.unwrap();
	next_event(&mut rx, |e| *e == EngineEvent::Connected { identity: uid("u1") }).await;
	wait_until("initial load", || {
		engine.read(|st| st.conversations.len() == 2 && st.notifications.len() == 1)
	})
	.await;

	server.push_to("u1", ServerEvent::NewMessage(msg("m1", "A", "u2", "u1", None, Some("app1"), 30)));
	server.push_to("u1", ServerEvent::PresenceUpdate(vec![uid("u2")]));

	wait_until("pushed events applied", || {
		engine.read(|st| {
			st.conversations.get(&cid("A")).map(|c| c.unread_count) == Some(1) && st.presence.is_online(&uid("u2"))
		})
	})
	.await;
	assert!(engine.is_connected());
	assert_eq!(engine.snapshot().conversations[0].conversation.id, cid("A"));

	service.shutdown().await;
	assert_eq!(server.log(), vec!["connect u1", "close u1"]);
}

#[tokio::test]
async fn restarting_same_identity_keeps_engine_and_channel() {
	let server = FakeChannelServer::new();
	let api = FakeApi::new();
	seed(&api);
	let (service, mut rx) = service_with(&server, &api);

	let first = service.start(identity("u1")).await.unwrap();
	next_event(&mut rx, |e| matches!(e, EngineEvent::Connected { .. })).await;
	wait_until("initial load", || first.read(|st| st.conversations.len() == 2)).await;
	first.select(&cid("B")).unwrap();

	let second = service.start(identity("u1")).await.unwrap();
	assert_eq!(second.snapshot().selected, Some(cid("B")));

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(server.log(), vec!["connect u1"]);
	service.shutdown().await;
}

#[tokio::test]
async fn switching_identity_starts_from_empty_state() {
	let server = FakeChannelServer::new();
	let api = FakeApi::new();
	seed(&api);
	let (service, mut rx) = service_with(&server, &api);

	let old = service.start(identity("u1")).await.unwrap();
	next_event(&mut rx, |e| *e == EngineEvent::Connected { identity: uid("u1") }).await;
	wait_until("initial load", || old.read(|st| st.conversations.len() == 2)).await;

	*api.conversations.lock() = vec![conv("K", "u7", "u2", None, None, 40)];
	let new = service.start(identity("u7")).await.unwrap();
	assert_eq!(new.current_user(), uid("u7"));
	assert!(new.snapshot().selected.is_none());

	next_event(&mut rx, |e| *e == EngineEvent::Connected { identity: uid("u7") }).await;
	wait_until("second identity loaded", || new.read(|st| st.conversations.len() == 1)).await;
	assert_eq!(server.log(), vec!["connect u1", "close u1", "connect u7"]);
	assert_eq!(service.engine().map(|e| e.current_user()), Some(uid("u7")));

	server.push_to("u7", ServerEvent::NewMessage(msg("k1", "K", "u2", "u7", None, None, 50)));
	wait_until("message routed to new identity", || {
		new.read(|st| st.conversations.get(&cid("K")).map(|c| c.unread_count) == Some(1))
	})
	.await;
	assert_eq!(old.read(|st| st.conversations.total_unread()), 0);
	assert!(old.read(|st| st.conversations.is_empty() && st.notifications.is_empty()));

	service.shutdown().await;
}

#[tokio::test]
async fn stop_drops_engine_and_closes_channel() {
	let server = FakeChannelServer::new();
	let api = FakeApi::new();
	seed(&api);
	let (service, mut rx) = service_with(&server, &api);

	let engine = service.start(identity("u1")).await.unwrap();
	next_event(&mut rx, |e| matches!(e, EngineEvent::Connected { .. })).await;
	wait_until("initial load", || {
		engine.read(|st| st.conversations.len() == 2 && st.notifications.len() == 1)
	})
	.await;
	server.push_to("u1", ServerEvent::PresenceUpdate(vec![uid("u2")]));
	wait_until("presence applied", || engine.read(|st| st.presence.len() == 1)).await;
	engine.select(&cid("A")).unwrap();

	service.stop("logout").await.unwrap();
	assert!(service.engine().is_none());
	let left = engine.snapshot();
	assert!(left.conversations.is_empty());
	assert!(left.notifications.is_empty());
	assert!(left.online.is_empty());
	assert!(left.selected.is_none());
	assert!(!engine.is_connected());
	wait_until("channel closed", || server.log().contains(&"close u1".to_string())).await;

	service.shutdown().await;
	assert_eq!(server.log(), vec!["connect u1", "close u1"]);
}
