#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context as _;
use parley_sync::{EngineEvent, SyncService, load_settings, load_settings_from_path};
use tracing::{info, warn};

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,parley_sync=debug".to_string());
	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: parley_headless [--config <path>]\n\
\n\
Runs the sync engine for the configured identity and logs what it sees.\n\
\n\
Options:\n\
	--config   Settings file (default: ~/.parley/config.toml)\n\
	--help     Show this help\n\
\n\
Environment:\n\
	PARLEY_USER_ID, PARLEY_AUTH_TOKEN, PARLEY_API_BASE_URL, PARLEY_CHANNEL_URL,\n\
	PARLEY_CONNECT_TIMEOUT_SECS, PARLEY_RECONNECT_MAX_DELAY_MS\n"
	);
	std::process::exit(2)
}

fn parse_config_path() -> Option<PathBuf> {
	let mut path = None;
	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--config" => path = Some(PathBuf::from(it.next().unwrap_or_else(|| usage_and_exit()))),
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}
	path
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();

	let settings = match parse_config_path() {
		Some(path) => load_settings_from_path(&path)?,
		None => load_settings()?,
	};
	let identity = settings
		.identity()
		.context("no identity configured; set identity.user_id or PARLEY_USER_ID")?;

	let (service, mut events) = SyncService::new(settings.client.clone(), settings.tuning.clone())?;
	let engine = service.start(identity).await?;
	info!(identity = %engine.current_user(), "engine started");

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("interrupted");
				break;
			}
			ev = events.recv() => {
				let Some(ev) = ev else { break };
				match ev {
					EngineEvent::Toast(t) => info!(kind = %t.kind, "{}", t.message),
					EngineEvent::Disconnected { reason } => warn!(%reason, "disconnected"),
					EngineEvent::ConversationsChanged => {
						let snap = engine.snapshot();
						info!(
							conversations = snap.conversations.len(),
							unread = snap.unread_messages,
							"conversations changed"
						);
					}
					EngineEvent::NotificationsChanged => {
						let snap = engine.snapshot();
						info!(
							notifications = snap.notifications.len(),
							unread = snap.unread_notifications,
							"notifications changed"
						);
					}
					other => info!(event = ?other, "engine event"),
				}
			}
		}
	}

	service.stop("client exit").await?;
	service.shutdown().await;
	Ok(())
}
