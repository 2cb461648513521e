#![forbid(unsafe_code)]

use parley_client_core::{ChannelControl, ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_CHANNEL_URL, Identity, RestClient, SecretString};
use parley_domain::UserId;
use parley_protocol::ServerEvent;
use tracing::info;

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: parley_client --user <id> [--channel ws://host:port/path] [--api http://host:port/path] [--list]\n\
\n\
Options:\n\
	--user      Identity to connect as (required)\n\
	--channel   Push-channel endpoint (default: {DEFAULT_CHANNEL_URL})\n\
	--api       REST base endpoint (default: {DEFAULT_API_BASE_URL})\n\
	--list      Print the conversation list before listening\n\
	--help      Show this help\n\
\n\
Environment:\n\
	PARLEY_AUTH_TOKEN   Bearer token sent with the handshake and REST calls\n\
\n\
Examples:\n\
	parley_client --user u1 --channel ws://127.0.0.1:5000/ws\n\
	parley_client --user u1 --api https://jobs.example.com/api --list\n"
	);
	std::process::exit(2)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,parley_client_core=debug".to_string());
	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

struct Args {
	user: UserId,
	channel_url: String,
	api_base_url: String,
	list: bool,
}

fn parse_args() -> Args {
	let mut user: Option<UserId> = None;
	let mut channel_url = DEFAULT_CHANNEL_URL.to_string();
	let mut api_base_url = DEFAULT_API_BASE_URL.to_string();
	let mut list = false;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--user" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				user = Some(v.parse().unwrap_or_else(|e| {
					eprintln!("Invalid --user value {v:?}: {e}");
					usage_and_exit()
				}));
			}
			"--channel" => {
				channel_url = it.next().unwrap_or_else(|| usage_and_exit());
			}
			"--api" => {
				api_base_url = it.next().unwrap_or_else(|| usage_and_exit());
			}
			"--list" => list = true,
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	let Some(user) = user else {
		eprintln!("--user is required");
		usage_and_exit();
	};

	Args {
		user,
		channel_url,
		api_base_url,
		list,
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();
	let args = parse_args();

	let cfg = ClientConfig {
		channel_url: args.channel_url,
		api_base_url: args.api_base_url,
		client_name: format!("parley-client-cli/{}", env!("CARGO_PKG_VERSION")),
		..ClientConfig::default()
	};
	cfg.validate()?;

	let token = std::env::var("PARLEY_AUTH_TOKEN").ok().and_then(|v| {
		let v = v.trim().to_string();
		(!v.is_empty()).then(|| SecretString::new(v))
	});
	let identity = Identity::new(args.user, token);

	if args.list {
		let rest = RestClient::new(&cfg, identity.clone())?;
		for conv in rest.list_conversations().await? {
			println!(
				"{} [{}] peer={} unread={} last={:?}",
				conv.id,
				conv.scope(),
				conv.peer_of(&identity.user_id),
				conv.unread_count,
				conv.last_message.as_deref().unwrap_or("")
			);
		}
	}

	info!(server = %cfg.channel_hostport(), identity = %identity.user_id, "connecting");

	let mut control = ChannelControl::connect(&cfg, &identity).await?;
	let mut events = control.open_events_stream()?;

	events
		.run_events_loop(|ev| match ev {
			ServerEvent::NewMessage(m) => {
				println!("[{} {}] {} -> {}: {}", m.conversation_id, m.scope(), m.sender_id, m.receiver_id, m.content);
			}
			ServerEvent::NewNotification(n) => {
				println!("[notification {}] {}", n.kind, n.message);
			}
			ServerEvent::PresenceUpdate(users) => {
				let ids: Vec<&str> = users.iter().map(UserId::as_str).collect();
				println!("[presence] online: {}", ids.join(", "));
			}
		})
		.await?;

	control.close("client exit").await;

	Ok(())
}
