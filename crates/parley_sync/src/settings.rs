#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use parley_client_core::{ClientConfig, Identity, SecretString};
use parley_domain::UserId;
use serde::Deserialize;
use tracing::{info, warn};

use crate::connection::ConnectionTuning;

/// Default settings path: `~/.parley/config.toml`.
pub fn default_settings_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".parley").join("config.toml"))
}

/// Load settings from the default path and the process environment.
pub fn load_settings() -> anyhow::Result<SyncSettings> {
	let path = default_settings_path()?;
	load_settings_from_path(&path)
}

/// Same as `load_settings` but with an explicit path.
pub fn load_settings_from_path(path: &Path) -> anyhow::Result<SyncSettings> {
	load_settings_with_env(path, |key| std::env::var(key).ok())
}

/// Load from `path`, then apply overrides looked up through `env`.
pub fn load_settings_with_env<E>(path: &Path, env: E) -> anyhow::Result<SyncSettings>
where
	E: Fn(&str) -> Option<String>,
{
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read settings from {}", path.display()))?
		.unwrap_or_default();

	let mut settings = SyncSettings::from_file(file_cfg)?;
	apply_env_overrides(&mut settings, env);
	settings.client.validate().context("validate endpoints")?;
	Ok(settings)
}

/// Engine settings.
#[derive(Debug, Clone, Default)]
pub struct SyncSettings {
	pub client: ClientConfig,
	pub tuning: ConnectionTuning,
	/// Identity to start with, if configured.
	pub user_id: Option<UserId>,
	pub auth_token: Option<SecretString>,
}

impl SyncSettings {
	fn from_file(file: FileConfig) -> anyhow::Result<Self> {
		let mut client = ClientConfig::default();
		let mut tuning = ConnectionTuning::default();

		if let Some(v) = file.server.api_base_url {
			client.api_base_url = v;
		}
		if let Some(v) = file.server.channel_url {
			client.channel_url = v;
		}
		if let Some(v) = file.server.max_event_bytes {
			client.max_event_bytes = v;
		}

		let conn = file.connection;
		if let Some(v) = conn.connect_timeout_secs {
			client.connect_timeout = Duration::from_secs(v);
		}
		if let Some(v) = conn.request_timeout_secs {
			client.request_timeout = Duration::from_secs(v);
		}
		if let Some(v) = conn.keepalive_interval_secs {
			tuning.keepalive_interval = Duration::from_secs(v.max(1));
		}
		if let Some(v) = conn.keepalive_max_failures {
			tuning.keepalive_max_failures = v.max(1);
		}
		if let Some(v) = conn.reconnect_min_delay_ms {
			tuning.reconnect_base = Duration::from_millis(v);
		}
		if let Some(v) = conn.reconnect_max_delay_ms {
			tuning.reconnect_max = Duration::from_millis(v);
		}

		let user_id = match file.identity.user_id {
			Some(v) => Some(v.parse::<UserId>().with_context(|| format!("invalid identity.user_id {v:?}"))?),
			None => None,
		};
		let auth_token = file
			.identity
			.auth_token
			.map(|t| t.trim().to_string())
			.filter(|t| !t.is_empty())
			.map(SecretString::new);

		Ok(Self {
			client,
			tuning,
			user_id,
			auth_token,
		})
	}

	/// Identity from the configured user id and token.
	pub fn identity(&self) -> Option<Identity> {
		self.user_id
			.clone()
			.map(|user| Identity::new(user, self.auth_token.clone()))
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
	server: FileServer,
	identity: FileIdentity,
	connection: FileConnection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileServer {
	api_base_url: Option<String>,
	channel_url: Option<String>,
	max_event_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileIdentity {
	user_id: Option<String>,
	auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConnection {
	connect_timeout_secs: Option<u64>,
	request_timeout_secs: Option<u64>,
	keepalive_interval_secs: Option<u64>,
	keepalive_max_failures: Option<u32>,
	reconnect_min_delay_ms: Option<u64>,
	reconnect_max_delay_ms: Option<u64>,
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read settings file")),
	}
}

fn non_empty(v: String) -> Option<String> {
	let v = v.trim().to_string();
	(!v.is_empty()).then_some(v)
}

fn apply_env_overrides<E>(settings: &mut SyncSettings, env: E)
where
	E: Fn(&str) -> Option<String>,
{
	if let Some(v) = env("PARLEY_API_BASE_URL").and_then(non_empty) {
		settings.client.api_base_url = v;
		info!("settings: api_base_url overridden by env");
	}

	if let Some(v) = env("PARLEY_CHANNEL_URL").and_then(non_empty) {
		settings.client.channel_url = v;
		info!("settings: channel_url overridden by env");
	}

	if let Some(v) = env("PARLEY_AUTH_TOKEN").and_then(non_empty) {
		settings.auth_token = Some(SecretString::new(v));
		info!("settings: auth_token overridden by env");
	}

	if let Some(v) = env("PARLEY_USER_ID").and_then(non_empty) {
		match v.parse::<UserId>() {
			Ok(user) => {
				info!(user = %user, "settings: user_id overridden by env");
				settings.user_id = Some(user);
			}
			Err(e) => warn!(error = %e, "settings: ignoring invalid PARLEY_USER_ID"),
		}
	}

	if let Some(secs) = env("PARLEY_CONNECT_TIMEOUT_SECS").and_then(|v| v.trim().parse::<u64>().ok()) {
		settings.client.connect_timeout = Duration::from_secs(secs);
		info!(secs, "settings: connect_timeout overridden by env");
	}

	if let Some(ms) = env("PARLEY_RECONNECT_MAX_DELAY_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
		settings.tuning.reconnect_max = Duration::from_millis(ms);
		info!(ms, "settings: reconnect_max_delay overridden by env");
	}
}
