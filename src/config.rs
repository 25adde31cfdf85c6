//! Client configuration
//!
//! One `Config` is created at process start and handed to the client; it
//! is never mutated afterwards. Values follow a priority chain:
//! 1. Built-in defaults (`Config::default()`)
//! 2. Config file (TOML)
//! 3. Environment variables (`BOINC_RPC_*`, `BOINC_DATA_DIR`)
//! 4. CLI flags (applied by the binary)

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::wire::{DEFAULT_HOST, DEFAULT_PORT};

/// Configuration for a GUI RPC client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// CONNECTION
	// ========================================================================
	/// Daemon host name or address
	pub host: String,

	/// Daemon TCP port
	pub port: u16,

	/// GUI RPC password; read from the password file when unset
	pub password: Option<String>,

	// ========================================================================
	// DAEMON
	// ========================================================================
	/// Daemon data directory (holds the password file)
	pub data_dir: PathBuf,

	/// Password file name inside `data_dir`
	pub password_file: String,

	/// Process name used when waiting for the daemon to exit
	pub process_name: String,

	/// Poll interval while waiting for the daemon to exit
	pub exit_poll_ms: u64,

	/// Give up waiting for the daemon to exit after this long
	pub exit_timeout_secs: Option<u64>,

	// ========================================================================
	// CLIENT
	// ========================================================================
	/// Version reported in the version exchange
	pub client_version: ClientVersion,

	/// Interval between watcher refreshes
	pub poll_interval_ms: u64,
}

/// Version triple this client reports to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientVersion {
	pub major: u32,
	pub minor: u32,
	pub release: u32,
}

impl Default for ClientVersion {
	fn default() -> Self {
		ClientVersion { major: 7, minor: 24, release: 0 }
	}
}

impl Default for Config {
	fn default() -> Self {
		Config {
			host: DEFAULT_HOST.to_string(),
			port: DEFAULT_PORT,
			password: None,
			data_dir: default_data_dir(),
			password_file: "gui_rpc_auth.cfg".to_string(),
			process_name: default_process_name().to_string(),
			exit_poll_ms: 250,
			exit_timeout_secs: Some(30),
			client_version: ClientVersion::default(),
			poll_interval_ms: 1000,
		}
	}
}

#[cfg(target_os = "windows")]
fn default_data_dir() -> PathBuf {
	PathBuf::from(r"C:\ProgramData\BOINC")
}

#[cfg(target_os = "macos")]
fn default_data_dir() -> PathBuf {
	PathBuf::from("/Library/Application Support/BOINC Data")
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn default_data_dir() -> PathBuf {
	PathBuf::from("/var/lib/boinc-client")
}

#[cfg(target_os = "windows")]
fn default_process_name() -> &'static str {
	"boinc.exe"
}

#[cfg(not(target_os = "windows"))]
fn default_process_name() -> &'static str {
	"boinc"
}

impl Config {
	/// Load from a TOML file; missing keys keep their defaults.
	pub fn load(path: &Path) -> Result<Config, ConfigError> {
		let text = std::fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
		let config: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse {
			path: path.display().to_string(),
			message: e.to_string(),
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Reject intervals a timer cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.poll_interval_ms == 0 {
			return Err(ConfigError::InvalidValue {
				name: "pollIntervalMs".into(),
				message: "must be at least 1".into(),
			});
		}
		if self.exit_poll_ms == 0 {
			return Err(ConfigError::InvalidValue {
				name: "exitPollMs".into(),
				message: "must be at least 1".into(),
			});
		}
		Ok(())
	}

	/// Apply `BOINC_RPC_HOST`, `BOINC_RPC_PORT`, `BOINC_RPC_PASSWORD` and
	/// `BOINC_DATA_DIR` from the process environment.
	pub fn with_env(self) -> Result<Config, ConfigError> {
		self.with_vars(|name| std::env::var(name).ok())
	}

	/// Apply overrides from an arbitrary variable source.
	pub fn with_vars<F>(mut self, var: F) -> Result<Config, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(host) = var("BOINC_RPC_HOST") {
			self.host = host;
		}
		if let Some(port) = var("BOINC_RPC_PORT") {
			self.port = port
				.parse()
				.map_err(|_| ConfigError::InvalidEnv { name: "BOINC_RPC_PORT".into(), value: port })?;
		}
		if let Some(password) = var("BOINC_RPC_PASSWORD") {
			self.password = Some(password);
		}
		if let Some(dir) = var("BOINC_DATA_DIR") {
			self.data_dir = PathBuf::from(dir);
		}
		Ok(self)
	}

	/// Whether `host` refers to this machine
	pub fn is_local(&self) -> bool {
		self.host.eq_ignore_ascii_case("localhost")
			|| self.host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
	}

	pub fn password_path(&self) -> PathBuf {
		self.data_dir.join(&self.password_file)
	}

	/// Password to authenticate with.
	///
	/// An explicit password wins. For local daemons the first line of the
	/// password file is used; a missing file means an empty password.
	pub fn resolve_password(&self) -> Result<String, ConfigError> {
		if let Some(password) = &self.password {
			return Ok(password.clone());
		}
		if !self.is_local() {
			return Ok(String::new());
		}

		let path = self.password_path();
		match std::fs::read_to_string(&path) {
			Ok(text) => {
				debug!(path = %path.display(), "using password file");
				Ok(text.lines().next().unwrap_or("").trim().to_string())
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
			Err(source) => Err(ConfigError::Read { path: path.display().to_string(), source }),
		}
	}

	pub fn exit_poll(&self) -> Duration {
		Duration::from_millis(self.exit_poll_ms)
	}

	pub fn exit_timeout(&self) -> Option<Duration> {
		self.exit_timeout_secs.map(Duration::from_secs)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}


// vim: ts=4
