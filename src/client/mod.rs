//! GUI RPC client
//!
//! [`RpcClient`] owns one connection to the daemon and exposes one async
//! method per remote operation. Each method is a single request/reply
//! round trip; the client holds no lock and expects one caller at a time.
//!
//! ```rust,ignore
//! use boinc_rpc::{Config, RpcClient};
//!
//! let mut client = RpcClient::new(Config::default());
//! client.connect().await?;
//! for project in client.projects().await? {
//!     println!("{} ({} MB)", project.name, project.disk_usage_mb);
//! }
//! client.close().await?;
//! ```

pub mod auth;
pub mod records;
pub mod requests;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{RpcError, RpcResult};
use crate::system;
use crate::types::{
	AttachStatus, DiskUsage, Preferences, Project, ProjectOp, ProxySettings, Task, VersionInfo,
};
use crate::watcher::SnapshotSource;
use crate::wire::{AuthState, Connection};

/// Client for the daemon's GUI RPC interface
pub struct RpcClient<S = TcpStream> {
	config: Config,
	conn: Option<Connection<S>>,
}

impl RpcClient<TcpStream> {
	/// Open a TCP connection to the configured daemon and authorize.
	pub async fn connect(&mut self) -> RpcResult<()> {
		if self.conn.is_some() {
			return Err(RpcError::AlreadyConnected);
		}
		let address = format!("{}:{}", self.config.host, self.config.port);
		let stream = TcpStream::connect(&address)
			.await
			.map_err(|source| RpcError::ConnectFailed { address: address.clone(), source })?;
		stream.set_nodelay(true)?;
		info!(%address, "connected to daemon");
		self.attach(stream).await
	}
}

impl<S> RpcClient<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send,
{
	pub fn new(config: Config) -> Self {
		RpcClient { config, conn: None }
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Whether the handshake has completed on the current connection
	pub fn is_connected(&self) -> bool {
		self.conn.as_ref().is_some_and(|c| c.state() == AuthState::Authorized)
	}

	/// Take ownership of an open stream and run the handshake on it.
	///
	/// On failure the stream is closed before the error is returned.
	pub async fn attach(&mut self, stream: S) -> RpcResult<()> {
		if self.conn.is_some() {
			return Err(RpcError::AlreadyConnected);
		}
		let password = self.config.resolve_password()?;
		let mut conn = Connection::new(stream);
		match auth::authorize(&mut conn, &password).await {
			Ok(()) => {
				self.conn = Some(conn);
				Ok(())
			}
			Err(e) => {
				warn!(error = %e, "authorization failed, closing connection");
				let _ = conn.shutdown().await;
				Err(e)
			}
		}
	}

	/// Close the connection. Closing a closed client is a no-op.
	pub async fn close(&mut self) -> RpcResult<()> {
		match self.conn.take() {
			Some(mut conn) => {
				info!("closing connection");
				conn.shutdown().await
			}
			None => Ok(()),
		}
	}

	fn connection(&mut self) -> RpcResult<&mut Connection<S>> {
		match self.conn.as_mut() {
			Some(conn) if conn.state() == AuthState::Authorized => Ok(conn),
			_ => Err(RpcError::NotConnected),
		}
	}

	/// Drop the connection unless `result` is an error the stream survives.
	fn settle<T>(&mut self, result: RpcResult<T>) -> RpcResult<T> {
		if let Err(e) = &result {
			if !e.keeps_connection() && self.conn.is_some() {
				warn!(error = %e, "dropping connection");
				self.conn = None;
			}
		}
		result
	}

	pub async fn exchange_versions(&mut self) -> RpcResult<VersionInfo> {
		let ours = self.config.client_version;
		let result = requests::exchange_versions(self.connection()?, ours).await;
		self.settle(result)
	}

	/// Attached projects, with disk usage
	pub async fn projects(&mut self) -> RpcResult<Vec<Project>> {
		let result = requests::projects(self.connection()?).await;
		self.settle(result)
	}

	pub async fn disk_usage(&mut self) -> RpcResult<DiskUsage> {
		let result = requests::disk_usage(self.connection()?).await;
		self.settle(result)
	}

	/// All tasks known to the daemon
	pub async fn tasks(&mut self) -> RpcResult<Vec<Task>> {
		let result = requests::tasks(self.connection()?, false).await;
		self.settle(result)
	}

	/// Tasks that currently hold a process slot
	pub async fn active_tasks(&mut self) -> RpcResult<Vec<Task>> {
		let result = requests::tasks(self.connection()?, true).await;
		self.settle(result)
	}

	/// Preferences currently in effect
	pub async fn preferences(&mut self) -> RpcResult<Preferences> {
		let result = requests::preferences(self.connection()?).await;
		self.settle(result)
	}

	pub async fn set_preferences(&mut self, prefs: &Preferences) -> RpcResult<()> {
		let result = requests::set_preferences(self.connection()?, prefs).await;
		self.settle(result)
	}

	/// HTTP proxy settings; `None` when no proxy is in use
	pub async fn proxy_settings(&mut self) -> RpcResult<Option<ProxySettings>> {
		let result = requests::proxy_settings(self.connection()?).await;
		self.settle(result)
	}

	pub async fn set_proxy_settings(&mut self, proxy: Option<&ProxySettings>) -> RpcResult<()> {
		let result = requests::set_proxy_settings(self.connection()?, proxy).await;
		self.settle(result)
	}

	pub async fn attach_project(&mut self, url: &str, authenticator: &str, name: &str) -> RpcResult<()> {
		let result = requests::attach_project(self.connection()?, url, authenticator, name).await;
		self.settle(result)
	}

	/// Progress of the last attach request
	pub async fn attach_poll(&mut self) -> RpcResult<AttachStatus> {
		let result = requests::attach_poll(self.connection()?).await;
		self.settle(result)
	}

	/// Run a control operation on the project with this master URL.
	pub async fn project_op(&mut self, op: ProjectOp, url: &str) -> RpcResult<()> {
		let result = requests::project_op(self.connection()?, op, url).await;
		self.settle(result)
	}

	/// Control handle for `project`, borrowing this client
	pub fn project<'a>(&'a mut self, project: &'a Project) -> ProjectControl<'a, S> {
		ProjectControl { client: self, url: &project.master_url }
	}

	/// Ask the daemon to exit and close the connection.
	///
	/// With `wait`, also block until the daemon process is gone (only for
	/// a local daemon). Returns whether the process is known to have exited.
	pub async fn quit(&mut self, wait: bool) -> RpcResult<bool> {
		let result = requests::quit(self.connection()?).await;
		self.settle(result)?;
		self.close().await?;

		if !wait || !self.config.is_local() {
			return Ok(false);
		}
		let exited = system::wait_for_exit(
			&self.config.process_name,
			self.config.exit_poll(),
			self.config.exit_timeout(),
		)
		.await;
		if !exited {
			warn!(process = %self.config.process_name, "daemon still running after quit");
		}
		Ok(exited)
	}
}

/// Per-project control operations bound to the client that owns the
/// project's connection
pub struct ProjectControl<'a, S> {
	client: &'a mut RpcClient<S>,
	url: &'a str,
}

impl<S> ProjectControl<'_, S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send,
{
	pub async fn suspend(&mut self) -> RpcResult<()> {
		self.client.project_op(ProjectOp::Suspend, self.url).await
	}

	pub async fn resume(&mut self) -> RpcResult<()> {
		self.client.project_op(ProjectOp::Resume, self.url).await
	}

	pub async fn detach(&mut self) -> RpcResult<()> {
		self.client.project_op(ProjectOp::Detach, self.url).await
	}

	pub async fn reset(&mut self) -> RpcResult<()> {
		self.client.project_op(ProjectOp::Reset, self.url).await
	}

	pub async fn update(&mut self) -> RpcResult<()> {
		self.client.project_op(ProjectOp::Update, self.url).await
	}

	pub async fn allow_more_work(&mut self) -> RpcResult<()> {
		self.client.project_op(ProjectOp::AllowMoreWork, self.url).await
	}

	pub async fn no_more_work(&mut self) -> RpcResult<()> {
		self.client.project_op(ProjectOp::NoMoreWork, self.url).await
	}
}

#[async_trait]
impl<S> SnapshotSource for RpcClient<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send,
{
	async fn fetch_projects(&mut self) -> RpcResult<Vec<Project>> {
		self.projects().await
	}

	async fn fetch_tasks(&mut self) -> RpcResult<Vec<Task>> {
		self.tasks().await
	}
}

// vim: ts=4
