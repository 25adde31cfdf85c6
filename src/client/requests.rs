//! One function per remote operation, each a composition of codec calls
//! over an authorized connection.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use super::records::{self, PREFERENCE_FIELDS};
use crate::config::ClientVersion;
use crate::error::{RpcError, RpcResult};
use crate::types::{
	AttachStatus, DiskUsage, Preferences, Project, ProjectOp, ProxySettings, Task, VersionInfo,
	BYTES_PER_MB,
};
use crate::wire::{Connection, RequestWriter};

/// Proxy fields replaced when HTTP proxy settings are written
const HTTP_PROXY_FIELDS: [&str; 6] = [
	"use_http_proxy",
	"use_http_auth",
	"http_server_name",
	"http_server_port",
	"http_user_name",
	"http_user_passwd",
];

pub async fn exchange_versions<S>(conn: &mut Connection<S>, ours: ClientVersion) -> RpcResult<VersionInfo>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| {
		w.element("exchange_versions", |w| {
			w.value("major", ours.major)?;
			w.value("minor", ours.minor)?;
			w.value("release", ours.release)
		})
	})
	.await?;

	let reply = conn.reply();
	reply.begin().await?;
	let result = match reply.open("server_version").await {
		Ok(el) => records::read_version(reply, el).await,
		Err(e) => Err(e),
	};
	reply.finish(result).await
}

/// Project list without disk usage
pub async fn project_status<S>(conn: &mut Connection<S>) -> RpcResult<Vec<Project>>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.empty("get_project_status")).await?;
	let reply = conn.reply();
	reply.begin().await?;

	let result = async {
		let list = reply.open("projects").await?;
		let mut projects = Vec::new();
		while let Some(item) = reply.try_open("project").await? {
			projects.push(records::read_project(reply, item).await?);
		}
		reply.skip_rest(list).await?;
		Ok::<_, RpcError>(projects)
	}
	.await;
	reply.finish(result).await
}

pub async fn disk_usage<S>(conn: &mut Connection<S>) -> RpcResult<DiskUsage>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.empty("get_disk_usage")).await?;
	let reply = conn.reply();
	reply.begin().await?;
	let result = match reply.open("disk_usage_summary").await {
		Ok(el) => records::read_disk_usage(reply, el).await,
		Err(e) => Err(e),
	};
	reply.finish(result).await
}

/// Project list with disk usage merged in by master URL
pub async fn projects<S>(conn: &mut Connection<S>) -> RpcResult<Vec<Project>>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	let mut projects = project_status(conn).await?;
	let usage = disk_usage(conn).await?;
	for project in projects.iter_mut() {
		if let Some(entry) = usage.projects.iter().find(|u| u.master_url == project.master_url) {
			project.disk_usage_mb = entry.bytes.max(0.0) as u64 / BYTES_PER_MB;
		}
	}
	debug!(count = projects.len(), "fetched projects");
	Ok(projects)
}

pub async fn tasks<S>(conn: &mut Connection<S>, active_only: bool) -> RpcResult<Vec<Task>>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.element("get_results", |w| w.boolean("active_only", active_only))).await?;
	let reply = conn.reply();
	reply.begin().await?;

	let result = async {
		let list = reply.open("results").await?;
		let mut tasks = Vec::new();
		while let Some(item) = reply.try_open("result").await? {
			tasks.push(records::read_task(reply, item).await?);
		}
		reply.skip_rest(list).await?;
		Ok::<_, RpcError>(tasks)
	}
	.await;
	let tasks = reply.finish(result).await?;
	debug!(count = tasks.len(), "fetched tasks");
	Ok(tasks)
}

pub async fn preferences<S>(conn: &mut Connection<S>) -> RpcResult<Preferences>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.empty("get_global_prefs_working")).await?;
	let reply = conn.reply();
	reply.begin().await?;
	let result = match reply.open("global_preferences").await {
		Ok(el) => records::read_preferences(reply, el).await,
		Err(e) => Err(e),
	};
	reply.finish(result).await
}

fn write_preferences(w: &mut RequestWriter, prefs: &Preferences) -> RpcResult<()> {
	w.boolean("run_on_batteries", prefs.run_on_batteries())?;
	w.boolean("run_gpu_if_user_active", prefs.run_gpu_if_user_active())?;
	w.double("cpu_usage_limit", prefs.cpu_usage_limit())?;
	w.double("disk_max_used_gb", prefs.disk_max_used_gb())?;
	w.value("max_ncpus", prefs.max_ncpus())?;
	w.double("max_ncpus_pct", prefs.max_ncpus_pct())
}

/// Write preferences as an override, keeping every field this client
/// does not model, then tell the daemon to reread the override.
pub async fn set_preferences<S>(conn: &mut Connection<S>, prefs: &Preferences) -> RpcResult<()>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.empty("get_global_prefs_working")).await?;

	let mut request = RequestWriter::new()?;
	request.start("set_global_prefs_override")?;
	request.start("global_preferences")?;

	let reply = conn.reply();
	reply.begin().await?;
	let result = async {
		let current = reply.open("global_preferences").await?;
		while let Some(child) = reply.next_child(&current).await? {
			if PREFERENCE_FIELDS.contains(&child.name()) {
				reply.skip(child).await?;
			} else {
				reply.copy(child, &mut request).await?;
			}
		}
		Ok::<_, RpcError>(())
	}
	.await;
	reply.finish(result).await?;

	write_preferences(&mut request, prefs)?;
	request.end("global_preferences")?;
	request.end("set_global_prefs_override")?;
	conn.transmit(request).await?;
	conn.expect_success().await?;

	conn.call_success(|w| w.empty("read_global_prefs_override")).await
}

pub async fn proxy_settings<S>(conn: &mut Connection<S>) -> RpcResult<Option<ProxySettings>>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.empty("get_proxy_settings")).await?;
	let reply = conn.reply();
	reply.begin().await?;

	let result = async {
		let info = reply.open("proxy_info").await?;
		let mut enabled = false;
		let mut host = String::new();
		let mut port = 0;
		let mut username = String::new();
		let mut password = String::new();
		while let Some(child) = reply.next_child(&info).await? {
			let name = child.name().to_string();
			match name.as_str() {
				"use_http_proxy" => enabled = reply.read_flag(child).await?,
				"http_server_name" => host = reply.read_value(child).await?,
				"http_server_port" => port = reply.read_int(child).await?,
				"http_user_name" => username = reply.read_value(child).await?,
				"http_user_passwd" => password = reply.read_value(child).await?,
				_ => reply.skip(child).await?,
			}
		}
		if !enabled {
			return Ok(None);
		}
		let server = if port > 0 { format!("{}:{}", host, port) } else { host };
		Ok::<_, RpcError>(Some(ProxySettings { server, username, password }))
	}
	.await;
	reply.finish(result).await
}

fn write_http_proxy(w: &mut RequestWriter, proxy: &ProxySettings) -> RpcResult<()> {
	w.empty("use_http_proxy")?;
	w.flag("use_http_auth", !proxy.username.is_empty())?;
	w.text("http_server_name", proxy.host())?;
	w.value("http_server_port", proxy.port().unwrap_or(0))?;
	w.text("http_user_name", &proxy.username)?;
	w.text("http_user_passwd", &proxy.password)
}

/// Replace the HTTP proxy settings. Every other proxy field (SOCKS,
/// exclusion lists, anything unknown) is echoed back as fetched. With
/// `None` only the "use HTTP proxy" flag is dropped.
pub async fn set_proxy_settings<S>(
	conn: &mut Connection<S>,
	proxy: Option<&ProxySettings>,
) -> RpcResult<()>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.empty("get_proxy_settings")).await?;

	let mut request = RequestWriter::new()?;
	request.start("set_proxy_settings")?;
	request.start("proxy_info")?;

	let reply = conn.reply();
	reply.begin().await?;
	let result = async {
		let current = reply.open("proxy_info").await?;
		while let Some(child) = reply.next_child(&current).await? {
			let replaced = match proxy {
				Some(_) => HTTP_PROXY_FIELDS.contains(&child.name()),
				None => child.name() == "use_http_proxy",
			};
			if replaced {
				trace!(element = child.name(), "replacing proxy field");
				reply.skip(child).await?;
			} else {
				reply.copy(child, &mut request).await?;
			}
		}
		Ok::<_, RpcError>(())
	}
	.await;
	reply.finish(result).await?;

	if let Some(proxy) = proxy {
		write_http_proxy(&mut request, proxy)?;
	}
	request.end("proxy_info")?;
	request.end("set_proxy_settings")?;
	conn.transmit(request).await?;
	conn.expect_success().await
}

pub async fn attach_project<S>(
	conn: &mut Connection<S>,
	url: &str,
	authenticator: &str,
	name: &str,
) -> RpcResult<()>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.call_success(|w| {
		w.element("project_attach", |w| {
			w.text("project_url", url)?;
			w.text("authenticator", authenticator)?;
			w.text("project_name", name)
		})
	})
	.await
}

pub async fn attach_poll<S>(conn: &mut Connection<S>) -> RpcResult<AttachStatus>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.empty("project_attach_poll")).await?;
	let reply = conn.reply();
	reply.begin().await?;
	let result = match reply.open("project_attach_reply").await {
		Ok(el) => records::read_attach_status(reply, el).await,
		Err(e) => Err(e),
	};
	reply.finish(result).await
}

/// Shared path for every per-project control operation
pub async fn project_op<S>(conn: &mut Connection<S>, op: ProjectOp, url: &str) -> RpcResult<()>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	debug!(op = op.tag(), url, "project operation");
	conn.call_success(|w| w.element(op.tag(), |w| w.text("project_url", url))).await
}

pub async fn quit<S>(conn: &mut Connection<S>) -> RpcResult<()>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.call_success(|w| w.empty("quit")).await
}

// vim: ts=4
