//! Typed views of the daemon's state
//!
//! All records are built fresh from each reply and never updated in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RpcError, RpcResult};
use crate::system;

/// Bytes per megabyte used when reporting project disk usage
pub const BYTES_PER_MB: u64 = 1_048_576;

/// A project the daemon is attached to, keyed by master URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
	pub master_url: String,
	pub name: String,
	/// Disk usage in whole megabytes
	pub disk_usage_mb: u64,
	pub suspended: bool,
	pub more_work_allowed: bool,
	pub ended: bool,
}

impl Default for Project {
	fn default() -> Self {
		Project {
			master_url: String::new(),
			name: String::new(),
			disk_usage_mb: 0,
			suspended: false,
			more_work_allowed: true,
			ended: false,
		}
	}
}

/// Coarse lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
	#[default]
	New,
	Downloading,
	Downloaded,
	ComputeError,
	Uploading,
	Uploaded,
	Aborted,
	UploadFailed,
	Other(i64),
}

impl From<i64> for TaskState {
	fn from(code: i64) -> Self {
		match code {
			0 => TaskState::New,
			1 => TaskState::Downloading,
			2 => TaskState::Downloaded,
			3 => TaskState::ComputeError,
			4 => TaskState::Uploading,
			5 => TaskState::Uploaded,
			6 => TaskState::Aborted,
			7 => TaskState::UploadFailed,
			other => TaskState::Other(other),
		}
	}
}

/// Execution state of a task's process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionState {
	#[default]
	Uninitialized,
	Executing,
	AbortPending,
	QuitPending,
	Suspended,
	CopyPending,
	Other(i64),
}

impl From<i64> for ExecutionState {
	fn from(code: i64) -> Self {
		match code {
			0 => ExecutionState::Uninitialized,
			1 => ExecutionState::Executing,
			5 => ExecutionState::AbortPending,
			8 => ExecutionState::QuitPending,
			9 => ExecutionState::Suspended,
			10 => ExecutionState::CopyPending,
			other => ExecutionState::Other(other),
		}
	}
}

/// A unit of work ("result"), keyed by name
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Task {
	pub name: String,
	pub wu_name: String,
	pub project_url: String,
	pub resources: String,
	pub version_num: i64,
	pub state: TaskState,
	pub execution_state: ExecutionState,
	pub scheduler_state: i64,
	pub exit_status: i64,
	pub signal: i64,
	pub pid: i64,
	pub slot: i64,
	pub current_cpu_time: Duration,
	pub elapsed_time: Duration,
	pub estimated_cpu_time_remaining: Duration,
	pub final_cpu_time: Duration,
	pub final_elapsed_time: Duration,
	pub received_time: DateTime<Utc>,
	pub report_deadline: DateTime<Utc>,
	/// 0.0 to 1.0
	pub fraction_done: f64,
	pub got_server_ack: bool,
	pub ready_to_report: bool,
	/// The task has a running (or suspended) process slot
	pub active: bool,
	pub suspended_via_gui: bool,
}

impl Task {
	/// Whether any of the fields a watcher reports on differ.
	pub fn has_tracked_changes(&self, other: &Task) -> bool {
		self.got_server_ack != other.got_server_ack
			|| self.current_cpu_time != other.current_cpu_time
			|| self.fraction_done != other.fraction_done
			|| self.active != other.active
			|| self.ready_to_report != other.ready_to_report
			|| self.estimated_cpu_time_remaining != other.estimated_cpu_time_remaining
	}
}

/// Global computing preferences
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preferences {
	run_on_batteries: bool,
	run_gpu_if_user_active: bool,
	cpu_usage_limit: f64,
	disk_max_used_gb: f64,
	max_ncpus: u32,
	max_ncpus_pct: f64,
}

impl Preferences {
	pub fn builder() -> PreferencesBuilder {
		PreferencesBuilder::default()
	}

	/// Builder starting from these values
	pub fn to_builder(&self) -> PreferencesBuilder {
		PreferencesBuilder {
			run_on_batteries: self.run_on_batteries,
			run_gpu_if_user_active: self.run_gpu_if_user_active,
			cpu_usage_limit: self.cpu_usage_limit,
			disk_max_used_gb: self.disk_max_used_gb,
			max_ncpus: Some(self.max_ncpus),
			max_ncpus_pct: Some(self.max_ncpus_pct),
		}
	}

	pub fn run_on_batteries(&self) -> bool {
		self.run_on_batteries
	}

	pub fn run_gpu_if_user_active(&self) -> bool {
		self.run_gpu_if_user_active
	}

	/// CPU time limit, percent (0-100)
	pub fn cpu_usage_limit(&self) -> f64 {
		self.cpu_usage_limit
	}

	pub fn disk_max_used_gb(&self) -> f64 {
		self.disk_max_used_gb
	}

	pub fn max_ncpus(&self) -> u32 {
		self.max_ncpus
	}

	/// Core limit as a percentage of logical cores; takes precedence
	/// over [`Preferences::max_ncpus`] on the daemon side.
	pub fn max_ncpus_pct(&self) -> f64 {
		self.max_ncpus_pct
	}
}

/// Builder for [`Preferences`]
#[derive(Debug, Clone)]
pub struct PreferencesBuilder {
	run_on_batteries: bool,
	run_gpu_if_user_active: bool,
	cpu_usage_limit: f64,
	disk_max_used_gb: f64,
	max_ncpus: Option<u32>,
	max_ncpus_pct: Option<f64>,
}

impl Default for PreferencesBuilder {
	fn default() -> Self {
		PreferencesBuilder {
			run_on_batteries: true,
			run_gpu_if_user_active: false,
			cpu_usage_limit: 100.0,
			disk_max_used_gb: 0.0,
			max_ncpus: None,
			max_ncpus_pct: None,
		}
	}
}

impl PreferencesBuilder {
	pub fn run_on_batteries(mut self, value: bool) -> Self {
		self.run_on_batteries = value;
		self
	}

	pub fn run_gpu_if_user_active(mut self, value: bool) -> Self {
		self.run_gpu_if_user_active = value;
		self
	}

	pub fn cpu_usage_limit(mut self, percent: f64) -> Self {
		self.cpu_usage_limit = percent;
		self
	}

	pub fn disk_max_used_gb(mut self, gb: f64) -> Self {
		self.disk_max_used_gb = gb;
		self
	}

	pub fn max_ncpus(mut self, count: u32) -> Self {
		self.max_ncpus = Some(count);
		self
	}

	pub fn max_ncpus_pct(mut self, percent: f64) -> Self {
		self.max_ncpus_pct = Some(percent);
		self
	}

	/// Forget the core percentage so `build` derives it from `max_ncpus`.
	pub fn derive_ncpus_pct(mut self) -> Self {
		self.max_ncpus_pct = None;
		self
	}

	/// Build using the local logical core count to derive a missing
	/// core percentage.
	pub fn build(self) -> RpcResult<Preferences> {
		self.build_with_cores(system::logical_cores())
	}

	/// Build, deriving a missing core percentage as `100 * max_ncpus / cores`.
	pub fn build_with_cores(self, cores: usize) -> RpcResult<Preferences> {
		let cores = cores.max(1);
		let max_ncpus = self.max_ncpus.unwrap_or(cores as u32);
		let max_ncpus_pct =
			self.max_ncpus_pct.unwrap_or_else(|| 100.0 * max_ncpus as f64 / cores as f64);

		if !(0.0..=100.0).contains(&self.cpu_usage_limit) {
			return Err(invalid(format!("cpu usage limit {} not in 0-100", self.cpu_usage_limit)));
		}
		if !self.disk_max_used_gb.is_finite() || self.disk_max_used_gb < 0.0 {
			return Err(invalid(format!("disk limit {} is negative", self.disk_max_used_gb)));
		}
		if !max_ncpus_pct.is_finite() || max_ncpus_pct < 0.0 {
			return Err(invalid(format!("core percentage {} is negative", max_ncpus_pct)));
		}

		Ok(Preferences {
			run_on_batteries: self.run_on_batteries,
			run_gpu_if_user_active: self.run_gpu_if_user_active,
			cpu_usage_limit: self.cpu_usage_limit,
			disk_max_used_gb: self.disk_max_used_gb,
			max_ncpus,
			max_ncpus_pct,
		})
	}
}

fn invalid(message: String) -> RpcError {
	RpcError::InvalidArgument { message }
}

/// HTTP proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxySettings {
	/// `host:port`, or just `host` when no port is configured
	pub server: String,
	pub username: String,
	pub password: String,
}

impl ProxySettings {
	pub fn new(server: impl Into<String>) -> Self {
		ProxySettings { server: server.into(), username: String::new(), password: String::new() }
	}

	pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.username = username.into();
		self.password = password.into();
		self
	}

	/// Host part of [`ProxySettings::server`]
	pub fn host(&self) -> &str {
		match self.split_port() {
			Some((host, _)) => host,
			None => &self.server,
		}
	}

	/// Port part of [`ProxySettings::server`], if any
	pub fn port(&self) -> Option<u16> {
		self.split_port().map(|(_, port)| port)
	}

	fn split_port(&self) -> Option<(&str, u16)> {
		let (host, port) = self.server.rsplit_once(':')?;
		port.parse().ok().map(|port| (host, port))
	}
}

/// Daemon version triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VersionInfo {
	pub major: i64,
	pub minor: i64,
	pub release: i64,
}

impl fmt::Display for VersionInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.release)
	}
}

/// Disk used by one project, in bytes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDiskUsage {
	pub master_url: String,
	pub bytes: f64,
}

/// Reply of the disk usage query
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DiskUsage {
	pub projects: Vec<ProjectDiskUsage>,
	pub total: f64,
	pub free: f64,
	pub boinc: f64,
	pub allowed: f64,
}

/// Progress of a pending attach
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AttachStatus {
	/// 0 on success; negative daemon error codes otherwise
	pub error_num: i64,
	pub messages: Vec<String>,
}

/// Control operations on a single project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOp {
	Suspend,
	Resume,
	Detach,
	Reset,
	Update,
	AllowMoreWork,
	NoMoreWork,
}

impl ProjectOp {
	/// Request element naming this operation
	pub fn tag(&self) -> &'static str {
		match self {
			ProjectOp::Suspend => "project_suspend",
			ProjectOp::Resume => "project_resume",
			ProjectOp::Detach => "project_detach",
			ProjectOp::Reset => "project_reset",
			ProjectOp::Update => "project_update",
			ProjectOp::AllowMoreWork => "project_allowmorework",
			ProjectOp::NoMoreWork => "project_nomorework",
		}
	}
}

impl FromStr for ProjectOp {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"suspend" => Ok(ProjectOp::Suspend),
			"resume" => Ok(ProjectOp::Resume),
			"detach" => Ok(ProjectOp::Detach),
			"reset" => Ok(ProjectOp::Reset),
			"update" => Ok(ProjectOp::Update),
			"allowmorework" | "allow-more-work" => Ok(ProjectOp::AllowMoreWork),
			"nomorework" | "no-more-work" => Ok(ProjectOp::NoMoreWork),
			_ => Err(format!("Unknown project operation: {}", s)),
		}
	}
}


// vim: ts=4
