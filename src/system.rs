//! Local host queries: logical core count and daemon process presence

use std::ffi::OsStr;
use std::time::{Duration, Instant};
use sysinfo::{CpuRefreshKind, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::debug;

/// Number of logical processors on this host (at least 1)
pub fn logical_cores() -> usize {
	let system =
		System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()));
	system.cpus().len().max(1)
}

/// Whether a process with exactly this name is running
pub fn process_running(name: &str) -> bool {
	let mut system = System::new();
	system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());
	let target = OsStr::new(name);
	system.processes().values().any(|p| p.name() == target)
}

/// Poll until no process named `name` is left.
///
/// Returns `false` if `timeout` elapsed first.
pub async fn wait_for_exit(name: &str, poll: Duration, timeout: Option<Duration>) -> bool {
	let started = Instant::now();
	loop {
		if !process_running(name) {
			debug!(process = name, elapsed = ?started.elapsed(), "daemon process exited");
			return true;
		}
		if timeout.is_some_and(|t| started.elapsed() >= t) {
			return false;
		}
		tokio::time::sleep(poll).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_logical_cores_positive() {
		assert!(logical_cores() >= 1);
	}

	#[tokio::test]
	async fn test_wait_for_missing_process_returns_immediately() {
		let exited = wait_for_exit(
			"no-such-daemon-process-name",
			Duration::from_millis(10),
			Some(Duration::from_millis(50)),
		)
		.await;
		assert!(exited);
	}
}

// vim: ts=4
