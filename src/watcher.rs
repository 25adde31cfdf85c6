//! Snapshot watcher
//!
//! Each [`Watcher::refresh`] fetches the current projects and tasks, diffs
//! them against the previous snapshot by key (master URL, task name) and
//! reports what was added, removed or changed. The watcher has no timer
//! of its own; the caller decides when to refresh.
//!
//! Events from one refresh are all delivered before the refresh returns,
//! so they always precede the events of the next refresh. Within one
//! refresh the order is: removed projects, added projects, removed tasks,
//! added tasks, changed tasks.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::callbacks::WatchListener;
use crate::error::RpcResult;
use crate::types::{Project, Task};

/// Where snapshots come from
#[async_trait]
pub trait SnapshotSource: Send {
	async fn fetch_projects(&mut self) -> RpcResult<Vec<Project>>;
	async fn fetch_tasks(&mut self) -> RpcResult<Vec<Task>>;
}

/// One difference between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum WatchEvent {
	ProjectAdded(Project),
	ProjectRemoved(Project),
	TaskAdded(Task),
	TaskRemoved(Task),
	TaskChanged { old: Task, new: Task },
}

/// Items of `current` whose key is absent from `previous`, in `current` order
pub fn added<'a, T, F>(previous: &[T], current: &'a [T], key: F) -> Vec<&'a T>
where
	F: Fn(&T) -> &str,
{
	let known: HashSet<&str> = previous.iter().map(&key).collect();
	current.iter().filter(|item| !known.contains(key(*item))).collect()
}

/// Items of `previous` whose key is absent from `current`, in `previous` order
pub fn removed<'a, T, F>(previous: &'a [T], current: &[T], key: F) -> Vec<&'a T>
where
	F: Fn(&T) -> &str,
{
	added(current, previous, key)
}

/// Pairs of (old, new) tasks with the same name whose tracked fields differ
pub fn changed<'a>(previous: &'a [Task], current: &'a [Task]) -> Vec<(&'a Task, &'a Task)> {
	let old_by_name: HashMap<&str, &Task> =
		previous.iter().map(|task| (task.name.as_str(), task)).collect();
	current
		.iter()
		.filter_map(|new| old_by_name.get(new.name.as_str()).map(|old| (*old, new)))
		.filter(|(old, new)| old.has_tracked_changes(new))
		.collect()
}

fn project_key(project: &Project) -> &str {
	&project.master_url
}

fn task_key(task: &Task) -> &str {
	&task.name
}

/// Polling diff engine over a [`SnapshotSource`]
pub struct Watcher<C> {
	source: C,
	projects: Vec<Project>,
	tasks: Vec<Task>,
	previous_projects: Option<Vec<Project>>,
	previous_tasks: Option<Vec<Task>>,
	listeners: Vec<Box<dyn WatchListener>>,
}

impl<C: SnapshotSource> Watcher<C> {
	pub fn new(source: C) -> Self {
		Watcher {
			source,
			projects: Vec::new(),
			tasks: Vec::new(),
			previous_projects: None,
			previous_tasks: None,
			listeners: Vec::new(),
		}
	}

	pub fn add_listener(&mut self, listener: Box<dyn WatchListener>) {
		self.listeners.push(listener);
	}

	/// Projects from the latest refresh
	pub fn projects(&self) -> &[Project] {
		&self.projects
	}

	/// Tasks from the latest refresh
	pub fn tasks(&self) -> &[Task] {
		&self.tasks
	}

	pub fn source(&self) -> &C {
		&self.source
	}

	/// Direct access to the source, e.g. to issue other RPCs between refreshes
	pub fn source_mut(&mut self) -> &mut C {
		&mut self.source
	}

	pub fn into_source(self) -> C {
		self.source
	}

	/// Forget the baseline. The next refresh reports nothing and only
	/// updates the current state.
	pub fn clear_state(&mut self) {
		self.previous_projects = None;
		self.previous_tasks = None;
	}

	/// Fetch a new snapshot, notify listeners of every difference and
	/// return the differences.
	pub async fn refresh(&mut self) -> RpcResult<Vec<WatchEvent>> {
		let projects = self.source.fetch_projects().await?;
		let tasks = self.source.fetch_tasks().await?;

		let events = diff(
			self.previous_projects.as_deref(),
			&projects,
			self.previous_tasks.as_deref(),
			&tasks,
		);
		debug!(
			projects = projects.len(),
			tasks = tasks.len(),
			events = events.len(),
			"refreshed snapshot"
		);

		self.previous_projects = Some(projects.clone());
		self.previous_tasks = Some(tasks.clone());
		self.projects = projects;
		self.tasks = tasks;

		for event in &events {
			self.notify(event);
		}
		Ok(events)
	}

	fn notify(&self, event: &WatchEvent) {
		for listener in &self.listeners {
			match event {
				WatchEvent::ProjectAdded(p) => listener.on_project_added(p),
				WatchEvent::ProjectRemoved(p) => listener.on_project_removed(p),
				WatchEvent::TaskAdded(t) => listener.on_task_added(t),
				WatchEvent::TaskRemoved(t) => listener.on_task_removed(t),
				WatchEvent::TaskChanged { old, new } => listener.on_task_changed(old, new),
			}
		}
	}
}

/// Differences between two snapshots; a missing baseline yields none.
pub fn diff(
	previous_projects: Option<&[Project]>,
	projects: &[Project],
	previous_tasks: Option<&[Task]>,
	tasks: &[Task],
) -> Vec<WatchEvent> {
	let mut events = Vec::new();

	if let Some(previous) = previous_projects {
		for p in removed(previous, projects, project_key) {
			events.push(WatchEvent::ProjectRemoved(p.clone()));
		}
		for p in added(previous, projects, project_key) {
			events.push(WatchEvent::ProjectAdded(p.clone()));
		}
	}

	if let Some(previous) = previous_tasks {
		for t in removed(previous, tasks, task_key) {
			events.push(WatchEvent::TaskRemoved(t.clone()));
		}
		for t in added(previous, tasks, task_key) {
			events.push(WatchEvent::TaskAdded(t.clone()));
		}
		for (old, new) in changed(previous, tasks) {
			events.push(WatchEvent::TaskChanged { old: old.clone(), new: new.clone() });
		}
	}

	events
}

#[cfg(test)]
mod tests {
	use super::*;

	fn project(url: &str) -> Project {
		Project { master_url: url.to_string(), name: url.to_string(), ..Default::default() }
	}

	fn task(name: &str) -> Task {
		Task { name: name.to_string(), ..Default::default() }
	}

	#[test]
	fn test_set_difference_by_key() {
		let previous = vec![project("a"), project("b"), project("c")];
		let current = vec![project("b"), project("d"), project("c"), project("e")];

		let add: Vec<_> = added(&previous, &current, project_key).iter().map(|p| p.master_url.clone()).collect();
		let rem: Vec<_> =
			removed(&previous, &current, project_key).iter().map(|p| p.master_url.clone()).collect();

		assert_eq!(add, vec!["d", "e"]);
		assert_eq!(rem, vec!["a"]);
		assert!(add.iter().all(|k| !rem.contains(k)));
	}

	#[test]
	fn test_key_equality_ignores_other_fields() {
		let previous = vec![project("a")];
		let mut renamed = project("a");
		renamed.name = "Renamed".into();
		renamed.suspended = true;
		let events = diff(Some(previous.as_slice()), &[renamed], None, &[]);
		assert!(events.is_empty());
	}

	#[test]
	fn test_each_tracked_field_fires_once() {
		let base = task("t");
		let mutations: [fn(&mut Task); 6] = [
			|t| t.got_server_ack = true,
			|t| t.current_cpu_time = std::time::Duration::from_secs(5),
			|t| t.fraction_done = 0.5,
			|t| t.active = true,
			|t| t.ready_to_report = true,
			|t| t.estimated_cpu_time_remaining = std::time::Duration::from_secs(60),
		];

		for mutate in mutations {
			let mut new = base.clone();
			mutate(&mut new);
			let events = diff(None, &[], Some(&[base.clone()][..]), &[new.clone()]);
			assert_eq!(events, vec![WatchEvent::TaskChanged { old: base.clone(), new }]);
		}
	}

	#[test]
	fn test_untracked_change_is_silent() {
		let base = task("t");
		let mut new = base.clone();
		new.pid = 77;
		new.execution_state = crate::types::ExecutionState::Suspended;
		new.report_deadline = chrono::DateTime::from_timestamp(1_800_000_000, 0).unwrap();
		assert!(diff(None, &[], Some(&[base][..]), &[new]).is_empty());
	}

	#[test]
	fn test_no_baseline_no_events() {
		let events = diff(None, &[project("a")], None, &[task("t")]);
		assert!(events.is_empty());
	}
}

// vim: ts=4
