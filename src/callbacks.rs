//! Listener traits for watcher events

use crate::types::{Project, Task};

// Type aliases to reduce complexity
type ProjectFn = dyn Fn(&Project) + Send + Sync;
type TaskFn = dyn Fn(&Task) + Send + Sync;
type TaskChangeFn = dyn Fn(&Task, &Task) + Send + Sync;

/// Receiver for snapshot differences.
///
/// All methods default to doing nothing, so implementors only override
/// the events they care about.
pub trait WatchListener: Send + Sync {
	/// A project appeared since the previous snapshot
	fn on_project_added(&self, _project: &Project) {}

	/// A project disappeared since the previous snapshot
	fn on_project_removed(&self, _project: &Project) {}

	/// A task appeared since the previous snapshot
	fn on_task_added(&self, _task: &Task) {}

	/// A task disappeared since the previous snapshot
	fn on_task_removed(&self, _task: &Task) {}

	/// A tracked field of a task changed
	fn on_task_changed(&self, _old: &Task, _new: &Task) {}
}

/// Listener that ignores every event
pub struct NoListener;

impl WatchListener for NoListener {}

/// Builder for listeners using function closures
pub struct ListenerBuilder {
	project_added: Option<Box<ProjectFn>>,
	project_removed: Option<Box<ProjectFn>>,
	task_added: Option<Box<TaskFn>>,
	task_removed: Option<Box<TaskFn>>,
	task_changed: Option<Box<TaskChangeFn>>,
}

impl ListenerBuilder {
	pub fn new() -> Self {
		ListenerBuilder {
			project_added: None,
			project_removed: None,
			task_added: None,
			task_removed: None,
			task_changed: None,
		}
	}

	pub fn on_project_added<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Project) + Send + Sync + 'static,
	{
		self.project_added = Some(Box::new(callback));
		self
	}

	pub fn on_project_removed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Project) + Send + Sync + 'static,
	{
		self.project_removed = Some(Box::new(callback));
		self
	}

	pub fn on_task_added<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Task) + Send + Sync + 'static,
	{
		self.task_added = Some(Box::new(callback));
		self
	}

	pub fn on_task_removed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Task) + Send + Sync + 'static,
	{
		self.task_removed = Some(Box::new(callback));
		self
	}

	pub fn on_task_changed<F>(mut self, callback: F) -> Self
	where
		F: Fn(&Task, &Task) + Send + Sync + 'static,
	{
		self.task_changed = Some(Box::new(callback));
		self
	}

	pub fn build(self) -> Box<dyn WatchListener> {
		Box::new(CompositeListener {
			project_added: self.project_added,
			project_removed: self.project_removed,
			task_added: self.task_added,
			task_removed: self.task_removed,
			task_changed: self.task_changed,
		})
	}
}

impl Default for ListenerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct CompositeListener {
	project_added: Option<Box<ProjectFn>>,
	project_removed: Option<Box<ProjectFn>>,
	task_added: Option<Box<TaskFn>>,
	task_removed: Option<Box<TaskFn>>,
	task_changed: Option<Box<TaskChangeFn>>,
}

impl WatchListener for CompositeListener {
	fn on_project_added(&self, project: &Project) {
		if let Some(ref callback) = self.project_added {
			callback(project);
		}
	}

	fn on_project_removed(&self, project: &Project) {
		if let Some(ref callback) = self.project_removed {
			callback(project);
		}
	}

	fn on_task_added(&self, task: &Task) {
		if let Some(ref callback) = self.task_added {
			callback(task);
		}
	}

	fn on_task_removed(&self, task: &Task) {
		if let Some(ref callback) = self.task_removed {
			callback(task);
		}
	}

	fn on_task_changed(&self, old: &Task, new: &Task) {
		if let Some(ref callback) = self.task_changed {
			callback(old, new);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[test]
	fn test_builder_routes_events() {
		let added = Arc::new(AtomicUsize::new(0));
		let counter = added.clone();
		let listener = ListenerBuilder::new()
			.on_project_added(move |_| {
				counter.fetch_add(1, Ordering::SeqCst);
			})
			.build();

		listener.on_project_added(&Project::default());
		listener.on_project_removed(&Project::default());
		listener.on_task_added(&Task::default());
		assert_eq!(added.load(Ordering::SeqCst), 1);
	}
}

// vim: ts=4
