//! Watcher driven by a real client over a scripted daemon

mod common;

use std::sync::{Arc, Mutex};

use boinc_rpc::callbacks::ListenerBuilder;
use boinc_rpc::{WatchEvent, Watcher};
use common::{connected, finish};

const NO_DISK_USAGE: &str = "<disk_usage_summary></disk_usage_summary>";

const PROJECTS_AB: &str = "<projects>
	<project><master_url>http://a/</master_url><project_name>A</project_name></project>
	<project><master_url>http://b/</master_url><project_name>B</project_name></project>
</projects>";

const PROJECTS_BC: &str = "<projects>
	<project><master_url>http://b/</master_url><project_name>B renamed</project_name></project>
	<project><master_url>http://c/</master_url><project_name>C</project_name></project>
</projects>";

const TASKS_1: &str = "<results>
	<result><name>t1</name><active_task><fraction_done>0.1</fraction_done></active_task></result>
	<result><name>t2</name></result>
</results>";

const TASKS_2: &str = "<results>
	<result><name>t1</name><active_task><fraction_done>0.2</fraction_done></active_task></result>
	<result><name>t3</name></result>
</results>";

const TASKS_3: &str = "<results><result><name>t9</name></result></results>";

#[tokio::test]
async fn test_refresh_reports_differences() {
	let (client, handle) = connected(&[
		PROJECTS_AB,
		NO_DISK_USAGE,
		TASKS_1,
		PROJECTS_BC,
		NO_DISK_USAGE,
		TASKS_2,
	])
	.await;

	let seen = Arc::new(Mutex::new(Vec::new()));
	let log = seen.clone();
	let mut watcher = Watcher::new(client);
	watcher.add_listener(
		ListenerBuilder::new()
			.on_task_changed(move |old, new| {
				log.lock().unwrap().push((old.fraction_done, new.fraction_done));
			})
			.build(),
	);

	let first = watcher.refresh().await.unwrap();
	assert!(first.is_empty());
	assert_eq!(watcher.projects().len(), 2);
	assert_eq!(watcher.tasks().len(), 2);

	let events = watcher.refresh().await.unwrap();
	let project_removed: Vec<_> = events
		.iter()
		.filter_map(|e| match e {
			WatchEvent::ProjectRemoved(p) => Some(p.master_url.as_str()),
			_ => None,
		})
		.collect();
	let project_added: Vec<_> = events
		.iter()
		.filter_map(|e| match e {
			WatchEvent::ProjectAdded(p) => Some(p.master_url.as_str()),
			_ => None,
		})
		.collect();
	assert_eq!(project_removed, vec!["http://a/"]);
	assert_eq!(project_added, vec!["http://c/"]);

	assert!(events.iter().any(|e| matches!(e, WatchEvent::TaskRemoved(t) if t.name == "t2")));
	assert!(events.iter().any(|e| matches!(e, WatchEvent::TaskAdded(t) if t.name == "t3")));
	assert_eq!(events.len(), 5);
	assert_eq!(*seen.lock().unwrap(), vec![(0.1, 0.2)]);

	let client = watcher.into_source();
	finish(client, handle).await;
}

#[tokio::test]
async fn test_clear_state_suppresses_next_diff() {
	let (client, handle) = connected(&[
		PROJECTS_AB,
		NO_DISK_USAGE,
		TASKS_1,
		PROJECTS_BC,
		NO_DISK_USAGE,
		TASKS_3,
		PROJECTS_AB,
		NO_DISK_USAGE,
		TASKS_1,
	])
	.await;

	let mut watcher = Watcher::new(client);
	watcher.refresh().await.unwrap();

	watcher.clear_state();
	let events = watcher.refresh().await.unwrap();
	assert!(events.is_empty());
	assert_eq!(watcher.tasks()[0].name, "t9");
	assert_eq!(watcher.projects()[1].master_url, "http://c/");

	// Baseline is back after one refresh
	let events = watcher.refresh().await.unwrap();
	assert!(!events.is_empty());

	finish(watcher.into_source(), handle).await;
}
