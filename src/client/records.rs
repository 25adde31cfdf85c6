//! Parsers for the records carried in replies

use tokio::io::AsyncRead;
use tracing::trace;

use crate::error::{RpcError, RpcResult};
use crate::types::{
	AttachStatus, DiskUsage, Preferences, Project, ProjectDiskUsage, Task, VersionInfo,
};
use crate::wire::{Element, ReplyReader};

pub async fn read_project<R>(reply: &mut ReplyReader<R>, el: Element) -> RpcResult<Project>
where
	R: AsyncRead + Unpin,
{
	let mut project = Project::default();
	while let Some(child) = reply.next_child(&el).await? {
		let name = child.name().to_string();
		match name.as_str() {
			"master_url" => project.master_url = reply.read_value(child).await?,
			"project_name" => project.name = reply.read_value(child).await?,
			"suspended_via_gui" => project.suspended = reply.read_flag(child).await?,
			"dont_request_more_work" => project.more_work_allowed = !reply.read_flag(child).await?,
			"ended" => project.ended = reply.read_flag(child).await?,
			_ => reply.skip(child).await?,
		}
	}
	Ok(project)
}

pub async fn read_task<R>(reply: &mut ReplyReader<R>, el: Element) -> RpcResult<Task>
where
	R: AsyncRead + Unpin,
{
	let mut task = Task::default();
	while let Some(child) = reply.next_child(&el).await? {
		let name = child.name().to_string();
		match name.as_str() {
			"name" => task.name = reply.read_value(child).await?,
			"wu_name" => task.wu_name = reply.read_value(child).await?,
			"project_url" => task.project_url = reply.read_value(child).await?,
			"resources" => task.resources = reply.read_value(child).await?,
			"version_num" => task.version_num = reply.read_int(child).await?,
			"state" => task.state = reply.read_int(child).await?.into(),
			"exit_status" => task.exit_status = reply.read_int(child).await?,
			"signal" => task.signal = reply.read_int(child).await?,
			"final_cpu_time" => task.final_cpu_time = reply.read_timespan(child).await?,
			"final_elapsed_time" => task.final_elapsed_time = reply.read_timespan(child).await?,
			"estimated_cpu_time_remaining" => {
				task.estimated_cpu_time_remaining = reply.read_timespan(child).await?
			}
			"received_time" => task.received_time = reply.read_timestamp(child).await?,
			"report_deadline" => task.report_deadline = reply.read_timestamp(child).await?,
			"got_server_ack" => task.got_server_ack = reply.read_flag(child).await?,
			"ready_to_report" => task.ready_to_report = reply.read_flag(child).await?,
			"suspended_via_gui" => task.suspended_via_gui = reply.read_flag(child).await?,
			"active_task" => {
				task.active = true;
				read_active_task(reply, child, &mut task).await?;
			}
			_ => reply.skip(child).await?,
		}
	}
	Ok(task)
}

async fn read_active_task<R>(reply: &mut ReplyReader<R>, el: Element, task: &mut Task) -> RpcResult<()>
where
	R: AsyncRead + Unpin,
{
	while let Some(child) = reply.next_child(&el).await? {
		let name = child.name().to_string();
		match name.as_str() {
			"active_task_state" => task.execution_state = reply.read_int(child).await?.into(),
			"scheduler_state" => task.scheduler_state = reply.read_int(child).await?,
			"slot" => task.slot = reply.read_int(child).await?,
			"pid" => task.pid = reply.read_int(child).await?,
			"fraction_done" => task.fraction_done = reply.read_double(child).await?,
			"current_cpu_time" => task.current_cpu_time = reply.read_timespan(child).await?,
			"elapsed_time" => task.elapsed_time = reply.read_timespan(child).await?,
			_ => reply.skip(child).await?,
		}
	}
	Ok(())
}

/// Preference fields this client understands; everything else is echoed
/// back untouched when preferences are written.
pub const PREFERENCE_FIELDS: [&str; 6] = [
	"run_on_batteries",
	"run_gpu_if_user_active",
	"cpu_usage_limit",
	"disk_max_used_gb",
	"max_ncpus",
	"max_ncpus_pct",
];

pub async fn read_preferences<R>(reply: &mut ReplyReader<R>, el: Element) -> RpcResult<Preferences>
where
	R: AsyncRead + Unpin,
{
	let mut builder = Preferences::builder();
	while let Some(child) = reply.next_child(&el).await? {
		let name = child.name().to_string();
		builder = match name.as_str() {
			"run_on_batteries" => builder.run_on_batteries(reply.read_bool(child).await?),
			"run_gpu_if_user_active" => builder.run_gpu_if_user_active(reply.read_bool(child).await?),
			"cpu_usage_limit" => builder.cpu_usage_limit(reply.read_double(child).await?),
			"disk_max_used_gb" => builder.disk_max_used_gb(reply.read_double(child).await?),
			"max_ncpus" => builder.max_ncpus(reply.read_int(child).await?.max(0) as u32),
			"max_ncpus_pct" => builder.max_ncpus_pct(reply.read_double(child).await?),
			_ => {
				reply.skip(child).await?;
				builder
			}
		};
	}
	builder.build().map_err(|e| RpcError::decode(el.name(), "", e))
}

pub async fn read_version<R>(reply: &mut ReplyReader<R>, el: Element) -> RpcResult<VersionInfo>
where
	R: AsyncRead + Unpin,
{
	let mut version = VersionInfo::default();
	while let Some(child) = reply.next_child(&el).await? {
		let name = child.name().to_string();
		match name.as_str() {
			"major" => version.major = reply.read_int(child).await?,
			"minor" => version.minor = reply.read_int(child).await?,
			"release" => version.release = reply.read_int(child).await?,
			_ => reply.skip(child).await?,
		}
	}
	Ok(version)
}

async fn read_project_usage<R>(reply: &mut ReplyReader<R>, el: Element) -> RpcResult<ProjectDiskUsage>
where
	R: AsyncRead + Unpin,
{
	let mut entry = ProjectDiskUsage { master_url: String::new(), bytes: 0.0 };
	while let Some(child) = reply.next_child(&el).await? {
		let name = child.name().to_string();
		match name.as_str() {
			"master_url" => entry.master_url = reply.read_value(child).await?,
			"disk_usage" => entry.bytes = reply.read_double(child).await?,
			_ => reply.skip(child).await?,
		}
	}
	Ok(entry)
}

/// Project entries and totals may come in any order.
pub async fn read_disk_usage<R>(reply: &mut ReplyReader<R>, el: Element) -> RpcResult<DiskUsage>
where
	R: AsyncRead + Unpin,
{
	let mut usage = DiskUsage::default();
	while let Some(child) = reply.next_child(&el).await? {
		let name = child.name().to_string();
		match name.as_str() {
			"project" => usage.projects.push(read_project_usage(reply, child).await?),
			"d_total" => usage.total = reply.read_double(child).await?,
			"d_free" => usage.free = reply.read_double(child).await?,
			"d_boinc" => usage.boinc = reply.read_double(child).await?,
			"d_allowed" => usage.allowed = reply.read_double(child).await?,
			other => {
				trace!(element = other, "ignoring disk usage field");
				reply.skip(child).await?
			}
		}
	}
	Ok(usage)
}

pub async fn read_attach_status<R>(reply: &mut ReplyReader<R>, el: Element) -> RpcResult<AttachStatus>
where
	R: AsyncRead + Unpin,
{
	let mut status = AttachStatus::default();
	while let Some(child) = reply.next_child(&el).await? {
		let name = child.name().to_string();
		match name.as_str() {
			"error_num" => status.error_num = reply.read_int(child).await?,
			"message" => status.messages.push(reply.read_value(child).await?),
			_ => reply.skip(child).await?,
		}
	}
	Ok(status)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{ExecutionState, TaskState};
	use std::time::Duration;

	async fn parse_task(body: &'static str) -> Task {
		let mut reply = ReplyReader::new(body.as_bytes());
		reply.begin().await.unwrap();
		let el = reply.open("result").await.unwrap();
		let task = read_task(&mut reply, el).await.unwrap();
		reply.end().await.unwrap();
		task
	}

	#[tokio::test]
	async fn test_read_active_task() {
		let task = parse_task(
			"<boinc_gui_rpc_reply><result>\n\
			 <name>wu_1_0</name><wu_name>wu_1</wu_name><project_url>http://x/</project_url>\n\
			 <state>2</state><exit_status>0</exit_status><ready_to_report/>\n\
			 <received_time>1700000000.000000</received_time>\n\
			 <report_deadline>1700600000.000000</report_deadline>\n\
			 <estimated_cpu_time_remaining>3600.000000</estimated_cpu_time_remaining>\n\
			 <active_task><active_task_state>1</active_task_state><slot>2</slot><pid>999</pid>\n\
			 <fraction_done>0.420000</fraction_done><current_cpu_time>120.5</current_cpu_time>\n\
			 <graphics_exec_path>/x</graphics_exec_path></active_task>\n\
			 </result></boinc_gui_rpc_reply>\x03",
		)
		.await;

		assert_eq!(task.name, "wu_1_0");
		assert_eq!(task.project_url, "http://x/");
		assert_eq!(task.state, TaskState::Downloaded);
		assert!(task.active);
		assert!(task.ready_to_report);
		assert!(!task.got_server_ack);
		assert_eq!(task.execution_state, ExecutionState::Executing);
		assert_eq!(task.pid, 999);
		assert_eq!(task.fraction_done, 0.42);
		assert_eq!(task.current_cpu_time, Duration::from_millis(120_500));
		assert_eq!(task.estimated_cpu_time_remaining, Duration::from_secs(3600));
		assert_eq!(task.received_time.timestamp(), 1_700_000_000);
	}

	#[tokio::test]
	async fn test_read_inactive_task() {
		let task = parse_task(
			"<boinc_gui_rpc_reply><result><name>t</name><got_server_ack/>\
			 <final_cpu_time>10</final_cpu_time></result></boinc_gui_rpc_reply>\x03",
		)
		.await;
		assert!(!task.active);
		assert!(task.got_server_ack);
		assert_eq!(task.final_cpu_time, Duration::from_secs(10));
		assert_eq!(task.execution_state, ExecutionState::Uninitialized);
	}

	#[tokio::test]
	async fn test_read_disk_usage_any_order() {
		let mut reply = ReplyReader::new(
			&b"<boinc_gui_rpc_reply><disk_usage_summary>\
			   <project><master_url>http://a/</master_url><disk_usage>10</disk_usage></project>\
			   <d_total>1000</d_total><d_free>500</d_free>\
			   <project><master_url>http://b/</master_url><disk_usage>20</disk_usage></project>\
			   </disk_usage_summary></boinc_gui_rpc_reply>\x03"[..],
		);
		reply.begin().await.unwrap();
		let el = reply.open("disk_usage_summary").await.unwrap();
		let usage = read_disk_usage(&mut reply, el).await.unwrap();
		reply.end().await.unwrap();

		let urls: Vec<_> = usage.projects.iter().map(|p| p.master_url.as_str()).collect();
		assert_eq!(urls, vec!["http://a/", "http://b/"]);
		assert_eq!(usage.projects[1].bytes, 20.0);
		assert_eq!(usage.total, 1000.0);
		assert_eq!(usage.free, 500.0);
	}

	#[tokio::test]
	async fn test_read_preferences_derives_percentage() {
		let mut reply = ReplyReader::new(
			&b"<boinc_gui_rpc_reply><global_preferences>\
			   <run_on_batteries>0</run_on_batteries><cpu_usage_limit>50.000000</cpu_usage_limit>\
			   <day_prefs><day_of_week>1</day_of_week></day_prefs>\
			   <max_ncpus_pct>25.000000</max_ncpus_pct>\
			   </global_preferences></boinc_gui_rpc_reply>\x03"[..],
		);
		reply.begin().await.unwrap();
		let el = reply.open("global_preferences").await.unwrap();
		let prefs = read_preferences(&mut reply, el).await.unwrap();
		reply.end().await.unwrap();

		assert!(!prefs.run_on_batteries());
		assert_eq!(prefs.cpu_usage_limit(), 50.0);
		assert_eq!(prefs.max_ncpus_pct(), 25.0);
	}
}

// vim: ts=4
