use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;

use boinc_rpc::logging::{self, info, warn};
use boinc_rpc::{Config, ProjectOp, ProxySettings, RpcClient, Watcher};

///////////////////////
// Utility functions //
///////////////////////

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

/// Defaults, then config file, then environment, then command line flags
fn load_config(matches: &ArgMatches) -> Result<Config, Box<dyn Error>> {
	let config = match matches.get_one::<PathBuf>("config") {
		Some(path) => Config::load(path)?,
		None => Config::default(),
	};
	let mut config = config.with_env()?;

	if let Some(host) = matches.get_one::<String>("host") {
		config.host = host.clone();
	}
	if let Some(port) = matches.get_one::<u16>("port") {
		config.port = *port;
	}
	if let Some(password) = matches.get_one::<String>("password") {
		config.password = Some(password.clone());
	}
	if let Some(dir) = matches.get_one::<PathBuf>("data-dir") {
		config.data_dir = dir.clone();
	}
	config.validate()?;
	Ok(config)
}

fn project_url_args() -> [Arg; 2] {
	[
		Arg::new("op")
			.required(true)
			.help("suspend, resume, detach, reset, update, allow-more-work or no-more-work"),
		Arg::new("url").required(true).help("Project master URL"),
	]
}

fn cli() -> Command {
	Command::new("boinc-rpc")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilu@symbion.hu>")
		.about("Control a BOINC daemon over GUI RPC")
		.subcommand_required(true)
		.arg(
			Arg::new("host")
				.short('H')
				.long("host")
				.value_name("HOST")
				.global(true)
				.help("Daemon host"),
		)
		.arg(
			Arg::new("port")
				.short('p')
				.long("port")
				.value_name("PORT")
				.value_parser(value_parser!(u16))
				.global(true)
				.help("Daemon port"),
		)
		.arg(
			Arg::new("password")
				.long("password")
				.value_name("PASSWORD")
				.global(true)
				.help("GUI RPC password (default: read from the daemon's password file)"),
		)
		.arg(
			Arg::new("data-dir")
				.long("data-dir")
				.value_name("DIR")
				.value_parser(value_parser!(PathBuf))
				.global(true)
				.help("Daemon data directory"),
		)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.global(true)
				.help("TOML configuration file"),
		)
		.subcommand(Command::new("version").about("Exchange versions with the daemon"))
		.subcommand(Command::new("projects").about("List attached projects"))
		.subcommand(Command::new("disk").about("Show disk usage"))
		.subcommand(
			Command::new("tasks").about("List tasks").arg(
				Arg::new("active")
					.short('a')
					.long("active")
					.action(ArgAction::SetTrue)
					.help("Only tasks holding a process slot"),
			),
		)
		.subcommand(Command::new("prefs").about("Show preferences in effect"))
		.subcommand(
			Command::new("set-prefs")
				.about("Override preferences; unspecified values keep their current setting")
				.arg(
					Arg::new("cpu-usage")
						.long("cpu-usage")
						.value_name("PERCENT")
						.value_parser(value_parser!(f64)),
				)
				.arg(
					Arg::new("max-ncpus")
						.long("max-ncpus")
						.value_name("N")
						.value_parser(value_parser!(u32)),
				)
				.arg(
					Arg::new("max-ncpus-pct")
						.long("max-ncpus-pct")
						.value_name("PERCENT")
						.value_parser(value_parser!(f64)),
				)
				.arg(
					Arg::new("disk-gb")
						.long("disk-gb")
						.value_name("GB")
						.value_parser(value_parser!(f64)),
				)
				.arg(
					Arg::new("run-on-batteries")
						.long("run-on-batteries")
						.value_name("BOOL")
						.value_parser(value_parser!(bool)),
				)
				.arg(
					Arg::new("gpu-when-active")
						.long("gpu-when-active")
						.value_name("BOOL")
						.value_parser(value_parser!(bool)),
				),
		)
		.subcommand(Command::new("proxy").about("Show HTTP proxy settings"))
		.subcommand(
			Command::new("set-proxy")
				.about("Set or disable the HTTP proxy")
				.arg(Arg::new("server").value_name("HOST:PORT").help("Proxy server; omit to disable"))
				.arg(Arg::new("user").long("user").value_name("USER"))
				.arg(Arg::new("pass").long("pass").value_name("PASSWORD")),
		)
		.subcommand(
			Command::new("attach")
				.about("Attach to a project")
				.arg(Arg::new("url").required(true))
				.arg(Arg::new("authenticator").required(true))
				.arg(Arg::new("name").required(true)),
		)
		.subcommand(Command::new("attach-poll").about("Show progress of the last attach"))
		.subcommand(Command::new("project").about("Control a project").args(project_url_args()))
		.subcommand(
			Command::new("watch").about("Print project and task changes as they happen").arg(
				Arg::new("interval")
					.short('i')
					.long("interval")
					.value_name("MS")
					.value_parser(value_parser!(u64).range(1..))
					.help("Refresh interval (default from config)"),
			),
		)
		.subcommand(
			Command::new("quit").about("Ask the daemon to exit").arg(
				Arg::new("wait")
					.short('w')
					.long("wait")
					.action(ArgAction::SetTrue)
					.help("Wait until the daemon process is gone"),
			),
		)
}

async fn set_prefs(client: &mut RpcClient, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let current = client.preferences().await?;
	let mut builder = current.to_builder();

	if let Some(value) = matches.get_one::<f64>("cpu-usage") {
		builder = builder.cpu_usage_limit(*value);
	}
	if let Some(value) = matches.get_one::<f64>("disk-gb") {
		builder = builder.disk_max_used_gb(*value);
	}
	if let Some(value) = matches.get_one::<bool>("run-on-batteries") {
		builder = builder.run_on_batteries(*value);
	}
	if let Some(value) = matches.get_one::<bool>("gpu-when-active") {
		builder = builder.run_gpu_if_user_active(*value);
	}
	match (matches.get_one::<u32>("max-ncpus"), matches.get_one::<f64>("max-ncpus-pct")) {
		(Some(count), Some(pct)) => builder = builder.max_ncpus(*count).max_ncpus_pct(*pct),
		(Some(count), None) => builder = builder.max_ncpus(*count).derive_ncpus_pct(),
		(None, Some(pct)) => builder = builder.max_ncpus_pct(*pct),
		(None, None) => {}
	}

	let prefs = builder.build()?;
	client.set_preferences(&prefs).await?;
	print_json(&prefs)
}

async fn watch(client: RpcClient, interval_ms: u64) -> Result<(), Box<dyn Error>> {
	let mut watcher = Watcher::new(client);
	let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms.max(1)));

	loop {
		interval.tick().await;

		if !watcher.source().is_connected() {
			match watcher.source_mut().connect().await {
				Ok(()) => {
					info!("reconnected");
					watcher.clear_state();
				}
				Err(e) => {
					warn!(error = %e, "reconnect failed");
					continue;
				}
			}
		}

		match watcher.refresh().await {
			Ok(events) => {
				for event in events {
					println!("{}", serde_json::to_string(&event)?);
				}
			}
			Err(e) => warn!(error = %e, kind = ?e.kind(), "refresh failed"),
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	logging::init_tracing();

	let matches = cli().get_matches();
	let config = load_config(&matches)?;
	let poll_interval = config.poll_interval_ms;

	let mut client = RpcClient::new(config);
	client.connect().await?;

	match matches.subcommand() {
		Some(("version", _)) => print_json(&client.exchange_versions().await?)?,
		Some(("projects", _)) => print_json(&client.projects().await?)?,
		Some(("disk", _)) => print_json(&client.disk_usage().await?)?,
		Some(("tasks", sub)) => {
			let tasks = if sub.get_flag("active") {
				client.active_tasks().await?
			} else {
				client.tasks().await?
			};
			print_json(&tasks)?
		}
		Some(("prefs", _)) => print_json(&client.preferences().await?)?,
		Some(("set-prefs", sub)) => set_prefs(&mut client, sub).await?,
		Some(("proxy", _)) => print_json(&client.proxy_settings().await?)?,
		Some(("set-proxy", sub)) => {
			let proxy = sub.get_one::<String>("server").map(|server| {
				let proxy = ProxySettings::new(server.as_str());
				match sub.get_one::<String>("user") {
					Some(user) => proxy.with_credentials(
						user.as_str(),
						sub.get_one::<String>("pass").map(String::as_str).unwrap_or(""),
					),
					None => proxy,
				}
			});
			client.set_proxy_settings(proxy.as_ref()).await?
		}
		Some(("attach", sub)) => {
			let arg = |name: &str| sub.get_one::<String>(name).map(String::as_str).unwrap_or("");
			client.attach_project(arg("url"), arg("authenticator"), arg("name")).await?
		}
		Some(("attach-poll", _)) => print_json(&client.attach_poll().await?)?,
		Some(("project", sub)) => {
			let op: ProjectOp = sub.get_one::<String>("op").ok_or("project: operation required")?.parse()?;
			let url = sub.get_one::<String>("url").ok_or("project: url required")?;
			client.project_op(op, url).await?
		}
		Some(("watch", sub)) => {
			let interval = sub.get_one::<u64>("interval").copied().unwrap_or(poll_interval);
			return watch(client, interval).await;
		}
		Some(("quit", sub)) => {
			let exited = client.quit(sub.get_flag("wait")).await?;
			if sub.get_flag("wait") && !exited {
				return Err("daemon did not exit".into());
			}
			return Ok(());
		}
		_ => return Err("unknown command".into()),
	}

	client.close().await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cli_definition() {
		cli().debug_assert();
	}

	#[test]
	fn test_watch_interval_must_be_positive() {
		assert!(cli().try_get_matches_from(["boinc-rpc", "watch", "--interval", "0"]).is_err());

		let matches = cli().try_get_matches_from(["boinc-rpc", "watch", "-i", "250"]).unwrap();
		let (_, sub) = matches.subcommand().unwrap();
		assert_eq!(sub.get_one::<u64>("interval"), Some(&250));
	}
}

// vim: ts=4
