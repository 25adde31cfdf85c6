//! # boinc-rpc - GUI RPC client for the BOINC daemon
//!
//! Talks to a running daemon over its local TCP control protocol: read
//! projects, tasks and preferences, change settings, control projects and
//! shut the daemon down. A [`Watcher`] turns repeated snapshots into
//! added/removed/changed events.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use boinc_rpc::{Config, RpcClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RpcClient::new(Config::default().with_env()?);
//!     client.connect().await?;
//!     for task in client.active_tasks().await? {
//!         println!("{} {:.1}%", task.name, task.fraction_done * 100.0);
//!     }
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Watching for changes
//!
//! ```rust,ignore
//! use boinc_rpc::{callbacks::ListenerBuilder, Watcher};
//!
//! let mut watcher = Watcher::new(client);
//! watcher.add_listener(
//!     ListenerBuilder::new()
//!         .on_task_changed(|old, new| println!("{}: {} -> {}", new.name, old.fraction_done, new.fraction_done))
//!         .build(),
//! );
//! loop {
//!     watcher.refresh().await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//! }
//! ```

pub mod callbacks;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod system;
pub mod types;
pub mod watcher;
pub mod wire;

// Re-export commonly used types and functions
pub use client::{ProjectControl, RpcClient};
pub use config::Config;
pub use error::{ConfigError, ErrorKind, RpcError, RpcResult};
pub use types::{
	AttachStatus, DiskUsage, ExecutionState, Preferences, PreferencesBuilder, Project, ProjectOp,
	ProxySettings, Task, TaskState, VersionInfo,
};
pub use watcher::{SnapshotSource, WatchEvent, Watcher};

// vim: ts=4
