//! Scripted in-process daemon for client tests

#![allow(dead_code)]

use boinc_rpc::{Config, RpcClient};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

pub const SENTINEL: u8 = 0x03;
pub const PASSWORD: &str = "secret";
pub const NONCE_REPLY: &str = "<nonce>abc123</nonce>";
pub const AUTHORIZED_REPLY: &str = "<authorized/>";

pub fn config() -> Config {
	Config { password: Some(PASSWORD.to_string()), ..Config::default() }
}

/// Read one request up to (not including) the sentinel; `None` on EOF.
pub async fn read_message<S: AsyncRead + Unpin>(stream: &mut S) -> Option<String> {
	let mut message = Vec::new();
	let mut byte = [0u8; 1];
	loop {
		let n = stream.read(&mut byte).await.ok()?;
		if n == 0 {
			return None;
		}
		if byte[0] == SENTINEL {
			break;
		}
		message.push(byte[0]);
	}
	String::from_utf8(message).ok()
}

/// Answer each request with the next scripted reply body and return the
/// requests received. Stops when the script runs out or the client hangs up.
pub async fn daemon<S>(mut stream: S, replies: Vec<&'static str>) -> Vec<String>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	let mut requests = Vec::new();
	for reply in replies {
		match read_message(&mut stream).await {
			Some(request) => requests.push(request),
			None => break,
		}
		let framed = format!(
			"<boinc_gui_rpc_reply>\n{}\n</boinc_gui_rpc_reply>\n{}",
			reply, SENTINEL as char
		);
		if stream.write_all(framed.as_bytes()).await.is_err() {
			break;
		}
	}
	requests
}

/// Handshake script followed by `replies`
pub fn with_handshake(replies: &[&'static str]) -> Vec<&'static str> {
	let mut script = vec![NONCE_REPLY, AUTHORIZED_REPLY];
	script.extend_from_slice(replies);
	script
}

/// Client already authorized against a scripted daemon
pub async fn connected(
	replies: &[&'static str],
) -> (RpcClient<DuplexStream>, JoinHandle<Vec<String>>) {
	let (client_end, daemon_end) = tokio::io::duplex(64 * 1024);
	let handle = tokio::spawn(daemon(daemon_end, with_handshake(replies)));
	let mut client = RpcClient::new(config());
	client.attach(client_end).await.unwrap();
	(client, handle)
}

/// Close the client and collect the requests the daemon saw, minus the
/// two handshake requests.
pub async fn finish(
	mut client: RpcClient<DuplexStream>,
	handle: JoinHandle<Vec<String>>,
) -> Vec<String> {
	client.close().await.unwrap();
	drop(client);
	handle.await.unwrap().into_iter().skip(2).collect()
}
