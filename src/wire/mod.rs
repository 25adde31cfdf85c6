//! GUI RPC wire layer
//!
//! Every request is one markup document under [`REQUEST_ROOT`] followed by
//! the [`SENTINEL`] byte; every reply is one document under [`REPLY_ROOT`],
//! also followed by the sentinel. This module provides the transport
//! filter, the request writer, the reply reader and [`Connection`], which
//! ties them to one stream.
//!
//! ```ignore
//! conn.send(|w| w.empty("get_project_status")).await?;
//! let reply = conn.reply();
//! reply.begin().await?;
//! let projects = reply.open("projects").await?;
//! ```

pub mod filter;
pub mod reader;
pub mod scalar;
pub mod writer;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::trace;

pub use filter::{FramingFilter, SENTINEL};
pub use reader::{Element, ReplyReader};
pub use writer::RequestWriter;

use crate::error::RpcResult;

/// Root element of every request
pub const REQUEST_ROOT: &str = "boinc_gui_rpc_request";

/// Root element of every reply
pub const REPLY_ROOT: &str = "boinc_gui_rpc_reply";

/// Reply element carrying a server-side error message
pub const ERROR_TAG: &str = "error";

/// Reply element signalling a missing or failed authorization
pub const UNAUTHORIZED_TAG: &str = "unauthorized";

/// Generic success reply element
pub const SUCCESS_TAG: &str = "success";

/// Default daemon TCP port
pub const DEFAULT_PORT: u16 = 31416;

/// Default daemon host
pub const DEFAULT_HOST: &str = "localhost";

/// Handshake progress of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
	Connected,
	Authorized,
}

/// One framed, filtered stream to the daemon.
///
/// Exclusively owns both halves of the underlying stream.
pub struct Connection<S> {
	reader: ReplyReader<ReadHalf<S>>,
	writer: FramingFilter<WriteHalf<S>>,
	state: AuthState,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
	pub fn new(stream: S) -> Self {
		let (read, write) = tokio::io::split(stream);
		Connection {
			reader: ReplyReader::new(read),
			writer: FramingFilter::new(write),
			state: AuthState::Connected,
		}
	}

	pub fn state(&self) -> AuthState {
		self.state
	}

	pub(crate) fn set_state(&mut self, state: AuthState) {
		self.state = state;
	}

	/// Build a request with `body` and send it.
	pub async fn send<F>(&mut self, body: F) -> RpcResult<()>
	where
		F: FnOnce(&mut RequestWriter) -> RpcResult<()>,
	{
		let mut request = RequestWriter::new()?;
		body(&mut request)?;
		self.transmit(request).await
	}

	/// Send a fully built request, then the sentinel byte.
	pub async fn transmit(&mut self, request: RequestWriter) -> RpcResult<()> {
		let bytes = request.finish()?;
		trace!(request = %String::from_utf8_lossy(&bytes), "sending request");
		self.writer.write_all(&bytes).await?;
		self.writer.flush().await?;
		self.writer.write_all(&[SENTINEL]).await?;
		self.writer.flush().await?;
		Ok(())
	}

	/// Reader positioned at the next reply
	pub fn reply(&mut self) -> &mut ReplyReader<ReadHalf<S>> {
		&mut self.reader
	}

	/// Send a request and expect a bare `<success/>` reply.
	pub async fn call_success<F>(&mut self, body: F) -> RpcResult<()>
	where
		F: FnOnce(&mut RequestWriter) -> RpcResult<()>,
	{
		self.send(body).await?;
		self.expect_success().await
	}

	/// Read a reply consisting of `<success/>` only.
	pub async fn expect_success(&mut self) -> RpcResult<()> {
		let reply = self.reply();
		reply.begin().await?;
		let result = reply.expect_empty(SUCCESS_TAG).await;
		reply.finish(result).await
	}

	/// Shut down the write half; the daemon sees end of stream.
	pub async fn shutdown(&mut self) -> RpcResult<()> {
		self.writer.shutdown().await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::io::AsyncReadExt;

	#[tokio::test]
	async fn test_send_frames_request_with_sentinel() {
		let (client, mut server) = tokio::io::duplex(1024);
		let mut conn = Connection::new(client);
		conn.send(|w| w.empty("auth1")).await.unwrap();

		let mut buf = vec![0u8; 256];
		let n = server.read(&mut buf).await.unwrap();
		let mut got = buf[..n].to_vec();
		while got.last() != Some(&SENTINEL) {
			let n = server.read(&mut buf).await.unwrap();
			got.extend_from_slice(&buf[..n]);
		}
		assert_eq!(got, b"<boinc_gui_rpc_request><auth1/></boinc_gui_rpc_request>\x03");
	}
}

// vim: ts=4
