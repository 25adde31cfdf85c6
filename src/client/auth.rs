//! Challenge/response handshake
//!
//! `auth1` fetches a nonce; `auth2` answers with the lower-case hex MD5 of
//! nonce followed by password. One shot, no retries.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::error::{RpcError, RpcResult};
use crate::wire::{AuthState, Connection};

/// Hex digest sent in `auth2`
pub fn nonce_hash(nonce: &str, password: &str) -> String {
	let mut input = String::with_capacity(nonce.len() + password.len());
	input.push_str(nonce);
	input.push_str(password);
	hex::encode(md5::compute(input.as_bytes()).0)
}

/// Handshake failures that are not transport errors all read as a
/// failed authentication.
fn handshake_error(e: RpcError) -> RpcError {
	match e {
		RpcError::Server { message } => RpcError::AuthenticationFailed { message },
		RpcError::UnexpectedElement { expected, found } => RpcError::AuthenticationFailed {
			message: format!("expected <{}>, got <{}>", expected, found),
		},
		other => other,
	}
}

async fn request_nonce<S>(conn: &mut Connection<S>) -> RpcResult<String>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.empty("auth1")).await?;
	let reply = conn.reply();
	reply.begin().await?;
	let el = reply.open("nonce").await?;
	let nonce = reply.read_value(el).await?;
	reply.end().await?;
	Ok(nonce)
}

async fn send_hash<S>(conn: &mut Connection<S>, hash: &str) -> RpcResult<()>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	conn.send(|w| w.element("auth2", |w| w.text("nonce_hash", hash))).await?;
	let reply = conn.reply();
	reply.begin().await?;
	reply.expect_empty("authorized").await?;
	reply.end().await
}

/// Run the handshake on a freshly opened connection.
///
/// The caller is responsible for closing the connection on failure.
pub async fn authorize<S>(conn: &mut Connection<S>, password: &str) -> RpcResult<()>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	let nonce = request_nonce(conn).await.map_err(handshake_error)?;
	debug!("received authentication nonce");

	let hash = nonce_hash(&nonce, password);
	send_hash(conn, &hash).await.map_err(handshake_error)?;

	conn.set_state(AuthState::Authorized);
	info!("authorized with daemon");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_handshake_error_mapping() {
		let e = handshake_error(RpcError::Server { message: "auth disabled".into() });
		assert!(matches!(&e, RpcError::AuthenticationFailed { message } if message == "auth disabled"));

		let e = handshake_error(RpcError::Unauthorized);
		assert!(matches!(e, RpcError::Unauthorized));

		let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "closed");
		assert!(matches!(handshake_error(RpcError::Io(io)), RpcError::Io(_)));
	}

	#[test]
	fn test_nonce_hash() {
		assert_eq!(nonce_hash("abc123", "secret"), format!("{:x}", md5::compute("abc123secret")));
		assert_eq!(nonce_hash("", ""), "d41d8cd98f00b204e9800998ecf8427e");
		assert_eq!(nonce_hash("a", "bc"), "900150983cd24fb0d6963f7d28e17f72");
	}
}

// vim: ts=4
