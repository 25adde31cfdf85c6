//! Transport filter for the GUI RPC byte stream
//!
//! The daemon terminates every message with a single out-of-band byte
//! (0x03) that is not valid markup, and its parser chokes on whitespace
//! before the `/>` of a self-closing tag. [`FramingFilter`] wraps a stream
//! and hides both quirks: reads turn the sentinel into a space, writes
//! drop whitespace in front of `/>`.

use std::borrow::Cow;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};

/// End-of-message marker written after every request
pub const SENTINEL: u8 = 0x03;

/// Stream wrapper that filters the framing sentinel and normalizes
/// self-closing tags.
///
/// Writes are buffered internally until the next flush, so a request is
/// only guaranteed to reach the peer after `flush()`.
#[derive(Debug)]
pub struct FramingFilter<S> {
	inner: S,
	pending: Vec<u8>,
}

impl<S> FramingFilter<S> {
	pub fn new(inner: S) -> Self {
		Self { inner, pending: Vec::new() }
	}

	pub fn get_ref(&self) -> &S {
		&self.inner
	}

	pub fn get_mut(&mut self) -> &mut S {
		&mut self.inner
	}

	pub fn into_inner(self) -> S {
		self.inner
	}
}

/// Replace every sentinel byte with an ASCII space, in place.
pub fn strip_sentinel(buf: &mut [u8]) {
	for b in buf.iter_mut().filter(|b| **b == SENTINEL) {
		*b = b' ';
	}
}

/// Remove whitespace immediately preceding `/>`.
///
/// Buffers of three bytes or fewer are returned untouched; they can only
/// be fragments of a larger write.
pub fn normalize_self_closing(buf: &[u8]) -> Cow<'_, [u8]> {
	if buf.len() <= 3 || !buf.windows(2).any(|w| w == b"/>") {
		return Cow::Borrowed(buf);
	}

	let mut out = Vec::with_capacity(buf.len());
	let mut i = 0;
	while i < buf.len() {
		if buf[i..].starts_with(b"/>") {
			while out.last().is_some_and(|b: &u8| b.is_ascii_whitespace()) {
				out.pop();
			}
			out.extend_from_slice(b"/>");
			i += 2;
		} else {
			out.push(buf[i]);
			i += 1;
		}
	}
	Cow::Owned(out)
}

impl<S: AsyncWrite + Unpin> FramingFilter<S> {
	fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		while !self.pending.is_empty() {
			let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending))?;
			if n == 0 {
				return Poll::Ready(Err(io::Error::new(
					io::ErrorKind::WriteZero,
					"failed to write buffered request",
				)));
			}
			self.pending.drain(..n);
		}
		Poll::Ready(Ok(()))
	}
}

impl<S: AsyncRead + Unpin> AsyncRead for FramingFilter<S> {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		let this = self.get_mut();
		let start = buf.filled().len();
		ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
		strip_sentinel(&mut buf.filled_mut()[start..]);
		Poll::Ready(Ok(()))
	}
}

impl<S: AsyncWrite + Unpin> AsyncWrite for FramingFilter<S> {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		let this = self.get_mut();
		if !this.pending.is_empty() {
			ready!(this.poll_drain(cx))?;
		}
		this.pending.extend_from_slice(&normalize_self_closing(buf));
		// Opportunistic; whatever is left goes out on flush.
		if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
			return Poll::Ready(Err(e));
		}
		Poll::Ready(Ok(buf.len()))
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		let this = self.get_mut();
		ready!(this.poll_drain(cx))?;
		Pin::new(&mut this.inner).poll_flush(cx)
	}

	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		let this = self.get_mut();
		ready!(this.poll_drain(cx))?;
		Pin::new(&mut this.inner).poll_shutdown(cx)
	}
}

impl<S: AsyncSeek + Unpin> AsyncSeek for FramingFilter<S> {
	fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
		Pin::new(&mut self.get_mut().inner).start_seek(position)
	}

	fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
		Pin::new(&mut self.get_mut().inner).poll_complete(cx)
	}
}


// vim: ts=4
