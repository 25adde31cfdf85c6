//! Reply parsing
//!
//! [`ReplyReader`] walks a reply one element at a time. Call sites open
//! the element they expect; the reader recognizes the daemon's error and
//! unauthorized indicators wherever they show up and turns them into
//! errors, so no call site has to.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, BufReader};
use tracing::trace;

use super::filter::FramingFilter;
use super::scalar;
use super::writer::RequestWriter;
use super::{ERROR_TAG, REPLY_ROOT, UNAUTHORIZED_TAG};
use crate::error::{RpcError, RpcResult};

/// An element whose start tag has been consumed
#[derive(Debug, Clone)]
pub struct Element {
	name: String,
	start: BytesStart<'static>,
	empty: bool,
}

impl Element {
	fn new(start: BytesStart<'static>, empty: bool) -> Self {
		let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
		Element { name, start, empty }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Self-closing element; there is no body and no end tag to read.
	pub fn is_empty(&self) -> bool {
		self.empty
	}

	fn into_event(self) -> Event<'static> {
		if self.empty {
			Event::Empty(self.start)
		} else {
			Event::Start(self.start)
		}
	}
}

/// Short description of an event for error messages
fn describe(event: &Event<'_>) -> String {
	match event {
		Event::Start(e) | Event::Empty(e) => String::from_utf8_lossy(e.name().as_ref()).into_owned(),
		Event::End(e) => format!("/{}", String::from_utf8_lossy(e.name().as_ref())),
		Event::Text(_) | Event::CData(_) => "#text".to_string(),
		_ => "#other".to_string(),
	}
}

fn unexpected(expected: &str, event: &Event<'_>) -> RpcError {
	RpcError::UnexpectedElement { expected: expected.to_string(), found: describe(event) }
}

fn is_end_of(event: &Event<'_>, name: &str) -> bool {
	matches!(event, Event::End(e) if e.name().as_ref() == name.as_bytes())
}

/// Reader over the reply half of a connection
pub struct ReplyReader<R> {
	reader: Reader<BufReader<FramingFilter<R>>>,
	buf: Vec<u8>,
	peeked: Option<Event<'static>>,
	depth: usize,
}

impl<R: AsyncRead + Unpin> ReplyReader<R> {
	pub fn new(inner: R) -> Self {
		let mut reader = Reader::from_reader(BufReader::new(FramingFilter::new(inner)));
		reader.config_mut().trim_text(true);
		ReplyReader { reader, buf: Vec::new(), peeked: None, depth: 0 }
	}

	fn track(&mut self, event: &Event<'_>) {
		match event {
			Event::Start(_) => self.depth += 1,
			Event::End(_) => self.depth = self.depth.saturating_sub(1),
			_ => {}
		}
	}

	fn unread(&mut self, event: Event<'static>) {
		match event {
			Event::Start(_) => self.depth = self.depth.saturating_sub(1),
			Event::End(_) => self.depth += 1,
			_ => {}
		}
		self.peeked = Some(event);
	}

	/// Next significant event; declarations, comments and blank text are skipped.
	async fn next_event(&mut self) -> RpcResult<Event<'static>> {
		if let Some(event) = self.peeked.take() {
			self.track(&event);
			return Ok(event);
		}
		loop {
			let event = self.reader.read_event_into_async(&mut self.buf).await?.into_owned();
			self.buf.clear();
			match event {
				Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
				Event::Text(ref t) if t.iter().all(u8::is_ascii_whitespace) => continue,
				Event::Eof => {
					return Err(io::Error::new(
						io::ErrorKind::UnexpectedEof,
						"connection closed by daemon",
					)
					.into())
				}
				event => {
					self.track(&event);
					return Ok(event);
				}
			}
		}
	}

	/// Read and validate the reply root start tag.
	pub async fn begin(&mut self) -> RpcResult<()> {
		self.depth = 0;
		let event = self.next_event().await?;
		match &event {
			Event::Start(e) if e.name().as_ref() == REPLY_ROOT.as_bytes() => Ok(()),
			_ => Err(unexpected(REPLY_ROOT, &event)),
		}
	}

	/// Read and validate the reply root end tag.
	pub async fn end(&mut self) -> RpcResult<()> {
		let event = self.next_event().await?;
		if is_end_of(&event, REPLY_ROOT) {
			return Ok(());
		}
		let el = match event {
			Event::Start(e) => Element::new(e, false),
			Event::Empty(e) => Element::new(e, true),
			other => return Err(unexpected(&format!("/{}", REPLY_ROOT), &other)),
		};
		Err(self.indicator_error(el, &format!("/{}", REPLY_ROOT)).await)
	}

	/// Consume whatever is left of the current reply.
	pub async fn drain(&mut self) -> RpcResult<()> {
		while self.depth > 0 {
			self.next_event().await?;
		}
		Ok(())
	}

	/// Finish a reply whose body produced `result`.
	///
	/// On success the root end tag is validated. On a server error the
	/// rest of the reply is drained so the connection stays in step.
	pub async fn finish<T>(&mut self, result: RpcResult<T>) -> RpcResult<T> {
		match result {
			Ok(value) => {
				self.end().await?;
				Ok(value)
			}
			Err(e) if e.keeps_connection() => {
				self.drain().await?;
				Err(e)
			}
			Err(e) => Err(e),
		}
	}

	/// Error for an element found where `expected` should have been.
	/// Error and unauthorized indicators become their own error kinds.
	async fn indicator_error(&mut self, el: Element, expected: &str) -> RpcError {
		let name = el.name().to_string();
		match name.as_str() {
			ERROR_TAG => match self.read_value(el).await {
				Ok(message) => {
					trace!(%message, "daemon returned error");
					RpcError::Server { message }
				}
				Err(e) => e,
			},
			UNAUTHORIZED_TAG => match self.skip(el).await {
				Ok(()) => RpcError::Unauthorized,
				Err(e) => e,
			},
			found => RpcError::UnexpectedElement {
				expected: expected.to_string(),
				found: found.to_string(),
			},
		}
	}

	async fn open_inner(&mut self, name: &str, strict: bool) -> RpcResult<Option<Element>> {
		let el = match self.next_event().await? {
			Event::Start(e) => Element::new(e, false),
			Event::Empty(e) => Element::new(e, true),
			other if strict => return Err(unexpected(name, &other)),
			other => {
				self.unread(other);
				return Ok(None);
			}
		};

		if el.name() == name {
			return Ok(Some(el));
		}
		if strict || el.name() == ERROR_TAG || el.name() == UNAUTHORIZED_TAG {
			return Err(self.indicator_error(el, name).await);
		}
		self.unread(el.into_event());
		Ok(None)
	}

	/// Open the next element, which must be `<name>`.
	pub async fn open(&mut self, name: &str) -> RpcResult<Element> {
		self.open_inner(name, true).await?.ok_or_else(|| RpcError::UnexpectedElement {
			expected: name.to_string(),
			found: "#none".to_string(),
		})
	}

	/// Open the next element if it is `<name>`; otherwise leave it unread
	/// and return `None`. Used to loop over repeated elements.
	pub async fn try_open(&mut self, name: &str) -> RpcResult<Option<Element>> {
		self.open_inner(name, false).await
	}

	/// Consume the end tag of `el`.
	pub async fn close(&mut self, el: Element) -> RpcResult<()> {
		if el.empty {
			return Ok(());
		}
		let event = self.next_event().await?;
		if is_end_of(&event, &el.name) {
			Ok(())
		} else {
			Err(unexpected(&format!("/{}", el.name), &event))
		}
	}

	/// Open `<name>` and immediately consume its end tag.
	pub async fn expect_empty(&mut self, name: &str) -> RpcResult<()> {
		let el = self.open(name).await?;
		self.close(el).await
	}

	/// Next child of `parent`, or `None` once the parent's end tag has
	/// been consumed.
	pub async fn next_child(&mut self, parent: &Element) -> RpcResult<Option<Element>> {
		if parent.empty {
			return Ok(None);
		}
		loop {
			let event = self.next_event().await?;
			if is_end_of(&event, &parent.name) {
				return Ok(None);
			}
			match event {
				Event::Start(e) => return Ok(Some(Element::new(e, false))),
				Event::Empty(e) => return Ok(Some(Element::new(e, true))),
				Event::Text(_) | Event::CData(_) => continue,
				other => return Err(unexpected(&parent.name, &other)),
			}
		}
	}

	/// Skip past `el` including any nested content.
	pub async fn skip(&mut self, el: Element) -> RpcResult<()> {
		if el.empty {
			return Ok(());
		}
		let target = self.depth - 1;
		while self.depth > target {
			self.next_event().await?;
		}
		Ok(())
	}

	/// Skip whatever children of `el` are left, then its end tag.
	pub async fn skip_rest(&mut self, el: Element) -> RpcResult<()> {
		while let Some(child) = self.next_child(&el).await? {
			trace!(parent = %el.name, element = %child.name, "skipping element");
			self.skip(child).await?;
		}
		Ok(())
	}

	/// Copy `el` and its whole subtree into `out` unchanged.
	pub async fn copy(&mut self, el: Element, out: &mut RequestWriter) -> RpcResult<()> {
		if el.empty {
			return out.echo(el.into_event());
		}
		let target = self.depth - 1;
		out.echo(el.into_event())?;
		while self.depth > target {
			let event = self.next_event().await?;
			out.echo(event)?;
		}
		Ok(())
	}

	/// Read the text content of `el` and move past its end tag.
	pub async fn read_value(&mut self, el: Element) -> RpcResult<String> {
		if el.empty {
			return Ok(String::new());
		}
		let mut value = String::new();
		loop {
			let event = self.next_event().await?;
			if is_end_of(&event, &el.name) {
				return Ok(value);
			}
			match event {
				Event::Text(t) => match t.unescape() {
					Ok(text) => value.push_str(&text),
					Err(_) => value.push_str(&String::from_utf8_lossy(&t)),
				},
				Event::CData(c) => value.push_str(&String::from_utf8_lossy(&c)),
				other => return Err(unexpected(&format!("/{}", el.name), &other)),
			}
		}
	}

	pub async fn read_int(&mut self, el: Element) -> RpcResult<i64> {
		let name = el.name.clone();
		let text = self.read_value(el).await?;
		scalar::parse_int(&name, &text)
	}

	pub async fn read_double(&mut self, el: Element) -> RpcResult<f64> {
		let name = el.name.clone();
		let text = self.read_value(el).await?;
		scalar::parse_double(&name, &text)
	}

	pub async fn read_timestamp(&mut self, el: Element) -> RpcResult<DateTime<Utc>> {
		let name = el.name.clone();
		let text = self.read_value(el).await?;
		scalar::parse_timestamp(&name, &text)
	}

	pub async fn read_timespan(&mut self, el: Element) -> RpcResult<Duration> {
		let name = el.name.clone();
		let text = self.read_value(el).await?;
		scalar::parse_timespan(&name, &text)
	}

	/// A `0`/`1` encoded boolean.
	pub async fn read_bool(&mut self, el: Element) -> RpcResult<bool> {
		let name = el.name.clone();
		let text = self.read_value(el).await?;
		scalar::parse_bool(&name, &text)
	}

	/// A presence-encoded flag; reaching it at all means "set".
	pub async fn read_flag(&mut self, el: Element) -> RpcResult<bool> {
		let text = self.read_value(el).await?;
		Ok(scalar::parse_flag(&text))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;

	fn reader(text: &'static str) -> ReplyReader<&'static [u8]> {
		ReplyReader::new(text.as_bytes())
	}

	#[tokio::test]
	async fn test_reads_success_reply() {
		let mut r = reader("<boinc_gui_rpc_reply>\n<success/>\n</boinc_gui_rpc_reply>\n\x03");
		r.begin().await.unwrap();
		r.expect_empty("success").await.unwrap();
		r.end().await.unwrap();
	}

	#[tokio::test]
	async fn test_error_indicator_carries_message() {
		let mut r = reader("<boinc_gui_rpc_reply><error>bad parameter</error></boinc_gui_rpc_reply>\x03");
		r.begin().await.unwrap();
		let result = r.expect_empty("success").await;
		let err = r.finish(result).await.unwrap_err();
		assert!(matches!(&err, RpcError::Server { message } if message == "bad parameter"));
		assert_eq!(err.kind(), ErrorKind::Protocol);
	}

	#[tokio::test]
	async fn test_unauthorized_indicator() {
		let mut r = reader("<boinc_gui_rpc_reply><unauthorized/></boinc_gui_rpc_reply>\x03");
		r.begin().await.unwrap();
		let err = r.open("projects").await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Authorization);
	}

	#[tokio::test]
	async fn test_name_mismatch_is_drift() {
		let mut r = reader("<boinc_gui_rpc_reply><results/></boinc_gui_rpc_reply>\x03");
		r.begin().await.unwrap();
		let err = r.open("projects").await.unwrap_err();
		assert!(matches!(err, RpcError::UnexpectedElement { ref found, .. } if found == "results"));
	}

	#[tokio::test]
	async fn test_try_open_stops_at_other_element() {
		let mut r = reader(
			"<boinc_gui_rpc_reply><disk_usage_summary>\
			 <project><master_url>a</master_url></project>\
			 <project><master_url>b</master_url></project>\
			 <d_total>100</d_total>\
			 </disk_usage_summary></boinc_gui_rpc_reply>\x03",
		);
		r.begin().await.unwrap();
		let summary = r.open("disk_usage_summary").await.unwrap();
		let mut urls = Vec::new();
		while let Some(project) = r.try_open("project").await.unwrap() {
			let url = r.open("master_url").await.unwrap();
			urls.push(r.read_value(url).await.unwrap());
			r.close(project).await.unwrap();
		}
		assert_eq!(urls, vec!["a", "b"]);

		let total = r.next_child(&summary).await.unwrap().unwrap();
		assert_eq!(total.name(), "d_total");
		assert_eq!(r.read_double(total).await.unwrap(), 100.0);
		assert!(r.next_child(&summary).await.unwrap().is_none());
		r.end().await.unwrap();
	}

	#[tokio::test]
	async fn test_presence_flags_and_escaped_text() {
		let mut r = reader(
			"<boinc_gui_rpc_reply><project><suspended_via_gui/>\
			 <project_name>A &amp; B</project_name><dont_request_more_work>0</dont_request_more_work>\
			 </project></boinc_gui_rpc_reply>\x03",
		);
		r.begin().await.unwrap();
		let project = r.open("project").await.unwrap();

		let flag = r.next_child(&project).await.unwrap().unwrap();
		assert!(flag.is_empty());
		assert!(r.read_flag(flag).await.unwrap());

		let name = r.next_child(&project).await.unwrap().unwrap();
		assert_eq!(r.read_value(name).await.unwrap(), "A & B");

		let cleared = r.next_child(&project).await.unwrap().unwrap();
		assert!(!r.read_flag(cleared).await.unwrap());
		assert!(r.next_child(&project).await.unwrap().is_none());
		r.end().await.unwrap();
	}

	#[tokio::test]
	async fn test_skip_nested_element() {
		let mut r = reader(
			"<boinc_gui_rpc_reply><result><gui_urls><gui_url><name>x</name></gui_url></gui_urls>\
			 <name>task</name></result></boinc_gui_rpc_reply>\x03",
		);
		r.begin().await.unwrap();
		let result = r.open("result").await.unwrap();
		let urls = r.next_child(&result).await.unwrap().unwrap();
		r.skip(urls).await.unwrap();
		let name = r.next_child(&result).await.unwrap().unwrap();
		assert_eq!(r.read_value(name).await.unwrap(), "task");
		assert!(r.next_child(&result).await.unwrap().is_none());
		r.end().await.unwrap();
	}

	#[tokio::test]
	async fn test_decode_error() {
		let mut r = reader("<boinc_gui_rpc_reply><major>seven</major></boinc_gui_rpc_reply>\x03");
		r.begin().await.unwrap();
		let major = r.open("major").await.unwrap();
		let err = r.read_int(major).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Decode);
	}

	#[tokio::test]
	async fn test_consecutive_replies_share_stream() {
		let mut r = reader(
			"<boinc_gui_rpc_reply><success/></boinc_gui_rpc_reply>\n\x03\
			 <boinc_gui_rpc_reply><nonce>abc</nonce></boinc_gui_rpc_reply>\n\x03",
		);
		r.begin().await.unwrap();
		r.expect_empty("success").await.unwrap();
		r.end().await.unwrap();

		r.begin().await.unwrap();
		let nonce = r.open("nonce").await.unwrap();
		assert_eq!(r.read_value(nonce).await.unwrap(), "abc");
		r.end().await.unwrap();
	}
}

// vim: ts=4
