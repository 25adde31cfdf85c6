//! Request assembly
//!
//! Requests are built in memory and only handed to the transport once
//! complete, so a failure while building never leaves a half-sent
//! request on the wire.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt::Display;

use super::REQUEST_ROOT;
use crate::error::RpcResult;

/// Builder for one request document
pub struct RequestWriter {
	writer: Writer<Vec<u8>>,
}

impl RequestWriter {
	/// Start a new request; the request root tag is already open.
	pub fn new() -> RpcResult<Self> {
		let mut request = RequestWriter { writer: Writer::new(Vec::new()) };
		request.start(REQUEST_ROOT)?;
		Ok(request)
	}

	pub fn start(&mut self, name: &str) -> RpcResult<()> {
		self.writer.write_event(Event::Start(BytesStart::new(name)))?;
		Ok(())
	}

	pub fn end(&mut self, name: &str) -> RpcResult<()> {
		self.writer.write_event(Event::End(BytesEnd::new(name)))?;
		Ok(())
	}

	/// Write `<name>`, run `body`, write `</name>`.
	pub fn element<F>(&mut self, name: &str, body: F) -> RpcResult<()>
	where
		F: FnOnce(&mut Self) -> RpcResult<()>,
	{
		self.start(name)?;
		body(self)?;
		self.end(name)
	}

	/// Write a self-closing `<name/>`.
	pub fn empty(&mut self, name: &str) -> RpcResult<()> {
		self.writer.write_event(Event::Empty(BytesStart::new(name)))?;
		Ok(())
	}

	/// Write `<name>text</name>` with `text` escaped.
	pub fn text(&mut self, name: &str, text: &str) -> RpcResult<()> {
		self.start(name)?;
		self.writer.write_event(Event::Text(BytesText::new(text)))?;
		self.end(name)
	}

	/// Write any displayable value as element text.
	pub fn value<T: Display>(&mut self, name: &str, value: T) -> RpcResult<()> {
		self.text(name, &value.to_string())
	}

	/// Write a floating value in fixed '.'-decimal notation.
	pub fn double(&mut self, name: &str, value: f64) -> RpcResult<()> {
		self.text(name, &format!("{:.6}", value))
	}

	/// Write a 0/1 encoded boolean.
	pub fn boolean(&mut self, name: &str, value: bool) -> RpcResult<()> {
		self.text(name, if value { "1" } else { "0" })
	}

	/// Write a presence-encoded flag: `<name/>` when set, nothing otherwise.
	pub fn flag(&mut self, name: &str, set: bool) -> RpcResult<()> {
		if set {
			self.empty(name)?;
		}
		Ok(())
	}

	/// Write an event exactly as read from a reply.
	pub(crate) fn echo(&mut self, event: Event<'_>) -> RpcResult<()> {
		self.writer.write_event(event)?;
		Ok(())
	}

	/// Close the request root and return the encoded document.
	pub fn finish(mut self) -> RpcResult<Vec<u8>> {
		self.end(REQUEST_ROOT)?;
		Ok(self.writer.into_inner())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn render<F>(body: F) -> String
	where
		F: FnOnce(&mut RequestWriter) -> RpcResult<()>,
	{
		let mut w = RequestWriter::new().unwrap();
		body(&mut w).unwrap();
		String::from_utf8(w.finish().unwrap()).unwrap()
	}

	#[test]
	fn test_empty_request() {
		assert_eq!(render(|_| Ok(())), "<boinc_gui_rpc_request></boinc_gui_rpc_request>");
	}

	#[test]
	fn test_nested_elements() {
		let out = render(|w| {
			w.element("project_suspend", |w| w.text("project_url", "http://x/?a=1&b=2"))
		});
		assert_eq!(
			out,
			"<boinc_gui_rpc_request><project_suspend>\
			 <project_url>http://x/?a=1&amp;b=2</project_url>\
			 </project_suspend></boinc_gui_rpc_request>"
		);
	}

	#[test]
	fn test_adjacent_empty_elements_have_no_space() {
		let out = render(|w| {
			w.empty("a")?;
			w.empty("b")?;
			w.flag("c", true)?;
			w.flag("d", false)
		});
		assert!(!out.contains(" />"));
		assert!(out.contains("<a/><b/><c/>"));
		assert!(!out.contains("<d/>"));
	}

	#[test]
	fn test_numbers_use_fixed_decimal_point() {
		let out = render(|w| {
			w.double("cpu_usage_limit", 62.5)?;
			w.boolean("run_on_batteries", false)?;
			w.value("max_ncpus", 3)
		});
		assert!(out.contains("<cpu_usage_limit>62.500000</cpu_usage_limit>"));
		assert!(out.contains("<run_on_batteries>0</run_on_batteries>"));
		assert!(out.contains("<max_ncpus>3</max_ncpus>"));
	}
}

// vim: ts=4
