use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tokio_sse_codec::{Event, Frame, SseEncoder};
use tokio_util::codec::Encoder;

/// The OpenAI stream terminator frame.
pub const DONE_MESSAGE: &str = "[DONE]";

/// A decoded SSE event. `name` is empty for plain `data:` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
	pub name: String,
	pub data: String,
	pub id: Option<String>,
}

impl SseEvent {
	pub fn is_done(&self) -> bool {
		self.data == DONE_MESSAGE
	}
}

/// Parser is an incremental `text/event-stream` decoder. Translators push raw chunks as they
/// arrive from the upstream and receive zero or more complete events per push; a partial event
/// stays buffered until its terminating blank line shows up.
#[derive(Debug, Default)]
pub struct Parser {
	buffer: BytesMut,
	// Fields of the event currently being assembled
	name: String,
	data: Vec<String>,
	id: Option<String>,
}

impl Parser {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
		self.buffer.extend_from_slice(chunk);
		let mut events = Vec::new();
		while let Some(line) = self.next_line() {
			if line.is_empty() {
				if let Some(ev) = self.finish_event() {
					events.push(ev);
				}
				continue;
			}
			self.parse_field(&line);
		}
		events
	}

	/// flush emits whatever is buffered at end-of-stream. A spec-conformant stream ends every
	/// event with a blank line, but truncated upstreams happen.
	pub fn flush(&mut self) -> Option<SseEvent> {
		if !self.buffer.is_empty() {
			let line = String::from_utf8_lossy(&self.buffer).to_string();
			self.buffer.clear();
			let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
			if !line.is_empty() {
				self.parse_field(&line);
			}
		}
		self.finish_event()
	}

	fn next_line(&mut self) -> Option<String> {
		let pos = self.buffer.iter().position(|b| *b == b'\n')?;
		let line = self.buffer.split_to(pos + 1);
		let line = &line[..line.len() - 1];
		let line = line.strip_suffix(b"\r").unwrap_or(line);
		Some(String::from_utf8_lossy(line).to_string())
	}

	fn parse_field(&mut self, line: &str) {
		// A leading colon is a comment (used for keep-alives)
		if line.starts_with(':') {
			return;
		}
		let (field, value) = match line.split_once(':') {
			Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
			None => (line, ""),
		};
		match field {
			"data" => self.data.push(value.to_string()),
			"event" => self.name = value.to_string(),
			"id" => self.id = Some(value.to_string()),
			// "retry" and unknown fields are ignored
			_ => {},
		}
	}

	fn finish_event(&mut self) -> Option<SseEvent> {
		if self.data.is_empty() && self.name.is_empty() {
			self.id = None;
			return None;
		}
		let ev = SseEvent {
			name: std::mem::take(&mut self.name),
			data: std::mem::take(&mut self.data).join("\n"),
			id: self.id.take(),
		};
		Some(ev)
	}
}

/// encode_event writes a single SSE frame.
pub fn encode_event(name: &'static str, data: Bytes) -> Bytes {
	let mut encoder = SseEncoder::new();
	let mut out = BytesMut::new();
	let frame = Frame::Event(Event::<Bytes> {
		data,
		name: std::borrow::Cow::Borrowed(name),
		id: None,
	});
	// Encoding into a fresh BytesMut cannot fail
	encoder.encode(frame, &mut out).expect("sse encode");
	out.freeze()
}

/// encode_json_event serializes `v` as the data of a single SSE frame.
pub fn encode_json_event<T: Serialize>(name: &'static str, v: &T) -> Option<Bytes> {
	let data = serde_json::to_vec(v).ok()?;
	Some(encode_event(name, Bytes::from(data)))
}

/// The final `data: [DONE]` frame for OpenAI-schema streams.
pub fn done_frame() -> Bytes {
	encode_event("", Bytes::from_static(DONE_MESSAGE.as_bytes()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn events_split_across_chunks() {
		let mut p = Parser::new();
		assert_eq!(p.push(b"data: {\"a\":"), vec![]);
		let events = p.push(b"1}\n\ndata: {\"b\":2}\n\n");
		assert_eq!(events.len(), 2);
		assert_eq!(events[0].data, "{\"a\":1}");
		assert_eq!(events[1].data, "{\"b\":2}");
	}

	#[test]
	fn named_events_and_ids() {
		let mut p = Parser::new();
		let events = p.push(b"event: message_start\nid: 7\ndata: {}\n\n");
		assert_eq!(
			events,
			vec![SseEvent {
				name: "message_start".into(),
				data: "{}".into(),
				id: Some("7".into()),
			}]
		);
	}

	#[test]
	fn comments_and_crlf_are_tolerated() {
		let mut p = Parser::new();
		let events = p.push(b": keep-alive\r\ndata: x\r\n\r\n");
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].data, "x");
	}

	#[test]
	fn multi_line_data_joins_with_newline() {
		let mut p = Parser::new();
		let events = p.push(b"data: line1\ndata: line2\n\n");
		assert_eq!(events[0].data, "line1\nline2");
	}

	#[test]
	fn flush_recovers_truncated_tail() {
		let mut p = Parser::new();
		assert!(p.push(b"data: tail").is_empty());
		let ev = p.flush().unwrap();
		assert_eq!(ev.data, "tail");
		assert!(p.flush().is_none());
	}

	#[test]
	fn done_frame_is_terminal() {
		let mut p = Parser::new();
		let events = p.push(&done_frame());
		assert!(events[0].is_done());
	}

	#[test]
	fn encode_round_trips_through_parser() {
		let frame = encode_json_event("message_start", &serde_json::json!({"ok": true})).unwrap();
		let mut p = Parser::new();
		let events = p.push(&frame);
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].name, "message_start");
		assert_eq!(events[0].data, "{\"ok\":true}");
	}
}
