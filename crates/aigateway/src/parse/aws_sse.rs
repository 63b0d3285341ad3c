use aws_smithy_eventstream::frame::{DecodedFrame, MessageFrameDecoder};
pub use aws_smithy_types::event_stream::Message;
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Error type for EventStream decoding.
///
/// Wraps AWS Smithy's eventstream errors and satisfies the `tokio_util::codec::Decoder`
/// requirement of implementing `From<io::Error>`.
#[derive(Debug)]
pub enum EventStreamError {
	/// AWS EventStream protocol error (CRC mismatch, invalid headers, etc.)
	Protocol(aws_smithy_eventstream::error::Error),
	/// I/O error during decoding
	Io(std::io::Error),
}

impl std::fmt::Display for EventStreamError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Protocol(e) => write!(f, "{e}"),
			Self::Io(e) => write!(f, "{e}"),
		}
	}
}

impl std::error::Error for EventStreamError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Protocol(e) => Some(e),
			Self::Io(e) => Some(e),
		}
	}
}

impl From<std::io::Error> for EventStreamError {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<aws_smithy_eventstream::error::Error> for EventStreamError {
	fn from(err: aws_smithy_eventstream::error::Error) -> Self {
		Self::Protocol(err)
	}
}

/// A `tokio_util::codec::Decoder` wrapper around AWS Smithy's `MessageFrameDecoder`.
#[derive(Default)]
pub struct EventStreamCodec {
	inner: MessageFrameDecoder,
}

impl EventStreamCodec {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Decoder for EventStreamCodec {
	type Item = Message;
	type Error = EventStreamError;

	fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
		match self.inner.decode_frame(src)? {
			DecodedFrame::Complete(message) => Ok(Some(message)),
			DecodedFrame::Incomplete => Ok(None),
		}
	}
}

/// Parser is an incremental AWS event-stream decoder: push raw body chunks, get complete
/// binary-framed messages back. A frame split across chunks stays buffered.
#[derive(Default)]
pub struct Parser {
	codec: EventStreamCodec,
	buffer: BytesMut,
}

impl Parser {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Message>, EventStreamError> {
		self.buffer.extend_from_slice(chunk);
		let mut out = Vec::new();
		while let Some(msg) = self.codec.decode(&mut self.buffer)? {
			out.push(msg);
		}
		Ok(out)
	}
}
