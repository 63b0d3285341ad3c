pub mod jwt;

use aigw_core::prelude::*;
use bytes::Bytes;

pub use ::http::uri::Authority;
pub use ::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header};

pub type Body = axum_core::body::Body;
pub type Request = ::http::Request<Body>;
pub type Response = ::http::Response<Body>;

/// Buffered bodies are bounded; anything larger is rejected before translation.
pub const BODY_BUFFER_LIMIT: usize = 2_097_152;

/// The pseudo-header carrying the request path in host-proxy header mutations.
pub const PSEUDO_PATH: &str = ":path";
/// The pseudo-header carrying the request authority in host-proxy header mutations.
pub const PSEUDO_AUTHORITY: &str = ":authority";

/// HeaderMutation is the translator's instruction set for the host proxy: headers to set
/// (adding or overwriting) and headers to remove, applied in that order. Keys are plain
/// strings because mutations may address `:path`/`:authority` pseudo-headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMutation {
	pub set: Vec<(Strng, Strng)>,
	pub remove: Vec<Strng>,
}

impl HeaderMutation {
	pub fn set(mut self, name: Strng, value: Strng) -> Self {
		self.set.push((name, value));
		self
	}

	pub fn remove(mut self, name: Strng) -> Self {
		self.remove.push(name);
		self
	}

	pub fn is_empty(&self) -> bool {
		self.set.is_empty() && self.remove.is_empty()
	}

	pub fn merge(mut self, other: HeaderMutation) -> Self {
		self.set.extend(other.set);
		self.remove.extend(other.remove);
		self
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self
			.set
			.iter()
			.rev()
			.find(|(n, _)| n.as_str() == name)
			.map(|(_, v)| v.as_str())
	}

	/// apply folds the non-pseudo mutations into a concrete header map. The host proxy
	/// normally applies mutations itself; this exists for tests and the in-process MCP path.
	pub fn apply(&self, headers: &mut HeaderMap) {
		for (name, value) in &self.set {
			if name.starts_with(':') {
				continue;
			}
			let (Ok(name), Ok(value)) = (
				HeaderName::try_from(name.as_str()),
				HeaderValue::try_from(value.as_str()),
			) else {
				continue;
			};
			headers.insert(name, value);
		}
		for name in &self.remove {
			if !name.starts_with(':') {
				headers.remove(name.as_str());
			}
		}
	}
}

/// BodyMutation either leaves the buffered body (or chunk) untouched or replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyMutation {
	Passthrough,
	Replace(Bytes),
}

impl Default for BodyMutation {
	fn default() -> Self {
		BodyMutation::Passthrough
	}
}

impl BodyMutation {
	pub fn replaced(&self) -> Option<&Bytes> {
		match self {
			BodyMutation::Replace(b) => Some(b),
			BodyMutation::Passthrough => None,
		}
	}

	/// resolve returns the bytes the client will observe given the original input.
	pub fn resolve<'a>(&'a self, original: &'a Bytes) -> &'a Bytes {
		match self {
			BodyMutation::Replace(b) => b,
			BodyMutation::Passthrough => original,
		}
	}
}

/// Reads the first value of a header as a string, ignoring non-UTF8 values.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn is_event_stream(headers: &HeaderMap) -> bool {
	header_str(headers, "content-type")
		.map(|ct| ct.starts_with("text/event-stream"))
		.unwrap_or(false)
}
