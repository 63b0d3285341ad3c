use std::sync::Arc;
use std::time::{Duration, Instant};

use aigw_core::prelude::*;
use bytes::{Bytes, BytesMut};

use crate::http::{BODY_BUFFER_LIMIT, BodyMutation, HeaderMap, HeaderMutation, StatusCode};
use crate::llm::translator::{self, Translator};
use crate::llm::types::TokenUsage;
use crate::llm::{AIError, AIProvider, RouteType};
use crate::telemetry::log::RequestLog;
use crate::telemetry::metrics::Metrics;
use crate::types::agent::Backend;

/// SelectedBackend is what the (external) selector hands back: the backend record plus the
/// provider settings that drive translation.
#[derive(Debug, Clone)]
pub struct SelectedBackend {
	pub backend: Backend,
	pub provider: AIProvider,
}

/// BackendSelector is the seam to the routing collaborator. Called once per request with the
/// original model name; decisions are never cached by the processor.
pub trait BackendSelector: Send + Sync {
	fn select(&self, original_model: &str) -> Result<SelectedBackend, AIError>;
}

/// The per-request lifecycle.
///
/// ```text
/// RECEIVED_HEADERS -> PARSED -> TRANSLATED -> {STREAMING | BUFFERED} -> DONE
///                any -> FAILED
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
	ReceivedHeaders,
	Parsed,
	Translated,
	Streaming,
	Buffered,
	Done,
	Failed,
}

/// Mutations produced by a request-phase step.
#[derive(Debug, Default)]
pub struct RequestAction {
	pub headers: HeaderMutation,
	pub body: BodyMutation,
}

/// Mutations produced by a response-phase step.
#[derive(Debug, Default)]
pub struct ResponseAction {
	pub headers: HeaderMutation,
	pub body: BodyMutation,
}

#[derive(Debug, Default)]
struct StreamingState {
	first_token_sent: bool,
	first_token_at: Option<Duration>,
	max_output_tokens: u64,
}

/// Processor drives one request through parse, route, translate, forward and accounting. It is
/// exclusively owned by the host-proxy stream handler for the request's lifetime; completion
/// metrics are guaranteed on every exit path by the drop guard.
pub struct Processor {
	selector: Arc<dyn BackendSelector>,
	metrics: Metrics,
	log: RequestLog,
	force_body_mutation: bool,

	state: State,
	start: Instant,
	route: RouteType,
	request_headers: HeaderMap,
	request_buffer: BytesMut,
	translator: Option<Box<dyn Translator>>,
	backend: Option<SelectedBackend>,
	streaming: StreamingState,
	usage: TokenUsage,
	response_status: StatusCode,
	response_buffer: BytesMut,
	completed: bool,
}

impl Processor {
	pub fn new(
		selector: Arc<dyn BackendSelector>,
		metrics: Metrics,
		force_body_mutation: bool,
	) -> Self {
		Processor {
			selector,
			metrics,
			log: RequestLog::default(),
			force_body_mutation,
			state: State::ReceivedHeaders,
			start: Instant::now(),
			route: RouteType::Passthrough,
			request_headers: HeaderMap::new(),
			request_buffer: BytesMut::new(),
			translator: None,
			backend: None,
			streaming: StreamingState::default(),
			usage: TokenUsage::default(),
			response_status: StatusCode::OK,
			response_buffer: BytesMut::new(),
			completed: false,
		}
	}

	pub fn state(&self) -> State {
		self.state
	}

	pub fn backend(&self) -> Option<&SelectedBackend> {
		self.backend.as_ref()
	}

	pub fn usage(&self) -> &TokenUsage {
		&self.usage
	}

	/// on_request_headers starts the request. The path picks the endpoint; an unknown path is
	/// forwarded untouched.
	pub fn on_request_headers(&mut self, headers: HeaderMap, path: &str) -> Result<(), AIError> {
		self.route = RouteType::from_path(path).unwrap_or(RouteType::Passthrough);
		self
			.metrics
			.set_operation(self.route.operation_name());
		self.log.route = Some(strng::new(path));
		self.request_headers = headers;
		Ok(())
	}

	/// on_request_body accumulates body chunks; on end-of-stream it parses, routes, and
	/// translates, emitting the mutations for the upstream request.
	pub fn on_request_body(
		&mut self,
		chunk: &[u8],
		end_of_stream: bool,
	) -> Result<Option<RequestAction>, AIError> {
		if self.request_buffer.len() + chunk.len() > BODY_BUFFER_LIMIT {
			return Err(self.fail(AIError::RequestTooLarge));
		}
		self.request_buffer.extend_from_slice(chunk);
		if !end_of_stream {
			return Ok(None);
		}
		let body = self.request_buffer.split().freeze();
		match self.translate_request(body) {
			Ok(action) => Ok(Some(action)),
			Err(e) => Err(self.fail(e)),
		}
	}

	fn translate_request(&mut self, body: Bytes) -> Result<RequestAction, AIError> {
		// Routing needs the original model before any translator exists.
		let original_model = extract_model(&body);
		self.state = State::Parsed;
		self.metrics.set_original_model(original_model.clone());
		self.log.original_model = Some(original_model.clone());

		let selected = self.selector.select(original_model.as_str())?;
		let mut translator = translator::translator_for(self.route, &selected.provider)?;
		let transform =
			translator.request_body(&self.request_headers, &body, self.force_body_mutation)?;

		self.metrics.set_provider(selected.provider.provider());
		self.metrics.set_request_model(transform.request_model.clone());
		self.log.provider = Some(selected.provider.provider());
		self.log.backend = Some(selected.backend.name.clone());
		self.log.request_model = Some(transform.request_model.clone());
		self.log.streaming = transform.streaming;

		// The authority is the backend's host unless the translator picked one.
		let authority = transform
			.override_host
			.clone()
			.unwrap_or_else(|| selected.backend.authority());
		let mut headers = transform
			.headers
			.set(strng::new(crate::http::PSEUDO_AUTHORITY), authority);
		for (name, value) in &selected.backend.headers {
			headers = headers.set(name.clone(), value.clone());
		}

		self.translator = Some(translator);
		self.backend = Some(selected);
		self.state = State::Translated;
		Ok(RequestAction {
			headers,
			body: transform.body,
		})
	}

	/// on_response_headers decides between the streaming and buffered paths and emits any
	/// header mutations (e.g. Bedrock's event-stream becomes SSE).
	pub fn on_response_headers(
		&mut self,
		status: StatusCode,
		headers: &HeaderMap,
	) -> Result<HeaderMutation, AIError> {
		self.response_status = status;
		self.log.status = Some(status.as_u16());
		if status.is_success() && (crate::http::is_event_stream(headers) || self.log.streaming) {
			self.state = State::Streaming;
		} else {
			self.state = State::Buffered;
		}
		match self.translator.as_mut() {
			// Body-less requests (e.g. GET /v1/models) never built a translator
			None => Ok(HeaderMutation::default()),
			Some(translator) => translator.response_headers(headers),
		}
	}

	/// on_response_body drives the response path. Streaming chunks are translated as they
	/// arrive; buffered responses are translated whole at end-of-stream.
	pub fn on_response_body(
		&mut self,
		headers: &HeaderMap,
		chunk: &[u8],
		end_of_stream: bool,
	) -> Result<ResponseAction, AIError> {
		match self.state {
			State::Streaming if self.response_status.is_success() => {
				self.streaming_chunk(headers, chunk, end_of_stream)
			},
			State::Streaming | State::Buffered => self.buffered_chunk(headers, chunk, end_of_stream),
			_ => Err(self.fail(AIError::Internal(format!(
				"response body in state {:?}",
				self.state
			)))),
		}
	}

	fn streaming_chunk(
		&mut self,
		headers: &HeaderMap,
		chunk: &[u8],
		end_of_stream: bool,
	) -> Result<ResponseAction, AIError> {
		let Some(translator) = self.translator.as_mut() else {
			return Err(self.fail(AIError::Internal("missing translator".to_string())));
		};
		let chunk = Bytes::copy_from_slice(chunk);
		let transform = match translator.response_body(headers, &chunk, end_of_stream) {
			Ok(t) => t,
			Err(e) => {
				// The response already began; the best that can be done is a terminal error
				// frame in the client's schema before the host closes the stream.
				self.fail(e);
				return Ok(ResponseAction {
					headers: HeaderMutation::default(),
					body: BodyMutation::Replace(stream_error_frame(self.route)),
				});
			},
		};
		self.absorb_response(&transform.usage, transform.response_model.clone());

		// Latency accounting: first output-bearing chunk marks TTFT; the final chunk yields
		// the average inter-token latency.
		let elapsed = self.start.elapsed();
		if transform.saw_output && !self.streaming.first_token_sent {
			self.streaming.first_token_sent = true;
			self.streaming.first_token_at = Some(elapsed);
			self.metrics.record_time_to_first_token(elapsed);
		}
		if let Some(out) = transform.usage.output_tokens
			&& out > self.streaming.max_output_tokens
		{
			self.streaming.max_output_tokens = out;
		}
		if end_of_stream {
			if let Some(per_token) = time_per_output_token(
				elapsed,
				self.streaming.first_token_at.unwrap_or_default(),
				self.streaming.max_output_tokens,
			) {
				self.metrics.record_time_per_output_token(per_token);
			}
			self.complete(true);
		}
		Ok(ResponseAction {
			headers: transform.headers,
			body: transform.body,
		})
	}

	fn buffered_chunk(
		&mut self,
		headers: &HeaderMap,
		chunk: &[u8],
		end_of_stream: bool,
	) -> Result<ResponseAction, AIError> {
		if self.response_buffer.len() + chunk.len() > BODY_BUFFER_LIMIT {
			return Err(self.fail(AIError::ResponseTooLarge));
		}
		self.response_buffer.extend_from_slice(chunk);
		if !end_of_stream {
			return Ok(ResponseAction {
				headers: HeaderMutation::default(),
				// The full replacement comes with the final chunk
				body: BodyMutation::Replace(Bytes::new()),
			});
		}
		let body = self.response_buffer.split().freeze();
		let Some(translator) = self.translator.as_mut() else {
			// No translator means nothing to rewrite; forward and account the status.
			self.complete(self.response_status.is_success());
			return Ok(ResponseAction {
				headers: HeaderMutation::default(),
				body: BodyMutation::Replace(body),
			});
		};

		if !self.response_status.is_success() {
			// Upstream errors keep their status; the body is translated to the client schema.
			let (header_mutation, body_mutation) = match translator.response_error(headers, &body) {
				Ok(m) => m,
				Err(e) => return Err(self.fail(e)),
			};
			self.log.error = Some(format!("upstream status {}", self.response_status));
			self.complete(false);
			return Ok(ResponseAction {
				headers: header_mutation,
				body: match body_mutation {
					BodyMutation::Passthrough => BodyMutation::Replace(body),
					replace => replace,
				},
			});
		}

		let transform = match translator.response_body(headers, &body, true) {
			Ok(t) => t,
			Err(e) => return Err(self.fail(e)),
		};
		self.absorb_response(&transform.usage, transform.response_model.clone());
		self.complete(true);
		Ok(ResponseAction {
			headers: transform.headers,
			body: match transform.body {
				BodyMutation::Passthrough => BodyMutation::Replace(body),
				replace => replace,
			},
		})
	}

	fn absorb_response(&mut self, usage: &TokenUsage, response_model: Option<Strng>) {
		self.usage = self.usage.override_with(usage);
		if let Some(model) = response_model {
			self.metrics.set_response_model(model.clone());
			self.log.response_model = Some(model);
		}
	}

	/// on_cancel discards partial state when the client disconnects or a deadline expires.
	/// The upstream connection is owned (and closed) by the host; this records the failure.
	pub fn on_cancel(&mut self) {
		if !self.completed {
			self.log.error.get_or_insert_with(|| "canceled".to_string());
			self.complete(false);
		}
	}

	/// error_response renders an error for the client: the user-facing sentinels verbatim,
	/// everything else as a generic message (details only in logs).
	pub fn error_response(&mut self, err: AIError) -> (StatusCode, Bytes) {
		let status = err.status();
		let message = if err.is_user_facing() {
			err.to_string()
		} else {
			"internal error".to_string()
		};
		let body = serde_json::json!({
			"error": {"type": "invalid_request_error", "message": message}
		});
		(
			status,
			Bytes::from(serde_json::to_vec(&body).unwrap_or_default()),
		)
	}

	fn fail(&mut self, err: AIError) -> AIError {
		if !self.completed {
			self.log.error = Some(err.to_string());
			self.complete(false);
		}
		err
	}

	fn complete(&mut self, success: bool) {
		if self.completed {
			return;
		}
		self.completed = true;
		self.state = if success { State::Done } else { State::Failed };
		let elapsed = self.start.elapsed();
		if !self.usage.is_empty() {
			self.metrics.record_token_usage(&self.usage);
		}
		self.metrics.record_completion(elapsed, success);
		self.log.usage = self.usage;
		self.log.duration = Some(elapsed);
		self.log.emit();
	}
}

impl Drop for Processor {
	fn drop(&mut self) {
		// A request abandoned mid-flight (disconnect, deadline) still records its completion.
		if !self.completed && self.state != State::ReceivedHeaders {
			self.log.error.get_or_insert_with(|| "aborted".to_string());
			self.complete(false);
		}
	}
}

/// stream_error_frame renders the terminal SSE frame emitted when translation fails after the
/// response has begun. Details stay in the logs; the client sees a generic error in its own
/// schema.
fn stream_error_frame(route: RouteType) -> Bytes {
	let body = match route {
		RouteType::Messages => serde_json::json!({
			"type": "error",
			"error": {"type": "api_error", "message": "stream translation failed"}
		}),
		_ => serde_json::json!({
			"error": {"type": "server_error", "message": "stream translation failed"}
		}),
	};
	let mut out = bytes::BytesMut::new();
	if route == RouteType::Messages {
		if let Some(frame) = crate::parse::sse::encode_json_event("error", &body) {
			out.extend_from_slice(&frame);
		}
	} else {
		if let Some(frame) = crate::parse::sse::encode_json_event("", &body) {
			out.extend_from_slice(&frame);
		}
		out.extend_from_slice(&crate::parse::sse::done_frame());
	}
	out.freeze()
}

/// Average inter-token latency: the time after the first token, spread over the remaining
/// tokens. Only defined once at least two output tokens were observed.
pub fn time_per_output_token(
	total: Duration,
	time_to_first_token: Duration,
	max_output_tokens: u64,
) -> Option<Duration> {
	if max_output_tokens > 1 {
		Some((total - time_to_first_token) / (max_output_tokens - 1) as u32)
	} else {
		None
	}
}

fn extract_model(body: &Bytes) -> Strng {
	serde_json::from_slice::<serde_json::Value>(body)
		.ok()
		.and_then(|v| v.get("model").and_then(|m| m.as_str()).map(strng::new))
		.unwrap_or_default()
}

#[cfg(test)]
#[path = "extproc_tests.rs"]
mod tests;
