use aigw_core::prelude::*;
use bytes::Bytes;

use crate::http::{HeaderMap, HeaderMutation, is_event_stream};
use crate::llm::translator::{
	BodyMutation, RequestTransform, ResponseTransform, Translator, parse_request,
};
use crate::llm::types::completions::typed as completions;
use crate::llm::types::{TokenUsage, completions as completions_api, embeddings, responses};
use crate::llm::{AIError, RouteType};
use crate::parse;

/// Passthrough forwards bytes untouched in both directions. Used when the upstream schema is
/// the client's schema and no mutation was requested.
#[derive(Default)]
pub struct Passthrough {}

impl Translator for Passthrough {
	fn request_body(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
		_force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		// Best-effort model extraction for metrics; passthrough routes don't require a body
		// the gateway understands.
		let model = serde_json::from_slice::<serde_json::Value>(body)
			.ok()
			.and_then(|v| v.get("model").and_then(|m| m.as_str()).map(strng::new))
			.unwrap_or_default();
		Ok(RequestTransform {
			headers: HeaderMutation::default(),
			body: BodyMutation::Passthrough,
			original_model: model.clone(),
			request_model: model,
			override_host: None,
			streaming: false,
		})
	}

	fn response_body(
		&mut self,
		_headers: &HeaderMap,
		_chunk: &Bytes,
		_end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		Ok(ResponseTransform::passthrough())
	}
}

/// OpenAITranslator serves OpenAI-schema backends. Bodies pass through except when the model
/// is virtualized (or a mutation is forced), in which case the body is re-marshaled; streaming
/// responses are scanned for usage without being altered.
pub struct OpenAITranslator {
	route: RouteType,
	model_override: Option<Strng>,
	streaming: bool,
	sse: parse::sse::Parser,
	seen_model: bool,
}

impl OpenAITranslator {
	pub fn new(route: RouteType, model_override: Option<Strng>) -> Self {
		OpenAITranslator {
			route,
			model_override,
			streaming: false,
			sse: parse::sse::Parser::new(),
			seen_model: false,
		}
	}

	fn chat_request(
		&mut self,
		body: &Bytes,
		force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let mut req: completions_api::Request = parse_request(body)?;
		req.validate()?;
		let original_model = strng::new(req.model.as_deref().unwrap_or_default());
		if original_model.is_empty() && self.model_override.is_none() {
			return Err(AIError::MissingField(strng::literal!("model")));
		}
		self.streaming = req.streaming();

		let request_model = self
			.model_override
			.clone()
			.unwrap_or_else(|| original_model.clone());
		let mutate = force_body_mutation || self.model_override.is_some();
		let body = if mutate {
			req.model = Some(request_model.to_string());
			// Streaming token accounting needs the final usage frame; request it on the
			// client's behalf whenever we rewrite the body anyway.
			if self.streaming && req.stream_options.is_none() {
				req.stream_options = Some(completions_api::StreamOptions {
					include_usage: true,
					rest: Default::default(),
				});
			}
			BodyMutation::Replace(Bytes::from(
				serde_json::to_vec(&req).map_err(AIError::RequestMarshal)?,
			))
		} else {
			BodyMutation::Passthrough
		};

		Ok(RequestTransform {
			headers: HeaderMutation::default(),
			body,
			original_model,
			request_model,
			override_host: None,
			streaming: self.streaming,
		})
	}

	fn simple_request<T>(
		&mut self,
		body: &Bytes,
		force_body_mutation: bool,
		streaming: impl Fn(&T) -> bool,
		model: impl Fn(&mut T) -> &mut Option<String>,
	) -> Result<RequestTransform, AIError>
	where
		T: serde::de::DeserializeOwned + serde::Serialize,
	{
		let mut req: T = parse_request(body)?;
		let original_model = strng::new(model(&mut req).as_deref().unwrap_or_default());
		if original_model.is_empty() && self.model_override.is_none() {
			return Err(AIError::MissingField(strng::literal!("model")));
		}
		self.streaming = streaming(&req);
		let request_model = self
			.model_override
			.clone()
			.unwrap_or_else(|| original_model.clone());
		let body = if force_body_mutation || self.model_override.is_some() {
			*model(&mut req) = Some(request_model.to_string());
			BodyMutation::Replace(Bytes::from(
				serde_json::to_vec(&req).map_err(AIError::RequestMarshal)?,
			))
		} else {
			BodyMutation::Passthrough
		};
		Ok(RequestTransform {
			headers: HeaderMutation::default(),
			body,
			original_model,
			request_model,
			override_host: None,
			streaming: self.streaming,
		})
	}

	fn buffered_response(&mut self, body: &Bytes) -> Result<ResponseTransform, AIError> {
		let mut out = ResponseTransform::passthrough();
		match self.route {
			RouteType::ChatCompletions => {
				let resp: completions::Response =
					serde_json::from_slice(body).map_err(AIError::ResponseParsing)?;
				out.response_model = Some(strng::new(&resp.model));
				if let Some(u) = &resp.usage {
					out.usage = chat_usage(u);
				}
			},
			RouteType::Completions => {
				let resp: completions::TextCompletionResponse =
					serde_json::from_slice(body).map_err(AIError::ResponseParsing)?;
				out.response_model = Some(strng::new(&resp.model));
				if let Some(u) = &resp.usage {
					out.usage = chat_usage(u);
				}
			},
			RouteType::Embeddings => {
				let resp: embeddings::Response =
					serde_json::from_slice(body).map_err(AIError::ResponseParsing)?;
				out.response_model = Some(strng::new(&resp.model));
				out.usage = TokenUsage {
					input_tokens: Some(resp.usage.prompt_tokens),
					total_tokens: Some(resp.usage.total_tokens),
					..Default::default()
				};
			},
			RouteType::Responses => {
				let resp: responses::Response =
					serde_json::from_slice(body).map_err(AIError::ResponseParsing)?;
				out.response_model = Some(strng::new(&resp.model));
				if let Some(u) = &resp.usage {
					out.usage = responses_usage(u);
				}
			},
			RouteType::Models | RouteType::Messages | RouteType::Passthrough => {},
		}
		Ok(out)
	}

	fn stream_chunk(&mut self, chunk: &Bytes, end_of_stream: bool) -> ResponseTransform {
		let mut out = ResponseTransform::passthrough();
		let mut events = self.sse.push(chunk);
		if end_of_stream && let Some(tail) = self.sse.flush() {
			events.push(tail);
		}
		for ev in events {
			if ev.is_done() {
				continue;
			}
			match self.route {
				RouteType::Responses => {
					let Ok(parsed) = serde_json::from_str::<responses::ResponseStreamEvent>(&ev.data)
					else {
						tracing::debug!("failed to parse streaming response event");
						continue;
					};
					if parsed.carries_output() {
						out.saw_output = true;
					}
					if let Some(model) = parsed.response_model()
						&& !self.seen_model
					{
						self.seen_model = true;
						out.response_model = Some(strng::new(model));
					}
					if let Some(u) = parsed.usage() {
						out.usage = out.usage.override_with(&responses_usage(u));
					}
				},
				_ => {
					let Ok(parsed) = serde_json::from_str::<completions::StreamResponse>(&ev.data) else {
						tracing::debug!("failed to parse streaming response chunk");
						continue;
					};
					if !self.seen_model {
						self.seen_model = true;
						out.response_model = Some(strng::new(&parsed.model));
					}
					if parsed.choices.iter().any(|c| {
						c.delta.content.is_some()
							|| c.delta.tool_calls.is_some()
							|| c.delta.reasoning_content.is_some()
					}) {
						out.saw_output = true;
					}
					if let Some(u) = parsed.usage {
						out.usage = out.usage.override_with(&chat_usage(&u));
					}
				},
			}
		}
		out
	}
}

impl Translator for OpenAITranslator {
	fn request_body(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
		force_body_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		match self.route {
			RouteType::ChatCompletions => self.chat_request(body, force_body_mutation),
			RouteType::Completions => self.simple_request::<completions::TextCompletionRequest>(
				body,
				force_body_mutation,
				|r| r.stream.unwrap_or_default(),
				|r| &mut r.model,
			),
			RouteType::Embeddings => self.simple_request::<embeddings::Request>(
				body,
				force_body_mutation,
				|_| false,
				|r| &mut r.model,
			),
			RouteType::Responses => self.simple_request::<responses::Request>(
				body,
				force_body_mutation,
				|r| r.streaming(),
				|r| &mut r.model,
			),
			RouteType::Models | RouteType::Passthrough | RouteType::Messages => Ok(RequestTransform {
				headers: HeaderMutation::default(),
				body: BodyMutation::Passthrough,
				original_model: Strng::default(),
				request_model: Strng::default(),
				override_host: None,
				streaming: false,
			}),
		}
	}

	fn response_body(
		&mut self,
		headers: &HeaderMap,
		chunk: &Bytes,
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		if self.streaming || is_event_stream(headers) {
			return Ok(self.stream_chunk(chunk, end_of_stream));
		}
		if !end_of_stream {
			// Buffered responses are delivered whole by the processor
			return Ok(ResponseTransform::passthrough());
		}
		self.buffered_response(chunk)
	}
}

pub(crate) fn chat_usage(u: &completions::Usage) -> TokenUsage {
	let cached = u
		.prompt_tokens_details
		.as_ref()
		.and_then(|d| d.cached_tokens);
	let cache_creation = u
		.prompt_tokens_details
		.as_ref()
		.and_then(|d| d.cache_creation_tokens);
	TokenUsage {
		input_tokens: Some(u.prompt_tokens),
		output_tokens: Some(u.completion_tokens),
		total_tokens: Some(u.total_tokens),
		cached_input_tokens: cached,
		cache_creation_input_tokens: cache_creation,
	}
}

pub(crate) fn responses_usage(u: &responses::ResponseUsage) -> TokenUsage {
	TokenUsage {
		input_tokens: Some(u.input_tokens),
		output_tokens: Some(u.output_tokens),
		total_tokens: Some(u.total_tokens),
		cached_input_tokens: u.input_tokens_details.as_ref().map(|d| d.cached_tokens),
		cache_creation_input_tokens: None,
	}
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod tests;
