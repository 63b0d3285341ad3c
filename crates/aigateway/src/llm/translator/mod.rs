use aigw_core::prelude::*;
use bytes::Bytes;

use crate::http::{HeaderMap, HeaderMutation};
use crate::llm::types::TokenUsage;
use crate::llm::{AIError, AIProvider, RouteType};

pub mod anthropic;
pub mod azure;
pub mod bedrock;
pub mod cohere;
pub mod openai;
pub mod vertex;

pub use crate::http::BodyMutation;

/// RequestTransform is what a translator tells the host proxy to do with a request: header and
/// body mutations, plus routing facts the processor records.
#[derive(Debug)]
pub struct RequestTransform {
	pub headers: HeaderMutation,
	pub body: BodyMutation,
	/// The model the client asked for, before any rewriting. Used for metrics.
	pub original_model: Strng,
	/// The model actually sent upstream.
	pub request_model: Strng,
	/// When set, the upstream authority differs from the backend's default host.
	pub override_host: Option<Strng>,
	pub streaming: bool,
}

/// ResponseTransform carries mutations plus whatever usage accounting this chunk revealed.
#[derive(Debug, Default)]
pub struct ResponseTransform {
	pub headers: HeaderMutation,
	pub body: BodyMutation,
	/// Usage fields discovered in this chunk; the processor merges chunks together.
	pub usage: TokenUsage,
	pub response_model: Option<Strng>,
	/// True when this chunk carried model output (drives time-to-first-token).
	pub saw_output: bool,
}

impl ResponseTransform {
	pub fn passthrough() -> Self {
		Default::default()
	}

	pub fn replace(body: Bytes) -> Self {
		ResponseTransform {
			body: BodyMutation::Replace(body),
			..Default::default()
		}
	}
}

/// Translator converts between the client-facing schema and one backend schema for one
/// endpoint. Implementations are per-request objects: streaming ones keep decode state across
/// `response_body` calls and flush it when `end_of_stream` is set.
pub trait Translator: Send {
	fn request_body(
		&mut self,
		headers: &HeaderMap,
		body: &Bytes,
		force_body_mutation: bool,
	) -> Result<RequestTransform, AIError>;

	fn response_headers(&mut self, _headers: &HeaderMap) -> Result<HeaderMutation, AIError> {
		Ok(HeaderMutation::default())
	}

	fn response_body(
		&mut self,
		headers: &HeaderMap,
		chunk: &Bytes,
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError>;

	/// Translate a non-2xx upstream body into the client's error schema.
	fn response_error(
		&mut self,
		_headers: &HeaderMap,
		body: &Bytes,
	) -> Result<(HeaderMutation, BodyMutation), AIError> {
		let _ = body;
		Ok((HeaderMutation::default(), BodyMutation::Passthrough))
	}
}

/// The registry: one translator pair per (endpoint, backend schema). Unsupported combinations
/// are rejected up front rather than at mid-stream.
pub fn translator_for(
	route: RouteType,
	provider: &AIProvider,
) -> Result<Box<dyn Translator>, AIError> {
	Ok(match (route, provider) {
		(RouteType::Passthrough, _) => Box::new(openai::Passthrough::default()),
		(
			RouteType::ChatCompletions
			| RouteType::Completions
			| RouteType::Embeddings
			| RouteType::Models
			| RouteType::Responses,
			AIProvider::OpenAI(p),
		) => Box::new(openai::OpenAITranslator::new(route, p.model.clone())),
		(
			RouteType::ChatCompletions
			| RouteType::Completions
			| RouteType::Embeddings
			| RouteType::Responses,
			AIProvider::AzureOpenAI(p),
		) => Box::new(azure::AzureTranslator::new(route, p.clone())),
		(RouteType::ChatCompletions, AIProvider::Anthropic(p)) => {
			Box::new(anthropic::ChatToMessages::new(p.model.clone(), None))
		},
		(RouteType::Messages, AIProvider::Anthropic(p)) => {
			Box::new(anthropic::MessagesNative::new(p.model.clone(), None))
		},
		(RouteType::ChatCompletions, AIProvider::GcpAnthropic(p)) => {
			Box::new(anthropic::ChatToMessages::new(p.model.clone(), Some(p.clone())))
		},
		(RouteType::Messages, AIProvider::GcpAnthropic(p)) => {
			Box::new(anthropic::MessagesNative::new(p.model.clone(), Some(p.clone())))
		},
		(RouteType::ChatCompletions, AIProvider::Bedrock(p)) => {
			Box::new(bedrock::ChatToConverse::new(p.clone()))
		},
		(RouteType::Messages, AIProvider::Bedrock(p)) => {
			Box::new(bedrock::MessagesToConverse::new(p.clone()))
		},
		(RouteType::Embeddings, AIProvider::Bedrock(p)) => {
			Box::new(bedrock::EmbeddingsToInvoke::new(p.clone()))
		},
		(RouteType::ChatCompletions, AIProvider::Vertex(p)) => {
			Box::new(vertex::ChatToGemini::new(p.clone()))
		},
		(RouteType::Embeddings, AIProvider::Vertex(p)) => {
			Box::new(vertex::EmbeddingsToPredict::new(p.clone()))
		},
		(RouteType::Embeddings, AIProvider::Cohere(p)) => {
			Box::new(cohere::EmbeddingsTranslator::new(p.clone()))
		},
		(m, p) => {
			return Err(AIError::UnsupportedConversion(strng::format!(
				"{m:?} for provider {}",
				p.provider()
			)));
		},
	})
}

// Shared helpers

pub(crate) fn parse_request<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, AIError> {
	serde_json::from_slice(body).map_err(AIError::classify_request_parse)
}

/// route_to builds the header mutation that repoints a request at an upstream path. The
/// `:path` pseudo-header is how the host proxy expresses URL rewrites.
pub(crate) fn route_to(path: &str) -> HeaderMutation {
	HeaderMutation::default()
		.set(strng::new(crate::http::PSEUDO_PATH), strng::new(path))
		.remove(strng::literal!("content-length"))
}

pub(crate) fn now_unix() -> i64 {
	chrono::Utc::now().timestamp()
}

pub(crate) fn message_id(prefix: &str) -> String {
	format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::llm::{anthropic, cohere, openai, vertex};

	#[test]
	fn registry_covers_supported_pairs() {
		let openai = AIProvider::OpenAI(openai::Provider::default());
		for route in [
			RouteType::ChatCompletions,
			RouteType::Completions,
			RouteType::Embeddings,
			RouteType::Models,
			RouteType::Responses,
		] {
			assert!(translator_for(route, &openai).is_ok(), "{route:?}");
		}

		let anthropic = AIProvider::Anthropic(anthropic::Provider::default());
		assert!(translator_for(RouteType::ChatCompletions, &anthropic).is_ok());
		assert!(translator_for(RouteType::Messages, &anthropic).is_ok());

		let cohere = AIProvider::Cohere(cohere::Provider::default());
		assert!(translator_for(RouteType::Embeddings, &cohere).is_ok());
	}

	#[test]
	fn unsupported_pairs_are_rejected_up_front() {
		let cohere = AIProvider::Cohere(cohere::Provider::default());
		let err = match translator_for(RouteType::ChatCompletions, &cohere) {
			Err(e) => e,
			Ok(_) => panic!("expected error"),
		};
		assert!(matches!(err, AIError::UnsupportedConversion(_)));

		let vertex = AIProvider::Vertex(vertex::Provider {
			model: None,
			region: None,
			project_id: strng::literal!("proj"),
		});
		assert!(translator_for(RouteType::Messages, &vertex).is_err());
	}
}
